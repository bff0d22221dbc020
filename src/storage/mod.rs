// src/storage/mod.rs
pub mod badge_store;
pub mod file_lock;

pub use badge_store::{BadgeStore, RetryPolicy};
