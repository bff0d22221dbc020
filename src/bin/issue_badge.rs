// src/bin/issue_badge.rs

//! Operator CLI for issuing and inspecting badges directly against the
//! registry directory, without going through the HTTP API.
//!
//! Uses the same environment configuration as the server, so a badge issued
//! here is indistinguishable from one issued over `POST /issue`.

use anyhow::{bail, Context};
use badge_registry::{build_services, AppConfig, BadgeError, IssueRequest, IssuerOverride};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::Path;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "issue-badge", version, about = "Issue and inspect badges in the local registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue a badge and update the registry
    Issue(IssueArgs),

    /// Print a stored badge and its signature status
    Verify {
        /// Badge id
        id: String,
    },
}

#[derive(clap::Args, Debug)]
struct IssueArgs {
    /// Badge display name
    badge_name: String,

    /// Recipient full name
    recipient_name: String,

    /// Recipient email, or '-' for none
    recipient_email_or_dash: String,

    /// Image path relative to the site (e.g. assets/badges/sample.png)
    image_rel_path: String,

    /// Comma-separated skills (e.g. 'Figma, Colour theory')
    skills_csv: String,

    /// Optional description
    #[arg(default_value = "")]
    description: String,

    /// Override issuer.name (else use the registry's issuer name)
    #[arg(long)]
    issuer_name: Option<String>,

    /// Override issuer.website (else use the registry's issuer website)
    #[arg(long)]
    issuer_website: Option<String>,
}

/// Splits a comma-separated skill list, trimming entries and dropping blanks.
fn parse_skills(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn relative(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(|p| p.display().to_string()))
        .unwrap_or_else(|| path.display().to_string())
}

fn issue(config: &AppConfig, args: IssueArgs) -> anyhow::Result<()> {
    let (issuer_service, _) = build_services(config)?;

    let issuer_override = IssuerOverride {
        name: args.issuer_name,
        website: args.issuer_website,
    };

    let email = match args.recipient_email_or_dash.as_str() {
        "-" => None,
        other => Some(other.to_string()),
    };
    let request = IssueRequest {
        name: Some(args.badge_name),
        recipient_name: Some(args.recipient_name),
        recipient_email: email,
        image: Some(args.image_rel_path),
        skills: Some(parse_skills(&args.skills_csv)),
        description: Some(args.description),
    };

    let badge = match issuer_service.issue_with_issuer(request, issuer_override) {
        Ok(badge) => badge,
        Err(BadgeError::MissingFields) => {
            bail!("badge name, recipient name and image must not be empty")
        }
        Err(e) => return Err(e).context("issuance failed"),
    };

    let store = issuer_service.store();
    println!("Issued badge {}", badge.id);
    println!("Wrote: {}", relative(&store.snapshot_path(&badge.id)));
    println!("Wrote: {}", relative(&store.registry_path()));
    println!("Verify at: {}", badge.verify_url);
    Ok(())
}

fn verify(config: &AppConfig, id: &str) -> anyhow::Result<bool> {
    let (_, verifier) = build_services(config)?;
    match verifier.verify_with_signature(id) {
        Ok((badge, status)) => {
            println!("{}", serde_json::to_string_pretty(&badge)?);
            println!("Signature: {}", status.as_str());
            Ok(true)
        }
        Err(BadgeError::NotFound) => {
            eprintln!("Badge not found for id {}", id);
            Ok(false)
        }
        Err(e) => Err(e).context("lookup failed"),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Issue(args) => {
            issue(&config, args)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { id } => {
            if verify(&config, &id)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
