use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use surveybot_core::config::{Credentials, DEFAULT_SETTINGS_FILENAME, Settings, load_settings};
use surveybot_core::logging::init_logging;
use surveybot_core::runtime::{prepare, replay, start};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "surveybot",
    version,
    about = "Keeps wishlist survey category pages in sync with their proposals"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Settings file (default: ./surveybot.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Log intended edits as diffs instead of saving them")]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Watch the recent-changes stream (default)")]
    Watch,
    #[command(name = "check-config", about = "Log in, load the survey configuration and exit")]
    CheckConfig,
    #[command(about = "Apply change events from a newline-delimited JSON file")]
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
struct ReplayArgs {
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_runtime_settings(&cli)?;
    init_logging(&settings.logging)?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(settings).await,
        Commands::CheckConfig => run_check_config(settings).await,
        Commands::Replay(args) => run_replay(settings, &args.file).await,
    }
}

fn load_runtime_settings(cli: &Cli) -> Result<Settings> {
    dotenvy::dotenv().ok();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILENAME));
    if let Some(dir) = path.parent() {
        let local_env = dir.join(".env");
        if local_env.exists() {
            let _ = dotenvy::from_path_override(&local_env);
        }
    }

    let mut settings = load_settings(&path)?;
    if cli.dry_run {
        settings.bot.dry_run = true;
    }
    Ok(settings)
}

/// Writes need a session; a dry run may go without one.
fn resolve_credentials(settings: &Settings) -> Result<Option<Credentials>> {
    match Credentials::from_env() {
        Ok(credentials) => Ok(Some(credentials)),
        Err(_) if settings.bot.dry_run => Ok(None),
        Err(error) => Err(error),
    }
}

async fn run_watch(settings: Settings) -> Result<()> {
    let credentials = resolve_credentials(&settings)?;
    if settings.bot.dry_run {
        info!("dry run: edits will be logged, not saved");
    }
    start(settings, credentials).await
}

async fn run_check_config(settings: Settings) -> Result<()> {
    let credentials = resolve_credentials(&settings)?;
    let context = prepare(settings, credentials).await?;

    println!("survey_root: {}", context.survey.survey_root);
    println!("bot_identity: {}", context.bot_identity.as_deref().unwrap_or("<none>"));
    println!("categories:");
    for category in &context.survey.categories {
        let page_id = context
            .page_ids
            .get(category)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "missing".to_string());
        println!(
            "  {category} (page id: {page_id}, counted: {})",
            format_flag(context.settings.is_counted(category))
        );
    }
    println!(
        "sentinel categories: {}",
        context.settings.bot.extra_categories.join(", ")
    );
    println!("editor counts: {}", format_flag(context.editor_counts.is_some()));
    println!();
    println!("{}", serde_json::to_string_pretty(&context.survey)?);
    Ok(())
}

async fn run_replay(settings: Settings, file: &Path) -> Result<()> {
    let credentials = resolve_credentials(&settings)?;
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );
    let context = prepare(settings, credentials).await?;
    let report = replay(&context, reader).await?;
    println!(
        "replayed {} events from {}: {} acted on, {} failed",
        report.events,
        normalize_path(file),
        report.acted,
        report.failed
    );
    Ok(())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["surveybot", "--legacy-flag"]).is_err());
        assert!(Cli::try_parse_from(["surveybot", "watch", "extra"]).is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["surveybot", "replay", "events.ndjson", "--dry-run"])
            .expect("parse");
        assert!(cli.dry_run);
        match cli.command {
            Some(Commands::Replay(args)) => assert_eq!(args.file, PathBuf::from("events.ndjson")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["surveybot"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(!cli.dry_run);
    }
}
