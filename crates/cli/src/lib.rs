pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use wayfarer_core::config::{
    AppConfig, ConfigOverrides, LlmProvider, LoadOptions, LogFormat, LoggingConfig,
};
use wayfarer_core::domain::trip::TripStatus;

use commands::queries::CriteriaArgs;
use commands::trips::{parse_status, patch_from_edits, TripAction};
use commands::{CommandResult, EXIT_INVALID_INPUT};

#[derive(Debug, Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer trip-planning CLI",
    long_about = "Plan trips conversationally, inspect search planning, manage saved trips, and check runtime readiness.",
    after_help = "Examples:\n  wayfarer chat\n  wayfarer ask \"A romantic weekend in Paris for two\"\n  wayfarer queries --destination Tokyo --activity food\n  wayfarer doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Default, clap::Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file to load instead of wayfarer.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the database URL")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[arg(long, global = true, value_parser = parse_provider, help = "Override the llm provider (openai|ollama)")]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override the llm model")]
    llm_model: Option<String>,
    #[arg(long, global = true, help = "Load the provider catalog from this TOML file")]
    catalog: Option<PathBuf>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                llm_provider: self.llm_provider,
                llm_model: self.llm_model.clone(),
                llm_base_url: None,
                search_catalog_path: self.catalog.clone(),
                retrieval_max_results: None,
            },
        }
    }
}

fn parse_provider(raw: &str) -> Result<LlmProvider, String> {
    raw.parse::<LlmProvider>().map_err(|error| error.to_string())
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Plan a trip interactively, one message per line")]
    Chat {
        #[arg(long, help = "Continue an existing conversation")]
        conversation: Option<String>,
    },
    #[command(about = "Send a single message and print the structured reply")]
    Ask {
        message: String,
        #[arg(long, help = "Continue an existing conversation")]
        conversation: Option<String>,
    },
    #[command(about = "Print the search queries planned for the given criteria (offline)")]
    Queries {
        #[command(flatten)]
        criteria: CriteriaArgs,
    },
    #[command(about = "Run retrieval for the given criteria and print travel items as JSON")]
    Search {
        #[command(flatten)]
        criteria: CriteriaArgs,
    },
    /// Manage saved trips
    #[command(subcommand)]
    Trips(TripsCommand),
    #[command(about = "Mark a conversation that is showing results as completed")]
    Close { conversation: String },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Check configuration, credentials, provider catalog, and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
}

#[derive(Debug, Subcommand)]
enum TripsCommand {
    #[command(about = "List saved trips, newest first")]
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<TripStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    #[command(about = "Show one saved trip")]
    Show { id: String },
    #[command(about = "Save the itinerary a conversation produced as a draft trip")]
    Save {
        #[arg(long)]
        conversation: String,
    },
    #[command(about = "Edit a saved trip")]
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        budget: Option<Decimal>,
        #[arg(long)]
        travelers: Option<u32>,
        #[arg(long, value_parser = parse_status)]
        status: Option<TripStatus>,
    },
    #[command(about = "Delete a saved trip")]
    Delete { id: String },
}

impl TripsCommand {
    fn into_action(self) -> Result<TripAction, CommandResult> {
        Ok(match self {
            Self::List { status, limit } => TripAction::List { status, limit },
            Self::Show { id } => TripAction::Show { id },
            Self::Save { conversation } => TripAction::Save { conversation },
            Self::Update { id, title, destination, start_date, end_date, budget, travelers, status } => {
                let patch = patch_from_edits(
                    title,
                    destination,
                    start_date,
                    end_date,
                    budget,
                    travelers,
                    status,
                )
                .ok_or_else(|| {
                    CommandResult::failure(
                        "trips.update",
                        "invalid_input",
                        "nothing to update; pass at least one field flag",
                        EXIT_INVALID_INPUT,
                    )
                })?;
                TripAction::Update { id, patch }
            }
            Self::Delete { id } => TripAction::Delete { id },
        })
    }
}

/// Routes `tracing` output to stderr so command results stay parseable on stdout.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Chat { conversation } => commands::chat::run(&options, conversation),
        Command::Ask { message, conversation } => {
            commands::ask::run(&options, &message, conversation)
        }
        Command::Queries { criteria } => commands::queries::run(&options, &criteria),
        Command::Search { criteria } => commands::search::run(&options, &criteria),
        Command::Trips(trips) => match trips.into_action() {
            Ok(action) => commands::trips::run(&options, action),
            Err(failure) => failure,
        },
        Command::Close { conversation } => commands::close::run(&options, &conversation),
        Command::Config => {
            CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            let (output, passed) = commands::doctor::run(&options, json);
            CommandResult { exit_code: if passed { 0 } else { 1 }, output }
        }
        Command::Migrate => commands::migrate::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, TripsCommand};

    #[test]
    fn global_flags_become_config_overrides() {
        let cli = Cli::try_parse_from([
            "wayfarer",
            "queries",
            "--destination",
            "Tokyo",
            "--database-url",
            "sqlite://other.db",
            "--llm-provider",
            "ollama",
        ])
        .expect("parse");

        let options = cli.global.load_options();
        assert_eq!(options.overrides.database_url.as_deref(), Some("sqlite://other.db"));
        assert!(options.overrides.llm_provider.is_some());
        assert!(!options.require_file);
        assert!(matches!(cli.command, Command::Queries { ref criteria } if criteria.destination.as_deref() == Some("Tokyo")));
    }

    #[test]
    fn trips_update_without_fields_is_rejected() {
        let cli = Cli::try_parse_from(["wayfarer", "trips", "update", "trip_1"]).expect("parse");
        let Command::Trips(trips @ TripsCommand::Update { .. }) = cli.command else {
            panic!("expected trips update");
        };

        let failure = trips.into_action().expect_err("empty update");
        assert_eq!(failure.exit_code, super::EXIT_INVALID_INPUT);
    }

    #[test]
    fn unknown_trip_status_is_a_parse_error() {
        assert!(Cli::try_parse_from(["wayfarer", "trips", "list", "--status", "archived"]).is_err());
    }
}
