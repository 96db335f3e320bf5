use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tagsend_core::settings::LoggingConfig;
use tagsend_core::Settings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;

mod app;
mod menu;

use app::{write_contacts, write_report, App};
use menu::Prompt;

#[derive(Parser, Debug)]
#[command(name = "tagsend", author, version, about = "Send chat messages to tagged contacts")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs here instead of `logging.file`
    #[arg(long, global = true, value_name = "PATH")]
    log_file_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive menu (the default)
    Menu,

    /// Send a message to every contact with a tag
    Send {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        message: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Print the send report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List contacts, optionally only those with a tag
    List {
        #[arg(long)]
        tag: Option<String>,
    },

    /// Case-insensitive search over names and tags
    Search { keyword: String },

    /// List every tag in use
    Tags,

    /// Add or remove a tag on a contact
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Add a contact
    Add {
        name: String,
        #[arg(long = "type", default_value = "friend")]
        contact_type: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Sync contacts from the chat client
    Sync,

    /// Fetch friend details from the chat client
    Friends {
        #[arg(long)]
        limit: Option<usize>,
        /// Add fetched friends as contacts tagged "friend"
        #[arg(long)]
        import: bool,
        /// Show one cached friend instead of fetching
        #[arg(long, conflicts_with_all = ["limit", "import"])]
        name: Option<String>,
    },

    /// Send a test message to the file transfer helper
    Helper,

    /// Read or change configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    Add { name: String, tag: String },
    Remove { name: String, tag: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print a dotted key such as `message.send_interval`
    Get { key: String },
    /// Write a dotted key to the config file
    Set { key: String, value: String },
}

/// Rotated log files kept next to the current one.
const MAX_LOG_FILES: usize = 5;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match start(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Everything after argument parsing. The log guard lives until this returns,
/// so the file layer is flushed on every exit path.
fn start(cli: Cli) -> Result<bool> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load tagsend config")?;
    let _guard = init_tracing(&settings.app().logging, cli.log_file_path.as_deref());
    if settings.created_default() {
        tracing::info!("Created default config at {:?}", settings.path());
    }
    tracing::debug!("Using config at {:?}", settings.path());

    let mut app = App::new(settings);
    match run(&mut app, cli.command.unwrap_or(Command::Menu)) {
        Ok(ok) => Ok(ok),
        Err(e) => {
            tracing::error!("{:#}", e);
            Ok(false)
        }
    }
}

/// Console logs go to stderr so `--json` output stays clean. The file rolls
/// daily and keeps [`MAX_LOG_FILES`] files; it is skipped when it cannot be
/// opened.
fn init_tracing(logging: &LoggingConfig, override_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let console = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_writer(io::stderr);

    let log_path = override_path.unwrap_or(logging.file.as_path());
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let prefix = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tagsend");
    let suffix = log_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("log");

    let built = std::fs::create_dir_all(log_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix(suffix)
                .max_log_files(MAX_LOG_FILES)
                .build(log_dir)
                .map_err(|e| e.to_string())
        });
    let file_appender = match built {
        Ok(appender) => appender,
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .init();
            tracing::warn!("Logging to console only, cannot open log in {:?}: {}", log_dir, e);
            return None;
        }
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    Some(guard)
}

/// Runs one command. `Ok(false)` means the operation itself reported failure.
fn run(app: &mut App, command: Command) -> Result<bool> {
    let mut out = io::stdout();

    match command {
        Command::Menu => {
            let mut prompt = Prompt::new(io::stdin().lock(), io::stdout());
            menu::run(app, &mut prompt).context("Interactive menu failed")?;
            Ok(true)
        }

        Command::Send {
            tag,
            message,
            yes,
            json,
        } => {
            let report = if yes {
                app.dispatcher.send_by_tag(&app.contacts, &tag, &message)
            } else {
                let mut prompt = Prompt::new(io::stdin().lock(), io::stderr());
                app.dispatcher
                    .send_by_tag_confirmed(&app.contacts, &tag, &message, |plan| {
                        prompt.confirm_plan(plan)
                    })
            };

            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                write_report(&mut out, &report)?;
            }
            Ok(report.success)
        }

        Command::List { tag } => {
            let contacts = match tag {
                Some(tag) => app.contacts.get_by_tag(&tag),
                None => app.contacts.list_all(),
            };
            write_contacts(&mut out, &contacts)?;
            Ok(true)
        }

        Command::Search { keyword } => {
            write_contacts(&mut out, &app.contacts.search(&keyword))?;
            Ok(true)
        }

        Command::Tags => {
            let tags = app.contacts.all_tags();
            if tags.is_empty() {
                writeln!(out, "No tags.")?;
            }
            for tag in tags {
                let count = app.contacts.get_by_tag(&tag).len();
                writeln!(out, "{tag} ({count})")?;
            }
            Ok(true)
        }

        Command::Tag { action } => {
            let changed = match &action {
                TagAction::Add { name, tag } => app.contacts.add_tag(name, tag),
                TagAction::Remove { name, tag } => app.contacts.remove_tag(name, tag),
            };
            if !changed {
                writeln!(out, "Nothing changed.")?;
            }
            Ok(changed)
        }

        Command::Add {
            name,
            contact_type,
            tags,
        } => {
            let added = app.contacts.add_contact(&name, &contact_type, &tags);
            if added {
                writeln!(out, "Added {name}.")?;
            } else {
                writeln!(out, "Could not add '{name}'.")?;
            }
            Ok(added)
        }

        Command::Sync => {
            let ok = app.contacts.sync_from_driver(app.dispatcher.driver());
            writeln!(out, "{} contacts.", app.contacts.contact_count())?;
            Ok(ok)
        }

        Command::Friends {
            limit,
            import,
            name,
        } => {
            if let Some(name) = name {
                return match app.friends.get_by_name(&name) {
                    Some(friend) => {
                        writeln!(out, "{}", serde_json::to_string_pretty(friend)?)?;
                        Ok(true)
                    }
                    None => {
                        writeln!(out, "No cached friend named '{name}'.")?;
                        Ok(false)
                    }
                };
            }

            let fetched = app.friends.fetch(app.dispatcher.driver_mut(), limit);
            for friend in &fetched {
                writeln!(out, "{}", friend.nickname)?;
            }
            writeln!(out, "Fetched {} friend(s).", fetched.len())?;
            if fetched.is_empty() {
                return Ok(false);
            }

            if import {
                let added = app
                    .friends
                    .sync_to_contacts(&mut app.contacts)
                    .context("Failed to import friends")?;
                writeln!(out, "Imported {added} new contact(s).")?;
            }
            Ok(true)
        }

        Command::Helper => Ok(app.dispatcher.send_test_message(None)),

        Command::Config { action } => match action {
            ConfigAction::Get { key } => match app.settings.get::<serde_json::Value>(&key) {
                Some(value) => {
                    writeln!(out, "{value}")?;
                    Ok(true)
                }
                None => {
                    writeln!(out, "No value for '{key}'.")?;
                    Ok(false)
                }
            },
            ConfigAction::Set { key, value } => {
                app.settings
                    .set(&key, &value)
                    .with_context(|| format!("Failed to set {key}"))?;
                writeln!(out, "{key} = {value}")?;
                Ok(true)
            }
        },
    }
}
