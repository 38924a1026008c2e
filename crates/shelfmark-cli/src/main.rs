mod confirm;
mod prompt;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shelfmark_core::{AppConfig, ExitCode, ShelfError, ShelfList, open_store, parse_tags};
use shelfmark_lookup::LookupPipeline;

use crate::confirm::{AddOptions, AddOutcome, add_book, describe};
use crate::prompt::TerminalPrompter;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfmark",
    about = "Add books to your reading list from a title, an ISBN or a shop page",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (implies --yes for `add`).
    /// Also enabled by setting SHELFMARK_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Look a book up and add it to the library.
    Add {
        /// A URL, a title/author, or an ISBN.
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
        /// Accept the first match without prompting.
        #[arg(short, long)]
        yes: bool,
        /// List to file the book under: to-read, to-buy or read.
        #[arg(long)]
        list: Option<ShelfList>,
        #[arg(long, action = clap::ArgAction::Append)]
        tag: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Add even if the book is already stored.
        #[arg(long)]
        force: bool,
    },

    /// Show what `add` would find, without touching the store.
    Lookup {
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location.
    Path,
    /// Show the effective configuration.
    Show,
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing();

    let json_output = cli.json || std::env::var("SHELFMARK_JSON").as_deref() == Ok("1");

    match cli.command {
        Commands::Add {
            input,
            yes,
            list,
            tag,
            notes,
            force,
        } => {
            let config = load_config(json_output);
            let store = open_store(&config.storage).unwrap_or_else(|e| config_failure(json_output, &e));
            let pipeline = LookupPipeline::from_config(&config).context("failed to build HTTP clients")?;

            let options = AddOptions {
                assume_yes: yes || json_output,
                force,
                list,
                tags: tag.iter().flat_map(|t| parse_tags(t)).collect(),
                notes,
            };
            let mut prompter = TerminalPrompter::new();
            let outcome = add_book(
                &pipeline,
                store.as_ref(),
                &mut prompter,
                &input.join(" "),
                &options,
            )
            .await?;

            report_add(&outcome, json_output, start.elapsed().as_millis())?;
            exit_with(outcome.exit_code());
        }

        Commands::Lookup { input } => {
            let config = load_config(json_output);
            let pipeline = LookupPipeline::from_config(&config).context("failed to build HTTP clients")?;
            let raw = input.join(" ");

            let built = pipeline.build_query(raw.trim()).await;
            let query = if built.is_empty() {
                raw.trim().to_string()
            } else {
                built.query.clone()
            };
            let found = pipeline.candidate(&query, built.cover.as_deref()).await;
            let dur = start.elapsed().as_millis();

            match found {
                Some(record) => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "query": query, "book": record },
                            "meta": { "duration_ms": dur, "catalog": pipeline.catalog_name() }
                        }))?;
                    } else {
                        println!("Query: {query}");
                        println!("{}", describe(&record));
                    }
                }
                None => {
                    report_not_found(&query, json_output, dur)?;
                    exit_with(ExitCode::NotFound);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Path => {
                let path = AppConfig::config_path();
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"path":path}}))?;
                } else {
                    println!("{}", path.display());
                }
            }

            ConfigAction::Show => {
                let config = load_config(json_output);
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":config}))?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }

            ConfigAction::Init { force } => {
                let path = AppConfig::config_path();
                let written = init_config(&path, force)?;
                if json_output {
                    print_json(&serde_json::json!({
                        "status": if written { "ok" } else { "exists" },
                        "data": { "path": path }
                    }))?;
                } else if written {
                    println!("Wrote default config to {}", path.display());
                } else {
                    eprintln!("{} already exists. Add --force to overwrite.", path.display());
                    exit_with(ExitCode::GeneralError);
                }
            }
        },
    }

    Ok(())
}

// ─── Reporting ───────────────────────────────────────────────────────────────

fn report_add(outcome: &AddOutcome, json_output: bool, dur: u128) -> Result<()> {
    match outcome {
        AddOutcome::Added { id, record } => {
            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "id": id, "book": record },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                println!("Added \"{}\" to {} ({id}).", record.title, record.list);
            }
        }
        AddOutcome::NotFound { query } => report_not_found(query, json_output, dur)?,
        AddOutcome::NoQuery => {
            if json_output {
                print_json(&serde_json::json!({"status":"error","error":"no_query","message":"Could not derive a search query","meta":{"duration_ms":dur}}))?;
            } else {
                eprintln!("No title given; nothing added.");
            }
        }
        AddOutcome::Declined => {
            if json_output {
                print_json(&serde_json::json!({"status":"skipped","meta":{"duration_ms":dur}}))?;
            } else {
                println!("Nothing added.");
            }
        }
        AddOutcome::DuplicateRefused { record } => {
            if json_output {
                print_json(&serde_json::json!({
                    "status": "exists",
                    "message": "Book already in library",
                    "data": { "book": record },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                eprintln!(
                    "\"{}\" is already in your library. Use --force to add it again.",
                    record.title
                );
            }
        }
        AddOutcome::WriteFailed { error, .. } => {
            if json_output {
                print_json(&serde_json::json!({"status":"error","error":"write_failed","message":format!("Error saving book: {error}"),"meta":{"duration_ms":dur}}))?;
            } else {
                eprintln!("Error saving book: {error}");
            }
        }
    }
    Ok(())
}

fn report_not_found(query: &str, json_output: bool, dur: u128) -> Result<()> {
    if json_output {
        print_json(&serde_json::json!({
            "status": "error",
            "error": "not_found",
            "message": "No match found in the book catalog",
            "query": query,
            "meta": { "duration_ms": dur }
        }))?;
    } else {
        eprintln!("No match found in the book catalog for \"{query}\".");
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

/// Config file plus env overrides. Any problem here ends the process.
fn load_config(json_output: bool) -> AppConfig {
    let mut config = AppConfig::load().unwrap_or_else(|e| config_failure(json_output, &e));
    if let Err(e) = config.apply_env_overrides() {
        config_failure(json_output, &e);
    }
    config
}

fn config_failure(json_output: bool, err: &ShelfError) -> ! {
    if json_output {
        let _ = print_json(&serde_json::json!({"status":"error","error":"config","message":err.to_string()}));
    } else {
        eprintln!("{err}");
        eprintln!("Config file: {}", AppConfig::config_path().display());
    }
    exit_with(startup_exit_code(err))
}

/// Bad or missing settings get their own code; anything else is a plain failure.
fn startup_exit_code(err: &ShelfError) -> ExitCode {
    if err.is_config() {
        ExitCode::ConfigMissing
    } else {
        ExitCode::GeneralError
    }
}

/// Returns `false` without writing when the file exists and `force` is off.
fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    AppConfig::default()
        .save_to(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

fn exit_with(code: ExitCode) -> ! {
    std::process::exit(code.code())
}
