use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use foisit::dialog::{coerce_answer, Session, Turn};
use foisit::model::{CommandPayload, InteractiveResponse, Params};
use foisit::registry::catalog;
use foisit::settings::{self, AssistantConfig};
use foisit::{logging, CommandHandler};

const DEFAULT_CONFIG: &str = "foisit.json";
const ENV_CONFIG: &str = "FOISIT_CONFIG";

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "foisit-cli", about = "Drive a foisit command registry from the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Assistant config file (defaults to $FOISIT_CONFIG, then ./foisit.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List registered commands
    List,
    /// Resolve one input and print the response
    Run {
        /// Free-text input
        input: Option<String>,
        /// Run a command by id instead of matching text
        #[arg(long, conflicts_with = "input")]
        command_id: Option<String>,
        /// Parameter as name=value (repeatable)
        #[arg(long = "param", requires = "command_id")]
        params: Vec<String>,
    },
    /// Interactive session
    Chat,
    /// Print JSON schemas
    Schema {
        /// Intent service request/response schema instead of the command tools
        #[arg(long)]
        contract: bool,
    },
}

// ── Config ───────────────────────────────────────────────────────

/// Resolve the config path and whether the user named it.
fn config_path(flag: Option<&Path>) -> (PathBuf, bool) {
    if let Some(path) = flag {
        return (path.to_path_buf(), true);
    }
    match std::env::var(ENV_CONFIG) {
        Ok(p) if !p.trim().is_empty() => (PathBuf::from(p), true),
        _ => (PathBuf::from(DEFAULT_CONFIG), false),
    }
}

fn load_config(flag: Option<&Path>) -> AssistantConfig {
    let (path, explicit) = config_path(flag);
    let mut config = if !explicit && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using the built-in sample");
        AssistantConfig::sample()
    } else {
        settings::load_config(&path).unwrap_or_else(|e| {
            eprintln!("Error: failed to load {}: {e}", path.display());
            process::exit(1);
        })
    };
    config.apply_env();
    config
}

fn build_handler(config: &AssistantConfig) -> Arc<CommandHandler> {
    match config.build_handler() {
        Ok(handler) => Arc::new(handler),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

// ── Input building ───────────────────────────────────────────────

/// `name=value` pairs; values are coerced by the command's declared
/// parameter type, or parsed as JSON, or taken as text.
fn build_payload(
    handler: &CommandHandler,
    command_id: &str,
    pairs: &[String],
) -> Result<CommandPayload, String> {
    let command = handler.snapshot().get_by_id(command_id);
    let mut params = Params::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, got \"{pair}\""))?;
        let declared = command
            .as_ref()
            .and_then(|c| c.parameters.iter().find(|p| p.name == name));
        let value = match declared {
            Some(param) => coerce_answer(param, raw),
            None => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        };
        params.insert(name.to_string(), value);
    }
    Ok(CommandPayload::new(command_id).with_params(params))
}

// ── Output formatting ────────────────────────────────────────────

fn print_response(response: &InteractiveResponse, raw_json: bool) {
    if raw_json {
        println!("{}", serde_json::to_string_pretty(response).unwrap_or_default());
        return;
    }

    let message = response.message();
    match response {
        InteractiveResponse::Error { .. } => println!("Error: {message}"),
        _ if message.is_empty() => println!("Done."),
        _ => println!("{message}"),
    }

    if let Some(fields) = response.fields() {
        for field in fields {
            let mut line = format!("  - {} ({})", field.name, field.type_name());
            if let Some(desc) = &field.description {
                line.push_str(": ");
                line.push_str(desc);
            }
            println!("{line}");
        }
    }
    if let Some(options) = response.options() {
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option.label);
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Answer a `confirm` response on stdin and submit the chosen option.
/// Anything but yes declines.
async fn answer_confirmation(
    handler: &CommandHandler,
    response: &InteractiveResponse,
) -> Option<InteractiveResponse> {
    let options = response.options()?;
    print!("[y/N] ");
    let _ = std::io::stdout().flush();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await.ok().flatten().unwrap_or_default();
    let yes = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
    let choice = options.iter().find(|o| o.confirmed == Some(yes))?;
    Some(handler.execute_command(choice.to_payload()?).await)
}

// ── Subcommands ──────────────────────────────────────────────────

fn run_init(flag: Option<&Path>, force: bool) {
    let (path, _) = config_path(flag);
    if path.exists() && !force {
        eprintln!("Error: {} already exists (use --force to overwrite)", path.display());
        process::exit(1);
    }
    if let Err(e) = settings::save_config(&path, &AssistantConfig::sample()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    println!("Wrote {}", path.display());
}

async fn run_chat(config: &AssistantConfig, handler: Arc<CommandHandler>, raw_json: bool) {
    let mut session = Session::new(handler);
    if let Some(phrase) = &config.activation_command {
        session = session.with_activation(phrase, config.intro_message.as_deref());
        println!("Say \"{phrase}\" to start. Ctrl-D to quit.");
    } else if let Some(intro) = &config.intro_message {
        println!("{intro}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            prompt();
            continue;
        }
        match session.submit_text(&line).await {
            Turn::Ignored => {}
            Turn::Activated(intro) => println!("{intro}"),
            Turn::Response(response) => {
                print_response(&response, raw_json);
                if let Some(field) = session.dialog().and_then(|d| d.next_field()) {
                    println!("({}?)", field.name);
                }
            }
        }
        prompt();
    }
    println!();
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let raw = cli.json;

    if let Commands::Init { force } = &cli.command {
        run_init(cli.config.as_deref(), *force);
        return;
    }

    let config = load_config(cli.config.as_deref());
    let handler = build_handler(&config);

    match cli.command {
        Commands::Init { .. } => {}
        Commands::List => {
            let registry = handler.snapshot();
            if raw {
                let descriptors = catalog::descriptors(&registry);
                println!("{}", serde_json::to_string_pretty(&descriptors).unwrap_or_default());
            } else {
                println!("{}", catalog::help_text(&registry));
            }
        }
        Commands::Run {
            input,
            command_id,
            params,
        } => {
            let mut response = match (input, command_id) {
                (_, Some(id)) => {
                    match build_payload(&handler, &id, &params) {
                        Ok(payload) => handler.execute_command(payload).await,
                        Err(e) => {
                            eprintln!("Error: {e}");
                            process::exit(2);
                        }
                    }
                }
                (Some(text), None) => handler.execute_command(text).await,
                (None, None) => {
                    eprintln!("Error: give an input or --command-id");
                    process::exit(2);
                }
            };
            print_response(&response, raw);
            if matches!(response, InteractiveResponse::Confirm { .. }) {
                if let Some(answered) = answer_confirmation(&handler, &response).await {
                    response = answered;
                    print_response(&response, raw);
                }
            }
            if matches!(response, InteractiveResponse::Error { .. }) {
                process::exit(1);
            }
        }
        Commands::Chat => run_chat(&config, handler, raw).await,
        Commands::Schema { contract } => {
            let schema = if contract {
                catalog::contract_schema()
            } else {
                catalog::to_json_schema(&handler.snapshot())
            };
            println!("{}", serde_json::to_string_pretty(&schema).unwrap_or_default());
        }
    }
}
