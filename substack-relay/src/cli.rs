///
/// This module implements the CLI for substack-relay: command parsing, argument
/// validation, and the async entrypoint shared by `main` and the integration tests.
///
/// Note composition, routing and output shaping live in [`substack-relay-core`];
/// this module only loads inputs, builds the HTTP client and prints JSON.
///
/// ## Commands
/// - `note preview`: compose a note from markdown or plain text and print its document, offline.
/// - `note create`: compose and publish a note with the configured session.
/// - `run`: execute a file of resource requests and print the output items.
///
/// Results go to stdout as JSON; logs go to stderr.
///
/// [`substack-relay-core`]: ../../substack-relay-core/
use crate::client::SubstackClient;
use crate::load_config::{load_config, CliConfig};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use substack_relay_core::cache::ClientCache;
use substack_relay_core::convert::{compose_note, NoteFormat};
use substack_relay_core::operation::{dispatch, execute, Request, RequestItem};

/// Clients built during this process, one per credential set.
static CLIENTS: Lazy<ClientCache<SubstackClient>> = Lazy::new(ClientCache::new);

/// CLI for substack-relay: publish notes and read Substack content as JSON.
#[derive(Parser)]
#[clap(
    name = "substack-relay",
    version,
    about = "Publish markdown notes to Substack and fetch profiles, posts, notes and comments"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose or publish a note
    Note {
        #[clap(subcommand)]
        action: NoteCommand,
    },
    /// Execute a list of resource requests from a JSON or YAML file
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the request list (`.json`, `.yaml` or `.yml`)
        #[clap(long)]
        requests: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Print the note document a body would produce, without publishing
    Preview {
        #[clap(flatten)]
        body: BodyArgs,
        /// `simple` or `markdown` (default)
        #[clap(long)]
        format: Option<NoteFormat>,
    },
    /// Publish a note
    Create {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        body: BodyArgs,
        /// `simple` or `markdown`; defaults to the config's `defaults.note_format`
        #[clap(long)]
        format: Option<NoteFormat>,
    },
}

/// Where the note body comes from.
#[derive(Args, Debug, Clone)]
pub struct BodyArgs {
    /// Note body given inline
    #[clap(long, conflicts_with = "file", required_unless_present = "file")]
    pub body: Option<String>,
    /// Read the note body from a file
    #[clap(long)]
    pub file: Option<PathBuf>,
}

impl BodyArgs {
    pub fn read(&self) -> Result<String> {
        match (&self.body, &self.file) {
            (Some(body), _) => Ok(body.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read note body from {}", path.display())),
            (None, None) => Err(anyhow!("Either --body or --file is required")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Many(Vec<RequestItem>),
    One(RequestItem),
}

fn load_requests(path: &Path) -> Result<Vec<RequestItem>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read requests file {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed: RequestFile = if is_json {
        serde_json::from_str(&content).context("Failed to parse requests JSON")?
    } else {
        serde_yaml::from_str(&content).context("Failed to parse requests YAML")?
    };
    Ok(match parsed {
        RequestFile::Many(items) => items,
        RequestFile::One(item) => vec![item],
    })
}

fn client_for(config: &CliConfig) -> Result<Arc<SubstackClient>> {
    CLIENTS
        .get_or_try_insert_with(&config.credentials, |credentials| {
            SubstackClient::new(credentials, config.api_base.as_deref())
        })
        .map_err(|e| anyhow!("Failed to construct Substack client: {e}"))
}

/// Runs a command and returns the JSON it would print.
pub async fn run_command(cli: Cli) -> Result<Value> {
    match cli.command {
        Commands::Note {
            action: NoteCommand::Preview { body, format },
        } => {
            let format = format.unwrap_or_default();
            let document = compose_note(&body.read()?, format)?;
            tracing::info!(
                command = "note preview",
                %format,
                paragraphs = document.paragraphs.len(),
                "Note composed"
            );
            Ok(json!({
                "format": format.to_string(),
                "paragraphs": document.paragraphs.len(),
                "text": document.plain_text(),
                "bodyJson": document.to_body_json(),
            }))
        }
        Commands::Note {
            action: NoteCommand::Create { config, body, format },
        } => {
            let config = load_config(config)?;
            let request = Request::CreateNote {
                body: body.read()?,
                format: format.unwrap_or(config.defaults.note_format),
            };
            tracing::info!(command = "note create", "Publishing note");
            let client = client_for(&config)?;
            let mut items = dispatch(client.as_ref(), &request).await?;
            items
                .pop()
                .ok_or_else(|| anyhow!("Publishing returned no note"))
        }
        Commands::Run { config, requests } => {
            let config = load_config(config)?;
            let items = load_requests(&requests)?;
            tracing::info!(command = "run", items = items.len(), "Executing requests");
            let client = client_for(&config)?;
            match execute(client.as_ref(), &items, &config.execute_options()).await {
                Ok(output) => {
                    tracing::info!(command = "run", produced = output.len(), "Execution complete");
                    Ok(Value::Array(output))
                }
                Err(e) => {
                    tracing::error!(command = "run", error = %e, "Execution failed");
                    Err(e.into())
                }
            }
        }
    }
}

/// Async CLI entrypoint for `main` and integration tests. Prints the result to stdout.
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let output = run_command(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
