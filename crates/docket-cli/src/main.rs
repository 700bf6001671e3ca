//! Docket CLI — launch a document server and talk to it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docket_client::{DocketClient, ServerConfig};
use std::collections::HashMap;
use std::io;

#[derive(Parser)]
#[command(name = "docket", version, about = "Talk to a document server over stdio")]
struct Cli {
    /// Server command to launch
    #[arg(long, default_value = "docket-server")]
    server_cmd: String,

    /// Argument to pass to the server (repeatable)
    #[arg(long = "server-arg")]
    server_args: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tools the server exposes
    Tools,
    /// Read a document's contents
    Read { doc_id: String },
    /// Replace text in a document (exact match, all occurrences)
    Edit {
        doc_id: String,
        old_string: String,
        new_string: String,
    },
    /// Call an arbitrary tool with JSON arguments
    Call {
        name: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// List the server's resources
    Docs,
    /// Render a prompt
    Prompt {
        name: String,
        /// Prompt argument as key=value (repeatable)
        #[arg(long = "arg", value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging on stderr; stdout is for command output
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ServerConfig::new(cli.server_cmd)
        .args(cli.server_args)
        .timeout_ms(cli.timeout_ms);

    tracing::debug!(command = %config.command, "Launching document server");

    let command = cli.command;
    DocketClient::scoped(config, |client: &DocketClient| {
        Box::pin(async move { run_command(client, command).await })
    })
    .await
    .context("session failed")?;

    Ok(())
}

async fn run_command(
    client: &DocketClient,
    command: Command,
) -> std::result::Result<(), docket_client::ClientError> {
    match command {
        Command::Tools => {
            for tool in client.list_tools().await? {
                println!(
                    "{}\t{}",
                    tool.name,
                    tool.description.unwrap_or_default()
                );
            }
        }
        Command::Read { doc_id } => {
            let result = client
                .call_tool("read_doc_contents", serde_json::json!({"doc_id": doc_id}))
                .await?;
            for block in result.content {
                println!("{}", block.as_text());
            }
        }
        Command::Edit {
            doc_id,
            old_string,
            new_string,
        } => {
            let result = client
                .call_tool(
                    "edit_document",
                    serde_json::json!({
                        "doc_id": doc_id,
                        "old_string": old_string,
                        "new_string": new_string,
                    }),
                )
                .await?;
            for block in result.content {
                println!("{}", block.as_text());
            }
        }
        Command::Call { name, args } => {
            let arguments: serde_json::Value = serde_json::from_str(&args)?;
            let result = client.call_tool(&name, arguments).await?;
            for block in result.content {
                println!("{}", block.as_text());
            }
        }
        Command::Docs => {
            for resource in client.list_resources().await? {
                println!("{}\t{}", resource.uri, resource.name);
            }
        }
        Command::Prompt { name, args } => {
            let arguments: HashMap<String, String> = args.into_iter().collect();
            let rendered = client.get_prompt(&name, arguments).await?;
            for message in rendered.messages {
                println!("[{}] {}", message.role, message.content.as_text());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_key_val_splits_on_first_equals() {
        assert_eq!(
            parse_key_val("doc_id=plan.md").unwrap(),
            ("doc_id".to_string(), "plan.md".to_string())
        );
        assert_eq!(
            parse_key_val("k=a=b").unwrap(),
            ("k".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("no-equals").is_err());
    }
}
