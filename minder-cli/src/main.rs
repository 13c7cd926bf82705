use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use minder_engine::{Engine, LlmClassifier, Outbound, OutboundPayload, init_config, load_config};

#[derive(Parser, Debug)]
#[command(name = "minder", version, about = "Conversational task/habit/expense assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default ~/.minder/config.toml if none exists
    InitConfig,

    /// Interactive chat loop on stdin (one message per line)
    Chat {
        /// User id for this session
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::InitConfig => {
            let path = init_config()?;
            println!("config at {}", path.display());
        }

        Command::Chat { user } => {
            chat(user).await?;
        }
    }

    Ok(())
}

async fn chat(user: i64) -> Result<()> {
    let config = load_config()?;
    let classifier = Arc::new(LlmClassifier::new(config.classifier_config()));
    let mut engine = Engine::start(config, classifier);

    let mut outbound = engine
        .take_outbound()
        .context("outbound stream already taken")?;
    let printer = tokio::spawn(async move {
        while let Some(ev) = outbound.recv().await {
            print_outbound(&ev);
        }
    });

    println!("minder ready. Type a message, or /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let ack = engine.submit(user, text, Utc::now()).await;
        println!("{}", serde_json::to_string_pretty(&ack)?);
    }

    engine.shutdown().await;
    printer.abort();
    Ok(())
}

fn print_outbound(ev: &Outbound) {
    match &ev.payload {
        OutboundPayload::Due(n) => match serde_json::to_string(n) {
            Ok(s) => println!("[reminder] {s}"),
            Err(_) => println!("[reminder] (unrenderable)"),
        },
        OutboundPayload::Recommendation { message, .. } => {
            println!("[suggestion] {message}");
        }
    }
}
