//! Chattime demo binary
//!
//! Runs one engine in-process with a single demo user, prints the per-user
//! and operator event streams, and drives the engine from an interactive
//! prompt.

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chattime_engine::{AppEvent, ChatEngine, EngineBuilder};

use crate::cli::Cli;
use crate::commands::{dispatch, Flow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = Cli::parse();
    let engine: Arc<ChatEngine> = Arc::new(
        EngineBuilder::new()
            .with_config(options.engine_config())
            .build(),
    );

    let user = engine
        .register_user("demo")
        .await
        .context("registering demo user")?;
    info!(user_id = %user.id, "demo user registered");
    println!(
        "chattime demo: user {} with balance {}. Type 'help' for commands.",
        user.id,
        engine.balance(user.id).await?
    );

    spawn_printer("user", engine.subscribe_user(user.id), options.json);
    spawn_printer("operator", engine.subscribe_operator(), options.json);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await.context("reading prompt")? else {
            break;
        };
        if let Flow::Quit = dispatch(&engine, user.id, &line).await {
            break;
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// Print one audience's event stream as it arrives
fn spawn_printer(label: &'static str, mut rx: broadcast::Receiver<AppEvent>, json: bool) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if json {
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("[{label}] {line}"),
                            Err(e) => eprintln!("[{label}] event serialization failed: {e}"),
                        }
                    } else {
                        println!("[{label}] {event:?}");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("[{label}] lagged, {missed} events missed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
