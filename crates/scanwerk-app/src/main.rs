// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: live document scanner
//
// Entry point. Initialises logging, loads settings, starts narration, and runs
// the frame loop. Operator commands are read one per line from stdin.

mod command;
mod driver;
mod narration;
mod services;

use std::io::BufRead;
use std::process::ExitCode;

use scanwerk_bridge::platform_bridge;
use scanwerk_core::error::Result;
use scanwerk_core::human_errors::humanize_error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use command::{Command, USAGE};
use driver::Driver;
use narration::Narrator;
use services::config_store::load_or_default;
use services::data_dir::data_dir;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Scanwerk starting");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = humanize_error(&err);
            error!(error = %err, "{}", human.message);
            eprintln!("{}: {}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let dir = data_dir();
    let config = load_or_default(&dir);
    info!(
        destination = %config.destination_dir.display(),
        camera = config.camera_index,
        policy = ?config.refresh_policy,
        "settings loaded"
    );

    let bridge = platform_bridge();
    let narrator = if config.narration_enabled {
        Narrator::spawn(bridge.speech(&config))?
    } else {
        Narrator::silent()
    };

    let (tx, rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(tx)?;

    let driver = Driver::new(config, dir, bridge, narrator);
    let mut status = driver.subscribe_status();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let current = status.borrow_and_update().clone();
                println!(
                    "[{} pages{}] {}",
                    current.page_count,
                    if current.editing { ", editing" } else { "" },
                    current.message
                );
            }
        });
        driver.run(rx).await
    })
}

/// Read commands from stdin on a dedicated thread. End of input means exit.
fn spawn_stdin_reader(tx: mpsc::UnboundedSender<Command>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "ignoring input line");
                        eprintln!("{err}\n{USAGE}");
                    }
                }
            }
            let _ = tx.send(Command::Exit);
        })?;
    Ok(())
}
