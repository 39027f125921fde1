//! Mudlark - clientless MUD session engine
//!
//! Connects to a MUD server, strips telnet negotiation from the incoming
//! stream, runs the automation rule set (triggers, gags, aliases,
//! tickers) over each line, records the session to disk, and relays
//! commands typed on stdin.

mod common;
mod config;
mod protocol;
mod rules;
mod session;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};

use common::types::RuleEffect;
use config::{build_rules, env::get_config_path, load_and_validate};
use rules::TickerScheduler;
use session::{ChannelBundle, RecorderConfig, SessionClient, SessionRecorder};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Mudlark v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Server: {}:{}", config.server.host, config.server.port);

    let rules = build_rules(&config);
    info!("  Rules: {} loaded", rules.len());

    // ============================================================
    // Create channels and the session recorder
    // ============================================================

    let channels = ChannelBundle::new();
    let session::channels::UiChannels {
        mut display_rx,
        mut effects_rx,
        user_input_tx,
    } = channels.ui;
    let outbound_tx = channels.session.outbound_tx.clone();
    let shutdown_rx = channels.session.shutdown_rx.clone();
    let shutdown_tx = channels.control.shutdown_tx;

    let recorder = match build_recorder(&config) {
        Ok(recorder) => {
            info!("  Session log: {}", recorder.log_path().display());
            Some(recorder)
        }
        Err(e) => {
            // Logging is best-effort; the session runs without it
            warn!("Session recording disabled: {}", e);
            None
        }
    };

    // ============================================================
    // Spawn UI-side tasks
    // ============================================================

    // Task 1: display surface (plain line sink on stdout)
    let display_task = tokio::spawn(async move {
        while let Some(line) = display_rx.recv().await {
            let stamp = line.received_at.with_timezone(&chrono::Local);
            println!("[{}] {}", stamp.format("%H:%M:%S"), line.text);
        }
        info!("Display task ended");
    });

    // Task 2: rule side-effect consumer (the rule-set owner)
    let effects_task = tokio::spawn(async move {
        while let Some(batch) = effects_rx.recv().await {
            for effect in batch.effects {
                match effect {
                    RuleEffect::Matched { rule_id } => {
                        debug!("Rule {} matched", rule_id);
                    }
                    RuleEffect::InvalidPattern { rule_id, message } => {
                        warn!("Rule {} has an invalid pattern: {}", rule_id, message);
                    }
                }
            }
        }
    });

    // Task 3: stdin command entry
    let input_task = {
        let user_input_tx = user_input_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if user_input_tx.send(line).is_err() {
                    break;
                }
            }
            info!("Input task ended");
        })
    };

    // ============================================================
    // Start the ticker scheduler
    // ============================================================

    let scheduler = TickerScheduler::new(outbound_tx, shutdown_rx);
    let ticker_handle = scheduler.handle();
    // The scheduler observes the shared shutdown signal and exits on its own
    tokio::spawn(scheduler.run());

    // ============================================================
    // Start the session client with reconnection
    // ============================================================

    use backon::BackoffBuilder;

    /// Exponential backoff for session reconnection.
    /// 5s initial, 5min max, with jitter, unlimited retries.
    fn session_backoff() -> impl Iterator<Item = Duration> {
        backon::ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(300))
            .with_jitter()
            .without_max_times()
            .build()
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let tickers = rules.clone();
    let session_channels = channels.session;

    let mut session_task = tokio::spawn(async move {
        let mut client = SessionClient::new(rules, recorder, session_channels);
        let mut backoff = session_backoff();

        loop {
            // Check for shutdown before connecting
            if client.channels.shutdown_rx.has_changed().unwrap_or(false)
                && *client.channels.shutdown_rx.borrow()
            {
                info!("Shutdown signal detected, stopping reconnection loop");
                break;
            }

            // Connected sessions start their tickers; disconnecting stops them
            for e in ticker_handle.start_session_tickers(&tickers) {
                warn!("Ticker not started: {}", e);
            }

            match client.run(&host, port).await {
                Ok(()) => {
                    info!("Session ended");
                    backoff = session_backoff(); // reset after a good connection
                }
                Err(e) => error!("Session error: {}", e),
            }

            ticker_handle.stop_all();

            if *client.channels.shutdown_rx.borrow() {
                break;
            }

            let delay = backoff.next().unwrap_or(Duration::from_secs(300));
            info!("Reconnecting in {:.1} seconds...", delay.as_secs_f64());

            // Wait for delay OR shutdown signal
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = client.channels.shutdown_rx.changed() => {
                    if *client.channels.shutdown_rx.borrow() {
                        info!("Shutdown signal received during backoff");
                        break;
                    }
                }
            }
        }
    });

    // ============================================================
    // Run until a task exits or a shutdown signal arrives
    // ============================================================

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - closing session...");
            true
        }
        _ = &mut session_task => false,
        _ = display_task => false,
        _ = effects_task => false,
        _ = input_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (session already exited): {}", e);
        }
        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, session_task).await {
            Ok(Ok(())) => info!("Session closed gracefully"),
            Ok(Err(e)) => warn!("Session task panicked: {}", e),
            Err(_) => warn!("Session close timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

/// Build the session recorder from config, with sensible defaults.
fn build_recorder(config: &config::types::Config) -> common::error::RecorderResult<SessionRecorder> {
    let defaults = RecorderConfig::default();
    let logging = config.logging.clone().unwrap_or_default();
    let session = config.session.clone().unwrap_or_default();

    SessionRecorder::new(RecorderConfig {
        directory: logging
            .directory
            .map(PathBuf::from)
            .unwrap_or(defaults.directory),
        session_name: config.server.host.clone(),
        max_file_bytes: logging.max_file_bytes.unwrap_or(defaults.max_file_bytes),
        rotation_sample: logging.rotation_sample.unwrap_or(defaults.rotation_sample),
        timestamps: session.timestamps.unwrap_or(defaults.timestamps),
        log_commands: session.log_commands.unwrap_or(defaults.log_commands),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
