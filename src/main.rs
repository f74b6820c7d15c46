//! mortalnetd - MortalNet chat and matchmaking server.
//!
//! Wires the pieces together: configuration, tracing, the hub and its
//! stores, signal handling, the periodic stats flush, the HTTP observation
//! surface, and the chat gateway.

use clap::Parser;
use mortalnet::config::{self, Config, LogFormat};
use mortalnet::error::ServerError;
use mortalnet::network::Gateway;
use mortalnet::security::BanList;
use mortalnet::state::{Hub, HubConfig, Motd};
use mortalnet::stats::StatsStore;
use mortalnet::{http, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::parse());

    // RUST_LOG wins over --log-level, as usual.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.log_level.as_directive()));
    match cfg.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        }
    }

    if let Err(errors) = config::validate(&cfg) {
        for err in &errors {
            error!(error = %err, "configuration validation failed");
        }
        anyhow::bail!(
            "configuration validation failed with {} error(s)",
            errors.len()
        );
    }

    info!(
        chat_addr = %cfg.chat_addr,
        web_addr = %cfg.web_addr,
        max_clients = cfg.max_clients,
        "starting mortalnetd"
    );

    let bans = BanList::new(cfg.ban_file.clone());
    let motd = Motd::new(cfg.motd.clone(), cfg.motd_file.clone());
    let stats = StatsStore::load(cfg.stats_file.clone());
    let hub = Arc::new(Hub::new(
        HubConfig {
            history_size: cfg.history_size,
            nick_reserve: Duration::from_secs(cfg.nick_reserve_secs),
            admin_password: cfg.admin_password.clone(),
        },
        bans,
        motd,
        stats,
    ));

    metrics::init();

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    // Signals: SIGINT/SIGTERM stop the server, SIGHUP reloads the ban file
    // and MOTD source without touching live sessions.
    {
        let shutdown_tx = shutdown_tx.clone();
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
            loop {
                tokio::select! {
                    _ = sigint.recv() => {
                        info!("received SIGINT, shutting down");
                        let _ = shutdown_tx.send(());
                    }
                    _ = sigterm.recv() => {
                        info!("received SIGTERM, shutting down");
                        let _ = shutdown_tx.send(());
                    }
                    _ = sighup.recv() => {
                        info!("received SIGHUP, reloading");
                        hub.reload();
                    }
                }
            }
        });
    }

    // Periodic stats flush, on top of the event-driven saves.
    {
        let hub = Arc::clone(&hub);
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => hub.stats.save(),
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    // Bind the chat listener first so that once the web surface answers,
    // the whole server is reachable.
    let gateway = Gateway::bind(Arc::clone(&cfg), Arc::clone(&hub)).await?;

    // Web observation surface. A bind failure here is as fatal as one on
    // the chat listener.
    {
        let web_addr = config::parse_listen_addr(&cfg.web_addr)?;
        let listener =
            tokio::net::TcpListener::bind(web_addr)
                .await
                .map_err(|e| ServerError::Bind {
                    addr: cfg.web_addr.clone(),
                    source: e,
                })?;
        info!(%web_addr, "web surface listening");
        tokio::spawn(http::serve(
            listener,
            Arc::clone(&hub),
            shutdown_tx.subscribe(),
        ));
    }

    gateway.run(shutdown_tx.clone()).await;

    // Drain: close remaining sessions, give their tasks a moment to flush,
    // then persist stats one last time.
    hub.close_all();
    tokio::time::sleep(Duration::from_millis(300)).await;
    hub.stats.save();
    info!("mortalnetd stopped");

    Ok(())
}
