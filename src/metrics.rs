//! Prometheus metrics for mortalnetd.
//!
//! Exposed on the web surface's `/metrics` endpoint. Counters are bumped by
//! the hub alongside its in-process counters; the gauges are set on
//! membership changes (`mortalnet_active_players`) and at scrape time
//! (`mortalnet_uptime_seconds`).

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total chat connections admitted past the ban and capacity checks.
    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "mortalnet_connections_total",
        "Total admitted chat connections"
    ).unwrap();

    /// Currently confirmed players.
    pub static ref ACTIVE_PLAYERS: IntGauge = IntGauge::new(
        "mortalnet_active_players",
        "Currently confirmed players"
    ).unwrap();

    /// Total broadcast chat messages.
    pub static ref MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "mortalnet_messages_total",
        "Total broadcast chat messages"
    ).unwrap();

    /// Total challenges, direct and matchmade.
    pub static ref CHALLENGES_TOTAL: IntCounter = IntCounter::new(
        "mortalnet_challenges_total",
        "Total challenges delivered"
    ).unwrap();

    /// Total admin kicks.
    pub static ref KICKS_TOTAL: IntCounter = IntCounter::new(
        "mortalnet_kicks_total",
        "Total admin kicks"
    ).unwrap();

    /// Total admin bans.
    pub static ref BANS_TOTAL: IntCounter = IntCounter::new(
        "mortalnet_bans_total",
        "Total admin bans"
    ).unwrap();

    /// Server uptime in whole seconds.
    pub static ref UPTIME_SECONDS: IntGauge = IntGauge::new(
        "mortalnet_uptime_seconds",
        "Server uptime in seconds"
    ).unwrap();
}

/// Register all metrics. Must be called once at server startup.
pub fn init() {
    REGISTRY
        .register(Box::new(CONNECTIONS_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(ACTIVE_PLAYERS.clone())).unwrap();
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(CHALLENGES_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(KICKS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(BANS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(UPTIME_SECONDS.clone())).unwrap();
}

/// Gather all metrics in Prometheus text exposition format, with the
/// `# HELP` and `# TYPE` preamble per series.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
