//! Startup wiring: validate configuration, build shared state, and
//! spawn the background eviction sweep.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use ir_domain::config::{Config, ConfigSeverity};
use ir_sessions::{PartyLockMap, SessionStore};

use crate::engine::relay::ReplyIdPatterns;
use crate::state::AppState;
use crate::transport::WebhookTransport;

/// Build the shared application state.
///
/// Fatal configuration problems (missing reviewer id, missing webhook
/// URL, missing transport credential) abort here, before the gateway
/// accepts a single event.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Error => tracing::error!(%issue, "configuration error"),
            ConfigSeverity::Warning => tracing::warn!(%issue, "configuration warning"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("configuration has fatal errors, refusing to start");
    }

    let credential = config
        .transport
        .resolve_credential()
        .context("transport credential")?;

    let transport = WebhookTransport::new(config.transport.webhook_url.clone(), credential)
        .context("building webhook transport")?;

    Ok(AppState {
        config,
        transport: Arc::new(transport),
        sessions: Arc::new(SessionStore::new()),
        locks: Arc::new(PartyLockMap::new()),
        reply_patterns: Arc::new(ReplyIdPatterns::new()),
    })
}

/// Spawn the session eviction sweep, if enabled.
pub fn spawn_background_tasks(state: &AppState) {
    let ttl_minutes = state.config.sessions.idle_ttl_minutes;
    if ttl_minutes == 0 {
        tracing::info!("session eviction disabled (sessions.idle_ttl_minutes = 0)");
        return;
    }

    let interval = std::time::Duration::from_secs(state.config.sessions.sweep_interval_secs);
    let ttl = chrono::Duration::minutes(ttl_minutes as i64);
    let sessions = state.sessions.clone();
    let locks = state.locks.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(ttl, Utc::now());
            locks.prune_idle();
            if evicted > 0 {
                tracing::info!(evicted, remaining = sessions.len(), "session sweep");
            }
        }
    });

    tracing::info!(
        ttl_minutes,
        interval_secs = state.config.sessions.sweep_interval_secs,
        "session eviction sweep started"
    );
}
