use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outbound transport configuration.  The engine never talks to a chat
/// platform directly; it POSTs send actions to a connector webhook which
/// owns delivery, media storage, and markup rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connector webhook URL that receives outbound send actions.
    #[serde(default)]
    pub webhook_url: String,

    /// Environment variable holding the bearer credential for the webhook.
    /// The variable must be set and non-empty at startup.
    #[serde(default = "d_credential_env")]
    pub credential_env: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            credential_env: d_credential_env(),
        }
    }
}

impl TransportConfig {
    /// Read the transport credential from the configured env var.
    /// Absence is a startup-fatal configuration error.
    pub fn resolve_credential(&self) -> Result<String> {
        match std::env::var(&self.credential_env) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(Error::Config(format!(
                "transport credential env var {} is not set",
                self.credential_env
            ))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Review
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reviewer identity.  Exactly one reviewer exists in the whole system;
/// every decision path checks the sender against this id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReviewConfig {
    /// Party id of the reviewer.  `0` (the default) is invalid and fails
    /// `validate()`.
    #[serde(default)]
    pub reviewer_id: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    /// Sentinel word that closes the evidence-photo loop.  Matched
    /// case-insensitively against the trimmed message text.
    #[serde(default = "d_done_word")]
    pub done_word: String,

    /// Command that unconditionally resets the issuing party's session.
    #[serde(default = "d_reset_command")]
    pub reset_command: String,

    /// Reviewer-only command that leaves the reply sub-phase.
    #[serde(default = "d_cancel_command")]
    pub cancel_command: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            done_word: d_done_word(),
            reset_command: d_reset_command(),
            cancel_command: d_cancel_command(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Evict sessions idle for more than this many minutes.
    /// `0` disables eviction (sessions then grow for the process lifetime).
    #[serde(default)]
    pub idle_ttl_minutes: u64,

    /// How often the eviction sweep runs.
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_minutes: 0,
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    3310
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_credential_env() -> String {
    "IR_TRANSPORT_TOKEN".into()
}

fn d_done_word() -> String {
    "done".into()
}

fn d_reset_command() -> String {
    "/start".into()
}

fn d_cancel_command() -> String {
    "/cancel".into()
}

fn d_sweep_interval() -> u64 {
    300
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// The transport credential is checked separately at bootstrap via
    /// [`TransportConfig::resolve_credential`] so this stays env-free.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.review.reviewer_id == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "review.reviewer_id".into(),
                message: "reviewer party id is required".into(),
            });
        }

        if self.transport.webhook_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "transport.webhook_url".into(),
                message: "connector webhook URL is required".into(),
            });
        }

        if self.form.done_word.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "form.done_word".into(),
                message: "done sentinel must not be empty".into(),
            });
        }

        if self.sessions.idle_ttl_minutes > 0 && self.sessions.sweep_interval_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sessions.sweep_interval_secs".into(),
                message: "sweep interval must be greater than 0 when eviction is enabled".into(),
            });
        }

        if self.sessions.idle_ttl_minutes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "sessions.idle_ttl_minutes".into(),
                message: "eviction disabled; session state grows unbounded".into(),
            });
        }

        errors
    }

    /// True when `validate()` reports at least one `Error`-severity issue.
    pub fn has_fatal_issues(&self) -> bool {
        self.validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}
