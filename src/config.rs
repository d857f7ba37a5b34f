//! Configuration types, built from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::intake::persistence::DEFAULT_NAMESPACE;

/// Which step-advance policy drives the interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePolicyKind {
    /// Static catalog with mandatory follow-ups.
    Fixed,
    /// Next-question service decides whether to re-ask or advance.
    Adaptive,
}

impl std::fmt::Display for AdvancePolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Adaptive => write!(f, "adaptive"),
        }
    }
}

impl std::str::FromStr for AdvancePolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "catalog" => Ok(Self::Fixed),
            "adaptive" | "ai" => Ok(Self::Adaptive),
            other => Err(ConfigError::InvalidValue {
                key: "ANAMNESIS_ADVANCE_POLICY".to_string(),
                message: format!("unknown policy '{other}' (expected 'fixed' or 'adaptive')"),
            }),
        }
    }
}

/// OpenAI chat-completions settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub model: String,
}

/// SMTP settings for the reviewer notification email.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub to_address: String,
}

impl SmtpConfig {
    /// Returns `None` unless both `SMTP_HOST` and `LEAD_EMAIL_TO` are set.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        let to_address = std::env::var("LEAD_EMAIL_TO").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("LEAD_EMAIL_FROM").unwrap_or_else(|_| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
            to_address,
        })
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
    /// Path to the libSQL database, or `:memory:`.
    pub db_path: String,
    pub advance_policy: AdvancePolicyKind,
    /// Key under which conversation snapshots are stored.
    pub storage_namespace: String,
    /// Timeout for every outbound HTTP call.
    pub upstream_timeout: Duration,
    /// How long an unused session stays in memory before eviction.
    pub session_idle_timeout: Duration,
    pub openai: Option<OpenAiConfig>,
    pub sheets_webhook_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
    /// Remote `/api/chat` used by the adaptive policy instead of the
    /// in-process assistant.
    pub next_question_url: Option<String>,
    /// Remote `/api/submit` used for session leads instead of the
    /// in-process dispatcher.
    pub lead_url: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_path: "./data/anamnesis.db".to_string(),
            advance_policy: AdvancePolicyKind::Adaptive,
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
            upstream_timeout: Duration::from_secs(20),
            session_idle_timeout: Duration::from_secs(30 * 60),
            openai: None,
            sheets_webhook_url: None,
            smtp: None,
            next_question_url: None,
            lead_url: None,
        }
    }
}

impl IntakeConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match std::env::var("ANAMNESIS_BIND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid ANAMNESIS_BIND, using default");
                defaults.bind
            }),
            Err(_) => defaults.bind,
        };

        let db_path = std::env::var("ANAMNESIS_DB_PATH").unwrap_or(defaults.db_path);

        let advance_policy = match std::env::var("ANAMNESIS_ADVANCE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.advance_policy,
        };

        let storage_namespace =
            std::env::var("ANAMNESIS_STORAGE_NAMESPACE").unwrap_or(defaults.storage_namespace);

        let upstream_timeout = positive_secs("ANAMNESIS_UPSTREAM_TIMEOUT_SECS")
            .unwrap_or(defaults.upstream_timeout);
        let session_idle_timeout = positive_secs("ANAMNESIS_SESSION_IDLE_SECS")
            .unwrap_or(defaults.session_idle_timeout);

        let openai = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|key| OpenAiConfig {
                api_key: SecretString::from(key),
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            });

        let sheets_webhook_url = non_empty_var("SHEETS_WEBHOOK_URL");

        Ok(Self {
            bind,
            db_path,
            advance_policy,
            storage_namespace,
            upstream_timeout,
            session_idle_timeout,
            openai,
            sheets_webhook_url,
            smtp: SmtpConfig::from_env(),
            next_question_url: non_empty_var("ANAMNESIS_NEXT_QUESTION_URL"),
            lead_url: non_empty_var("ANAMNESIS_LEAD_URL"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn positive_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid duration, using default");
            None
        }
    }
}
