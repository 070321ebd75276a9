// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;

use crate::credential::HandshakeSettings;
use crate::publish::BusSettings;
use crate::transport::{RetryPolicy, TransportSettings};

/// App id presented on the token-scoped (second stage) session call.
pub const DEFAULT_NEW_APP_ID: &str = "3587dcbb-7f81-457c-9781-0e3f29f6f56a";

/// User agent the token-scoped session surface expects.
pub const DEFAULT_USER_AGENT: &str = "UbiServices_SDK_2020.Release.58_PC64_ansi_static";

/// Periodic Ubisoft session refresher publishing credentials to RabbitMQ.
#[derive(Clone, Parser)]
#[command(name = "r6index-auth", version, about)]
pub struct AuthConfig {
    /// Dotenv file loaded before the remaining options are resolved.
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Session endpoint of the auth service.
    #[arg(long, env = "UBISOFT_URL")]
    pub ubisoft_url: String,

    /// Account used for the basic-auth stage.
    #[arg(long, env = "UBISOFT_USERNAME")]
    pub ubisoft_username: String,

    /// Password for the basic-auth stage.
    #[arg(long, env = "UBISOFT_PASS", hide_env_values = true)]
    pub ubisoft_pass: String,

    /// App id sent on the basic-auth stage.
    #[arg(long, env = "UBISOFT_APPID")]
    pub ubisoft_appid: String,

    /// App id sent on the token-scoped stage.
    #[arg(long, env = "UBISOFT_NEW_APPID", default_value = DEFAULT_NEW_APP_ID)]
    pub ubisoft_new_appid: String,

    /// User agent sent on the token-scoped stage.
    #[arg(long, env = "UBISOFT_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub ubisoft_user_agent: String,

    /// AMQP broker URL.
    #[arg(long, env = "RABBITMQ_URL")]
    pub rabbitmq_url: String,

    /// Fanout exchange credentials are published to.
    #[arg(long, env = "R6INDEX_EXCHANGE", default_value = "r6index")]
    pub exchange: String,

    /// Single-slot queue bound to the exchange.
    #[arg(long, env = "R6INDEX_QUEUE", default_value = "auth")]
    pub queue: String,

    /// Seconds between refresh cycles.
    #[arg(long, env = "R6INDEX_INTERVAL_SECS", default_value_t = 600)]
    pub interval_secs: u64,

    /// Graceful shutdown deadline in milliseconds.
    #[arg(long, env = "R6INDEX_SHUTDOWN_TIMEOUT_MS", default_value_t = 5000)]
    pub shutdown_timeout_ms: u64,

    /// HTTP dial timeout in milliseconds.
    #[arg(long, env = "R6INDEX_CONNECT_TIMEOUT_MS", default_value_t = 1000)]
    pub connect_timeout_ms: u64,

    /// Overall per-request HTTP timeout in milliseconds.
    #[arg(long, env = "R6INDEX_REQUEST_TIMEOUT_MS", default_value_t = 10000)]
    pub request_timeout_ms: u64,

    /// Attempts per handshake call before giving up.
    #[arg(long, env = "R6INDEX_RETRY_MAX", default_value_t = 5)]
    pub retry_max: u32,

    /// First backoff step in milliseconds; doubles per retry.
    #[arg(long, env = "R6INDEX_BACKOFF_MS", default_value_t = 5000)]
    pub backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[arg(long, env = "R6INDEX_BACKOFF_MAX_MS", default_value_t = 30000)]
    pub backoff_max_ms: u64,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, env = "R6INDEX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[arg(long, env = "R6INDEX_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl AuthConfig {
    /// Load an optional dotenv file named by `--env-file`, then parse.
    ///
    /// The file has to be applied before clap reads the environment, so the
    /// flag is located with a plain scan of the raw arguments.
    pub fn load() -> anyhow::Result<Self> {
        if let Some(path) = env_file_arg(std::env::args()) {
            dotenvy::from_path(&path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
        }
        Ok(Self::parse())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ubisoft_username.trim().is_empty() {
            anyhow::bail!("UBISOFT_USERNAME must not be empty");
        }
        if self.ubisoft_appid.trim().is_empty() || self.ubisoft_new_appid.trim().is_empty() {
            anyhow::bail!("app ids must not be empty");
        }

        let auth_url = reqwest::Url::parse(&self.ubisoft_url)
            .map_err(|e| anyhow::anyhow!("invalid UBISOFT_URL: {e}"))?;
        if !matches!(auth_url.scheme(), "http" | "https") {
            anyhow::bail!("UBISOFT_URL must be http or https, got {}", auth_url.scheme());
        }

        let bus_url = reqwest::Url::parse(&self.rabbitmq_url)
            .map_err(|_| anyhow::anyhow!("invalid RABBITMQ_URL"))?;
        if !matches!(bus_url.scheme(), "amqp" | "amqps") {
            anyhow::bail!("RABBITMQ_URL must be amqp or amqps, got {}", bus_url.scheme());
        }

        if self.interval_secs == 0 {
            anyhow::bail!("interval must be at least one second");
        }
        if self.retry_max == 0 {
            anyhow::bail!("retry budget must allow at least one attempt");
        }
        if self.backoff_ms > self.backoff_max_ms {
            anyhow::bail!(
                "backoff base ({}ms) exceeds backoff max ({}ms)",
                self.backoff_ms,
                self.backoff_max_ms
            );
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        Ok(())
    }

    /// `Authorization` header value for the basic stage.
    pub fn basic_token(&self) -> String {
        let raw = format!("{}:{}", self.ubisoft_username, self.ubisoft_pass);
        format!("Basic {}", STANDARD.encode(raw))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max,
            base: Duration::from_millis(self.backoff_ms),
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            retry: self.retry_policy(),
        }
    }

    pub fn handshake_settings(&self) -> HandshakeSettings {
        HandshakeSettings {
            url: self.ubisoft_url.clone(),
            basic_token: self.basic_token(),
            app_id: self.ubisoft_appid.clone(),
            new_app_id: self.ubisoft_new_appid.clone(),
            user_agent: self.ubisoft_user_agent.clone(),
        }
    }

    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            url: self.rabbitmq_url.clone(),
            exchange: self.exchange.clone(),
            queue: self.queue.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("env_file", &self.env_file)
            .field("ubisoft_url", &self.ubisoft_url)
            .field("ubisoft_username", &self.ubisoft_username)
            .field("ubisoft_pass", &"<redacted>")
            .field("ubisoft_appid", &self.ubisoft_appid)
            .field("ubisoft_new_appid", &self.ubisoft_new_appid)
            .field("ubisoft_user_agent", &self.ubisoft_user_agent)
            .field("exchange", &self.exchange)
            .field("queue", &self.queue)
            .field("interval_secs", &self.interval_secs)
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .field("retry_max", &self.retry_max)
            .finish_non_exhaustive()
    }
}

/// Find the value of `--env-file` (either `--env-file PATH` or `--env-file=PATH`).
pub fn env_file_arg(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--" {
            return None;
        }
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--env-file=") {
            return Some(PathBuf::from(value));
        }
    }
    None
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
