use std::env;

/// Connection details for the topic-exchange message bus, shared by every
/// harvester, the stream controller, and the exporter.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub exchange: String,
}

impl BrokerConfig {
    /// Load broker connection details from the environment.
    ///
    /// Panics with a named-variable message when a required value is absent —
    /// there is no sensible default for broker credentials.
    pub fn from_env() -> Self {
        Self {
            host: required_env("SFM_MQ_HOST"),
            port: env::var("SFM_MQ_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5672),
            username: required_env("SFM_MQ_USERNAME"),
            password: required_env("SFM_MQ_PASSWORD"),
            exchange: env::var("SFM_MQ_EXCHANGE").unwrap_or_else(|_| "sfm_exchange".to_string()),
        }
    }

    /// Log presence/length of sensitive fields rather than their values.
    pub fn log_redacted(&self) {
        tracing::info!(host = %self.host, port = self.port, exchange = %self.exchange, "broker config");
        tracing::info!(username_len = self.username.len(), password_len = self.password.len(), "broker credentials present");
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
