//! Server settings with TOML file support.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// Immutable settings snapshot for the server-side messaging services.
///
/// Can be loaded from a TOML file via [`ServerSettings::from_toml_file`]
/// or built programmatically (e.g. for tests). Services take a snapshot
/// at construction; nothing here changes afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Heartbeat publish interval in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u16,

    /// Whether to debug-log each published frame.
    #[serde(default)]
    pub log_requests: bool,

    /// Endpoint of the public heartbeat channel.
    #[serde(default = "default_public_heartbeat_endpoint")]
    pub public_heartbeat_endpoint: String,

    /// Endpoint of the secure heartbeat channel.
    #[serde(default = "default_secure_heartbeat_endpoint")]
    pub secure_heartbeat_endpoint: String,

    /// Endpoint of the public block notification channel.
    #[serde(default = "default_public_block_endpoint")]
    pub public_block_endpoint: String,

    /// Endpoint of the secure block notification channel.
    #[serde(default = "default_secure_block_endpoint")]
    pub secure_block_endpoint: String,

    /// Endpoint of the public transaction notification channel.
    #[serde(default = "default_public_transaction_endpoint")]
    pub public_transaction_endpoint: String,

    /// Endpoint of the secure transaction notification channel.
    #[serde(default = "default_secure_transaction_endpoint")]
    pub secure_transaction_endpoint: String,

    /// Endpoint of the control channel (stop requests).
    #[serde(default = "default_control_endpoint")]
    pub control_endpoint: String,

    /// Credential per secured domain ("heartbeat", "block", "transaction").
    /// Domains without an entry here cannot run a secure variant.
    #[serde(default)]
    pub secure_domain_keys: HashMap<String, String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServerSettings {
    pub fn from_toml_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        toml::from_str("").expect("empty settings deserialize from defaults")
    }
}

fn default_heartbeat_interval() -> u16 {
    5
}

fn default_public_heartbeat_endpoint() -> String {
    "0.0.0.0:9092".to_string()
}

fn default_secure_heartbeat_endpoint() -> String {
    "0.0.0.0:9082".to_string()
}

fn default_public_block_endpoint() -> String {
    "0.0.0.0:9093".to_string()
}

fn default_secure_block_endpoint() -> String {
    "0.0.0.0:9083".to_string()
}

fn default_public_transaction_endpoint() -> String {
    "0.0.0.0:9094".to_string()
}

fn default_secure_transaction_endpoint() -> String {
    "0.0.0.0:9084".to_string()
}

fn default_control_endpoint() -> String {
    "0.0.0.0:9091".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let settings = ServerSettings::default();
        assert_eq!(settings.heartbeat_interval_seconds, 5);
        assert!(!settings.log_requests);
        assert_eq!(settings.public_heartbeat_endpoint, "0.0.0.0:9092");
        assert!(settings.secure_domain_keys.is_empty());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
heartbeat_interval_seconds = 1
log_requests = true

[secure_domain_keys]
heartbeat = "s3cret"
"#
        )
        .unwrap();

        let settings = ServerSettings::from_toml_file(file.path()).unwrap();
        assert_eq!(settings.heartbeat_interval_seconds, 1);
        assert!(settings.log_requests);
        assert_eq!(
            settings.secure_domain_keys.get("heartbeat").map(String::as_str),
            Some("s3cret")
        );
        // Unspecified fields fall back to defaults.
        assert_eq!(settings.public_block_endpoint, "0.0.0.0:9093");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ServerSettings::from_toml_file(Path::new("/nonexistent/stela.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "heartbeat_interval_seconds = \"not a number\"").unwrap();
        let err = ServerSettings::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
