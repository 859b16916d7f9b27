// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Service name stamped on every JSON log line.
    pub service_name: String,
    /// Fallback filter directive when `RUST_LOG` is unset, e.g. `"info,checkin_engine=debug"`.
    pub log_level: String,
    /// Emit Bunyan-style JSON instead of human-readable lines.
    pub json_output: bool,
    /// Redact PII from transcript previews before they are logged.
    pub redaction_enabled: bool,
    /// Maximum characters of patient speech included in a log preview.
    pub preview_chars: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            service_name: "checkin-engine".to_string(),
            log_level: "info".to_string(),
            json_output: false,
            redaction_enabled: true,
            preview_chars: 48,
        }
    }
}
