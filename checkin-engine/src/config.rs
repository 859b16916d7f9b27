use logger_redacted::LoggerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::flow::{QuestionDefinition, QuestionFlow};

/// Errors raised while loading or validating engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Voice used for every synthesized question
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub voice_name: String,
    pub language: String,
    pub speaking_rate: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_name: "en-US-Neural2-F".to_string(),
            language: "en-US".to_string(),
            speaking_rate: 0.95,
        }
    }
}

/// Backoff settings for a collaborator call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of each delay randomized, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
            jitter: 0.2,
        }
    }
}

impl RetrySettings {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(format!(
                "{name}.max_attempts must be at least 1"
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "{name}.jitter {} is outside [0, 1]",
                self.jitter
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "{name}.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Check-in engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckInConfig {
    /// A session with no activity for this long becomes `timed_out`.
    pub inactivity_timeout_minutes: u64,
    /// A session older than this becomes `expired`, active or not.
    pub max_session_minutes: u64,
    pub sweep_interval_secs: u64,
    pub voice: VoiceSettings,
    pub synthesis_retry: RetrySettings,
    pub extraction_retry: RetrySettings,
    /// Per-attempt timeout for the chat-completion call.
    pub extraction_timeout_secs: u64,
    /// How long a completed session without a health record is assumed to
    /// be mid-extraction on another instance.
    pub finalization_grace_secs: u64,
    /// Overrides the built-in eight-question flow.
    pub questions: Option<Vec<QuestionDefinition>>,
    pub logging: LoggerConfig,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_minutes: 30,
            max_session_minutes: 45,
            sweep_interval_secs: 60,
            voice: VoiceSettings::default(),
            synthesis_retry: RetrySettings::default(),
            extraction_retry: RetrySettings {
                max_attempts: 2,
                base_delay_ms: 500,
                max_delay_ms: 4_000,
                jitter: 0.2,
            },
            extraction_timeout_secs: 30,
            finalization_grace_secs: 120,
            questions: None,
            logging: LoggerConfig::default(),
        }
    }
}

impl CheckInConfig {
    /// Load configuration from environment variables
    ///
    /// Keys use the `CHECKIN_` prefix and `__` as the nesting separator, e.g.
    /// `CHECKIN_SYNTHESIS_RETRY__MAX_ATTEMPTS=5`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Layered load: defaults, then an optional file, then environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("CHECKIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_timeout_minutes == 0 {
            return Err(ConfigError::Invalid(
                "inactivity_timeout_minutes must be positive".to_string(),
            ));
        }
        if self.max_session_minutes == 0 {
            return Err(ConfigError::Invalid(
                "max_session_minutes must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.extraction_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "extraction_timeout_secs must be positive".to_string(),
            ));
        }
        if self.finalization_grace_secs == 0 {
            return Err(ConfigError::Invalid(
                "finalization_grace_secs must be positive".to_string(),
            ));
        }
        if !(0.25..=4.0).contains(&self.voice.speaking_rate) {
            return Err(ConfigError::Invalid(format!(
                "voice.speaking_rate {} is outside 0.25..=4.0",
                self.voice.speaking_rate
            )));
        }
        self.synthesis_retry.validate("synthesis_retry")?;
        self.extraction_retry.validate("extraction_retry")?;
        if let Some(questions) = &self.questions {
            QuestionFlow::new(questions.clone())?;
        }
        Ok(())
    }

    /// The configured flow, or the reference flow when none is set.
    pub fn question_flow(&self) -> Result<QuestionFlow, ConfigError> {
        match &self.questions {
            Some(questions) => QuestionFlow::new(questions.clone()),
            None => Ok(QuestionFlow::reference()),
        }
    }

    pub fn inactivity_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(minutes_as_i64(self.inactivity_timeout_minutes))
    }

    pub fn max_session_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(minutes_as_i64(self.max_session_minutes))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn finalization_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(seconds_as_i64(self.finalization_grace_secs))
    }
}

/// Clamped well inside chrono's representable range.
const MAX_MINUTES: u64 = 10_000_000;

fn minutes_as_i64(minutes: u64) -> i64 {
    i64::try_from(minutes.min(MAX_MINUTES)).unwrap_or(0)
}

fn seconds_as_i64(seconds: u64) -> i64 {
    i64::try_from(seconds.min(MAX_MINUTES * 60)).unwrap_or(0)
}
