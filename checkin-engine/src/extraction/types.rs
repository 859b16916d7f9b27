use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Strings a model emits when it means "nothing to report".
const PLACEHOLDERS: &[&str] = &[
    "",
    "none",
    "n/a",
    "na",
    "null",
    "nil",
    "unknown",
    "not mentioned",
    "not specified",
    "not provided",
    "not stated",
];

/// Lowercase, trim, and fold `_`/`-` separators into spaces.
pub(crate) fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn is_placeholder(raw: &str) -> bool {
    let label = raw.trim().to_lowercase();
    PLACEHOLDERS.contains(&label.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    VeryGood,
    Good,
    Neutral,
    Low,
    VeryLow,
}

impl Mood {
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "very good" | "great" | "excellent" | "happy" | "fantastic" | "wonderful" => {
                Some(Self::VeryGood)
            }
            "good" | "fine" | "positive" | "content" | "pretty good" => Some(Self::Good),
            "neutral" | "ok" | "okay" | "so so" | "average" | "alright" | "meh" => {
                Some(Self::Neutral)
            }
            "low" | "bad" | "sad" | "down" | "poor" | "anxious" | "stressed" | "irritable" => {
                Some(Self::Low)
            }
            "very low" | "very bad" | "terrible" | "awful" | "depressed" | "miserable" => {
                Some(Self::VeryLow)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    High,
    Moderate,
    Low,
    VeryLow,
}

impl EnergyLevel {
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "high" | "very high" | "energetic" | "great" | "good" | "lots" => Some(Self::High),
            "moderate" | "medium" | "normal" | "average" | "ok" | "okay" | "fine" => {
                Some(Self::Moderate)
            }
            "low" | "tired" | "fatigued" | "sluggish" | "drained" => Some(Self::Low),
            "very low" | "exhausted" | "none at all" | "depleted" => Some(Self::VeryLow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SleepQuality {
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "excellent" | "great" | "very good" | "restful" => Some(Self::Excellent),
            "good" | "well" | "fine" | "solid" => Some(Self::Good),
            "fair" | "ok" | "okay" | "average" | "so so" | "restless" => Some(Self::Fair),
            "poor" | "bad" | "badly" | "terrible" | "insomnia" | "very poor" => Some(Self::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationAdherence {
    Taken,
    Partial,
    Missed,
    NotApplicable,
}

impl MedicationAdherence {
    pub fn from_label(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "taken" | "yes" | "true" | "all" | "took" | "as prescribed" => Some(Self::Taken),
            "partial" | "partially" | "some" | "partly" => Some(Self::Partial),
            "missed" | "no" | "false" | "skipped" | "forgot" | "not taken" => Some(Self::Missed),
            "not applicable" | "no medications" | "none prescribed" | "no medication" => {
                Some(Self::NotApplicable)
            }
            _ => None,
        }
    }

    /// Booleans map to taken / missed.
    pub fn from_bool(taken: bool) -> Self {
        if taken {
            Self::Taken
        } else {
            Self::Missed
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meals {
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
}

impl Meals {
    pub fn is_empty(&self) -> bool {
        self.breakfast.is_none() && self.lunch.is_none() && self.dinner.is_none()
    }
}

/// Structured health data distilled from a transcript
///
/// Every field except `raw_transcript` may be absent, meaning the patient did
/// not mention it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub symptoms: BTreeSet<String>,
    pub mood: Option<Mood>,
    pub pain_level: Option<u8>,
    pub energy_level: Option<EnergyLevel>,
    pub sleep_quality: Option<SleepQuality>,
    pub medication_taken: Option<MedicationAdherence>,
    pub physical_activity: BTreeSet<String>,
    pub meals: Meals,
    pub general_feeling: Option<String>,
    pub additional_notes: Option<String>,
    pub raw_transcript: String,
}

impl ExtractedData {
    /// Only the verbatim transcript, nothing structured.
    pub fn degraded(raw_transcript: impl Into<String>) -> Self {
        Self {
            raw_transcript: raw_transcript.into(),
            ..Default::default()
        }
    }

    pub fn has_structured_fields(&self) -> bool {
        !self.symptoms.is_empty()
            || self.mood.is_some()
            || self.pain_level.is_some()
            || self.energy_level.is_some()
            || self.sleep_quality.is_some()
            || self.medication_taken.is_some()
            || !self.physical_activity.is_empty()
            || !self.meals.is_empty()
            || self.general_feeling.is_some()
            || self.additional_notes.is_some()
    }
}
