//! Turning completer output into `ExtractedData`.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::types::{
    is_placeholder, EnergyLevel, ExtractedData, Meals, MedicationAdherence, Mood, SleepQuality,
};

/// Outcome of parsing one completer response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedExtraction {
    Parsed(ExtractedData),
    /// The response held no usable JSON object. Carries the raw text.
    Malformed(String),
}

/// Drop reasoning blocks some models emit ahead of their answer.
pub fn sanitize_output(raw: &str) -> String {
    let mut text = raw.to_string();
    for (open, close) in [("<think>", "</think>"), ("<thinking>", "</thinking>")] {
        while let Some(start) = text.find(open) {
            match text.get(start..).and_then(|rest| rest.find(close)) {
                Some(offset) => text.replace_range(start..start + offset + close.len(), ""),
                // Unclosed: everything after the tag is reasoning.
                None => text.truncate(start),
            }
        }
    }
    text.trim().to_string()
}

/// Locate the JSON object inside a response: fenced ```json block first, then
/// any fenced block that looks like JSON, then the outermost braces.
pub fn extract_json_block(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = trimmed.get(start + 7..)?;
        if let Some(end) = after_fence.find("```") {
            return after_fence.get(..end).map(str::trim);
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = trimmed.get(start + 3..)?;
        if let Some(end) = after_fence.find("```") {
            let block = after_fence.get(..end).map_or("", str::trim);
            if block.starts_with('{') {
                return Some(block);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed.get(start..=end),
        _ => None,
    }
}

/// Parse a completer response, attaching `raw_transcript` to the result.
pub fn parse_response(response: &str, raw_transcript: &str) -> ParsedExtraction {
    let cleaned = sanitize_output(response);
    let Some(block) = extract_json_block(&cleaned) else {
        return ParsedExtraction::Malformed(response.to_string());
    };
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(block) else {
        return ParsedExtraction::Malformed(response.to_string());
    };

    ParsedExtraction::Parsed(from_fields(&fields, raw_transcript))
}

fn from_fields(fields: &Map<String, Value>, raw_transcript: &str) -> ExtractedData {
    ExtractedData {
        symptoms: string_set(field(fields, "symptoms", "symptoms")),
        mood: label(field(fields, "mood", "mood")).and_then(|s| Mood::from_label(&s)),
        pain_level: pain_level(field(fields, "painLevel", "pain_level")),
        energy_level: label(field(fields, "energyLevel", "energy_level"))
            .and_then(|s| EnergyLevel::from_label(&s)),
        sleep_quality: label(field(fields, "sleepQuality", "sleep_quality"))
            .and_then(|s| SleepQuality::from_label(&s)),
        medication_taken: medication(field(fields, "medicationTaken", "medication_taken")),
        physical_activity: string_set(field(fields, "physicalActivity", "physical_activity")),
        meals: meals(field(fields, "meals", "meals")),
        general_feeling: text(field(fields, "generalFeeling", "general_feeling")),
        additional_notes: text(field(fields, "additionalNotes", "additional_notes")),
        raw_transcript: raw_transcript.to_string(),
    }
}

fn field<'a>(fields: &'a Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    fields
        .get(camel)
        .or_else(|| fields.get(snake))
        .filter(|value| !value.is_null())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !is_placeholder(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn label(value: Option<&Value>) -> Option<String> {
    text(value)
}

fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    let items: Vec<&str> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => s.split(',').collect(),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !is_placeholder(item))
        .collect()
}

/// Integer, integral float, or numeric string within 0..=10.
fn pain_level(value: Option<&Value>) -> Option<u8> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if number.fract() != 0.0 || !(0.0..=10.0).contains(&number) {
        return None;
    }
    (0..=10u8).find(|level| f64::from(*level) == number)
}

fn medication(value: Option<&Value>) -> Option<MedicationAdherence> {
    match value? {
        Value::Bool(taken) => Some(MedicationAdherence::from_bool(*taken)),
        Value::String(s) => MedicationAdherence::from_label(s),
        _ => None,
    }
}

fn meals(value: Option<&Value>) -> Meals {
    match value {
        Some(Value::Object(meals)) => Meals {
            breakfast: text(meals.get("breakfast")),
            lunch: text(meals.get("lunch")),
            dinner: text(meals.get("dinner")),
        },
        _ => Meals::default(),
    }
}
