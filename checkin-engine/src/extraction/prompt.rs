/// JSON shape the completer is asked to produce.
pub const SCHEMA_HINT: &str = r#"{
  "symptoms": ["string"],
  "mood": "very_good|good|neutral|low|very_low|null",
  "painLevel": "integer 0-10 or null",
  "energyLevel": "high|moderate|low|very_low|null",
  "sleepQuality": "excellent|good|fair|poor|null",
  "medicationTaken": "taken|partial|missed|not_applicable|null",
  "physicalActivity": ["string"],
  "meals": {"breakfast": "string or null", "lunch": "string or null", "dinner": "string or null"},
  "generalFeeling": "string or null",
  "additionalNotes": "string or null"
}"#;

/// Build the extraction prompt for a rendered transcript.
pub fn build_prompt(transcript: &str) -> String {
    format!(
        "You are a health information extractor. Read the patient's daily check-in \
conversation and extract the information they explicitly gave. Output valid JSON only.\n\n\
RULES:\n\
1. Extract ONLY what the patient explicitly states.\n\
2. NEVER guess. If something was not mentioned, use null (or an empty list).\n\
3. painLevel is an integer from 0 to 10.\n\
4. Use the listed labels for mood, energyLevel, sleepQuality and medicationTaken.\n\
5. symptoms and physicalActivity are short lowercase phrases.\n\
6. Keep meals and free-text fields in the patient's own words.\n\n\
CONVERSATION (Q = assistant question, A = patient answer):\n\
{transcript}\n\n\
OUTPUT FORMAT:\n\
```json\n\
{SCHEMA_HINT}\n\
```"
    )
}
