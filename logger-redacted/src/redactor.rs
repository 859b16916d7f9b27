use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex");
    static ref PHONE_REGEX: Regex =
        Regex::new(r"(?:\+1[-.\s]?)?\(?\b[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b")
            .expect("valid phone regex");
    static ref SSN_REGEX: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex");
    static ref IP_REGEX: Regex =
        Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid ip regex");
    static ref MRN_REGEX: Regex =
        Regex::new(r"(?i)\bMRN[-:\s]?\d{4,}\b").expect("valid mrn regex");
    static ref DATE_REGEX: Regex =
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").expect("valid date regex");
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_ssn: bool,
    pub redact_ip_addresses: bool,
    pub redact_record_numbers: bool,
    pub redact_dates: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            redact_ip_addresses: true,
            redact_record_numbers: true,
            redact_dates: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    pub fn with_custom_pattern(mut self, pattern: Regex, replacement: impl Into<String>) -> Self {
        self.custom_patterns.push((pattern, replacement.into()));
        self
    }
}

/// PII redactor for log messages and transcript previews
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// A redactor that passes text through untouched.
    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            redact_emails: false,
            redact_phones: false,
            redact_ssn: false,
            redact_ip_addresses: false,
            redact_record_numbers: false,
            redact_dates: false,
            hash_for_correlation: false,
            custom_patterns: Vec::new(),
        })
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // SSNs and record numbers first: the phone pattern would otherwise
        // swallow some of their digit runs.
        if self.config.redact_ssn {
            result = self.replace(&SSN_REGEX, &result, "SSN", "***-**-****");
        }

        if self.config.redact_record_numbers {
            result = self.replace(&MRN_REGEX, &result, "MRN", "MRN******");
        }

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        if self.config.redact_phones {
            result = self.replace(&PHONE_REGEX, &result, "PHONE", "(***) ***-****");
        }

        if self.config.redact_ip_addresses {
            result = self.redact_ip_addresses(&result);
        }

        if self.config.redact_dates {
            result = self.replace(&DATE_REGEX, &result, "DATE", "**/**/****");
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Redact `text` and cap it at `max_chars` characters for a log line.
    pub fn preview(&self, text: &str, max_chars: usize) -> String {
        let redacted = self.redact(text.trim());
        let mut chars = redacted.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }

    fn replace(&self, pattern: &Regex, text: &str, label: &str, mask: &str) -> String {
        pattern
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("{label}[{}]", self.hash_value(&caps[0]))
                } else {
                    mask.to_string()
                }
            })
            .to_string()
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                let email = &caps[0];
                if self.config.hash_for_correlation {
                    return format!("EMAIL[{}]", self.hash_value(email));
                }
                match email.split_once('@') {
                    Some((local, domain)) => format!(
                        "{}***@{}***",
                        local.chars().next().unwrap_or('*'),
                        domain.chars().next().unwrap_or('*')
                    ),
                    None => "***@***".to_string(),
                }
            })
            .to_string()
    }

    fn redact_ip_addresses(&self, text: &str) -> String {
        IP_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                let ip = &caps[0];
                if self.config.hash_for_correlation {
                    return format!("IP[{}]", self.hash_value(ip));
                }
                let parts: Vec<&str> = ip.split('.').collect();
                match (parts.first(), parts.last()) {
                    (Some(first), Some(last)) if parts.len() == 4 => {
                        format!("{first}.***.***.{last}")
                    }
                    _ => "***.***.***.***".to_string(),
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let digest = Sha256::digest(value.as_bytes());
        general_purpose::STANDARD.encode(&digest[..8]) // Use first 8 bytes for shorter hash
    }
}
