use crate::value::{SecretValue, Value, REDACTED};

/// Scrubs raw secret content out of free-form text (stderr, provider error messages).
///
/// Holds handles, not copies, of every secret it knows about.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<SecretValue>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, value: &Value) {
        if let Some(secret) = value.secret() {
            self.track_secret(secret.clone());
        }
    }

    pub fn track_secret(&mut self, secret: SecretValue) {
        if secret.is_empty() || self.secrets.iter().any(|s| s.same_handle(&secret)) {
            return;
        }
        self.secrets.push(secret);
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn scrub(&self, text: &str) -> String {
        let mut needles: Vec<String> = Vec::new();
        for s in &self.secrets {
            let raw = s.expose_str();
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                needles.push(trimmed.to_string());
            }
            if raw.len() != trimmed.len() && !raw.is_empty() {
                needles.push(raw.into_owned());
            }
        }
        // Longest first, so a secret containing another is replaced whole.
        needles.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut out = text.to_string();
        for n in &needles {
            if out.contains(n.as_str()) {
                out = out.replace(n.as_str(), REDACTED);
            }
        }
        out
    }
}
