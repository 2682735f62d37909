mod redact;
mod secret;

use std::borrow::Cow;
use std::fmt;

pub use redact::Redactor;
pub use secret::SecretValue;

/// Placeholder written wherever a sensitive value would otherwise be rendered.
pub const REDACTED: &str = "<redacted>";

/// A concrete, non-sensitive datum.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Datum {
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl Datum {
    /// Text form used for template substitution. Lists are joined with `,`.
    pub fn render(&self) -> String {
        match self {
            Datum::Int(i) => i.to_string(),
            Datum::Str(s) => s.clone(),
            Datum::List(items) => items.join(","),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Str(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Str(s)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Int(i)
    }
}

impl From<Vec<String>> for Datum {
    fn from(items: Vec<String>) -> Self {
        Datum::List(items)
    }
}

/// A resolved value, optionally marked sensitive.
///
/// Sensitive content lives behind a [`SecretValue`] handle. `Debug`, `Display` and `Serialize`
/// all print [`REDACTED`] for it; only [`Value::expose_text`] and [`Value::unmark`] reach the
/// raw content.
#[derive(Clone)]
pub struct Value(Repr);

#[derive(Clone)]
enum Repr {
    Plain(Datum),
    Sensitive(SecretValue),
}

impl Value {
    pub fn plain(datum: impl Into<Datum>) -> Self {
        Self(Repr::Plain(datum.into()))
    }

    pub fn sensitive(text: impl Into<String>) -> Self {
        Self(Repr::Sensitive(SecretValue::from_string(text.into())))
    }

    pub fn from_secret(secret: SecretValue) -> Self {
        Self(Repr::Sensitive(secret))
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(self.0, Repr::Sensitive(_))
    }

    /// Re-marks a value as sensitive. Non-string data is stored in its rendered text form.
    pub fn mark_sensitive(self) -> Self {
        match self.0 {
            Repr::Plain(d) => Self::sensitive(d.render()),
            Repr::Sensitive(_) => self,
        }
    }

    /// Explicitly drops the sensitive marking, yielding a plain string value.
    pub fn unmark(self) -> Self {
        match self.0 {
            Repr::Plain(_) => self,
            Repr::Sensitive(s) => Self::plain(s.expose_str().into_owned()),
        }
    }

    /// The datum of a plain value; `None` for sensitive values.
    pub fn as_datum(&self) -> Option<&Datum> {
        match &self.0 {
            Repr::Plain(d) => Some(d),
            Repr::Sensitive(_) => None,
        }
    }

    pub fn secret(&self) -> Option<&SecretValue> {
        match &self.0 {
            Repr::Plain(_) => None,
            Repr::Sensitive(s) => Some(s),
        }
    }

    /// Raw text, including sensitive content. Only for handing values to collaborators.
    pub fn expose_text(&self) -> Cow<'_, str> {
        match &self.0 {
            Repr::Plain(d) => Cow::Owned(d.render()),
            Repr::Sensitive(s) => s.expose_str(),
        }
    }

    /// Text safe for logs, events and reports.
    pub fn display_text(&self) -> Cow<'_, str> {
        match &self.0 {
            Repr::Plain(d) => Cow::Owned(d.render()),
            Repr::Sensitive(_) => Cow::Borrowed(REDACTED),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Plain(a), Repr::Plain(b)) => a == b,
            (Repr::Sensitive(a), Repr::Sensitive(b)) => a.expose_bytes() == b.expose_bytes(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Plain(d) => f.debug_tuple("Value").field(d).finish(),
            Repr::Sensitive(_) => f.write_str("Value(<redacted>)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Repr::Plain(d) => d.serialize(serializer),
            Repr::Sensitive(_) => serializer.serialize_str(REDACTED),
        }
    }
}

impl From<Datum> for Value {
    fn from(d: Datum) -> Self {
        Self::plain(d)
    }
}

/// Resolution state of one output slot during a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ValueState {
    Pending,
    Resolved(Value),
    Failed(String),
}

impl ValueState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ValueState::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&Value> {
        match self {
            ValueState::Resolved(v) => Some(v),
            _ => None,
        }
    }
}
