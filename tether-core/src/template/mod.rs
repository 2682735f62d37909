//! Command templates with `{$name}` placeholders.
//!
//! Braces that are not followed by `$` are kept verbatim, so shell syntax such as
//! `${VAR}` or `{a,b}` survives untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use zeroize::Zeroizing;

use crate::value::Value;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-\.]+$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut buf = String::new();
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '{' {
                buf.push(ch);
                continue;
            }

            let mut lookahead = chars.clone();
            while let Some(ws) = lookahead.peek() {
                if ws.is_whitespace() {
                    lookahead.next();
                } else {
                    break;
                }
            }
            if !matches!(lookahead.peek(), Some('$')) {
                buf.push('{');
                continue;
            }

            let mut inner = String::new();
            let mut found = false;
            for n in chars.by_ref() {
                if n == '}' {
                    found = true;
                    break;
                }
                inner.push(n);
            }
            if !found {
                return Err(TemplateError::UnclosedPlaceholder);
            }

            let name = inner.trim().trim_start_matches('$').trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder);
            }
            if !NAME_RE.is_match(name) {
                return Err(TemplateError::InvalidName(name.to_string()));
            }
            if !buf.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut buf)));
            }
            segments.push(Segment::Placeholder(name.to_string()));
        }

        if !buf.is_empty() {
            segments.push(Segment::Literal(buf));
        }

        Ok(Self {
            source: input.to_string(),
            segments,
        })
    }

    /// A template whose text is never scanned for placeholders.
    pub fn literal(text: impl Into<String>) -> Self {
        let source = text.into();
        let segments = if source.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(source.clone())]
        };
        Self { source, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes resolved inputs. Fails on the first placeholder with no value.
    pub fn render(&self, inputs: &BTreeMap<String, Value>) -> Result<Rendered, TemplateError> {
        let mut exposed = Zeroizing::new(String::new());
        let mut display = String::new();
        let mut sensitive = false;

        for seg in &self.segments {
            match seg {
                Segment::Literal(l) => {
                    exposed.push_str(l);
                    display.push_str(l);
                }
                Segment::Placeholder(name) => {
                    let value = inputs
                        .get(name)
                        .ok_or_else(|| TemplateError::Unresolved(name.clone()))?;
                    exposed.push_str(&value.expose_text());
                    display.push_str(&value.display_text());
                    sensitive |= value.is_sensitive();
                }
            }
        }

        Ok(Rendered {
            exposed,
            display,
            sensitive,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl std::str::FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A rendered template.
///
/// `expose()` carries raw sensitive substitutions and is zeroized on drop; `display()` has them
/// replaced by `<redacted>`. `Debug` only ever shows the display form.
pub struct Rendered {
    exposed: Zeroizing<String>,
    display: String,
    sensitive: bool,
}

impl Rendered {
    pub fn expose(&self) -> &str {
        self.exposed.as_str()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// The rendered text as a value, keeping the sensitive marking of its inputs.
    pub fn into_value(self) -> Value {
        if self.sensitive {
            Value::sensitive(self.exposed.as_str())
        } else {
            Value::plain(self.display)
        }
    }
}

impl fmt::Debug for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendered")
            .field("display", &self.display)
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder (missing '}}')")]
    UnclosedPlaceholder,
    #[error("empty placeholder")]
    EmptyPlaceholder,
    #[error("invalid placeholder name: {0}")]
    InvalidName(String),
    #[error("no resolved value for placeholder {0}")]
    Unresolved(String),
}
