use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
    #[error("invalid placeholder name {0:?}")]
    InvalidName(String),
    #[error("required field `{0}` has no value")]
    MissingField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, required: bool },
}

/// Page template with named placeholders.
///
/// `{{name}}` marks a required field and `{{name?}}` an optional one. Optional
/// fields without a value render as the empty string; a required field
/// without a value fails the render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    segments: Vec<Segment>,
}

impl PageTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::Unterminated(offset + start))?;
            let raw = after_open[..end].trim();
            let (name, required) = match raw.strip_suffix('?') {
                Some(name) => (name.trim(), false),
                None => (raw, true),
            };
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(TemplateError::InvalidName(raw.to_string()));
            }
            segments.push(Segment::Field {
                name: name.to_string(),
                required,
            });
            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Placeholder names with their required flag, in template order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, bool)> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field { name, required } => Some((name.as_str(), *required)),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, fields: &TemplateFields) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, required } => match fields.get(name) {
                    Some(value) => out.push_str(value),
                    None if *required => return Err(TemplateError::MissingField(name.clone())),
                    None => {}
                },
            }
        }
        Ok(out)
    }
}

/// Named values supplied to a [`PageTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFields {
    values: HashMap<String, String>,
}

impl TemplateFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}
