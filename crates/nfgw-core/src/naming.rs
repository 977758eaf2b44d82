//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
//! Display names for catalog points.
//!
//! Templates use keyed substitution: `{key}` is replaced by the attribute of
//! that name, `{{` and `}}` produce literal braces. Positional fields and
//! format specifications are not supported.

use std::collections::BTreeMap;

use nfgw_common::DEFAULT_TOPIC_NAME_FORMAT;
use nfgw_logging::{gw_warn, LogContext};
use thiserror::Error;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template references missing attribute '{0}'")]
    MissingKey(String),
    #[error("unmatched '{brace}' at byte {position}")]
    UnmatchedBrace { brace: char, position: usize },
    #[error("empty field at byte {0}")]
    EmptyField(usize),
    #[error("unsupported field '{0}'; only plain attribute names are allowed")]
    UnsupportedField(String),
    #[error("unsupported format specification '{spec}' on field '{field}'")]
    UnsupportedFormatSpec { field: String, spec: String },
}

/// Substitute `attrs` into `template`.
pub fn render(
    template: &str,
    attrs: &BTreeMap<String, String>,
) -> std::result::Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() * 2);
    let mut chars = template.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(TemplateError::UnmatchedBrace { brace: '{', position }),
                        other => field.push(other),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnmatchedBrace { brace: '{', position });
                }
                if field.is_empty() {
                    return Err(TemplateError::EmptyField(position));
                }
                if let Some(split) = field.find([':', '!']) {
                    let spec = field.split_off(split);
                    return Err(TemplateError::UnsupportedFormatSpec { field, spec });
                }
                if field.contains(['[', '.']) || field.chars().all(|c| c.is_ascii_digit()) {
                    return Err(TemplateError::UnsupportedField(field));
                }
                let value = attrs
                    .get(&field)
                    .ok_or_else(|| TemplateError::MissingKey(field.clone()))?;
                out.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedBrace { brace: '}', position });
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Builds point display names from the configured template, falling back to
/// [`DEFAULT_TOPIC_NAME_FORMAT`] when the configured one cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFormatter {
    template: String,
}

impl Default for NameFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_NAME_FORMAT)
    }
}

impl NameFormatter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Format a display name. `attrs` must already contain the `uuid` key.
    ///
    /// Fails with [`GatewayError::Configuration`] only when the default
    /// template cannot be rendered either.
    pub fn format(&self, attrs: &BTreeMap<String, String>) -> Result<String> {
        match render(&self.template, attrs) {
            Ok(name) => Ok(name),
            Err(err) => {
                let uuid = attrs.get("uuid").map(String::as_str).unwrap_or("");
                gw_warn!(
                    context = LogContext::operation("format_name").with_point(uuid),
                    error = err,
                    "name template '{}' failed ({}); using default template",
                    self.template,
                    err
                );
                render(DEFAULT_TOPIC_NAME_FORMAT, attrs).map_err(|fallback| {
                    GatewayError::Configuration(format!(
                        "point {uuid}: template failed ({err}) and default template failed ({fallback})"
                    ))
                })
            }
        }
    }
}
