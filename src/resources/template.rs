//! URI templates with named placeholders, e.g. `users://{userId}/profile`.
//!
//! A placeholder matches one non-empty path segment (no `/`). Matching is
//! anchored at both ends: a URI either matches the whole pattern or not at all.

use crate::error::RegistryError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Placeholder values extracted from a URI, keyed by placeholder name.
pub type TemplateVariables = BTreeMap<String, String>;

static PLACEHOLDER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex: placeholder name pattern")
});

#[derive(Debug, Clone)]
pub struct UriTemplate {
    raw: String,
    placeholders: Vec<String>,
    matcher: Regex,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, RegistryError> {
        let invalid = |message: String| RegistryError::InvalidTemplate {
            template: template.to_string(),
            message: message.into(),
        };

        let mut pattern = String::from("^");
        let mut placeholders: Vec<String> = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(invalid("unbalanced '}'".into()));
            }
            pattern.push_str(&regex::escape(literal));

            let close = tail
                .find('}')
                .ok_or_else(|| invalid("unterminated placeholder".into()))?;
            let name = &tail[1..close];
            if !PLACEHOLDER_NAME.is_match(name) {
                return Err(invalid(format!("invalid placeholder name '{}'", name)));
            }
            if placeholders.iter().any(|p| p == name) {
                return Err(invalid(format!("duplicate placeholder '{}'", name)));
            }
            pattern.push_str(&format!("(?P<{}>[^/]+)", name));
            placeholders.push(name.to_string());
            rest = &tail[close + 1..];
        }

        if rest.contains('}') {
            return Err(invalid("unbalanced '}'".into()));
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        if placeholders.is_empty() {
            return Err(invalid("template has no placeholders".into()));
        }

        let matcher = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            raw: template.to_string(),
            placeholders,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Extract placeholder values if the whole URI matches.
    pub fn match_uri(&self, uri: &str) -> Option<TemplateVariables> {
        let captures = self.matcher.captures(uri)?;
        self.placeholders
            .iter()
            .map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect()
    }
}

impl std::fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
