//! URL templates with `{name}` placeholders.
//!
//! # Design Decisions
//! - A placeholder always spans a whole segment (`/{state_id}/root`)
//! - Templates are parsed once at startup; a malformed template is a
//!   startup error rather than a router panic
//! - Matching is segment-by-segment, no regex

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    #[error("template {template:?} has a malformed segment {segment:?}")]
    MalformedSegment { template: String, segment: String },

    #[error("template {template:?} repeats parameter {name:?}")]
    DuplicateParam { template: String, name: String },
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    /// Segments after the leading '/'.
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::MissingLeadingSlash(raw.to_string()))?;

        let mut segments = Vec::new();
        for part in rest.split('/') {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) if is_valid_name(name) => Segment::Param(name.to_string()),
                Some(_) => return Err(malformed(raw, part)),
                None if part.contains('{') || part.contains('}') => return Err(malformed(raw, part)),
                None => Segment::Literal(part.to_string()),
            };

            if let Segment::Param(name) = &segment {
                if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                    return Err(TemplateError::DuplicateParam {
                        template: raw.to_string(),
                        name: name.clone(),
                    });
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match `path` and return the `(name, value)` captures in template order.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<(&str, &'p str)>> {
        let parts: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => captures.push((name.as_str(), part)),
            }
        }
        Some(captures)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn malformed(template: &str, segment: &str) -> TemplateError {
    TemplateError::MalformedSegment {
        template: template.to_string(),
        segment: segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let t = PathTemplate::parse("/eth/v1/beacon/states/{state_id}/validators/{validator_id}").unwrap();
        assert_eq!(t.params().collect::<Vec<_>>(), vec!["state_id", "validator_id"]);
        assert_eq!(t.segments()[0], Segment::Literal("eth".into()));
        assert_eq!(t.to_string(), "/eth/v1/beacon/states/{state_id}/validators/{validator_id}");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            PathTemplate::parse("eth/v1"),
            Err(TemplateError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/eth/{}/x"),
            Err(TemplateError::MalformedSegment { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/eth/{id/x"),
            Err(TemplateError::MalformedSegment { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/eth/a{id}"),
            Err(TemplateError::MalformedSegment { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/{id}/x/{id}"),
            Err(TemplateError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn test_captures() {
        let t = PathTemplate::parse("/eth/v1/beacon/headers/{block_id}").unwrap();
        assert_eq!(
            t.captures("/eth/v1/beacon/headers/0xabcd"),
            Some(vec![("block_id", "0xabcd")])
        );
        assert_eq!(t.captures("/eth/v1/beacon/headers/"), None);
        assert_eq!(t.captures("/eth/v1/beacon/blocks/head"), None);
        assert_eq!(t.captures("/eth/v1/beacon/headers/head/extra"), None);
    }
}
