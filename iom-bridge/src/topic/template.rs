//! Topic template parsing, resolution and matching.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Failure in the topic layer.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The pattern text violates the template grammar.
    #[error("malformed topic pattern `{pattern}`: {detail}")]
    Malformed { pattern: String, detail: String },

    /// A publish resolution or subscription build hit a variable with no
    /// bound value.
    #[error("no value bound for `{{{variable}}}` in `{pattern}`")]
    Unresolved { pattern: String, variable: String },

    /// A template containing wildcards was asked for a concrete topic.
    #[error("pattern `{pattern}` contains wildcards and cannot name a publish topic")]
    NotConcrete { pattern: String },

    /// A concrete topic carries no value segment after the given key.
    #[error("topic `{topic}` carries no `{key}` value segment")]
    SegmentNotFound { topic: String, key: String },

    /// A publish call named a template the client never declared.
    #[error("no publish template named `{0}`")]
    UnknownTemplate(String),
}

/// Values for template variables, instance-scoped or call-scoped.
#[derive(Debug, Clone, Default)]
pub struct TopicValues(HashMap<String, String>);

impl TopicValues {
    pub fn new() -> Self {
        TopicValues::default()
    }

    pub fn with(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(variable.into(), value.into());
        self
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.0.get(variable).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    SingleWildcard,
    MultiWildcard,
}

/// An immutable, parsed topic pattern.
///
/// Segments are literals, brace-delimited variables, `+` (exactly one
/// segment) or a final `#` (any remainder, including none). Variables come
/// in two binding stages: [`TopicTemplate::bind`] fixes the instance-scoped
/// ones once per client, [`TopicTemplate::resolve`] supplies the
/// call-scoped rest per publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl TopicTemplate {
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let malformed = |detail: &str| TemplateError::Malformed {
            pattern: pattern.to_string(),
            detail: detail.to_string(),
        };

        let raw: Vec<&str> = pattern.split('/').collect();
        let last = raw.len() - 1;
        let mut segments = Vec::with_capacity(raw.len());
        for (index, text) in raw.into_iter().enumerate() {
            let segment = match text {
                "+" => Segment::SingleWildcard,
                "#" => {
                    if index != last {
                        return Err(malformed("multi-level wildcard must be the final segment"));
                    }
                    Segment::MultiWildcard
                }
                _ if text.starts_with('{') || text.ends_with('}') => {
                    let name = text
                        .strip_prefix('{')
                        .and_then(|inner| inner.strip_suffix('}'))
                        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
                        .ok_or_else(|| malformed("variable segments take the form `{name}`"))?;
                    Segment::Variable(name.to_string())
                }
                _ if text.contains(['{', '}']) => {
                    return Err(malformed("variables must span a whole segment"));
                }
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        Ok(TopicTemplate {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// Original pattern text, for diagnostics.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Fixes every variable that has a value in `values`, leaving the rest
    /// open. Used once per client to bind the instance-scoped variables.
    pub fn bind(&self, values: &TopicValues) -> TopicTemplate {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Variable(name) => match values.get(name) {
                    Some(value) => Segment::Literal(value.to_string()),
                    None => segment.clone(),
                },
                other => other.clone(),
            })
            .collect();
        TopicTemplate {
            pattern: self.pattern.clone(),
            segments,
        }
    }

    /// Renders a concrete publish topic. Every variable must be bound and
    /// the template must be wildcard-free.
    pub fn resolve(&self, values: &TopicValues) -> Result<String, TemplateError> {
        let mut rendered = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push(text.as_str()),
                Segment::Variable(name) => match values.get(name) {
                    Some(value) => rendered.push(value),
                    None => {
                        return Err(TemplateError::Unresolved {
                            pattern: self.pattern.clone(),
                            variable: name.clone(),
                        })
                    }
                },
                Segment::SingleWildcard | Segment::MultiWildcard => {
                    return Err(TemplateError::NotConcrete {
                        pattern: self.pattern.clone(),
                    })
                }
            }
        }
        Ok(rendered.join("/"))
    }

    /// Renders the subscription filter form: wildcards stay literal, but
    /// all variables must already be bound.
    pub fn subscription_filter(&self) -> Result<String, TemplateError> {
        let mut rendered = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push(text.as_str()),
                Segment::SingleWildcard => rendered.push("+"),
                Segment::MultiWildcard => rendered.push("#"),
                Segment::Variable(name) => {
                    return Err(TemplateError::Unresolved {
                        pattern: self.pattern.clone(),
                        variable: name.clone(),
                    })
                }
            }
        }
        Ok(rendered.join("/"))
    }

    /// Tests a concrete inbound topic against this template. Unbound
    /// variables match like single-level wildcards.
    pub fn matches(&self, topic: &str) -> bool {
        let inbound: Vec<&str> = topic.split('/').collect();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::MultiWildcard => return true,
                Segment::Literal(text) => {
                    if inbound.get(index) != Some(&text.as_str()) {
                        return false;
                    }
                }
                Segment::Variable(_) | Segment::SingleWildcard => {
                    if index >= inbound.len() {
                        return false;
                    }
                }
            }
        }
        inbound.len() == self.segments.len()
    }
}

impl fmt::Display for TopicTemplate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.pattern)
    }
}

/// Recovers the value segment immediately following the literal segment
/// `key` in a concrete topic. Callers that can tolerate absence use
/// `.ok()`.
pub fn extract_segment_value(topic: &str, key: &str) -> Result<String, TemplateError> {
    let segments: Vec<&str> = topic.split('/').collect();
    segments
        .iter()
        .position(|segment| *segment == key)
        .and_then(|index| segments.get(index + 1))
        .map(|value| (*value).to_string())
        .ok_or_else(|| TemplateError::SegmentNotFound {
            topic: topic.to_string(),
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(pattern: &str) -> TopicTemplate {
        TopicTemplate::parse(pattern).expect("pattern should parse")
    }

    #[test]
    fn resolution_leaves_no_placeholders() {
        let resolved = template("IoM/1.0/Organisation/{organisation}/CorrelationId/{correlation}")
            .resolve(
                &TopicValues::new()
                    .with("organisation", "org-hvv")
                    .with("correlation", "7"),
            )
            .expect("resolution should succeed");

        assert_eq!(resolved, "IoM/1.0/Organisation/org-hvv/CorrelationId/7");
        assert!(!resolved.contains(['{', '}']));
    }

    #[test]
    fn unresolved_variable_names_the_culprit() {
        let err = template("A/{missing}/B")
            .resolve(&TopicValues::new())
            .expect_err("must fail");
        assert!(matches!(
            err,
            TemplateError::Unresolved { variable, .. } if variable == "missing"
        ));
    }

    #[test]
    fn wildcards_cannot_name_a_publish_topic() {
        let err = template("A/+/B")
            .resolve(&TopicValues::new())
            .expect_err("must fail");
        assert!(matches!(err, TemplateError::NotConcrete { .. }));
    }

    #[test]
    fn binding_is_partial_and_repeatable() {
        let bound = template("Organisation/{organisation}/Vehicle/{vehicle}")
            .bind(&TopicValues::new().with("organisation", "org-hvv"));

        assert!(bound.resolve(&TopicValues::new()).is_err());
        let resolved = bound
            .resolve(&TopicValues::new().with("vehicle", "vehicle-23"))
            .expect("call binding should finish the resolution");
        assert_eq!(resolved, "Organisation/org-hvv/Vehicle/vehicle-23");
    }

    #[test]
    fn subscription_filter_keeps_wildcards_and_demands_bound_variables() {
        let filter = template("R/{organisation}/+/Tail/#")
            .bind(&TopicValues::new().with("organisation", "org-hvv"))
            .subscription_filter()
            .expect("filter should render");
        assert_eq!(filter, "R/org-hvv/+/Tail/#");

        assert!(template("R/{organisation}/+").subscription_filter().is_err());
    }

    #[test]
    fn single_wildcard_matches_exactly_one_segment() {
        let pattern = template("R/VehicleId/+/End");

        assert!(pattern.matches("R/VehicleId/123/End"));
        assert!(!pattern.matches("R/VehicleId/123/456/End"));
        assert!(!pattern.matches("R/VehicleId/End"));
    }

    #[test]
    fn multi_wildcard_matches_any_tail_including_empty() {
        let pattern = template("R/Data/#");

        assert!(pattern.matches("R/Data"));
        assert!(pattern.matches("R/Data/a"));
        assert!(pattern.matches("R/Data/a/b/c"));
        assert!(!pattern.matches("R/Other/a"));
    }

    #[test]
    fn unbound_variables_match_like_single_wildcards() {
        let pattern = template("R/{organisation}/End");

        assert!(pattern.matches("R/org-hvv/End"));
        assert!(!pattern.matches("R/org-hvv/extra/End"));
    }

    #[test]
    fn literal_templates_match_exactly() {
        let pattern = template("A/B/C");

        assert!(pattern.matches("A/B/C"));
        assert!(!pattern.matches("A/B"));
        assert!(!pattern.matches("A/B/C/D"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(TopicTemplate::parse("A/#/B").is_err());
        assert!(TopicTemplate::parse("A/{}/B").is_err());
        assert!(TopicTemplate::parse("A/{open/B").is_err());
        assert!(TopicTemplate::parse("A/close}/B").is_err());
        assert!(TopicTemplate::parse("A/pre{var}/B").is_err());
    }

    #[test]
    fn segment_value_extraction_finds_the_following_segment() {
        let topic = "IoM/1.0/Organisation/org/ItcsId/itcs-1/CorrelationId/42/ResponseData";

        assert_eq!(
            extract_segment_value(topic, "CorrelationId").expect("value should be found"),
            "42"
        );
        assert_eq!(
            extract_segment_value(topic, "Organisation").expect("value should be found"),
            "org"
        );
        assert!(extract_segment_value(topic, "VehicleId").is_err());
        assert!(extract_segment_value("Ends/With/CorrelationId", "CorrelationId").is_err());
    }
}
