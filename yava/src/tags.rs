//! Tag extraction from model output
//!
//! Prompts ask the model to wrap the interesting parts of its answer in
//! pseudo-XML tags (`<PLAN>...</PLAN>`). [`extract`] pulls those parts back
//! out. It is not an XML parser: no attributes, no nesting, no escaping.

use regex::Regex;
use serde::{Serialize, Serializer};

/// What [`extract`] found.
///
/// Callers branch on the shape: nothing, exactly one block, or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// No `<TAG>...</TAG>` pair in the text
    Empty,
    /// Exactly one pair; its content
    Single(String),
    /// Two or more pairs, in document order
    Many(Vec<String>),
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        matches!(self, Extracted::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            Extracted::Empty => 0,
            Extracted::Single(_) => 1,
            Extracted::Many(items) => items.len(),
        }
    }

    /// The first match in document order
    pub fn first(&self) -> Option<&str> {
        match self {
            Extracted::Empty => None,
            Extracted::Single(s) => Some(s.as_str()),
            Extracted::Many(items) => items.first().map(String::as_str),
        }
    }

    /// Flatten into a plain list regardless of shape
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Extracted::Empty => Vec::new(),
            Extracted::Single(s) => vec![s],
            Extracted::Many(items) => items,
        }
    }

    fn from_matches(mut matches: Vec<String>) -> Self {
        match matches.len() {
            0 => Extracted::Empty,
            1 => Extracted::Single(matches.remove(0)),
            _ => Extracted::Many(matches),
        }
    }
}

/// `[]`, `"content"` or `["a", "b"]`
impl Serialize for Extracted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extracted::Empty => Vec::<String>::new().serialize(serializer),
            Extracted::Single(s) => serializer.serialize_str(s),
            Extracted::Many(items) => items.serialize(serializer),
        }
    }
}

/// Find the content between `<tag>` and `</tag>`.
///
/// Matching is non-greedy and spans lines. The tag is taken literally and
/// case-sensitively.
///
/// ```rust
/// use yava::tags::{extract, Extracted};
///
/// assert_eq!(extract("<PLAN>Content</PLAN>", "PLAN"), Extracted::Single("Content".into()));
/// assert_eq!(extract("<PLA>Content</PLAN>", "PLAN"), Extracted::Empty);
/// ```
pub fn extract(text: &str, tag: &str) -> Extracted {
    let tag = regex::escape(tag);
    let pattern = format!(r"(?s)<{tag}>(.*?)</{tag}>");

    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(tag = %tag, error = %e, "tag pattern rejected");
            return Extracted::Empty;
        }
    };

    let matches = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    Extracted::from_matches(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single() {
        assert_eq!(extract("<PLAN>Content</PLAN>", "PLAN"), Extracted::Single("Content".into()));
    }

    #[test]
    fn test_mismatched_tag() {
        assert_eq!(extract("<PLA>Content</PLAN>", "PLAN"), Extracted::Empty);
    }

    #[test]
    fn test_many_in_document_order() {
        assert_eq!(
            extract("<PLAN>Plan 1</PLAN><PLAN>Plan 2</PLAN>", "PLAN"),
            Extracted::Many(vec!["Plan 1".into(), "Plan 2".into()])
        );
    }

    #[test]
    fn test_multiline() {
        assert_eq!(extract("<A>line1\nline2</A>", "A"), Extracted::Single("line1\nline2".into()));
    }

    #[test]
    fn test_non_greedy_with_surrounding_text() {
        let text = "Here you go:\n<STEPS>\n1. read\n</STEPS> and also <STEPS>2. write</STEPS>\nbye";
        let found = extract(text, "STEPS");
        assert_eq!(found.len(), 2);
        assert_eq!(found.first(), Some("\n1. read\n"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(extract("<plan>x</plan>", "PLAN").is_empty());
    }

    #[test]
    fn test_unclosed_tag() {
        assert_eq!(extract("<PLAN>never closed", "PLAN"), Extracted::Empty);
    }

    #[test]
    fn test_empty_content_is_a_match() {
        assert_eq!(extract("<A></A>", "A"), Extracted::Single(String::new()));
    }

    #[test]
    fn test_regex_metacharacters_in_tag() {
        assert_eq!(extract("<a.b>x</a.b><aXb>y</aXb>", "a.b"), Extracted::Single("x".into()));
    }

    #[test]
    fn test_into_vec() {
        assert!(Extracted::Empty.into_vec().is_empty());
        assert_eq!(Extracted::Single("a".into()).into_vec(), vec!["a".to_string()]);
    }

    #[test]
    fn test_serialized_shapes() {
        assert_eq!(serde_json::to_string(&Extracted::Empty).unwrap(), "[]");
        assert_eq!(serde_json::to_string(&Extracted::Single("a".into())).unwrap(), r#""a""#);
        assert_eq!(
            serde_json::to_string(&Extracted::Many(vec!["a".into(), "b".into()])).unwrap(),
            r#"["a","b"]"#
        );
    }
}
