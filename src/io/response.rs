//! The query response written to stdout.
//!
//! Every query produces exactly one response object. Callers tell the
//! outcomes apart by the `error` key: absent on success, `"Index not found"`
//! when no index has been built (a soft failure), anything else is a hard
//! failure. `matches` is always present.

use crate::error::RetrievalError;
use crate::query::QueryResult;
use serde::{Deserialize, Serialize};

/// Error text reported when no index has been built.
pub const INDEX_NOT_FOUND: &str = "Index not found";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub matches: Vec<QueryResult>,
}

impl QueryResponse {
    pub fn success(matches: Vec<QueryResult>) -> Self {
        Self {
            error: None,
            matches,
        }
    }

    pub fn index_missing() -> Self {
        Self {
            error: Some(INDEX_NOT_FOUND.to_string()),
            matches: Vec::new(),
        }
    }

    /// Response for a failed query. Carries no matches.
    pub fn from_error(error: &RetrievalError) -> Self {
        if error.is_soft() {
            return Self::index_missing();
        }
        Self {
            error: Some(error.to_string()),
            matches: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_soft_failure(&self) -> bool {
        self.error.as_deref() == Some(INDEX_NOT_FOUND)
    }

    #[must_use]
    pub fn is_hard_failure(&self) -> bool {
        self.error.is_some() && !self.is_soft_failure()
    }

    /// Compact single-line JSON.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"error":{},"matches":[]}}"#,
                serde_json::Value::String(e.to_string())
            )
        })
    }

    /// Render matches as prompt context for a chat model.
    ///
    /// One block per match, nearest first, separated by a blank line. Empty
    /// when there are no matches.
    pub fn to_prompt_context(&self) -> String {
        self.matches
            .iter()
            .map(|m| {
                format!(
                    "Context Tag: [{}]\nSimilar Previous User Input: \"{}\" (Distance: {:.2})\nVerified Therapeutic Responses: \"{}\"",
                    m.metadata.tag,
                    m.metadata.matched_pattern,
                    m.distance,
                    m.metadata.responses.join(" | ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DocumentMetadata;
    use std::path::PathBuf;

    fn result(tag: &str, text: &str, distance: f32, responses: &[&str]) -> QueryResult {
        QueryResult {
            distance,
            text: text.to_string(),
            metadata: DocumentMetadata {
                tag: tag.to_string(),
                responses: responses.iter().map(|r| r.to_string()).collect(),
                matched_pattern: text.to_string(),
            },
        }
    }

    #[test]
    fn test_success_omits_error_key() {
        let response = QueryResponse::success(vec![result("greeting", "hello", 0.0, &["Hi"])]);
        let json = response.to_json_line();
        assert!(!json.contains("error"));
        assert_eq!(
            json,
            r#"{"matches":[{"distance":0.0,"text":"hello","metadata":{"tag":"greeting","responses":["Hi"],"matched_pattern":"hello"}}]}"#
        );
        assert!(!response.is_soft_failure());
        assert!(!response.is_hard_failure());
    }

    #[test]
    fn test_empty_success_is_not_a_failure() {
        let response = QueryResponse::success(Vec::new());
        assert_eq!(response.to_json_line(), r#"{"matches":[]}"#);
        assert!(!response.is_hard_failure());
    }

    #[test]
    fn test_error_responses() {
        let soft = QueryResponse::from_error(&RetrievalError::IndexMissing {
            path: PathBuf::from("x.index"),
        });
        assert_eq!(soft, QueryResponse::index_missing());
        assert!(soft.is_soft_failure());
        assert!(!soft.is_hard_failure());

        let hard = QueryResponse::from_error(&RetrievalError::FormatMismatch {
            reason: "3 rows vs 2 entries".to_string(),
        });
        assert!(hard.is_hard_failure());
        assert!(hard.matches.is_empty());
        assert!(hard.error.unwrap().contains("3 rows vs 2 entries"));
    }

    #[test]
    fn test_response_parses_back() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"matches":[]}"#).unwrap();
        assert_eq!(parsed, QueryResponse::success(Vec::new()));
    }

    #[test]
    fn test_prompt_context_layout() {
        let response = QueryResponse::success(vec![
            result("sad", "I feel down", 0.1234, &["I'm sorry.", "Want to talk?"]),
            result("greeting", "hello", 1.5, &["Hi"]),
        ]);
        let expected = "Context Tag: [sad]\n\
             Similar Previous User Input: \"I feel down\" (Distance: 0.12)\n\
             Verified Therapeutic Responses: \"I'm sorry. | Want to talk?\"\n\
             \n\
             Context Tag: [greeting]\n\
             Similar Previous User Input: \"hello\" (Distance: 1.50)\n\
             Verified Therapeutic Responses: \"Hi\"";
        assert_eq!(response.to_prompt_context(), expected);
        assert_eq!(QueryResponse::index_missing().to_prompt_context(), "");
    }
}
