use crate::config::types::{JudgeError, Result};
use serde::{Deserialize, Serialize};

/// Declarative test query, closed over the four known shapes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestQuery {
    /// Exact test id, no normalization
    Id(String),
    /// Shell glob (`*`, `?`, bracket classes)
    Wildcard {
        pattern: String,
        case_insensitive: bool,
    },
    /// Regular expression anchored at both ends
    Regex {
        pattern: String,
        case_insensitive: bool,
    },
    /// Logical OR; empty matches nothing
    AnyOf(Vec<TestQuery>),
}

/// Query flag carried on the wire
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryFlag {
    #[serde(rename = "IGNORE_CASE")]
    IgnoreCase,
}

/// Pattern payload of a wildcard or regex query
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternQuery {
    pub value: String,
    #[serde(default)]
    pub flags: Vec<QueryFlag>,
}

impl PatternQuery {
    fn ignore_case(&self) -> bool {
        self.flags.contains(&QueryFlag::IgnoreCase)
    }
}

/// Wire form of a single query node: exactly one field must be set
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestQueryMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<PatternQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<PatternQuery>,
}

impl TryFrom<&TestQueryMessage> for TestQuery {
    type Error = JudgeError;

    fn try_from(message: &TestQueryMessage) -> Result<Self> {
        match (&message.id, &message.wildcard, &message.regex) {
            (Some(id), None, None) => Ok(TestQuery::Id(id.clone())),
            (None, Some(wildcard), None) => Ok(TestQuery::Wildcard {
                pattern: wildcard.value.clone(),
                case_insensitive: wildcard.ignore_case(),
            }),
            (None, None, Some(regex)) => Ok(TestQuery::Regex {
                pattern: regex.value.clone(),
                case_insensitive: regex.ignore_case(),
            }),
            (None, None, None) => Err(JudgeError::InvalidTestQuery(
                "query node has none of id, wildcard, regex".to_string(),
            )),
            _ => Err(JudgeError::InvalidTestQuery(
                "query node sets more than one of id, wildcard, regex".to_string(),
            )),
        }
    }
}

impl TestQuery {
    /// Build the OR of a repeated query field
    pub fn from_messages(messages: &[TestQueryMessage]) -> Result<Self> {
        messages
            .iter()
            .map(TestQuery::try_from)
            .collect::<Result<Vec<_>>>()
            .map(TestQuery::AnyOf)
    }

    pub fn id(id: impl Into<String>) -> Self {
        TestQuery::Id(id.into())
    }

    pub fn wildcard(pattern: impl Into<String>, case_insensitive: bool) -> Self {
        TestQuery::Wildcard {
            pattern: pattern.into(),
            case_insensitive,
        }
    }

    pub fn regex(pattern: impl Into<String>, case_insensitive: bool) -> Self {
        TestQuery::Regex {
            pattern: pattern.into(),
            case_insensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shapes() {
        let messages: Vec<TestQueryMessage> = serde_json::from_value(serde_json::json!([
            {"id": "edge1"},
            {"wildcard": {"value": "sample*"}},
            {"regex": {"value": "t[0-9]+", "flags": ["IGNORE_CASE"]}}
        ]))
        .unwrap();

        let query = TestQuery::from_messages(&messages).unwrap();
        assert_eq!(
            query,
            TestQuery::AnyOf(vec![
                TestQuery::id("edge1"),
                TestQuery::wildcard("sample*", false),
                TestQuery::regex("t[0-9]+", true),
            ])
        );
    }

    #[test]
    fn test_empty_node_is_invalid() {
        let err = TestQuery::try_from(&TestQueryMessage::default()).unwrap_err();
        assert!(matches!(err, JudgeError::InvalidTestQuery(_)));
    }

    #[test]
    fn test_ambiguous_node_is_invalid() {
        let message = TestQueryMessage {
            id: Some("a".to_string()),
            regex: Some(PatternQuery {
                value: "a".to_string(),
                flags: vec![],
            }),
            ..Default::default()
        };
        assert!(TestQuery::try_from(&message).is_err());
    }

    #[test]
    fn test_one_bad_node_fails_whole_list() {
        let messages = vec![
            TestQueryMessage {
                id: Some("a".to_string()),
                ..Default::default()
            },
            TestQueryMessage::default(),
        ];
        assert!(TestQuery::from_messages(&messages).is_err());
    }
}
