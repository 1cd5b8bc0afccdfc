use serde::{Deserialize, Serialize};

use crate::environment::ProjectId;
use crate::rule::Operator;

pub type SegmentId = i64;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    pub project_id: ProjectId,

    #[serde(default)]
    pub rules: Vec<SegmentRule>,
}

/// How the children of a [SegmentRule] combine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    All,
    Any,
    None,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SegmentRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub conditions: Vec<SegmentCondition>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SegmentCondition {
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
}

impl SegmentRule {
    #[cfg(test)]
    pub(crate) fn new(
        rule_type: RuleType,
        rules: Vec<SegmentRule>,
        conditions: Vec<SegmentCondition>,
    ) -> Self {
        Self {
            rule_type,
            rules,
            conditions,
        }
    }
}

impl SegmentCondition {
    #[cfg(test)]
    pub(crate) fn new(operator: Operator, property: &str, value: &str) -> Self {
        Self {
            operator,
            value: Some(value.to_string()),
            property: Some(property.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_parse() {
        let segment: Segment = serde_json::from_str(
            r#"{
                "id": 4,
                "name": "beta_users",
                "project_id": 1,
                "rules": [{
                    "type": "ALL",
                    "rules": [{
                        "type": "ANY",
                        "conditions": [
                            {"operator": "EQUAL", "property": "plan", "value": "beta"},
                            {"operator": "IS_SET", "property": "early_access"}
                        ]
                    }]
                }]
            }"#,
        )
        .expect("should parse");

        assert_eq!(
            segment,
            Segment {
                id: 4,
                name: "beta_users".to_string(),
                project_id: 1,
                rules: vec![SegmentRule::new(
                    RuleType::All,
                    vec![SegmentRule::new(
                        RuleType::Any,
                        vec![],
                        vec![
                            SegmentCondition::new(Operator::Equal, "plan", "beta"),
                            SegmentCondition {
                                operator: Operator::IsSet,
                                value: None,
                                property: Some("early_access".to_string()),
                            },
                        ],
                    )],
                    vec![],
                )],
            }
        );
    }
}
