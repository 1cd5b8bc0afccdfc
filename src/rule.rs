use serde::{Deserialize, Serialize};

use crate::segment::{RuleType, SegmentCondition, SegmentRule};

/// Condition operators understood by the evaluation engine. They are carried into the document
/// untouched; their semantics live in the engine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanInclusive,
    LessThan,
    LessThanInclusive,
    Contains,
    NotContains,
    In,
    Regex,
    PercentageSplit,
    Modulo,
    IsSet,
    IsNotSet,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SegmentRuleModel {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub rules: Vec<SegmentRuleModel>,
    pub conditions: Vec<SegmentConditionModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SegmentConditionModel {
    pub operator: Operator,
    pub value: Option<String>,
    #[serde(rename = "property_")]
    pub property: Option<String>,
}

impl From<&SegmentCondition> for SegmentConditionModel {
    fn from(condition: &SegmentCondition) -> Self {
        SegmentConditionModel {
            operator: condition.operator,
            value: condition.value.clone(),
            property: condition.property.clone(),
        }
    }
}

/// Maps a segment rule and everything below it into the engine's rule tree, keeping the order of
/// child rules and conditions.
pub fn map_segment_rule(rule: &SegmentRule) -> SegmentRuleModel {
    SegmentRuleModel {
        rule_type: rule.rule_type,
        rules: rule.rules.iter().map(map_segment_rule).collect(),
        conditions: rule
            .conditions
            .iter()
            .map(SegmentConditionModel::from)
            .collect(),
    }
}
