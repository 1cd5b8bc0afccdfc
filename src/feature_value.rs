use log::warn;
use serde::{Deserialize, Serialize};

/// The type a [crate::Feature] declares for the values of its feature states.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureValueType {
    #[default]
    Boolean,
    Text,
    Numeric,
}

/// The configured value of a feature state, or the fixed value of a multivariate option.
///
/// Serializes as a bare JSON scalar so that the evaluation engine sees `true`, `"blue"` or `42`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FeatureStateValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<bool> for FeatureStateValue {
    fn from(b: bool) -> FeatureStateValue {
        FeatureStateValue::Bool(b)
    }
}

impl From<String> for FeatureStateValue {
    fn from(s: String) -> FeatureStateValue {
        FeatureStateValue::Text(s)
    }
}

impl From<&str> for FeatureStateValue {
    fn from(s: &str) -> FeatureStateValue {
        FeatureStateValue::Text(s.to_owned())
    }
}

impl From<i64> for FeatureStateValue {
    fn from(i: i64) -> FeatureStateValue {
        FeatureStateValue::Integer(i)
    }
}

impl FeatureStateValue {
    pub fn value_type(&self) -> FeatureValueType {
        match self {
            FeatureStateValue::Bool(_) => FeatureValueType::Boolean,
            FeatureStateValue::Integer(_) => FeatureValueType::Numeric,
            FeatureStateValue::Text(_) => FeatureValueType::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureStateValue::Bool(b) => Some(*b),
            _ => {
                warn!("feature state value is not bool but {:?}", self);
                None
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureStateValue::Text(s) => Some(s),
            _ => {
                warn!("feature state value is not text but {:?}", self);
                None
            }
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FeatureStateValue::Integer(i) => Some(*i),
            _ => {
                warn!("feature state value is not numeric but {:?}", self);
                None
            }
        }
    }
}
