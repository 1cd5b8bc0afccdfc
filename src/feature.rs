use serde::Deserialize;
use uuid::Uuid;

use crate::environment::EnvironmentId;
use crate::feature_value::{FeatureStateValue, FeatureValueType};
use crate::identity::IdentityId;
use crate::segment::SegmentId;
use crate::version::{EnvironmentFeatureVersion, VersionLink};

pub type FeatureId = i64;
pub type FeatureStateId = i64;
pub type FeatureSegmentId = i64;
pub type MultivariateFeatureOptionId = i64;
pub type MultivariateFeatureStateValueId = i64;

/// Segment override priority. Lower numbers take precedence, 0 is the highest.
pub type Priority = u32;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: FeatureValueType,
    #[serde(default)]
    pub is_server_key_only: bool,
}

/// Binds a feature state to a segment within one environment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FeatureSegment {
    pub id: FeatureSegmentId,
    pub segment_id: SegmentId,
    pub environment_id: EnvironmentId,
    pub priority: Priority,
}

/// The binding context of a [FeatureState].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Identity(IdentityId),
    Segment { priority: Priority },
    Environment,
}

/// One configured value of a [Feature] in one scope of one environment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FeatureState {
    pub id: FeatureStateId,
    pub uuid: Uuid,
    pub feature: Feature,
    pub environment_id: EnvironmentId,
    pub enabled: bool,
    pub value: FeatureStateValue,

    #[serde(default)]
    pub feature_segment: Option<FeatureSegment>,
    #[serde(default)]
    pub identity_id: Option<IdentityId>,
    #[serde(default)]
    pub version: Option<VersionLink>,
}

impl FeatureState {
    pub fn scope(&self) -> Scope {
        match (&self.identity_id, &self.feature_segment) {
            (Some(identity_id), _) => Scope::Identity(*identity_id),
            (None, Some(feature_segment)) => Scope::Segment {
                priority: feature_segment.priority,
            },
            (None, None) => Scope::Environment,
        }
    }

    /// True for the environment-wide state of a feature, bound to neither a segment nor an
    /// identity.
    pub fn is_environment_default(&self) -> bool {
        self.scope() == Scope::Environment
    }

    /// Legacy states without a version are always live.
    pub fn is_live_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.version {
            None => true,
            Some(version) => version.is_live_at(now),
        }
    }

    pub fn has_consistent_value_type(&self) -> bool {
        self.value.value_type() == self.feature.value_type
    }

    /// Copies this state into `version`, keeping its value, enabled flag and scope. A segment
    /// link follows the state into `environment_id`.
    pub fn clone_for_version(
        &self,
        id: FeatureStateId,
        environment_id: EnvironmentId,
        version: &EnvironmentFeatureVersion,
    ) -> FeatureState {
        let feature_segment = self.feature_segment.clone().map(|link| FeatureSegment {
            environment_id,
            ..link
        });
        FeatureState {
            id,
            uuid: Uuid::new_v4(),
            environment_id,
            feature_segment,
            version: Some(VersionLink::from(version)),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MultivariateFeatureOption {
    pub id: MultivariateFeatureOptionId,
    pub value: FeatureStateValue,
}

/// A share of the traffic for a multivariate feature state that is served an option's value.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MultivariateFeatureStateValue {
    pub id: MultivariateFeatureStateValueId,
    pub uuid: Uuid,
    pub feature_state_id: FeatureStateId,
    pub multivariate_feature_option: MultivariateFeatureOption,
    pub percentage_allocation: f32,
}

impl MultivariateFeatureStateValue {
    pub fn clone_for_feature_state(
        &self,
        id: MultivariateFeatureStateValueId,
        feature_state_id: FeatureStateId,
    ) -> MultivariateFeatureStateValue {
        MultivariateFeatureStateValue {
            id,
            uuid: Uuid::new_v4(),
            feature_state_id,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_common::{feature, segment_override};
    use chrono::{TimeZone, Utc};
    use spectral::prelude::*;

    #[test]
    fn parses_feature_state() {
        let json = r#"{
            "id": 7,
            "uuid": "0f1b5e2c-7a4e-4e8e-9a5e-2b0a3c9d1e11",
            "feature": {"id": 3, "name": "dark_mode", "type": "BOOLEAN", "is_server_key_only": true},
            "environment_id": 1,
            "enabled": true,
            "value": false,
            "feature_segment": {"id": 9, "segment_id": 4, "environment_id": 1, "priority": 2}
        }"#;

        let state: FeatureState = serde_json::from_str(json).unwrap();
        assert_that!(state.scope()).is_equal_to(Scope::Segment { priority: 2 });
        assert_that!(state.feature.is_server_key_only).is_true();
        assert_that!(state.version).is_none();
        assert_that!(state.has_consistent_value_type()).is_true();
    }

    #[test]
    fn identity_scope_wins_over_segment_link() {
        let mut state = segment_override(1, feature(1, "dark_mode"), 4, 0, true);
        state.identity_id = Some(99);
        assert_that!(state.scope()).is_equal_to(Scope::Identity(99));
        assert_that!(state.is_environment_default()).is_false();
    }

    #[test]
    fn clone_for_version_keeps_value_and_scope() {
        let original = segment_override(1, feature(1, "dark_mode"), 4, 3, true);
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let version = EnvironmentFeatureVersion::new(2, created_at);

        let clone = original.clone_for_version(10, 2, &version);

        assert_that!(clone.id).is_equal_to(10);
        assert_that!(clone.environment_id).is_equal_to(2);
        assert_ne!(clone.uuid, original.uuid);
        assert_that!(clone.enabled).is_equal_to(original.enabled);
        assert_that!(clone.value).is_equal_to(original.value.clone());
        assert_that!(clone.scope()).is_equal_to(original.scope());
        assert_that!(clone.version.map(|v| v.uuid)).is_equal_to(Some(version.uuid));
    }

    #[test]
    fn clone_for_version_moves_segment_link_to_target_environment() {
        let original = segment_override(1, feature(1, "dark_mode"), 4, 3, true);
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let version = EnvironmentFeatureVersion::new(2, created_at);

        let clone = original.clone_for_version(10, 2, &version);
        let link = clone.feature_segment.unwrap();
        let source = original.feature_segment.unwrap();

        assert_that!(link.environment_id).is_equal_to(2);
        assert_that!(link.segment_id).is_equal_to(source.segment_id);
        assert_that!(link.priority).is_equal_to(source.priority);
    }
}
