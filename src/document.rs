use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::environment::{
    Environment, EnvironmentApiKey, EnvironmentApiKeyId, EnvironmentId, OrganisationId, ProjectId,
};
use crate::feature::{
    FeatureId, FeatureState, FeatureStateId, MultivariateFeatureOptionId,
    MultivariateFeatureStateValue, MultivariateFeatureStateValueId, Priority,
};
use crate::feature_value::{FeatureStateValue, FeatureValueType};
use crate::integration::{IntegrationKind, IntegrationModel, WebhookModel};
use crate::rule::SegmentRuleModel;
use crate::segment::SegmentId;

/// The self-contained snapshot of all flag configuration of one environment, as consumed by the
/// evaluation engine.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnvironmentDocument {
    pub id: EnvironmentId,
    pub api_key: String,
    pub name: String,
    pub allow_client_traits: bool,
    pub updated_at: DateTime<Utc>,
    pub use_identity_composite_key_for_hashing: bool,
    pub hide_sensitive_data: bool,
    pub hide_disabled_flags: Option<bool>,

    pub project: ProjectModel,
    pub feature_states: Vec<FeatureStateModel>,

    pub amplitude_config: Option<IntegrationModel>,
    pub dynatrace_config: Option<IntegrationModel>,
    pub heap_config: Option<IntegrationModel>,
    pub mixpanel_config: Option<IntegrationModel>,
    pub rudderstack_config: Option<IntegrationModel>,
    pub segment_config: Option<IntegrationModel>,
    pub webhook_config: Option<WebhookModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrganisationModel {
    pub id: OrganisationId,
    pub name: String,
    pub feature_analytics: bool,
    pub stop_serving_flags: bool,
    pub persist_trait_data: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProjectModel {
    pub id: ProjectId,
    pub name: String,
    pub hide_disabled_flags: bool,
    pub enable_realtime_updates: bool,
    pub server_key_only_feature_ids: Vec<FeatureId>,
    pub organisation: OrganisationModel,
    pub segments: Vec<SegmentModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SegmentModel {
    pub id: SegmentId,
    pub name: String,
    pub rules: Vec<SegmentRuleModel>,
    pub feature_states: Vec<FeatureStateModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeatureModel {
    pub id: FeatureId,
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: FeatureValueType,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeatureSegmentModel {
    pub priority: Priority,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MultivariateFeatureOptionModel {
    pub id: MultivariateFeatureOptionId,
    pub value: FeatureStateValue,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MultivariateFeatureStateValueModel {
    pub id: MultivariateFeatureStateValueId,
    pub mv_fs_value_uuid: Uuid,
    pub percentage_allocation: f32,
    pub multivariate_feature_option: MultivariateFeatureOptionModel,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeatureStateModel {
    pub feature: FeatureModel,
    pub enabled: bool,
    pub feature_state_id: FeatureStateId,
    pub featurestate_uuid: Uuid,
    pub feature_state_value: FeatureStateValue,
    pub feature_segment: Option<FeatureSegmentModel>,
    pub multivariate_feature_state_values: Vec<MultivariateFeatureStateValueModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnvironmentApiKeyModel {
    pub id: EnvironmentApiKeyId,
    pub key: String,
    pub name: String,
    pub client_api_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl EnvironmentDocument {
    pub fn integration(&self, kind: IntegrationKind) -> Option<&IntegrationModel> {
        match kind {
            IntegrationKind::Amplitude => self.amplitude_config.as_ref(),
            IntegrationKind::Dynatrace => self.dynatrace_config.as_ref(),
            IntegrationKind::Heap => self.heap_config.as_ref(),
            IntegrationKind::Mixpanel => self.mixpanel_config.as_ref(),
            IntegrationKind::Rudderstack => self.rudderstack_config.as_ref(),
            IntegrationKind::Segment => self.segment_config.as_ref(),
        }
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&SegmentModel> {
        self.project.segments.iter().find(|s| s.id == segment_id)
    }

    /// The environment default state of the feature called `name`.
    pub fn feature_state(&self, name: &str) -> Option<&FeatureStateModel> {
        self.feature_states.iter().find(|fs| fs.feature.name == name)
    }
}

impl SegmentModel {
    pub fn feature_state(&self, name: &str) -> Option<&FeatureStateModel> {
        self.feature_states.iter().find(|fs| fs.feature.name == name)
    }
}

/// Maps a feature state together with the multivariate values that belong to it.
pub fn map_feature_state(
    feature_state: &FeatureState,
    multivariate_values: &[MultivariateFeatureStateValue],
) -> FeatureStateModel {
    FeatureStateModel {
        feature: FeatureModel {
            id: feature_state.feature.id,
            name: feature_state.feature.name.clone(),
            value_type: feature_state.feature.value_type,
        },
        enabled: feature_state.enabled,
        feature_state_id: feature_state.id,
        featurestate_uuid: feature_state.uuid,
        feature_state_value: feature_state.value.clone(),
        feature_segment: feature_state
            .feature_segment
            .as_ref()
            .map(|feature_segment| FeatureSegmentModel {
                priority: feature_segment.priority,
            }),
        multivariate_feature_state_values: multivariate_values
            .iter()
            .map(map_multivariate_value)
            .collect(),
    }
}

fn map_multivariate_value(
    value: &MultivariateFeatureStateValue,
) -> MultivariateFeatureStateValueModel {
    MultivariateFeatureStateValueModel {
        id: value.id,
        mv_fs_value_uuid: value.uuid,
        percentage_allocation: value.percentage_allocation,
        multivariate_feature_option: MultivariateFeatureOptionModel {
            id: value.multivariate_feature_option.id,
            value: value.multivariate_feature_option.value.clone(),
        },
    }
}

/// Maps a server-side key, pairing it with the client key of the environment it grants access to.
pub fn map_environment_api_key(
    api_key: &EnvironmentApiKey,
    environment: &Environment,
) -> EnvironmentApiKeyModel {
    EnvironmentApiKeyModel {
        id: api_key.id,
        key: api_key.key.clone(),
        name: api_key.name.clone(),
        client_api_key: environment.api_key.clone(),
        created_at: api_key.created_at,
        expires_at: api_key.expires_at,
        active: api_key.active,
    }
}
