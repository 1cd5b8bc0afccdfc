use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::document::{
    map_feature_state, EnvironmentDocument, OrganisationModel, ProjectModel, SegmentModel,
};
use crate::environment::{Environment, EnvironmentId, Organisation, Project};
use crate::feature::{FeatureState, FeatureStateId, MultivariateFeatureStateValue};
use crate::feature_value::FeatureValueType;
use crate::integration::{
    map_integration, map_webhook_config, IntegrationConfig, IntegrationKind, WebhookConfig,
};
use crate::precedence::prioritised_feature_states;
use crate::rule::map_segment_rule;
use crate::segment::{Segment, SegmentId};
use crate::store::Store;

/// The project ceilings an environment document is checked against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeLimit {
    Segments,
    Features,
    SegmentOverrides,
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeLimit::Segments => "segments",
            SizeLimit::Features => "features",
            SizeLimit::SegmentOverrides => "segment overrides",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MappingError {
    /// The environment holds more than its project allows. Needs the tenant to shrink their
    /// configuration, retrying will not help.
    #[error("environment {environment_id} exceeds its {limit} limit ({count} > {allowed})")]
    DocumentTooLarge {
        environment_id: EnvironmentId,
        limit: SizeLimit,
        count: usize,
        allowed: usize,
    },
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },
    #[error("feature state {feature_state_id} holds a {actual:?} value but its feature is {expected:?}")]
    ValueTypeMismatch {
        feature_state_id: FeatureStateId,
        expected: FeatureValueType,
        actual: FeatureValueType,
    },
}

/// Builds the document of an environment as of `now`.
///
/// All reads happen up front. Once the size limits are checked the document is assembled from
/// memory without touching the store again. The limits are counted on the resolved states, so
/// non-live or superseded states never count against them.
pub fn build_environment_document(
    store: &dyn Store,
    environment_id: EnvironmentId,
    now: DateTime<Utc>,
) -> Result<EnvironmentDocument, MappingError> {
    let data = EnvironmentData::read(store, environment_id, now)?;
    data.validate()?;
    let document = data.into_document();
    info!(
        "built document for environment {} with {} segments and {} feature states",
        environment_id,
        document.project.segments.len(),
        document.feature_states.len()
    );
    Ok(document)
}

/// Rejects the first state whose value does not have the type its feature declares.
pub(crate) fn ensure_value_types<'a, I>(feature_states: I) -> Result<(), MappingError>
where
    I: IntoIterator<Item = &'a FeatureState>,
{
    match feature_states
        .into_iter()
        .find(|fs| !fs.has_consistent_value_type())
    {
        Some(fs) => Err(MappingError::ValueTypeMismatch {
            feature_state_id: fs.id,
            expected: fs.feature.value_type,
            actual: fs.value.value_type(),
        }),
        None => Ok(()),
    }
}

// Everything a document is assembled from, with precedence already resolved.
struct EnvironmentData {
    environment: Environment,
    project: Project,
    organisation: Organisation,
    segments: Vec<Segment>,
    feature_states: Vec<FeatureState>,
    segment_feature_states: HashMap<SegmentId, Vec<FeatureState>>,
    multivariate_values: HashMap<FeatureStateId, Vec<MultivariateFeatureStateValue>>,
    integrations: HashMap<IntegrationKind, IntegrationConfig>,
    webhook: Option<WebhookConfig>,
}

impl EnvironmentData {
    fn read(
        store: &dyn Store,
        environment_id: EnvironmentId,
        now: DateTime<Utc>,
    ) -> Result<Self, MappingError> {
        let environment = store
            .environment(environment_id)
            .ok_or(MappingError::NotFound {
                entity: "environment",
                id: environment_id,
            })?;
        let project = store
            .project(environment.project_id)
            .ok_or(MappingError::NotFound {
                entity: "project",
                id: environment.project_id,
            })?;
        let organisation =
            store
                .organisation(project.organisation_id)
                .ok_or(MappingError::NotFound {
                    entity: "organisation",
                    id: project.organisation_id,
                })?;

        let segments = store.project_segments(project.id);
        let feature_states = prioritised_feature_states(
            store
                .environment_feature_states(environment_id)
                .into_iter()
                .filter(FeatureState::is_environment_default),
            now,
        );
        let segment_feature_states: HashMap<SegmentId, Vec<FeatureState>> = segments
            .iter()
            .map(|segment| {
                let overrides = store.segment_feature_states(segment.id, environment_id);
                (segment.id, prioritised_feature_states(overrides, now))
            })
            .collect();

        let feature_state_ids = feature_states
            .iter()
            .chain(segment_feature_states.values().flatten())
            .map(|fs| fs.id)
            .collect_vec();
        let multivariate_values = store
            .multivariate_feature_state_values(&feature_state_ids)
            .into_iter()
            .into_group_map_by(|value| value.feature_state_id);

        let integrations = IntegrationKind::ALL
            .iter()
            .filter_map(|kind| {
                store
                    .integration_config(environment_id, *kind)
                    .map(|config| (*kind, config))
            })
            .collect();
        let webhook = store.webhook_config(environment_id);

        Ok(EnvironmentData {
            environment,
            project,
            organisation,
            segments,
            feature_states,
            segment_feature_states,
            multivariate_values,
            integrations,
            webhook,
        })
    }

    fn validate(&self) -> Result<(), MappingError> {
        let override_count: usize = self.segment_feature_states.values().map(Vec::len).sum();
        let checks = [
            (
                SizeLimit::Segments,
                self.segments.len(),
                self.project.max_segments_allowed,
            ),
            (
                SizeLimit::Features,
                self.feature_states.len() + override_count,
                self.project.max_features_allowed,
            ),
            (
                SizeLimit::SegmentOverrides,
                override_count,
                self.project.max_segments_overrides_allowed,
            ),
        ];
        if let Some((limit, count, allowed)) = checks
            .into_iter()
            .find(|(_, count, allowed)| count > allowed)
        {
            warn!(
                "environment {} exceeds its {} limit ({} > {})",
                self.environment.id, limit, count, allowed
            );
            return Err(MappingError::DocumentTooLarge {
                environment_id: self.environment.id,
                limit,
                count,
                allowed,
            });
        }

        ensure_value_types(
            self.feature_states
                .iter()
                .chain(self.segment_feature_states.values().flatten()),
        )
    }

    fn into_document(self) -> EnvironmentDocument {
        let organisation = OrganisationModel {
            id: self.organisation.id,
            name: self.organisation.name.clone(),
            feature_analytics: self.organisation.feature_analytics,
            stop_serving_flags: self.organisation.stop_serving_flags,
            persist_trait_data: self.organisation.persist_trait_data,
        };

        let segments = self
            .segments
            .iter()
            .map(|segment| {
                let overrides = self
                    .segment_feature_states
                    .get(&segment.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                debug!(
                    "segment {} carries {} overrides",
                    segment.id,
                    overrides.len()
                );
                SegmentModel {
                    id: segment.id,
                    name: segment.name.clone(),
                    rules: segment.rules.iter().map(map_segment_rule).collect(),
                    feature_states: overrides
                        .iter()
                        .map(|fs| map_feature_state(fs, self.values_of(fs)))
                        .collect(),
                }
            })
            .collect();

        let project = ProjectModel {
            id: self.project.id,
            name: self.project.name.clone(),
            hide_disabled_flags: self.project.hide_disabled_flags,
            enable_realtime_updates: self.project.enable_realtime_updates,
            server_key_only_feature_ids: self
                .feature_states
                .iter()
                .filter(|fs| fs.feature.is_server_key_only)
                .map(|fs| fs.feature.id)
                .collect(),
            organisation,
            segments,
        };

        let feature_states = self
            .feature_states
            .iter()
            .map(|fs| map_feature_state(fs, self.values_of(fs)))
            .collect();

        let integration = |kind: IntegrationKind| map_integration(self.integrations.get(&kind));

        EnvironmentDocument {
            id: self.environment.id,
            api_key: self.environment.api_key.clone(),
            name: self.environment.name.clone(),
            allow_client_traits: self.environment.allow_client_traits,
            updated_at: self.environment.updated_at,
            use_identity_composite_key_for_hashing: self
                .environment
                .use_identity_composite_key_for_hashing,
            hide_sensitive_data: self.environment.hide_sensitive_data,
            hide_disabled_flags: self.environment.hide_disabled_flags,

            project,
            feature_states,

            amplitude_config: integration(IntegrationKind::Amplitude),
            dynatrace_config: integration(IntegrationKind::Dynatrace),
            heap_config: integration(IntegrationKind::Heap),
            mixpanel_config: integration(IntegrationKind::Mixpanel),
            rudderstack_config: integration(IntegrationKind::Rudderstack),
            segment_config: integration(IntegrationKind::Segment),
            webhook_config: map_webhook_config(self.webhook.as_ref()),
        }
    }

    fn values_of(&self, feature_state: &FeatureState) -> &[MultivariateFeatureStateValue] {
        self.multivariate_values
            .get(&feature_state.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
