#![cfg(test)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use maplit::hashmap;
use uuid::Uuid;

use crate::environment::{
    Environment, EnvironmentId, Organisation, OrganisationId, Project, ProjectId,
};
use crate::feature::{
    Feature, FeatureId, FeatureSegment, FeatureState, FeatureStateId, MultivariateFeatureOption,
    MultivariateFeatureStateValue, Priority,
};
use crate::feature_value::{FeatureStateValue, FeatureValueType};
use crate::identity::{Identity, IdentityId, Trait, TraitValue};
use crate::integration::{IntegrationConfig, IntegrationKind, WebhookConfig};
use crate::segment::{Segment, SegmentId};
use crate::store::Store;
use crate::version::{
    EnvironmentFeatureVersion, RebuildRequest, RebuildScheduler, VersionLink, VersionRepository,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn feature(id: FeatureId, name: &str) -> Feature {
    Feature {
        id,
        name: name.to_string(),
        value_type: FeatureValueType::Boolean,
        is_server_key_only: false,
    }
}

pub fn environment(id: EnvironmentId, project_id: ProjectId) -> Environment {
    Environment {
        id,
        name: format!("environment-{}", id),
        project_id,
        api_key: format!("client-key-{}", id),
        allow_client_traits: true,
        updated_at: now(),
        use_identity_composite_key_for_hashing: false,
        hide_sensitive_data: false,
        hide_disabled_flags: None,
    }
}

pub fn environment_default(id: FeatureStateId, feature: Feature, enabled: bool) -> FeatureState {
    FeatureState {
        id,
        uuid: Uuid::new_v4(),
        feature,
        environment_id: 1,
        enabled,
        value: FeatureStateValue::Bool(enabled),
        feature_segment: None,
        identity_id: None,
        version: None,
    }
}

pub fn segment_override(
    id: FeatureStateId,
    feature: Feature,
    segment_id: SegmentId,
    priority: Priority,
    enabled: bool,
) -> FeatureState {
    FeatureState {
        feature_segment: Some(FeatureSegment {
            id: segment_id * 1000 + feature.id,
            segment_id,
            environment_id: 1,
            priority,
        }),
        ..environment_default(id, feature, enabled)
    }
}

pub fn identity_override(
    id: FeatureStateId,
    feature: Feature,
    identity_id: IdentityId,
    enabled: bool,
) -> FeatureState {
    FeatureState {
        identity_id: Some(identity_id),
        ..environment_default(id, feature, enabled)
    }
}

pub fn draft() -> VersionLink {
    VersionLink {
        uuid: Uuid::new_v4(),
        published: false,
        live_from: None,
    }
}

pub fn published(live_from: DateTime<Utc>) -> VersionLink {
    VersionLink {
        uuid: Uuid::new_v4(),
        published: true,
        live_from: Some(live_from),
    }
}

pub fn mv_value(
    id: i64,
    feature_state_id: FeatureStateId,
    value: FeatureStateValue,
    percentage_allocation: f32,
) -> MultivariateFeatureStateValue {
    MultivariateFeatureStateValue {
        id,
        uuid: Uuid::new_v4(),
        feature_state_id,
        multivariate_feature_option: MultivariateFeatureOption { id: id * 10, value },
        percentage_allocation,
    }
}

/// An in-memory store holding one organisation (1) and one project (1).
pub struct TestStore {
    organisations: HashMap<OrganisationId, Organisation>,
    projects: HashMap<ProjectId, Project>,
    environments: HashMap<EnvironmentId, Environment>,
    segments: Vec<Segment>,
    feature_states: Vec<FeatureState>,
    multivariate_values: Vec<MultivariateFeatureStateValue>,
    integrations: HashMap<(EnvironmentId, IntegrationKind), IntegrationConfig>,
    webhooks: HashMap<EnvironmentId, WebhookConfig>,
    identities: HashMap<IdentityId, Identity>,
    traits: HashMap<IdentityId, Vec<Trait>>,
    reads: Cell<usize>,
}

impl TestStore {
    pub fn with_environment(environment_id: EnvironmentId) -> Self {
        Self {
            organisations: hashmap! {
                1 => Organisation {
                    id: 1,
                    name: "Acme".to_string(),
                    feature_analytics: false,
                    stop_serving_flags: false,
                    persist_trait_data: true,
                },
            },
            projects: hashmap! {
                1 => Project {
                    id: 1,
                    name: "web".to_string(),
                    organisation_id: 1,
                    hide_disabled_flags: false,
                    enable_realtime_updates: false,
                    max_segments_allowed: 100,
                    max_features_allowed: 400,
                    max_segments_overrides_allowed: 100,
                },
            },
            environments: hashmap! {
                environment_id => environment(environment_id, 1),
            },
            segments: vec![],
            feature_states: vec![],
            multivariate_values: vec![],
            integrations: HashMap::new(),
            webhooks: HashMap::new(),
            identities: HashMap::new(),
            traits: HashMap::new(),
            reads: Cell::new(0),
        }
    }

    pub fn project_mut(&mut self) -> &mut Project {
        self.projects.get_mut(&1).unwrap()
    }

    pub fn add_environment(&mut self, environment: Environment) {
        self.environments.insert(environment.id, environment);
    }

    pub fn add_segment(&mut self, id: SegmentId, name: &str) {
        self.segments.push(Segment {
            id,
            name: name.to_string(),
            project_id: 1,
            rules: vec![],
        });
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        self.segments.iter_mut().find(|s| s.id == id).unwrap()
    }

    pub fn add_feature_state(&mut self, feature_state: FeatureState) {
        self.feature_states.push(feature_state);
    }

    pub fn add_multivariate_value(&mut self, value: MultivariateFeatureStateValue) {
        self.multivariate_values.push(value);
    }

    pub fn set_integration(
        &mut self,
        environment_id: EnvironmentId,
        kind: IntegrationKind,
        config: IntegrationConfig,
    ) {
        self.integrations.insert((environment_id, kind), config);
    }

    pub fn set_webhook(&mut self, environment_id: EnvironmentId, config: WebhookConfig) {
        self.webhooks.insert(environment_id, config);
    }

    pub fn add_identity(&mut self, identity: Identity) {
        self.identities.insert(identity.id, identity);
    }

    pub fn add_trait(&mut self, identity_id: IdentityId, key: &str, value: TraitValue) {
        self.traits.entry(identity_id).or_default().push(Trait {
            trait_key: key.to_string(),
            trait_value: value,
        });
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn read(&self) {
        self.reads.set(self.reads.get() + 1);
    }
}

impl Store for TestStore {
    fn environment(&self, environment_id: EnvironmentId) -> Option<Environment> {
        self.read();
        self.environments.get(&environment_id).cloned()
    }

    fn project(&self, project_id: ProjectId) -> Option<Project> {
        self.read();
        self.projects.get(&project_id).cloned()
    }

    fn organisation(&self, organisation_id: OrganisationId) -> Option<Organisation> {
        self.read();
        self.organisations.get(&organisation_id).cloned()
    }

    fn project_segments(&self, project_id: ProjectId) -> Vec<Segment> {
        self.read();
        self.segments
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect()
    }

    // Like the real store this hands back identity overrides as well.
    fn environment_feature_states(&self, environment_id: EnvironmentId) -> Vec<FeatureState> {
        self.read();
        self.feature_states
            .iter()
            .filter(|fs| fs.environment_id == environment_id && fs.feature_segment.is_none())
            .cloned()
            .collect()
    }

    fn segment_feature_states(
        &self,
        segment_id: SegmentId,
        environment_id: EnvironmentId,
    ) -> Vec<FeatureState> {
        self.read();
        self.feature_states
            .iter()
            .filter(|fs| {
                fs.feature_segment.as_ref().map_or(false, |feature_segment| {
                    feature_segment.segment_id == segment_id
                        && feature_segment.environment_id == environment_id
                })
            })
            .cloned()
            .collect()
    }

    fn multivariate_feature_state_values(
        &self,
        feature_state_ids: &[FeatureStateId],
    ) -> Vec<MultivariateFeatureStateValue> {
        self.read();
        self.multivariate_values
            .iter()
            .filter(|v| feature_state_ids.contains(&v.feature_state_id))
            .cloned()
            .collect()
    }

    fn integration_config(
        &self,
        environment_id: EnvironmentId,
        kind: IntegrationKind,
    ) -> Option<IntegrationConfig> {
        self.read();
        self.integrations.get(&(environment_id, kind)).cloned()
    }

    fn webhook_config(&self, environment_id: EnvironmentId) -> Option<WebhookConfig> {
        self.read();
        self.webhooks.get(&environment_id).cloned()
    }

    fn identity(&self, identity_id: IdentityId) -> Option<Identity> {
        self.read();
        self.identities.get(&identity_id).cloned()
    }

    fn identity_feature_states(&self, identity_id: IdentityId) -> Vec<FeatureState> {
        self.read();
        self.feature_states
            .iter()
            .filter(|fs| fs.identity_id == Some(identity_id))
            .cloned()
            .collect()
    }

    fn identity_traits(&self, identity_id: IdentityId) -> Vec<Trait> {
        self.read();
        self.traits.get(&identity_id).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct InMemoryVersionRepository {
    versions: Vec<EnvironmentFeatureVersion>,
    feature_states: Vec<FeatureState>,
    multivariate_values: Vec<MultivariateFeatureStateValue>,
    last_id: i64,
}

impl InMemoryVersionRepository {
    pub fn add_feature_state(
        &mut self,
        version: &EnvironmentFeatureVersion,
        feature: Feature,
        enabled: bool,
    ) -> FeatureState {
        let id = self.allocate_id();
        let feature_state = FeatureState {
            environment_id: version.environment_id,
            version: Some(VersionLink::from(version)),
            ..environment_default(id, feature, enabled)
        };
        self.feature_states.push(feature_state.clone());
        feature_state
    }
}

impl VersionRepository for InMemoryVersionRepository {
    fn version(&self, uuid: Uuid) -> Option<EnvironmentFeatureVersion> {
        self.versions.iter().find(|v| v.uuid == uuid).cloned()
    }

    fn previous_published_version(
        &self,
        environment_id: EnvironmentId,
        created_before: DateTime<Utc>,
    ) -> Option<EnvironmentFeatureVersion> {
        self.versions
            .iter()
            .filter(|v| {
                v.environment_id == environment_id && v.published && v.created_at < created_before
            })
            .max_by_key(|v| v.created_at)
            .cloned()
    }

    // Links are refreshed from the stored version, the way a join would read them.
    fn version_feature_states(&self, uuid: Uuid) -> Vec<FeatureState> {
        let link = match self.version(uuid) {
            Some(version) => VersionLink::from(&version),
            None => return vec![],
        };
        self.feature_states
            .iter()
            .filter(|fs| fs.version.as_ref().map(|v| v.uuid) == Some(uuid))
            .map(|fs| FeatureState {
                version: Some(link.clone()),
                ..fs.clone()
            })
            .collect()
    }

    fn multivariate_values(
        &self,
        feature_state_id: FeatureStateId,
    ) -> Vec<MultivariateFeatureStateValue> {
        self.multivariate_values
            .iter()
            .filter(|v| v.feature_state_id == feature_state_id)
            .cloned()
            .collect()
    }

    fn allocate_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_version(&mut self, version: &EnvironmentFeatureVersion) {
        self.versions.push(version.clone());
    }

    fn update_version(
        &mut self,
        version: &EnvironmentFeatureVersion,
        expected_published: bool,
    ) -> bool {
        match self.versions.iter_mut().find(|v| v.uuid == version.uuid) {
            Some(stored) if stored.published == expected_published => {
                *stored = version.clone();
                true
            }
            _ => false,
        }
    }

    fn insert_feature_state(&mut self, feature_state: FeatureState) {
        self.feature_states.push(feature_state);
    }

    fn insert_multivariate_value(&mut self, value: MultivariateFeatureStateValue) {
        self.multivariate_values.push(value);
    }
}

#[derive(Default)]
pub struct RecordingScheduler {
    requests: RefCell<Vec<RebuildRequest>>,
}

impl RecordingScheduler {
    pub fn requests(&self) -> Vec<RebuildRequest> {
        self.requests.borrow().clone()
    }
}

impl RebuildScheduler for RecordingScheduler {
    fn schedule_rebuild(&self, request: RebuildRequest) {
        self.requests.borrow_mut().push(request);
    }
}
