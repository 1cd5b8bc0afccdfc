use crate::environment::{
    Environment, EnvironmentId, Organisation, OrganisationId, Project, ProjectId,
};
use crate::feature::{FeatureState, FeatureStateId, MultivariateFeatureStateValue};
use crate::identity::{Identity, IdentityId, Trait};
use crate::integration::{IntegrationConfig, IntegrationKind, WebhookConfig};
use crate::segment::{Segment, SegmentId};

/// Store is the read-only interface to the relational data the documents are built from.
///
/// Every accessor returns complete, owned collections. Building a document reads through this
/// interface in one pass and never holds on to it afterwards.
pub trait Store {
    fn environment(&self, environment_id: EnvironmentId) -> Option<Environment>;

    fn project(&self, project_id: ProjectId) -> Option<Project>;

    fn organisation(&self, organisation_id: OrganisationId) -> Option<Organisation>;

    /// All segments of the project, each with its complete rule tree.
    fn project_segments(&self, project_id: ProjectId) -> Vec<Segment>;

    /// The feature states of the environment that are not bound to a segment, in every version.
    /// Identity overrides may be among them.
    fn environment_feature_states(&self, environment_id: EnvironmentId) -> Vec<FeatureState>;

    /// The states overriding features for `segment_id` within the environment, in every version.
    fn segment_feature_states(
        &self,
        segment_id: SegmentId,
        environment_id: EnvironmentId,
    ) -> Vec<FeatureState>;

    fn multivariate_feature_state_values(
        &self,
        feature_state_ids: &[FeatureStateId],
    ) -> Vec<MultivariateFeatureStateValue>;

    fn integration_config(
        &self,
        environment_id: EnvironmentId,
        kind: IntegrationKind,
    ) -> Option<IntegrationConfig>;

    fn webhook_config(&self, environment_id: EnvironmentId) -> Option<WebhookConfig>;

    fn identity(&self, identity_id: IdentityId) -> Option<Identity>;

    fn identity_feature_states(&self, identity_id: IdentityId) -> Vec<FeatureState>;

    fn identity_traits(&self, identity_id: IdentityId) -> Vec<Trait>;
}
