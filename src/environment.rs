use chrono::{DateTime, Utc};
use serde::Deserialize;

pub type OrganisationId = i64;
pub type ProjectId = i64;
pub type EnvironmentId = i64;
pub type EnvironmentApiKeyId = i64;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    #[serde(default)]
    pub feature_analytics: bool,
    #[serde(default)]
    pub stop_serving_flags: bool,
    #[serde(default = "default_true")]
    pub persist_trait_data: bool,
}

/// A project groups environments and segments and carries the ceilings that bound the size of
/// each environment document built for it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub organisation_id: OrganisationId,

    #[serde(default)]
    pub hide_disabled_flags: bool,
    #[serde(default)]
    pub enable_realtime_updates: bool,

    #[serde(default = "default_max_segments")]
    pub max_segments_allowed: usize,
    #[serde(default = "default_max_features")]
    pub max_features_allowed: usize,
    #[serde(default = "default_max_segment_overrides")]
    pub max_segments_overrides_allowed: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub project_id: ProjectId,
    /// The client-side key of the environment.
    pub api_key: String,

    #[serde(default = "default_true")]
    pub allow_client_traits: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub use_identity_composite_key_for_hashing: bool,
    #[serde(default)]
    pub hide_sensitive_data: bool,
    // When unset the project's setting applies.
    #[serde(default)]
    pub hide_disabled_flags: Option<bool>,
}

/// A server-side key granting access to one environment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EnvironmentApiKey {
    pub id: EnvironmentApiKeyId,
    pub key: String,
    pub name: String,
    pub environment_id: EnvironmentId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_segments() -> usize {
    100
}

fn default_max_features() -> usize {
    400
}

fn default_max_segment_overrides() -> usize {
    100
}
