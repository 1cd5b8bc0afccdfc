use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::builder::{ensure_value_types, MappingError};
use crate::document::{map_feature_state, FeatureStateModel};
use crate::environment::EnvironmentId;
use crate::feature::FeatureState;
use crate::precedence::prioritised_feature_states;
use crate::store::Store;

pub type IdentityId = i64;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Identity {
    pub id: IdentityId,
    pub identifier: String,
    pub environment_id: EnvironmentId,
    pub created_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraitValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Trait {
    pub trait_key: String,
    pub trait_value: TraitValue,
}

/// An identity with its traits and its own overrides, as consumed by the evaluation engine.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IdentityDocument {
    pub identifier: String,
    pub environment_api_key: String,
    pub created_date: DateTime<Utc>,
    pub identity_id: IdentityId,
    pub identity_features: Vec<FeatureStateModel>,
    pub identity_traits: Vec<TraitModel>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TraitModel {
    pub trait_key: String,
    pub trait_value: TraitValue,
}

pub fn build_identity_document(
    store: &dyn Store,
    identity_id: IdentityId,
    now: DateTime<Utc>,
) -> Result<IdentityDocument, MappingError> {
    let identity = store.identity(identity_id).ok_or(MappingError::NotFound {
        entity: "identity",
        id: identity_id,
    })?;
    let environment =
        store
            .environment(identity.environment_id)
            .ok_or(MappingError::NotFound {
                entity: "environment",
                id: identity.environment_id,
            })?;

    let feature_states: Vec<FeatureState> =
        prioritised_feature_states(store.identity_feature_states(identity_id), now);
    let feature_state_ids = feature_states.iter().map(|fs| fs.id).collect_vec();
    let multivariate_values = store
        .multivariate_feature_state_values(&feature_state_ids)
        .into_iter()
        .into_group_map_by(|value| value.feature_state_id);
    let traits = store.identity_traits(identity_id);

    ensure_value_types(&feature_states)?;

    let identity_features = feature_states
        .iter()
        .map(|fs| {
            let values = multivariate_values
                .get(&fs.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            map_feature_state(fs, values)
        })
        .collect_vec();
    info!(
        "built document for identity {} with {} overrides",
        identity_id,
        identity_features.len()
    );

    Ok(IdentityDocument {
        identifier: identity.identifier,
        environment_api_key: environment.api_key,
        created_date: identity.created_date,
        identity_id: identity.id,
        identity_features,
        identity_traits: traits
            .into_iter()
            .map(|t| TraitModel {
                trait_key: t.trait_key,
                trait_value: t.trait_value,
            })
            .collect(),
    })
}
