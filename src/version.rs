use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::environment::EnvironmentId;
use crate::feature::{FeatureState, FeatureStateId, MultivariateFeatureStateValue};

pub type UserId = i64;

/// A versioned snapshot boundary of feature configuration for one environment.
///
/// Versions start out as drafts and become published exactly once. A published version becomes
/// live at its `live_from` time, which is either stamped at publication or set ahead of time by
/// the caller to schedule the go-live.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnvironmentFeatureVersion {
    pub uuid: Uuid,
    pub environment_id: EnvironmentId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<UserId>,

    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub published_by: Option<UserId>,
    #[serde(default)]
    pub live_from: Option<DateTime<Utc>>,
}

/// The parts of a version a feature state needs to decide whether it is live.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VersionLink {
    pub uuid: Uuid,
    pub published: bool,
    #[serde(default)]
    pub live_from: Option<DateTime<Utc>>,
}

impl VersionLink {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.published && self.live_from.map_or(true, |live_from| live_from <= now)
    }
}

impl From<&EnvironmentFeatureVersion> for VersionLink {
    fn from(version: &EnvironmentFeatureVersion) -> Self {
        VersionLink {
            uuid: version.uuid,
            published: version.published,
            live_from: version.live_from,
        }
    }
}

/// Request to rebuild the document of an environment, no earlier than `not_before`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RebuildRequest {
    pub environment_id: EnvironmentId,
    pub not_before: DateTime<Utc>,
}

impl RebuildRequest {
    /// How long a scheduler has to wait from `now`; zero once the request is due.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        (self.not_before - now).max(Duration::zero())
    }
}

/// The side effect of saving a version. Returned by the transition functions so the caller that
/// persists the version also dispatches the effect.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    ScheduleRebuild(RebuildRequest),
    NoOp,
}

impl Transition {
    /// Decides the effect of saving `version` given whether the persisted row was already
    /// published before the save. Only the draft to published edge schedules a rebuild.
    pub fn on_save(was_published: bool, version: &EnvironmentFeatureVersion) -> Transition {
        match (was_published, version.published, version.live_from) {
            (false, true, Some(live_from)) => Transition::ScheduleRebuild(RebuildRequest {
                environment_id: version.environment_id,
                not_before: live_from,
            }),
            _ => Transition::NoOp,
        }
    }
}

impl EnvironmentFeatureVersion {
    pub fn new(environment_id: EnvironmentId, now: DateTime<Utc>) -> Self {
        EnvironmentFeatureVersion {
            uuid: Uuid::new_v4(),
            environment_id,
            created_at: now,
            created_by: None,
            published: false,
            published_by: None,
            live_from: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        !self.published
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        VersionLink::from(self).is_live_at(now)
    }

    /// Marks the version as published. A `live_from` set beforehand is kept, which schedules the
    /// go-live for that time.
    pub fn publish(&mut self, published_by: Option<UserId>, now: DateTime<Utc>) -> Transition {
        let was_published = self.published;
        if !was_published {
            self.published = true;
            self.published_by = published_by;
        }
        self.stamp_live_from(now);
        Transition::on_save(was_published, self)
    }

    fn stamp_live_from(&mut self, now: DateTime<Utc>) {
        if self.published && self.live_from.is_none() {
            self.live_from = Some(now);
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum VersionError {
    #[error("environment feature version {0} does not exist")]
    NotFound(Uuid),
    #[error("environment feature version {0} is published and cannot return to draft")]
    AlreadyPublished(Uuid),
    #[error("environment feature version {0} was modified concurrently")]
    Conflict(Uuid),
}

/// Persistence for versions and the feature states that belong to them.
pub trait VersionRepository {
    fn version(&self, uuid: Uuid) -> Option<EnvironmentFeatureVersion>;

    /// The most recently created published version of the environment created before
    /// `created_before`.
    fn previous_published_version(
        &self,
        environment_id: EnvironmentId,
        created_before: DateTime<Utc>,
    ) -> Option<EnvironmentFeatureVersion>;

    fn version_feature_states(&self, uuid: Uuid) -> Vec<FeatureState>;

    fn multivariate_values(&self, feature_state_id: FeatureStateId)
        -> Vec<MultivariateFeatureStateValue>;

    /// Hands out a fresh primary key for a feature state or multivariate value row.
    fn allocate_id(&mut self) -> i64;

    fn insert_version(&mut self, version: &EnvironmentFeatureVersion);

    /// Writes `version` only if the stored `published` flag still equals `expected_published`.
    /// Returns whether the write happened.
    fn update_version(
        &mut self,
        version: &EnvironmentFeatureVersion,
        expected_published: bool,
    ) -> bool;

    fn insert_feature_state(&mut self, feature_state: FeatureState);

    fn insert_multivariate_value(&mut self, value: MultivariateFeatureStateValue);
}

/// Receives rebuild requests. Delivery and retries are the scheduler's concern.
pub trait RebuildScheduler {
    fn schedule_rebuild(&self, request: RebuildRequest);
}

/// Drives versions through their lifecycle and hands rebuild requests to the scheduler.
pub struct VersionLifecycle<R, S> {
    repository: R,
    scheduler: S,
}

impl<R: VersionRepository, S: RebuildScheduler> VersionLifecycle<R, S> {
    pub fn new(repository: R, scheduler: S) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Creates a draft version for the environment, seeded with a copy of every feature state of
    /// the previous published version. The first version of an environment starts empty.
    pub fn create(
        &mut self,
        environment_id: EnvironmentId,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> EnvironmentFeatureVersion {
        let mut version = EnvironmentFeatureVersion::new(environment_id, now);
        version.created_by = created_by;

        let previous = self
            .repository
            .previous_published_version(environment_id, version.created_at);
        self.repository.insert_version(&version);

        match previous {
            Some(previous) => {
                let cloned = self.clone_feature_states(&previous, &version);
                info!(
                    "created version {} for environment {} with {} feature states cloned from {}",
                    version.uuid, environment_id, cloned, previous.uuid
                );
            }
            None => info!(
                "created first version {} for environment {}",
                version.uuid, environment_id
            ),
        }

        version
    }

    fn clone_feature_states(
        &mut self,
        from: &EnvironmentFeatureVersion,
        into: &EnvironmentFeatureVersion,
    ) -> usize {
        let feature_states = self.repository.version_feature_states(from.uuid);
        for feature_state in &feature_states {
            let id = self.repository.allocate_id();
            let clone = feature_state.clone_for_version(id, into.environment_id, into);

            for value in self.repository.multivariate_values(feature_state.id) {
                let value_id = self.repository.allocate_id();
                self.repository
                    .insert_multivariate_value(value.clone_for_feature_state(value_id, id));
            }
            self.repository.insert_feature_state(clone);
        }
        feature_states.len()
    }

    /// Publishes the version now, or at its preset `live_from`.
    pub fn publish(
        &mut self,
        uuid: Uuid,
        published_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Transition, VersionError> {
        let mut version = self.repository.version(uuid).ok_or(VersionError::NotFound(uuid))?;
        let was_published = version.published;

        let transition = version.publish(published_by, now);
        self.persist(&version, was_published)?;
        self.dispatch(&transition);
        Ok(transition)
    }

    /// Saves changes to an existing version. The scheduling decision is taken against the
    /// `published` flag read before the write.
    pub fn save(
        &mut self,
        mut version: EnvironmentFeatureVersion,
        now: DateTime<Utc>,
    ) -> Result<Transition, VersionError> {
        let stored = self
            .repository
            .version(version.uuid)
            .ok_or(VersionError::NotFound(version.uuid))?;
        if stored.published && version.is_draft() {
            return Err(VersionError::AlreadyPublished(version.uuid));
        }

        version.stamp_live_from(now);
        let transition = Transition::on_save(stored.published, &version);
        self.persist(&version, stored.published)?;
        self.dispatch(&transition);
        Ok(transition)
    }

    fn persist(
        &mut self,
        version: &EnvironmentFeatureVersion,
        expected_published: bool,
    ) -> Result<(), VersionError> {
        if self.repository.update_version(version, expected_published) {
            Ok(())
        } else {
            Err(VersionError::Conflict(version.uuid))
        }
    }

    fn dispatch(&self, transition: &Transition) {
        match transition {
            Transition::ScheduleRebuild(request) => {
                info!(
                    "scheduling rebuild of environment {} document at {}",
                    request.environment_id, request.not_before
                );
                self.scheduler.schedule_rebuild(request.clone());
            }
            Transition::NoOp => debug!("version save requires no document rebuild"),
        }
    }
}
