use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use moka::sync::Cache;

use crate::builder::MappingError;
use crate::config::Config;
use crate::document::EnvironmentDocument;
use crate::environment::EnvironmentId;
use crate::version::RebuildRequest;

#[derive(Clone)]
struct CachedDocument {
    document: Arc<EnvironmentDocument>,
    built_at: DateTime<Utc>,
}

/// Time-bounded cache of environment documents backed by `moka`.
///
/// - **TTL**: entries are served while younger than the configured TTL, measured against the
///   caller's `now`. `moka` evicts them on its own clock after the same TTL.
/// - **Per-key coalescing**: misses go through `try_get_with`, so concurrent requests for one
///   environment share a single build while other environments proceed in parallel.
/// - A TTL of zero bypasses the cache entirely.
pub struct EnvironmentDocumentCache {
    ttl: Duration,
    cache: Option<Cache<EnvironmentId, CachedDocument>>,
}

impl EnvironmentDocumentCache {
    pub fn new(config: &Config) -> Self {
        let ttl = config.document_ttl();
        let cache = ttl
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Cache::builder().time_to_live(ttl).build());
        Self { ttl, cache }
    }

    /// Returns the cached document of the environment, building it with `build` when there is
    /// none younger than the TTL. Failed builds are not cached.
    pub fn get_or_build<F>(
        &self,
        environment_id: EnvironmentId,
        now: DateTime<Utc>,
        build: F,
    ) -> Result<Arc<EnvironmentDocument>, MappingError>
    where
        F: FnOnce() -> Result<EnvironmentDocument, MappingError>,
    {
        let Some(cache) = &self.cache else {
            return build().map(Arc::new);
        };

        if let Some(entry) = cache.get(&environment_id) {
            if now - entry.built_at < self.ttl {
                debug!("serving cached document of environment {}", environment_id);
                return Ok(entry.document);
            }
            cache.invalidate(&environment_id);
        }

        cache
            .try_get_with(environment_id, || {
                debug!("building document of environment {}", environment_id);
                build().map(|document| CachedDocument {
                    document: Arc::new(document),
                    built_at: now,
                })
            })
            .map(|entry| entry.document)
            .map_err(|error| error.as_ref().clone())
    }

    /// Executes a scheduled rebuild, replacing whatever is cached. Requests that are not due yet
    /// are left alone and return `None`.
    pub fn rebuild<F>(
        &self,
        request: &RebuildRequest,
        now: DateTime<Utc>,
        build: F,
    ) -> Result<Option<Arc<EnvironmentDocument>>, MappingError>
    where
        F: FnOnce() -> Result<EnvironmentDocument, MappingError>,
    {
        if request.delay_from(now) > Duration::zero() {
            debug!(
                "rebuild of environment {} is not due before {}",
                request.environment_id, request.not_before
            );
            return Ok(None);
        }

        let document = Arc::new(build()?);
        if let Some(cache) = &self.cache {
            cache.insert(
                request.environment_id,
                CachedDocument {
                    document: document.clone(),
                    built_at: now,
                },
            );
        }
        Ok(Some(document))
    }

    pub fn invalidate(&self, environment_id: EnvironmentId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&environment_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_environment_document, SizeLimit};
    use crate::test_common::{now, TestStore};
    use spectral::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn cache(seconds: u32) -> EnvironmentDocumentCache {
        EnvironmentDocumentCache::new(&Config {
            cache_environment_document_seconds: seconds,
        })
    }

    fn document() -> EnvironmentDocument {
        build_environment_document(&TestStore::with_environment(1), 1, now()).unwrap()
    }

    #[test]
    fn serves_cached_document_within_ttl() {
        let cache = cache(60);
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(document())
        };

        cache.get_or_build(1, now(), build).unwrap();
        cache
            .get_or_build(1, now() + Duration::seconds(59), build)
            .unwrap();
        assert_that!(builds.load(Ordering::SeqCst)).is_equal_to(1);

        cache
            .get_or_build(1, now() + Duration::seconds(60), build)
            .unwrap();
        assert_that!(builds.load(Ordering::SeqCst)).is_equal_to(2);
    }

    #[test]
    fn zero_ttl_always_builds() {
        let cache = cache(0);
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(document())
        };

        cache.get_or_build(1, now(), build).unwrap();
        cache.get_or_build(1, now(), build).unwrap();

        assert_that!(builds.load(Ordering::SeqCst)).is_equal_to(2);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache = cache(60);
        let error = MappingError::DocumentTooLarge {
            environment_id: 1,
            limit: SizeLimit::Segments,
            count: 2,
            allowed: 1,
        };

        assert_that!(cache.get_or_build(1, now(), || Err(error.clone())))
            .is_err_containing(error);
        assert_that!(cache.get_or_build(1, now(), || Ok(document()))).is_ok();
    }

    #[test]
    fn concurrent_requests_share_one_build() {
        let cache = cache(60);
        let builds = AtomicUsize::new(0);
        let document = document();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache
                        .get_or_build(1, now(), || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(document.clone())
                        })
                        .unwrap();
                });
            }
        });

        assert_that!(builds.load(Ordering::SeqCst)).is_equal_to(1);
    }

    #[test]
    fn due_rebuild_replaces_cached_document() {
        let cache = cache(60);
        let original = cache.get_or_build(1, now(), || Ok(document())).unwrap();
        let request = RebuildRequest {
            environment_id: 1,
            not_before: now(),
        };

        let rebuilt = cache
            .rebuild(&request, now() + Duration::seconds(1), || Ok(document()))
            .unwrap()
            .unwrap();
        let served = cache
            .get_or_build(1, now() + Duration::seconds(2), || Ok(document()))
            .unwrap();

        assert_that!(Arc::ptr_eq(&served, &rebuilt)).is_true();
        assert_that!(Arc::ptr_eq(&served, &original)).is_false();
    }

    #[test]
    fn rebuild_before_due_time_is_skipped() {
        let cache = cache(60);
        let request = RebuildRequest {
            environment_id: 1,
            not_before: now() + Duration::hours(1),
        };

        let result = cache.rebuild(&request, now(), || Ok(document())).unwrap();

        assert_that!(result).is_none();
    }

    #[test]
    fn invalidating_unknown_environments_keeps_cache_empty() {
        let cache = cache(60);
        for environment_id in 1..=1000 {
            cache.invalidate(environment_id);
        }

        let entries = cache.cache.as_ref().unwrap();
        entries.run_pending_tasks();
        assert_that!(entries.entry_count()).is_equal_to(0);
    }

    #[test]
    fn invalidate_releases_entry() {
        let cache = cache(60);
        cache.get_or_build(1, now(), || Ok(document())).unwrap();
        cache.invalidate(1);

        let entries = cache.cache.as_ref().unwrap();
        entries.run_pending_tasks();
        assert_that!(entries.entry_count()).is_equal_to(0);
    }

    #[test]
    fn zero_ttl_holds_no_cache() {
        assert_that!(cache(0).cache.is_none()).is_true();
    }

    #[test]
    fn invalidate_forces_next_build() {
        let cache = cache(60);
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(document())
        };

        cache.get_or_build(1, now(), build).unwrap();
        cache.invalidate(1);
        cache.get_or_build(1, now(), build).unwrap();

        assert_that!(builds.load(Ordering::SeqCst)).is_equal_to(2);
    }
}
