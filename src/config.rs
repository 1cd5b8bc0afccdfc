use chrono::Duration;
use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    /// How long a built environment document is served from the cache. Zero disables caching.
    #[envconfig(from = "CACHE_ENVIRONMENT_DOCUMENT_SECONDS", default = "0")]
    pub cache_environment_document_seconds: u32,
}

impl Config {
    pub fn document_ttl(&self) -> Duration {
        Duration::seconds(i64::from(self.cache_environment_document_seconds))
    }
}
