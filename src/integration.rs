use serde::{Deserialize, Serialize};

/// Third-party analytics integrations whose configuration is exported with the environment
/// document.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Amplitude,
    Dynatrace,
    Heap,
    Mixpanel,
    Rudderstack,
    Segment,
}

impl IntegrationKind {
    pub const ALL: [IntegrationKind; 6] = [
        IntegrationKind::Amplitude,
        IntegrationKind::Dynatrace,
        IntegrationKind::Heap,
        IntegrationKind::Mixpanel,
        IntegrationKind::Rudderstack,
        IntegrationKind::Segment,
    ];
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub entity_selector: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IntegrationModel {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub entity_selector: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WebhookModel {
    pub url: String,
    pub secret: Option<String>,
}

pub fn map_integration(integration: Option<&IntegrationConfig>) -> Option<IntegrationModel> {
    match integration {
        Some(config) if !config.deleted => Some(IntegrationModel {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            entity_selector: config.entity_selector.clone(),
        }),
        _ => None,
    }
}

pub fn map_webhook_config(webhook: Option<&WebhookConfig>) -> Option<WebhookModel> {
    match webhook {
        Some(config) if !config.deleted => Some(WebhookModel {
            url: config.url.clone(),
            secret: config.secret.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    fn amplitude() -> IntegrationConfig {
        IntegrationConfig {
            api_key: Some("amp-key".to_string()),
            base_url: Some("https://api2.amplitude.com".to_string()),
            entity_selector: None,
            deleted: false,
        }
    }

    #[test]
    fn absent_integration_maps_to_none() {
        assert_that!(map_integration(None)).is_none();
        assert_that!(map_webhook_config(None)).is_none();
    }

    #[test]
    fn deleted_integration_maps_to_none() {
        let config = IntegrationConfig {
            deleted: true,
            ..amplitude()
        };
        assert_that!(map_integration(Some(&config))).is_none();

        let webhook = WebhookConfig {
            url: "https://hooks.example.com".to_string(),
            secret: None,
            deleted: true,
        };
        assert_that!(map_webhook_config(Some(&webhook))).is_none();
    }

    #[test]
    fn live_integration_keeps_its_settings() {
        assert_that!(map_integration(Some(&amplitude()))).is_equal_to(Some(IntegrationModel {
            api_key: Some("amp-key".to_string()),
            base_url: Some("https://api2.amplitude.com".to_string()),
            entity_selector: None,
        }));

        let webhook = WebhookConfig {
            url: "https://hooks.example.com".to_string(),
            secret: Some("shh".to_string()),
            deleted: false,
        };
        assert_that!(map_webhook_config(Some(&webhook))).is_equal_to(Some(WebhookModel {
            url: "https://hooks.example.com".to_string(),
            secret: Some("shh".to_string()),
        }));
    }
}
