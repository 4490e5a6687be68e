//! # Widget Registrations
//!
//! The registry-side view of an embeddable widget, and the sanitized view
//! that is safe to hand back to an embedding page.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{SiteKey, TenantId, WidgetId, WidgetSecret};
use crate::origin::AllowedOrigins;

/// Identity of an embeddable widget as held by the registry.
///
/// Deserializable from seed files and database rows. Deliberately not
/// `Serialize`: the only outward representation is [`WidgetConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetRegistration {
    /// Opaque, stable identifier.
    pub widget_id: WidgetId,
    /// Display name.
    pub name: String,
    /// Public key used by embedders.
    pub site_key: SiteKey,
    /// HMAC key for identity tickets. Never returned to callers.
    pub secret: WidgetSecret,
    /// Exact origins permitted to embed this widget.
    pub allowed_origins: AllowedOrigins,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Opaque display configuration.
    #[serde(default = "empty_theme")]
    pub theme: serde_json::Value,
    /// Registry-side soft disable. Inactive widgets resolve as not found.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn empty_theme() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_active() -> bool {
    true
}

impl WidgetRegistration {
    /// Check registration invariants.
    ///
    /// An active widget must have a non-empty allow-list, and every entry
    /// must be an exact canonical origin.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.allowed_origins.validate(self.widget_id.as_str())?;
        if self.active && self.allowed_origins.is_empty() {
            return Err(ValidationError::EmptyAllowList(self.widget_id.to_string()));
        }
        Ok(())
    }

    /// The sanitized view returned by a successful bootstrap.
    pub fn to_config(&self) -> WidgetConfig {
        WidgetConfig {
            id: self.widget_id.to_string(),
            name: self.name.clone(),
            site_key: self.site_key.to_string(),
            theme: self.theme.clone(),
        }
    }
}

/// Sanitized widget configuration. Contains no secret material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Widget identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Public site key.
    pub site_key: String,
    /// Opaque display configuration.
    pub theme: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(origins: &[&str]) -> WidgetRegistration {
        WidgetRegistration {
            widget_id: WidgetId::new("w-1").unwrap(),
            name: "Support".to_string(),
            site_key: SiteKey::parse("pk_test_1").unwrap(),
            secret: WidgetSecret::new("0123456789abcdef0123").unwrap(),
            allowed_origins: AllowedOrigins::new("w-1", origins.iter().copied()).unwrap(),
            tenant_id: TenantId::new("tenant-a").unwrap(),
            theme: serde_json::json!({"color": "#0044ff"}),
            active: true,
        }
    }

    #[test]
    fn active_widget_requires_allow_list() {
        let reg = registration(&[]);
        assert_eq!(
            reg.validate(),
            Err(ValidationError::EmptyAllowList("w-1".to_string()))
        );
        let mut inactive = registration(&[]);
        inactive.active = false;
        assert!(inactive.validate().is_ok());
    }

    #[test]
    fn config_never_contains_secret() {
        let reg = registration(&["https://good.com"]);
        let json = serde_json::to_string(&reg.to_config()).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("0123456789abcdef0123"));
        assert!(json.contains("pk_test_1"));
    }

    #[test]
    fn deserializes_seed_entry_with_defaults() {
        let reg: WidgetRegistration = serde_json::from_value(serde_json::json!({
            "widget_id": "w-9",
            "name": "Chat",
            "site_key": "pk_9",
            "secret": "a-long-enough-secret",
            "allowed_origins": ["https://shop.example"],
            "tenant_id": "t-9"
        }))
        .unwrap();
        assert!(reg.active);
        assert_eq!(reg.theme, serde_json::json!({}));
        assert!(reg.validate().is_ok());
    }

    #[test]
    fn seed_entry_with_wildcard_fails_validation() {
        let reg: WidgetRegistration = serde_json::from_value(serde_json::json!({
            "widget_id": "w-9",
            "name": "Chat",
            "site_key": "pk_9",
            "secret": "a-long-enough-secret",
            "allowed_origins": ["https://*.shop.example"],
            "tenant_id": "t-9"
        }))
        .unwrap();
        assert!(reg.validate().is_err());
    }
}
