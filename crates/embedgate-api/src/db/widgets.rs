//! Widget registration reads.
//!
//! The gateway never writes this table. Rows are converted into validated
//! [`WidgetRegistration`]s; a row that violates registration invariants is
//! reported rather than served.

use embedgate_core::{
    AllowedOrigins, SiteKey, TenantId, ValidationError, WidgetId, WidgetRegistration, WidgetSecret,
};
use sqlx::PgPool;

/// Database row for a widget registration.
#[derive(sqlx::FromRow)]
pub struct WidgetRow {
    pub widget_id: String,
    pub name: String,
    pub site_key: String,
    pub secret: String,
    pub allowed_origins: Vec<String>,
    pub tenant_id: String,
    pub theme: serde_json::Value,
    pub active: bool,
}

impl WidgetRow {
    /// Validate and convert into a domain registration.
    pub fn into_registration(self) -> Result<WidgetRegistration, ValidationError> {
        let registration = WidgetRegistration {
            allowed_origins: AllowedOrigins::new(&self.widget_id, &self.allowed_origins)?,
            widget_id: WidgetId::new(self.widget_id)?,
            name: self.name,
            site_key: SiteKey::parse(&self.site_key)?,
            secret: WidgetSecret::new(self.secret)?,
            tenant_id: TenantId::new(self.tenant_id)?,
            theme: self.theme,
            active: self.active,
        };
        registration.validate()?;
        Ok(registration)
    }
}

/// Fetch the active widget registered under `site_key`.
pub async fn find_active_by_site_key(
    pool: &PgPool,
    site_key: &str,
) -> Result<Option<WidgetRow>, sqlx::Error> {
    sqlx::query_as::<_, WidgetRow>(
        "SELECT widget_id, name, site_key, secret, allowed_origins, tenant_id, theme, active
         FROM widgets WHERE site_key = $1 AND active",
    )
    .bind(site_key)
    .fetch_optional(pool)
    .await
}
