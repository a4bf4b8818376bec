//! PostgREST implementation of [`MetadataStore`].
//!
//! Every table is reached at `{base_url}/rest/v1/{table}` with the service key sent both as
//! `apikey` and as a bearer token. Writes ask for `return=representation` so inserted and
//! patched rows come back in the response body.

use crate::error::{status_error, transport_error, RemoteError, RemoteResult};
use crate::required;
use altus_core::stores::{Filter, MetadataStore, Query, Row};
use altus_core::{StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct PostgrestConfig {
    base_url: String,
    service_key: String,
}

impl PostgrestConfig {
    pub fn new(base_url: &str, service_key: String) -> RemoteResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(RemoteError::Configuration(format!(
                "metadata store URL must be http(s): {base_url:?}"
            )));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            service_key,
        })
    }

    /// Builds the configuration from raw `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY` values.
    pub fn from_env_values(url: Option<String>, service_key: Option<String>) -> RemoteResult<Self> {
        let url = required("SUPABASE_URL", url)?;
        Self::new(&url, required("SUPABASE_SERVICE_ROLE_KEY", service_key)?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }
}

impl std::fmt::Debug for PostgrestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestConfig")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// QUERY RENDERING
// ============================================================================

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escapes the `LIKE` metacharacters in a literal prefix.
fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Renders one filter as a PostgREST query parameter. Prefix filters use `ilike` so they
/// ignore case like object store paths do.
pub fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::IsNull(column) | Filter::Eq(column, Value::Null) => {
            (column.clone(), "is.null".into())
        }
        Filter::Eq(column, value) => (column.clone(), format!("eq.{}", scalar(value))),
        Filter::StartsWith(column, prefix) => {
            (column.clone(), format!("ilike.{}*", escape_like(prefix)))
        }
        Filter::Gt(column, value) => (column.clone(), format!("gt.{}", scalar(value))),
    }
}

pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(query.filters.iter().map(filter_param));
    if let Some(column) = &query.order_by {
        params.push(("order".into(), format!("{column}.asc")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    params
}

// ============================================================================
// STORE
// ============================================================================

pub struct PostgrestStore {
    client: reqwest::Client,
    config: PostgrestConfig,
}

impl PostgrestStore {
    pub fn new(config: PostgrestConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.config.table_url(table))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn rows(response: reqwest::Response) -> StoreResult<Vec<Row>> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataStore for PostgrestStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Row>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&query_params(query))
            .send()
            .await
            .map_err(transport_error)?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport_error)?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {table} returned no row")))
    }

    async fn patch(&self, table: &str, filters: &[Filter], fields: Row) -> StoreResult<usize> {
        if filters.is_empty() {
            return Err(StoreError::Rejected {
                status: 400,
                message: format!("refusing to patch every row of {table}"),
            });
        }
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let response = self
            .request(reqwest::Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&fields)
            .send()
            .await
            .map_err(transport_error)?;
        Ok(Self::rows(response).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_rendering() {
        assert_eq!(
            filter_param(&Filter::Eq("owner_id".into(), json!(1))),
            ("owner_id".to_string(), "eq.1".to_string())
        );
        assert_eq!(
            filter_param(&Filter::Eq("entity_type".into(), json!("property"))),
            ("entity_type".to_string(), "eq.property".to_string())
        );
        assert_eq!(
            filter_param(&Filter::IsNull("end_date".into())).1,
            "is.null"
        );
        assert_eq!(
            filter_param(&Filter::Eq("end_date".into(), Value::Null)).1,
            "is.null"
        );
        assert_eq!(filter_param(&Filter::Gt("id".into(), json!(1000))).1, "gt.1000");
    }

    #[test]
    fn test_prefix_filter_escapes_like_metacharacters() {
        let (column, value) = filter_param(&Filter::StartsWith(
            "stored_path".into(),
            "/Altus/01_Owners/acme-1/".into(),
        ));
        assert_eq!(column, "stored_path");
        assert_eq!(value, r"ilike./Altus/01\_Owners/acme-1/*");
        assert_eq!(escape_like(r"50%\x"), r"50\%\\x");
    }

    #[test]
    fn test_query_params_order_and_limit() {
        let query = Query::new()
            .starts_with("stored_path", "/A/")
            .gt("id", 5)
            .order_by("id")
            .limit(1000);
        let params = query_params(&query);
        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert!(params.contains(&("id".to_string(), "gt.5".to_string())));
        assert!(params.contains(&("order".to_string(), "id.asc".to_string())));
        assert_eq!(params.last(), Some(&("limit".to_string(), "1000".to_string())));
    }

    #[test]
    fn test_config_validation() {
        let config = PostgrestConfig::from_env_values(
            Some("https://db.example.com/".into()),
            Some("service".into()),
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://db.example.com");
        assert_eq!(
            config.table_url("file_assets"),
            "https://db.example.com/rest/v1/file_assets"
        );
        assert!(!format!("{config:?}").contains("service"));

        assert!(matches!(
            PostgrestConfig::from_env_values(None, Some("k".into())),
            Err(RemoteError::MissingCredential("SUPABASE_URL"))
        ));
        assert!(matches!(
            PostgrestConfig::from_env_values(Some("db.example.com".into()), Some("k".into())),
            Err(RemoteError::Configuration(_))
        ));
    }
}
