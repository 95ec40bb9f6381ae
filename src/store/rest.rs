//! REST data service client.
//!
//! # Responsibilities
//! - Translate `QueryOptions` into PostgREST query parameters
//! - Issue select/insert/update/delete as GET/POST/PATCH/DELETE
//! - Map HTTP failures onto `StoreError`
//!
//! # Design Decisions
//! - Filter values travel as query parameters (`column=eq.value`), never
//!   spliced into a statement
//! - Writes ask for `return=representation` so callers get the affected rows

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use url::Url;

use crate::config::StoreConfig;
use crate::store::{DataStore, Filters, QueryOptions, StoreError, StoreResult};

/// HTTP-backed `DataStore`.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RestStore {
    /// Build a client from configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StoreError::InvalidRequest(format!("invalid base URL: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// URL for `table` carrying the given filters and read options.
    pub fn table_url(&self, table: &str, filters: &Filters, query: Option<&QueryOptions>) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(table);

        {
            let mut pairs = url.query_pairs_mut();
            if let Some(query) = query {
                if let Some(columns) = &query.columns {
                    pairs.append_pair("select", &columns.join(","));
                }
            }
            for (column, value) in filters {
                pairs.append_pair(column, &format!("eq.{}", filter_literal(value)));
            }
            if let Some(query) = query {
                if let Some(order) = &query.order {
                    let direction = if order.ascending { "asc" } else { "desc" };
                    pairs.append_pair("order", &format!("{}.{}", order.column, direction));
                }
                if let Some(limit) = query.limit {
                    pairs.append_pair("limit", &limit.to_string());
                }
                if let Some(offset) = query.offset {
                    pairs.append_pair("offset", &offset.to_string());
                }
            }
        }

        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if !self.api_key.is_empty() {
            builder = builder
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if body.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        serde_json::from_slice(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Render a filter value the way the REST dialect expects it.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DataStore for RestStore {
    async fn select(&self, table: &str, query: &QueryOptions) -> StoreResult<Value> {
        let url = self.table_url(table, &query.filters, Some(query))?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn insert(&self, table: &str, data: &Value) -> StoreResult<Value> {
        let url = self.table_url(table, &Filters::new(), None)?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(data);
        self.send(builder).await
    }

    async fn update(&self, table: &str, data: &Value, filters: &Filters) -> StoreResult<Value> {
        let url = self.table_url(table, filters, None)?;
        let builder = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(data);
        self.send(builder).await
    }

    async fn delete(&self, table: &str, filters: &Filters) -> StoreResult<Value> {
        let url = self.table_url(table, filters, None)?;
        let builder = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        self.send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::filters;

    fn store() -> RestStore {
        RestStore::new(&StoreConfig {
            base_url: "http://db.local/rest/v1/".to_string(),
            api_key: "anon".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_select_url() {
        let query = QueryOptions::new()
            .columns(["id", "name"])
            .filter("college_id", "C1")
            .filter("active", true)
            .order_by("name", false)
            .limit(25)
            .offset(50);

        let url = store().table_url("courses", &query.filters, Some(&query)).unwrap();
        assert_eq!(url.path(), "/rest/v1/courses");
        assert_eq!(
            url.query(),
            Some("select=id%2Cname&active=eq.true&college_id=eq.C1&order=name.desc&limit=25&offset=50")
        );
    }

    #[test]
    fn test_write_url_has_only_filters() {
        let url = store()
            .table_url("courses", &filters([("id", 7)]), None)
            .unwrap();
        assert_eq!(url.as_str(), "http://db.local/rest/v1/courses?id=eq.7");

        let url = store().table_url("courses", &Filters::new(), None).unwrap();
        assert_eq!(url.as_str(), "http://db.local/rest/v1/courses");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = RestStore::new(&StoreConfig {
            base_url: "::nope".to_string(),
            ..StoreConfig::default()
        })
        .err();
        assert!(matches!(err, Some(StoreError::InvalidRequest(_))));
    }
}
