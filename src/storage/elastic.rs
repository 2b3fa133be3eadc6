// src/storage/elastic.rs

//! Elasticsearch-compatible index store.
//!
//! Uses the typed document endpoints (`/{index}/{kind}/{id}`) so document
//! kinds map one-to-one onto index types.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde_json::{Value, json};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{IndexConfig, StoreConfig};
use crate::storage::{IndexStore, WorkOrderQuery};
use crate::utils::content_id;

/// Index store backed by an Elasticsearch REST endpoint.
#[derive(Debug, Clone)]
pub struct ElasticStore {
    client: Client,
    base_url: Url,
    index: IndexConfig,
}

impl ElasticStore {
    /// Create a store with a configured HTTP client.
    pub fn new(store: &StoreConfig, index: IndexConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("indexer/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(store.timeout_secs))
            .build()?;
        let base_url = Url::parse(&store.elastic_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "store.elastic_url {} cannot be used as a base URL",
                store.elastic_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            index,
        })
    }

    /// Append path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn put(&self, url: Url, body: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?)
    }

    /// Turn a non-success response into an index error.
    async fn reject(context: String, response: reqwest::Response) -> AppError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        AppError::index(context, format!("status {status}: {text}"))
    }
}

/// Request body for a work order query.
fn search_body(query: &WorkOrderQuery) -> Value {
    json!({
        "query": { "query_string": { "query": query.query_string() } },
        "sort": [ { query.sort_field.as_str(): { "order": "desc" } } ],
        "size": query.limit,
    })
}

/// Sources of the hits in a search response.
fn parse_hits(response: &Value) -> Vec<Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("_source").cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// Source of a get response, `None` when the document was not found.
fn parse_get(response: &Value) -> Option<Value> {
    if response.get("found").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    response.get("_source").cloned()
}

#[async_trait]
impl IndexStore for ElasticStore {
    async fn index(&self, kind: &str, id: &str, body: &str) -> Result<()> {
        let url = self.url(&[&self.index.ci_index, kind, id]);
        let response = self.put(url, body).await?;
        if !response.status().is_success() {
            return Err(Self::reject(format!("{kind}/{id}"), response).await);
        }
        Ok(())
    }

    async fn index_event(&self, channel: &str, body: &str) -> Result<()> {
        let id = content_id(channel, body);
        let mut url = self.url(&[&self.index.event_index, channel, &id]);
        url.query_pairs_mut().append_pair("op_type", "create");

        let response = self.put(url, body).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                log::debug!("Event {} already indexed, keeping first copy", id);
                Ok(())
            }
            _ => Err(Self::reject(format!("event {channel}/{id}"), response).await),
        }
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        let url = self.url(&[&self.index.ci_index, kind, id]);
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let text = response.text().await?;
                Ok(parse_get(&serde_json::from_str(&text)?))
            }
            _ => Err(Self::reject(format!("get {kind}/{id}"), response).await),
        }
    }

    async fn search_work_orders(&self, query: &WorkOrderQuery) -> Result<Vec<Value>> {
        let url = self.url(&[
            &self.index.work_order_pattern,
            &self.index.work_order_kind,
            "_search",
        ]);
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(search_body(query).to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::reject(format!("search ci {}", query.ci_id), response).await);
        }
        let text = response.text().await?;
        Ok(parse_hits(&serde_json::from_str(&text)?))
    }
}
