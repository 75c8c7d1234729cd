//! `races` table on the hosted backend, through its PostgREST endpoint.

use crate::error::StoreError;
use crate::models::{NewRaceRow, RaceKey, RaceRecord};
use crate::storage::RaceStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct RestStore {
    client: Client,
    table_url: Url,
    key: String,
}

impl RestStore {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        Ok(Self {
            client,
            table_url: base.join("rest/v1/races")?,
            key: key.to_string(),
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }

    /// `GET /rest/v1/races?select=id&name=eq.<name>&date=eq.<date>&limit=1`
    fn lookup_url(&self, key: &RaceKey) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("name", &format!("eq.{}", key.name))
            .append_pair("date", &format!("eq.{}", key.date.format("%Y-%m-%d")))
            .append_pair("limit", "1");
        url
    }

    async fn check(resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl RaceStore for RestStore {
    async fn exists(&self, key: &RaceKey) -> Result<bool, StoreError> {
        let url = self.lookup_url(key);
        debug!("GET {}", url);

        let resp = self.authed(self.client.get(url)).send().await?;
        let rows: Vec<serde_json::Value> = Self::check(resp).await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn insert(&self, race: &RaceRecord) -> Result<(), StoreError> {
        let resp = self
            .authed(self.client.post(self.table_url.clone()))
            .header("Prefer", "return=minimal")
            .json(&NewRaceRow::from(race))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
