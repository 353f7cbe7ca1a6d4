// src/ingest/client.rs
//! HTTP feed clients. One fetch per call, a fixed user-agent, a bounded
//! timeout, and no retries: a source that fails this round simply contributes
//! nothing, the cascade moves on to the next tier.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::ingest::rss::parse_feed_items;
use crate::ingest::types::{NewsItem, SourceProvider};

/// Browser-like user-agent: several regional outlets and all the RSS bridges
/// reject the default reqwest one.
pub const FEED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const FEED_TIMEOUT_SECS: u64 = 20;
const BRIDGE_TIMEOUT_SECS: u64 = 15;

/// Shared client for all feed fetches.
pub fn build_feed_client() -> Result<Client> {
    Client::builder()
        .user_agent(FEED_USER_AGENT)
        .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
        .build()
        .context("building feed http client")
}

/// A classic RSS/Atom feed endpoint.
pub struct RssSource {
    url: String,
    client: Client,
    max_items: usize,
}

impl RssSource {
    pub fn new(client: Client, url: impl Into<String>, max_items: usize) -> Self {
        Self {
            url: url.into(),
            client,
            max_items,
        }
    }
}

#[async_trait]
impl SourceProvider for RssSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("fetching {}", self.url))?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("{} answered {}", self.url, resp.status());
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {}", self.url))?;
        Ok(parse_feed_items(&body, self.max_items))
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// An RSS bridge in front of a chat channel (rsshub and friends). Same
/// contract as `RssSource`, but bridges frequently answer 200 with an HTML
/// error page, so the body is sniffed before parsing.
pub struct BridgeSource {
    url: String,
    client: Client,
    max_items: usize,
}

impl BridgeSource {
    pub fn new(client: Client, url: impl Into<String>, max_items: usize) -> Self {
        Self {
            url: url.into(),
            client,
            max_items,
        }
    }
}

#[async_trait]
impl SourceProvider for BridgeSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(BRIDGE_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("fetching bridge {}", self.url))?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("bridge {} answered {}", self.url, resp.status());
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of bridge {}", self.url))?;
        let sniff = body.to_lowercase();
        if !sniff.contains("<rss") && !sniff.contains("<feed") {
            bail!("bridge {} returned a non-feed payload", self.url);
        }
        Ok(parse_feed_items(&body, self.max_items))
    }

    fn name(&self) -> &str {
        &self.url
    }
}
