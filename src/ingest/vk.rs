// src/ingest/vk.rs
//! VK group walls as a social content source. Posts have no title of their
//! own, so the first line of text doubles as one; the permalink
//! `https://vk.com/wall-{group}_{post}` is the dedup identity.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::ingest::types::{NewsItem, SourceProvider};

const VK_API_URL: &str = "https://api.vk.com/method/wall.get";
const VK_API_VERSION: &str = "5.131";
const VK_TIMEOUT_SECS: u64 = 10;
const TITLE_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct WallEnvelope {
    #[serde(default)]
    response: Option<WallResponse>,
    #[serde(default)]
    error: Option<VkError>,
}

#[derive(Debug, Deserialize)]
struct WallResponse {
    #[serde(default)]
    items: Vec<WallPost>,
}

#[derive(Debug, Deserialize)]
struct VkError {
    #[serde(default)]
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct WallPost {
    id: i64,
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    text: String,
}

/// One news group wall, fetched through the VK API (`owner_id = -group_id`).
pub struct VkWallSource {
    group_id: i64,
    access_token: String,
    client: Client,
    count: usize,
    label: String,
}

impl VkWallSource {
    pub fn new(client: Client, group_id: i64, access_token: impl Into<String>, count: usize) -> Self {
        Self {
            group_id,
            access_token: access_token.into(),
            client,
            count,
            label: format!("vk:wall-{group_id}"),
        }
    }
}

#[async_trait]
impl SourceProvider for VkWallSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let count = self.count.min(100).to_string();
        let owner = (-self.group_id).to_string();
        let params = [
            ("owner_id", owner.as_str()),
            ("count", count.as_str()),
            ("access_token", self.access_token.as_str()),
            ("v", VK_API_VERSION),
            ("filter", "owner"),
        ];
        let resp = self
            .client
            .get(VK_API_URL)
            .query(&params)
            .timeout(Duration::from_secs(VK_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("fetching {}", self.label))?;
        if resp.status() != reqwest::StatusCode::OK {
            bail!("{} answered {}", self.label, resp.status());
        }
        let envelope: WallEnvelope = resp
            .json()
            .await
            .with_context(|| format!("decoding {} payload", self.label))?;
        if let Some(err) = envelope.error {
            bail!("vk api error for {}: {}", self.label, err.error_msg);
        }
        let posts = envelope.response.map(|r| r.items).unwrap_or_default();
        Ok(posts
            .into_iter()
            .filter_map(|p| wall_post_to_item(self.group_id, p))
            .collect())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn wall_post_to_item(group_id: i64, post: WallPost) -> Option<NewsItem> {
    let text = post.text.trim();
    if text.is_empty() {
        return None;
    }
    let one_line = text.replace('\n', " ");
    let mut title: String = one_line.chars().take(TITLE_CHARS).collect();
    if one_line.chars().count() > TITLE_CHARS {
        title.push('…');
    }
    Some(NewsItem {
        title: title.trim().to_string(),
        link: format!("https://vk.com/wall-{}_{}", group_id, post.id),
        body: text.to_string(),
        published_at: post.date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_payload_becomes_items_with_permalinks() {
        let raw = r#"{
            "response": {
                "items": [
                    {"id": 42, "date": 1748847600, "text": "В городе открыли новый парк.\nПодробности позже."},
                    {"id": 43, "text": ""}
                ]
            }
        }"#;
        let envelope: WallEnvelope = serde_json::from_str(raw).unwrap();
        let posts = envelope.response.unwrap().items;
        let items: Vec<_> = posts
            .into_iter()
            .filter_map(|p| wall_post_to_item(15755094, p))
            .collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://vk.com/wall-15755094_42");
        assert_eq!(items[0].published_at, Some(1_748_847_600));
        assert!(items[0].title.starts_with("В городе открыли"));
        assert!(!items[0].title.contains('\n'));
    }

    #[test]
    fn long_posts_get_ellipsised_titles() {
        let text = "а".repeat(150);
        let item = wall_post_to_item(
            1,
            WallPost {
                id: 7,
                date: None,
                text,
            },
        )
        .unwrap();
        assert_eq!(item.title.chars().count(), TITLE_CHARS + 1);
        assert!(item.title.ends_with('…'));
        assert_eq!(item.published_at, None);
    }

    #[test]
    fn api_error_payload_is_detected() {
        let raw = r#"{"error": {"error_code": 5, "error_msg": "User authorization failed"}}"#;
        let envelope: WallEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.error.is_some());
        assert!(envelope.response.is_none());
    }
}
