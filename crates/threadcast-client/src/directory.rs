//! Static topic/channel directory.
//!
//! A plain request/response collaborator next to the real-time connection:
//! the server exposes the topic list and per-topic channel listings over
//! HTTP. This is read-only and has nothing to do with the event stream.

use threadcast_proto::{Channel, Topic};

use crate::ClientError;

/// Fetch the ordered topic list.
pub async fn fetch_topics(base_url: &str) -> Result<Vec<Topic>, ClientError> {
    let url = format!("{}/topics", base_url.trim_end_matches('/'));
    get_json(&url).await
}

/// Fetch the channel listings under one topic.
pub async fn fetch_channels(base_url: &str, topic_id: &str) -> Result<Vec<Channel>, ClientError> {
    let url = format!("{}/topics/{topic_id}/channels", base_url.trim_end_matches('/'));
    get_json(&url).await
}

async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, ClientError> {
    let response = reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| ClientError::Directory { reason: e.to_string() })?;
    response
        .json()
        .await
        .map_err(|e| ClientError::Directory { reason: e.to_string() })
}
