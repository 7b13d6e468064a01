//! services/planner/src/adapters/realtime_db.rs
//!
//! This module contains the realtime database adapter, the concrete
//! implementation of the `RemoteFavoritesSync` port. Favorites live at
//! `users/{user_id}/favorites` and are read through the database's REST
//! streaming endpoint (server-sent `put`/`patch` events).

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use tracing::{debug, info, warn};
use trip_planner_core::domain::Trip;
use trip_planner_core::ports::{FavoritesStream, PortError, PortResult, RemoteFavoritesSync};

use super::sse::SseDecoder;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct RealtimeDbAdapter {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RealtimeDbAdapter {
    /// Creates a new `RealtimeDbAdapter` for the database at `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    /// Sends `token` as the `auth` query parameter on every request.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn favorites_url(&self, user_id: &str) -> PortResult<String> {
        if user_id.is_empty()
            || user_id
                .chars()
                .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
        {
            return Err(PortError::Unexpected(format!("invalid user id {:?}", user_id)));
        }
        Ok(format!("{}/users/{}/favorites.json", self.base_url, user_id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }
}

fn status_error(status: reqwest::StatusCode) -> PortError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        PortError::Unauthorized
    } else {
        PortError::Network(format!("remote store responded with {}", status))
    }
}

//=========================================================================================
// `RemoteFavoritesSync` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteFavoritesSync for RealtimeDbAdapter {
    async fn subscribe(&self, user_id: &str) -> PortResult<FavoritesStream> {
        let url = self.favorites_url(user_id)?;
        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        info!("Subscribed to remote favorites for user {}", user_id);
        Ok(favorites_from_events(response.bytes_stream()))
    }

    async fn push(&self, user_id: &str, favorites: &[Trip]) -> PortResult<()> {
        let url = self.favorites_url(user_id)?;
        let response = self
            .authorize(self.client.put(&url))
            .json(favorites)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        debug!("Pushed {} favorites for user {}", favorites.len(), user_id);
        Ok(())
    }
}

//=========================================================================================
// Event Stream Handling
//=========================================================================================

#[derive(Deserialize)]
struct EventPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Turns a raw event-stream body into favorites snapshots.
///
/// The node's value is mirrored locally; each `put` or `patch` is applied to
/// the mirror and the whole node is yielded again. `cancel` and
/// `auth_revoked` end the stream with `Unauthorized`.
pub fn favorites_from_events<S, E>(byte_stream: S) -> FavoritesStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut tree = Value::Null;
        let mut byte_stream = Box::pin(byte_stream);

        loop {
            let (events, finished) = match byte_stream.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(PortError::Network(e.to_string()));
                    break;
                }
                None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
            };

            for event in events {
                match event.event.as_deref() {
                    Some(kind @ ("put" | "patch")) => {
                        let payload = match serde_json::from_str::<EventPayload>(&event.data) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("Ignoring malformed {} event: {}", kind, e);
                                continue;
                            }
                        };
                        if kind == "put" {
                            apply_put(&mut tree, &payload.path, payload.data);
                        } else {
                            apply_patch(&mut tree, &payload.path, payload.data);
                        }
                        yield Ok(normalize_favorites(&tree));
                    }
                    Some("cancel") | Some("auth_revoked") => {
                        warn!("Remote favorites subscription revoked by server");
                        yield Err(PortError::Unauthorized);
                        return;
                    }
                    _ => {}
                }
            }

            if finished {
                debug!("Remote favorites event stream closed");
                break;
            }
        }
    })
}

/// Converts a node value into favorites: null reads as empty, an object
/// reads as its values in key order (numeric keys numerically), and entries
/// that are not trips are skipped.
pub fn normalize_favorites(value: &Value) -> Vec<Trip> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            let mut keyed: Vec<(&String, &Value)> = map.iter().collect();
            keyed.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            });
            keyed.into_iter().map(|(_, v)| v).collect()
        }
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter(|v| !v.is_null())
        .filter_map(|v| match serde_json::from_value::<Trip>(v.clone()) {
            Ok(trip) => Some(trip),
            Err(e) => {
                warn!("Skipping malformed remote favorite: {}", e);
                None
            }
        })
        .collect()
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

// Arrays are mirrored as objects keyed by index so child paths like `/2`
// can be written.
fn as_object(value: &mut Value) -> &mut Map<String, Value> {
    if let Value::Array(items) = value {
        let map = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *value = Value::Object(map);
    }
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

fn apply_put(tree: &mut Value, path: &str, data: Value) {
    let segments = path_segments(path);
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        node = as_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    let parent = as_object(node);
    if data.is_null() {
        parent.remove(*last);
    } else {
        parent.insert(last.to_string(), data);
    }
}

fn apply_patch(tree: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        warn!("Ignoring patch at {} without an object body", path);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(tree, &format!("{}/{}", base, key), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(trips: &[Trip]) -> Vec<&str> {
        trips.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn null_node_is_empty() {
        assert!(normalize_favorites(&Value::Null).is_empty());
    }

    #[test]
    fn object_node_reads_in_numeric_key_order() {
        let node = json!({"10": {"id": "k"}, "2": {"id": "c"}, "0": {"id": "a"}});
        assert_eq!(ids(&normalize_favorites(&node)), ["a", "c", "k"]);
    }

    #[test]
    fn array_holes_and_junk_are_skipped() {
        let node = json!([{"id": "a"}, null, 5, {"id": "b"}]);
        assert_eq!(ids(&normalize_favorites(&node)), ["a", "b"]);
    }

    #[test]
    fn put_at_root_replaces_node() {
        let mut tree = json!([{"id": "a"}]);
        apply_put(&mut tree, "/", json!([{"id": "b"}]));
        assert_eq!(ids(&normalize_favorites(&tree)), ["b"]);
    }

    #[test]
    fn put_at_child_path_updates_array_entry() {
        let mut tree = json!([{"id": "a"}, {"id": "b"}]);
        apply_put(&mut tree, "/1", json!({"id": "z"}));
        apply_put(&mut tree, "/0", Value::Null);
        assert_eq!(ids(&normalize_favorites(&tree)), ["z"]);
    }

    #[test]
    fn patch_merges_children() {
        let mut tree = json!([{"id": "a"}]);
        apply_patch(&mut tree, "/", json!({"1": {"id": "b"}}));
        assert_eq!(ids(&normalize_favorites(&tree)), ["a", "b"]);
    }
}
