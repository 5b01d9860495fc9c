//! Interfaces to the external torrent engine.
//!
//! The engine itself lives outside this workspace; the pipeline only ever
//! touches it through the traits here. Queries are synchronous accessor
//! calls; mutations travel over an asynchronous JSON-like command channel
//! whose replies come back later through the shared notice stream.

use crate::model::{TorrentFields, TorrentId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Correlation key embedded in an outgoing command and echoed in its reply.
pub type Tag = i64;

/// Synchronous read access to the engine's current torrent set.
pub trait EngineView: Send + Sync {
    /// Identities of every torrent the engine currently tracks.
    fn torrent_ids(&self) -> Vec<TorrentId>;

    /// Number of torrents the engine currently tracks.
    fn torrent_count(&self) -> usize;

    /// Read the full attribute record for one torrent.
    ///
    /// Returns `None` when the identity is unknown, which is an expected
    /// outcome during teardown races, not an error.
    fn torrent_fields(&self, id: TorrentId) -> Option<TorrentFields>;
}

/// One request on the engine's asynchronous command channel.
///
/// Serializes to the engine's RPC dictionary shape: a `method` string, an
/// `arguments` map, and the caller-chosen `tag` echoed back in the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// RPC method name, e.g. `torrent-start-now`.
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Correlation tag echoed back in the reply.
    pub tag: Tag,
}

impl CommandRequest {
    /// Build a request for `method` carrying `arguments` under `tag`.
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: Map<String, Value>, tag: Tag) -> Self {
        Self {
            method: method.into(),
            arguments,
            tag,
        }
    }
}

/// Write access to the engine's asynchronous command channel.
///
/// Submission only enqueues; the reply, if any, arrives later as an
/// [`EngineNotice::Response`] on the shared notice stream.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Forward one request to the engine.
    ///
    /// # Errors
    ///
    /// Returns an error when the request could not be enqueued (for example,
    /// the engine is shutting down). Delivery is otherwise fire-and-forget.
    async fn submit(&self, request: CommandRequest) -> anyhow::Result<()>;
}

/// Asynchronous notification delivered by the engine.
///
/// These arrive from the engine's own execution contexts and must be
/// re-dispatched onto the pipeline thread before any shared state is
/// touched; `SessionHandle` in `swarmview-session` is that hand-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineNotice {
    /// The engine started tracking a new torrent.
    TorrentAdded {
        /// Identity of the new torrent.
        id: TorrentId,
    },
    /// The engine stopped tracking a torrent.
    TorrentRemoved {
        /// Identity of the removed torrent.
        id: TorrentId,
    },
    /// A torrent mutated outside the regular refresh cadence.
    TorrentChanged {
        /// Identity of the changed torrent.
        id: TorrentId,
    },
    /// Engine-wide settings changed.
    SettingsChanged,
    /// The engine is shutting down; no further notices will follow.
    SessionClosing,
    /// Reply to an earlier command, correlated by its embedded tag.
    Response {
        /// Raw reply payload.
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_request_serializes_to_rpc_dict_shape() {
        let mut arguments = Map::new();
        arguments.insert("ids".to_string(), json!([7]));
        let request = CommandRequest::new("torrent-start-now", arguments, 3);

        let value = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(
            value,
            json!({
                "method": "torrent-start-now",
                "arguments": { "ids": [7] },
                "tag": 3,
            })
        );
    }

    #[test]
    fn notice_round_trips_through_serde() {
        let notice = EngineNotice::TorrentAdded { id: TorrentId(9) };
        let json = serde_json::to_string(&notice).expect("serialize notice");
        let back: EngineNotice = serde_json::from_str(&json).expect("deserialize notice");
        assert_eq!(back, notice);
    }
}
