//! Tag-keyed request/response correlation.

use serde_json::{Map, Value};
use std::collections::HashMap;
use swarmview_core::{CommandRequest, CommandSink, Tag};
use tracing::{debug, warn};

type ResponseHandler = Box<dyn FnOnce(&Value) + Send>;

/// Demultiplexer for the engine's single shared reply channel.
///
/// Each outgoing command gets a strictly increasing tag; the reply echoes
/// the tag and is routed back to the recorded handler, which runs exactly
/// once. Replies with unknown tags are logged and discarded. A command the
/// engine never answers leaves its entry in the table for the life of the
/// session; there is deliberately no timeout here, and retries are the
/// caller's responsibility.
#[derive(Default)]
pub struct RequestCorrelator {
    next_tag: Tag,
    pending: HashMap<Tag, Option<ResponseHandler>>,
}

impl RequestCorrelator {
    /// Correlator with no outstanding requests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_tag: 0,
            pending: HashMap::new(),
        }
    }

    /// Number of requests still waiting for a reply.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Submit a command and register `on_response` for its reply.
    ///
    /// # Errors
    ///
    /// Returns the sink's error when the request could not be enqueued; the
    /// pending entry is rolled back so the tag does not leak.
    pub async fn send<F>(
        &mut self,
        sink: &dyn CommandSink,
        method: &str,
        arguments: Map<String, Value>,
        on_response: F,
    ) -> anyhow::Result<Tag>
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.dispatch(sink, method, arguments, Some(Box::new(on_response)))
            .await
    }

    /// Submit a command whose reply carries no information the pipeline
    /// cares about. The entry is still tracked so a reply is consumed
    /// silently instead of logging an unknown tag.
    ///
    /// # Errors
    ///
    /// Returns the sink's error when the request could not be enqueued.
    pub async fn exec(
        &mut self,
        sink: &dyn CommandSink,
        method: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<Tag> {
        self.dispatch(sink, method, arguments, None).await
    }

    /// Route one reply payload back to its pending handler.
    ///
    /// Unknown, duplicate, or foreign tags are discarded after a log line; a
    /// handler is never invoked twice.
    pub fn dispatch_response(&mut self, payload: &Value) {
        let Some(tag) = payload.get("tag").and_then(Value::as_i64) else {
            debug!("discarding untagged response payload");
            return;
        };
        match self.pending.remove(&tag) {
            Some(Some(handler)) => handler(payload),
            Some(None) => {}
            None => warn!(tag, "pending request for tag not found"),
        }
    }

    async fn dispatch(
        &mut self,
        sink: &dyn CommandSink,
        method: &str,
        arguments: Map<String, Value>,
        handler: Option<ResponseHandler>,
    ) -> anyhow::Result<Tag> {
        self.next_tag += 1;
        let tag = self.next_tag;
        self.pending.insert(tag, handler);

        let request = CommandRequest::new(method, arguments, tag);
        if let Err(err) = sink.submit(request).await {
            self.pending.remove(&tag);
            return Err(err);
        }
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use swarmview_core::CommandSink;

    #[derive(Default)]
    struct RecordingSink {
        requests: std::sync::Mutex<Vec<CommandRequest>>,
    }

    #[async_trait::async_trait]
    impl CommandSink for RecordingSink {
        async fn submit(&self, request: CommandRequest) -> Result<()> {
            self.requests.lock().expect("requests").push(request);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl CommandSink for FailingSink {
        async fn submit(&self, _request: CommandRequest) -> Result<()> {
            anyhow::bail!("sink closed")
        }
    }

    #[tokio::test]
    async fn tags_increase_and_embed_into_requests() -> Result<()> {
        let sink = RecordingSink::default();
        let mut correlator = RequestCorrelator::new();

        let first = correlator.exec(&sink, "port-test", Map::new()).await?;
        let second = correlator.exec(&sink, "blocklist-update", Map::new()).await?;
        assert!(second > first);

        let requests = sink.requests.lock().expect("requests");
        assert_eq!(requests[0].tag, first);
        assert_eq!(requests[1].tag, second);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_order_replies_fire_exactly_once() -> Result<()> {
        let sink = RecordingSink::default();
        let mut correlator = RequestCorrelator::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let first = correlator
            .send(&sink, "port-test", Map::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await?;
        let counter = fired.clone();
        let second = correlator
            .send(&sink, "port-test", Map::new(), move |_| {
                counter.fetch_add(10, Ordering::SeqCst);
            })
            .await?;
        assert_eq!(correlator.pending_len(), 2);

        // the later command answers first
        correlator.dispatch_response(&json!({ "tag": second, "result": "success" }));
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert_eq!(correlator.pending_len(), 1);

        // an unknown tag is discarded without touching the other entry
        correlator.dispatch_response(&json!({ "tag": 999, "result": "success" }));
        assert_eq!(correlator.pending_len(), 1);

        correlator.dispatch_response(&json!({ "tag": first, "result": "success" }));
        assert_eq!(fired.load(Ordering::SeqCst), 11);
        assert_eq!(correlator.pending_len(), 0);

        // a duplicate reply cannot re-fire the handler
        correlator.dispatch_response(&json!({ "tag": first, "result": "success" }));
        assert_eq!(fired.load(Ordering::SeqCst), 11);
        Ok(())
    }

    #[tokio::test]
    async fn failed_submission_rolls_back_the_pending_entry() {
        let mut correlator = RequestCorrelator::new();
        let result = correlator
            .send(&FailingSink, "port-test", Map::new(), |_| {})
            .await;
        assert!(result.is_err());
        assert_eq!(correlator.pending_len(), 0);
    }

    #[tokio::test]
    async fn untagged_payloads_are_ignored() -> Result<()> {
        let sink = RecordingSink::default();
        let mut correlator = RequestCorrelator::new();
        correlator.send(&sink, "port-test", Map::new(), |_| {}).await?;
        correlator.dispatch_response(&json!({ "result": "success" }));
        assert_eq!(correlator.pending_len(), 1);
        Ok(())
    }
}
