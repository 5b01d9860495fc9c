//! The session pipeline: one consumer loop over engine notices, user
//! commands, and the periodic refresh tick.

use crate::config::SessionConfig;
use crate::correlator::RequestCorrelator;
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use swarmview_collection::{
    ActivityGroup, ListAdapter, SortMode, Splice, TorrentListView, TorrentStore, ViewEvent,
};
use swarmview_core::{CommandSink, EngineNotice, EngineView, TorrentId, TorrentSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Commands the embedding surface may enqueue for the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    /// Hand a quiesced watch-dir batch to the engine.
    AddTorrentFiles {
        /// Paths of the stabilized candidate files.
        paths: Vec<PathBuf>,
    },
    /// Install a sort mode by its preference key.
    SetSortMode {
        /// Preference key, e.g. `sort-by-ratio`.
        key: String,
    },
    /// Flip or restore the sort direction.
    SetSortReversed {
        /// Whether the order should be reversed.
        reversed: bool,
    },
    /// Restrict the activity filter axis by its preference key.
    SetActivityFilter {
        /// Preference key, e.g. `show-seeding`.
        key: String,
    },
    /// Restrict the tracker filter axis.
    SetTrackerFilter {
        /// Host to restrict to; `None` lifts the restriction.
        host: Option<String>,
    },
    /// Replace the free-text filter.
    SetTextFilter {
        /// New needle.
        text: String,
    },
    /// Ask the engine to start a torrent immediately.
    StartNow {
        /// Target torrent.
        id: TorrentId,
    },
    /// Probe the engine's listening port.
    PortTest {
        /// Receives whether the port is reachable.
        respond_to: oneshot::Sender<bool>,
    },
    /// Ask the engine to refresh its blocklist.
    BlocklistUpdate {
        /// Receives the new rule count, `-1` when unavailable.
        respond_to: oneshot::Sender<i64>,
    },
    /// Coalesce an eager refresh into the next loop turn.
    RefreshSoon,
}

/// Clonable, `Send` entry point for contexts outside the pipeline task.
///
/// Engine callbacks arrive on the engine's threads; pushing them through
/// this handle is the only hand-off primitive the pipeline needs, because
/// the receiving loop is the sole consumer of all mutable state.
#[derive(Clone)]
pub struct SessionHandle {
    notices: mpsc::UnboundedSender<EngineNotice>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Re-dispatch an engine notice onto the pipeline task.
    pub fn notify(&self, notice: EngineNotice) {
        if self.notices.send(notice).is_err() {
            debug!("session loop gone; notice dropped");
        }
    }

    /// Enqueue a command for the pipeline task.
    pub fn command(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            debug!("session loop gone; command dropped");
        }
    }
}

/// Handle for removing a renderer subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererSubscription(u64);

type StructuralSubscriber = Box<dyn FnMut(Splice) + Send>;
type ItemChangedSubscriber = Box<dyn FnMut(usize) + Send>;

/// The live torrent collection pipeline.
///
/// Owns the store, the sorted/filtered projection, the cursor adapter, and
/// the pending-request table, and keeps them consistent with the external
/// engine. For a given turn the order is fixed: store mutation, then the
/// transforms, then the adapter, then the renderer callbacks; one turn is
/// fully applied before the next begins.
pub struct Session {
    engine: Arc<dyn EngineView>,
    sink: Arc<dyn CommandSink>,
    store: TorrentStore,
    list: TorrentListView,
    adapter: ListAdapter,
    correlator: RequestCorrelator,
    on_structural: Vec<(RendererSubscription, StructuralSubscriber)>,
    on_item_changed: Vec<(RendererSubscription, ItemChangedSubscriber)>,
    next_subscription: u64,
    refresh_interval: std::time::Duration,
    pending_refresh: bool,
    closing: bool,
}

impl Session {
    /// Build an empty pipeline against `engine` and `sink`, with the sort
    /// and filter strategies taken from `config`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn EngineView>,
        sink: Arc<dyn CommandSink>,
        config: &SessionConfig,
    ) -> Self {
        let store = TorrentStore::new();
        let mut list = TorrentListView::new();
        list.set_sort_mode(&store, SortMode::from_key(&config.sort_mode));
        list.set_sort_reversed(config.sort_reversed);
        list.set_activity_filter(&store, ActivityGroup::from_key(&config.filter_mode));
        list.set_tracker_filter(&store, config.tracker_filter.clone());
        list.set_text_filter(&store, &config.text_filter);

        Self {
            engine,
            sink,
            store,
            list,
            adapter: ListAdapter::new(),
            correlator: RequestCorrelator::new(),
            on_structural: Vec::new(),
            on_item_changed: Vec::new(),
            next_subscription: 0,
            refresh_interval: config.refresh_interval(),
            pending_refresh: false,
            closing: false,
        }
    }

    /// Bulk-load the engine's current torrent set in one splice.
    ///
    /// # Errors
    ///
    /// Propagates collection invariant violations; the engine disappearing
    /// mid-load is tolerated per entity.
    pub fn load(&mut self) -> Result<()> {
        let mut ids = self.engine.torrent_ids();
        ids.sort_unstable();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(fields) = self.engine.torrent_fields(id) {
                items.push(TorrentSnapshot::new(id, &fields));
            }
        }
        let loaded = items.len();
        let previous = self.store.len();
        self.store
            .splice(0, previous, items)
            .context("bulk load splice")?;
        let events = self.list.rebuild(&self.store);
        self.forward(events)?;
        info!(count = loaded, "loaded torrent collection");
        Ok(())
    }

    /// Apply one engine notice to the pipeline.
    ///
    /// # Errors
    ///
    /// Propagates collection invariant violations (duplicate identity,
    /// stale position); transient absences are handled locally.
    pub fn handle_notice(&mut self, notice: EngineNotice) -> Result<()> {
        match notice {
            EngineNotice::TorrentAdded { id } => self.on_torrent_added(id),
            EngineNotice::TorrentRemoved { id } => self.on_torrent_removed(id),
            EngineNotice::TorrentChanged { id } => self.on_torrent_changed(id),
            EngineNotice::SettingsChanged => {
                debug!("engine settings changed");
                self.refresh_soon();
                Ok(())
            }
            EngineNotice::SessionClosing => {
                info!(
                    pending = self.correlator.pending_len(),
                    "engine session closing"
                );
                self.closing = true;
                Ok(())
            }
            EngineNotice::Response { payload } => {
                self.correlator.dispatch_response(&payload);
                Ok(())
            }
        }
    }

    /// Apply one user command to the pipeline.
    ///
    /// # Errors
    ///
    /// Propagates command-channel submission failures and collection
    /// invariant violations.
    pub async fn handle_command(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::AddTorrentFiles { paths } => self.add_torrent_files(paths).await,
            SessionCommand::SetSortMode { key } => {
                let events = self.list.set_sort_mode(&self.store, SortMode::from_key(&key));
                self.forward(events)
            }
            SessionCommand::SetSortReversed { reversed } => {
                let events = self.list.set_sort_reversed(reversed);
                self.forward(events)
            }
            SessionCommand::SetActivityFilter { key } => {
                let events = self
                    .list
                    .set_activity_filter(&self.store, ActivityGroup::from_key(&key));
                self.forward(events)
            }
            SessionCommand::SetTrackerFilter { host } => {
                let events = self.list.set_tracker_filter(&self.store, host);
                self.forward(events)
            }
            SessionCommand::SetTextFilter { text } => {
                let events = self.list.set_text_filter(&self.store, &text);
                self.forward(events)
            }
            SessionCommand::StartNow { id } => {
                let mut arguments = Map::new();
                arguments.insert("ids".to_string(), json!([id.0]));
                self.correlator
                    .exec(self.sink.as_ref(), "torrent-start-now", arguments)
                    .await?;
                self.refresh_soon();
                Ok(())
            }
            SessionCommand::PortTest { respond_to } => {
                self.correlator
                    .send(self.sink.as_ref(), "port-test", Map::new(), move |payload| {
                        let is_open = payload
                            .get("arguments")
                            .and_then(|arguments| arguments.get("port-is-open"))
                            .and_then(Value::as_bool)
                            .unwrap_or(false);
                        let _ = respond_to.send(is_open);
                    })
                    .await?;
                Ok(())
            }
            SessionCommand::BlocklistUpdate { respond_to } => {
                self.correlator
                    .send(
                        self.sink.as_ref(),
                        "blocklist-update",
                        Map::new(),
                        move |payload| {
                            let rule_count = payload
                                .get("arguments")
                                .and_then(|arguments| arguments.get("blocklist-size"))
                                .and_then(Value::as_i64)
                                .unwrap_or(-1);
                            let _ = respond_to.send(rule_count);
                        },
                    )
                    .await?;
                Ok(())
            }
            SessionCommand::RefreshSoon => {
                self.refresh_soon();
                Ok(())
            }
        }
    }

    /// Refresh every entity from the engine and push the outcome through
    /// the transform chain.
    ///
    /// # Errors
    ///
    /// Propagates adapter invariant violations.
    pub fn refresh_all(&mut self) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let outcome = self.store.refresh_all(|id| engine.torrent_fields(id));
        if outcome.is_empty() {
            return Ok(());
        }
        let events = self.list.on_entities_changed(&self.store, &outcome);
        self.forward(events)
    }

    /// Mark an eager refresh; any number of marks coalesce into one pass on
    /// the next loop turn.
    pub fn refresh_soon(&mut self) {
        self.pending_refresh = true;
    }

    /// Consume the coalesced eager-refresh mark.
    pub fn take_pending_refresh(&mut self) -> bool {
        std::mem::take(&mut self.pending_refresh)
    }

    /// Whether a session-closing notice has been seen.
    #[must_use]
    pub const fn closing(&self) -> bool {
        self.closing
    }

    /// Number of visible entries.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.list.len()
    }

    /// Snapshot at visible `position`, if any.
    #[must_use]
    pub fn visible_at(&self, position: usize) -> Option<TorrentSnapshot> {
        self.list
            .id_at(position)
            .and_then(|id| self.store.snapshot(id))
            .cloned()
    }

    /// The cursor adapter over the visible projection.
    #[must_use]
    pub const fn adapter(&self) -> &ListAdapter {
        &self.adapter
    }

    /// The underlying store, for read-only inspection.
    #[must_use]
    pub const fn store(&self) -> &TorrentStore {
        &self.store
    }

    /// The visible projection, for read-only inspection.
    #[must_use]
    pub const fn list(&self) -> &TorrentListView {
        &self.list
    }

    /// Number of commands still waiting for an engine reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_len()
    }

    /// Register renderer callbacks for structural and in-place changes.
    pub fn subscribe<S, I>(&mut self, on_structural: S, on_item_changed: I) -> RendererSubscription
    where
        S: FnMut(Splice) + Send + 'static,
        I: FnMut(usize) + Send + 'static,
    {
        self.next_subscription += 1;
        let id = RendererSubscription(self.next_subscription);
        self.on_structural.push((id, Box::new(on_structural)));
        self.on_item_changed.push((id, Box::new(on_item_changed)));
        id
    }

    /// Drop a renderer subscription; unknown handles are ignored.
    pub fn unsubscribe(&mut self, id: RendererSubscription) {
        self.on_structural.retain(|(handle, _)| *handle != id);
        self.on_item_changed.retain(|(handle, _)| *handle != id);
    }

    /// Drive the pipeline until the engine closes or both channels drop.
    ///
    /// Notices and commands are applied one at a time, each fully (store,
    /// transforms, adapter, renderer) before the next; the refresh interval
    /// provides the steady cadence and `refresh_soon` marks fold into the
    /// end of whichever turn set them.
    pub async fn run(
        mut self,
        mut notices: mpsc::UnboundedReceiver<EngineNotice>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        if let Err(err) = self.load() {
            warn!(error = %err, "initial collection load failed");
        }
        let mut refresh = tokio::time::interval(self.refresh_interval);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !self.closing {
            tokio::select! {
                notice = notices.recv() => match notice {
                    Some(notice) => {
                        if let Err(err) = self.handle_notice(notice) {
                            warn!(error = %err, "notice handling failed");
                        }
                    }
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(err) = self.handle_command(command).await {
                            warn!(error = %err, "command handling failed");
                        }
                    }
                    None => break,
                },
                _ = refresh.tick() => {
                    if let Err(err) = self.refresh_all() {
                        warn!(error = %err, "periodic refresh failed");
                    }
                }
            }

            if self.take_pending_refresh()
                && let Err(err) = self.refresh_all()
            {
                warn!(error = %err, "coalesced refresh failed");
            }
        }

        debug!(
            pending = self.correlator.pending_len(),
            "session loop stopped"
        );
        self
    }

    async fn add_torrent_files(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        let count = paths.len();
        for path in paths {
            let path_display = path.display().to_string();
            let mut arguments = Map::new();
            arguments.insert("filename".to_string(), Value::String(path_display.clone()));
            self.correlator
                .send(
                    self.sink.as_ref(),
                    "torrent-add",
                    arguments,
                    move |payload| {
                        let result = payload.get("result").and_then(Value::as_str).unwrap_or("");
                        let duplicate = payload
                            .get("arguments")
                            .and_then(|arguments| arguments.get("torrent-duplicate"))
                            .is_some();
                        if result != "success" {
                            warn!(path = %path_display, result, "could not add torrent file");
                        } else if duplicate {
                            // watch-dir re-discoveries are not worth nagging about
                            debug!(path = %path_display, "torrent file was already added");
                        }
                    },
                )
                .await?;
        }
        if count > 0 {
            info!(count, "submitted watch-dir batch");
            self.refresh_soon();
        }
        Ok(())
    }

    fn on_torrent_added(&mut self, id: TorrentId) -> Result<()> {
        let Some(fields) = self.engine.torrent_fields(id) else {
            debug!(torrent_id = %id, "added torrent vanished before first read");
            return Ok(());
        };
        self.store
            .insert_sorted(TorrentSnapshot::new(id, &fields))
            .context("insert reported torrent")?;
        let events = self.list.on_inserted(&self.store, id);
        self.forward(events)
    }

    fn on_torrent_removed(&mut self, id: TorrentId) -> Result<()> {
        // resolve the position once and remove by it
        let Some(position) = self.store.position_of(id) else {
            debug!(torrent_id = %id, "removed torrent was not tracked");
            return Ok(());
        };
        self.store
            .remove_at(position)
            .context("remove reported torrent")?;
        let events = self.list.on_removed(id);
        self.forward(events)
    }

    fn on_torrent_changed(&mut self, id: TorrentId) -> Result<()> {
        let Some(fields) = self.engine.torrent_fields(id) else {
            debug!(torrent_id = %id, "changed torrent vanished before read");
            return Ok(());
        };
        if let Some(outcome) = self.store.refresh_entity(id, &fields) {
            let events = self.list.on_entities_changed(&self.store, &outcome);
            self.forward(events)?;
        }
        Ok(())
    }

    fn forward(&mut self, events: Vec<ViewEvent>) -> Result<()> {
        for event in events {
            match event {
                ViewEvent::Spliced {
                    position,
                    removed,
                    added,
                } => {
                    self.adapter
                        .apply_splice(position, removed, &added)
                        .context("adapter splice")?;
                    let splice = Splice {
                        position,
                        removed,
                        added: added.len(),
                    };
                    for (_, subscriber) in &mut self.on_structural {
                        subscriber(splice);
                    }
                }
                ViewEvent::ItemChanged { position } => {
                    for (_, subscriber) in &mut self.on_item_changed {
                        subscriber(position);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Spawn the session loop on the current runtime.
///
/// Returns the cross-thread [`SessionHandle`] and the join handle, which
/// yields the session back once the loop stops.
#[must_use]
pub fn spawn(session: Session) -> (SessionHandle, JoinHandle<Session>) {
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        notices: notice_tx,
        commands: command_tx,
    };
    let join = tokio::spawn(session.run(notice_rx, command_rx));
    (handle, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmview_core::Activity;
    use swarmview_test_support::{ScriptedEngine, fields};

    fn session_over(engine: &Arc<ScriptedEngine>) -> Session {
        let view: Arc<dyn EngineView> = engine.clone();
        let sink: Arc<dyn CommandSink> = engine.clone();
        Session::new(view, sink, &SessionConfig::default())
    }

    #[tokio::test]
    async fn load_projects_the_scripted_engine() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        engine.install(TorrentId(2), fields("beta"));
        engine.install(TorrentId(1), fields("alpha"));

        let mut session = session_over(&engine);
        session.load()?;

        assert_eq!(session.visible_count(), 2);
        assert_eq!(
            session.visible_at(0).map(|snapshot| snapshot.id()),
            Some(TorrentId(1))
        );
        assert_eq!(session.adapter().position_of(TorrentId(2)), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn add_and_remove_notices_flow_to_the_adapter() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        let mut session = session_over(&engine);
        session.load()?;

        engine.install(TorrentId(5), fields("epsilon"));
        session.handle_notice(EngineNotice::TorrentAdded { id: TorrentId(5) })?;
        assert_eq!(session.visible_count(), 1);
        assert_eq!(session.adapter().position_of(TorrentId(5)), Some(0));

        engine.remove(TorrentId(5));
        session.handle_notice(EngineNotice::TorrentRemoved { id: TorrentId(5) })?;
        assert_eq!(session.visible_count(), 0);
        assert_eq!(session.adapter().position_of(TorrentId(5)), None);

        // a second removal notice for the same identity is tolerated
        session.handle_notice(EngineNotice::TorrentRemoved { id: TorrentId(5) })?;
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_add_notice_is_an_invariant_violation() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        engine.install(TorrentId(5), fields("epsilon"));

        let mut session = session_over(&engine);
        session.load()?;
        let result = session.handle_notice(EngineNotice::TorrentAdded { id: TorrentId(5) });
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn settings_notice_coalesces_into_one_refresh() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        let mut session = session_over(&engine);
        session.load()?;

        session.handle_notice(EngineNotice::SettingsChanged)?;
        session.handle_notice(EngineNotice::SettingsChanged)?;
        assert!(session.take_pending_refresh());
        assert!(!session.take_pending_refresh());
        Ok(())
    }

    #[tokio::test]
    async fn port_test_round_trips_through_the_correlator() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        let mut session = session_over(&engine);

        let (respond_to, response) = oneshot::channel();
        session
            .handle_command(SessionCommand::PortTest { respond_to })
            .await?;
        assert_eq!(session.pending_requests(), 1);

        let tag = engine.submitted()[0].tag;
        session.handle_notice(EngineNotice::Response {
            payload: json!({
                "tag": tag,
                "result": "success",
                "arguments": { "port-is-open": true },
            }),
        })?;
        assert!(response.await.expect("port test response"));
        assert_eq!(session.pending_requests(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unanswered_requests_stay_pending_for_the_session_lifetime() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        let mut session = session_over(&engine);

        session
            .handle_command(SessionCommand::StartNow { id: TorrentId(1) })
            .await?;
        session.handle_notice(EngineNotice::Response {
            payload: json!({ "tag": 999, "result": "success" }),
        })?;
        assert_eq!(session.pending_requests(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn changed_notice_refreshes_a_single_entity() -> Result<()> {
        let engine = Arc::new(ScriptedEngine::new());
        engine.install(TorrentId(1), fields("alpha"));
        engine.install(TorrentId(2), fields("beta"));

        let mut session = session_over(&engine);
        session.load()?;

        let changes = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = changes.clone();
        session.subscribe(
            |_| {},
            move |position| log.lock().expect("positions").push(position),
        );

        engine.update(TorrentId(2), |record| {
            record.activity = Activity::Downloading;
        });
        session.handle_notice(EngineNotice::TorrentChanged { id: TorrentId(2) })?;

        assert_eq!(changes.lock().expect("positions").as_slice(), [1]);
        Ok(())
    }
}
