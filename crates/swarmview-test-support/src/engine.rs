//! Scriptable in-memory engine double.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use swarmview_core::{CommandRequest, CommandSink, EngineView, TorrentFields, TorrentId};

/// In-memory stand-in for the external engine.
///
/// Tests mutate the scripted torrent set directly and drive the pipeline's
/// refresh against it; submitted commands are recorded for assertions
/// instead of being executed.
#[derive(Default)]
pub struct ScriptedEngine {
    torrents: Mutex<BTreeMap<TorrentId, TorrentFields>>,
    submitted: Mutex<Vec<CommandRequest>>,
}

impl ScriptedEngine {
    /// Empty engine double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a torrent into the engine's current set.
    ///
    /// # Panics
    ///
    /// Panics if the scripted state mutex is poisoned.
    pub fn install(&self, id: TorrentId, fields: TorrentFields) {
        self.torrents
            .lock()
            .expect("scripted state poisoned")
            .insert(id, fields);
    }

    /// Mutate one scripted torrent in place; unknown identities are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the scripted state mutex is poisoned.
    pub fn update<F>(&self, id: TorrentId, mutate: F)
    where
        F: FnOnce(&mut TorrentFields),
    {
        if let Some(fields) = self
            .torrents
            .lock()
            .expect("scripted state poisoned")
            .get_mut(&id)
        {
            mutate(fields);
        }
    }

    /// Drop one torrent from the scripted set.
    ///
    /// # Panics
    ///
    /// Panics if the scripted state mutex is poisoned.
    pub fn remove(&self, id: TorrentId) {
        self.torrents
            .lock()
            .expect("scripted state poisoned")
            .remove(&id);
    }

    /// Commands submitted so far, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the submission log mutex is poisoned.
    #[must_use]
    pub fn submitted(&self) -> Vec<CommandRequest> {
        self.submitted
            .lock()
            .expect("submission log poisoned")
            .clone()
    }
}

impl EngineView for ScriptedEngine {
    fn torrent_ids(&self) -> Vec<TorrentId> {
        self.torrents
            .lock()
            .expect("scripted state poisoned")
            .keys()
            .copied()
            .collect()
    }

    fn torrent_count(&self) -> usize {
        self.torrents.lock().expect("scripted state poisoned").len()
    }

    fn torrent_fields(&self, id: TorrentId) -> Option<TorrentFields> {
        self.torrents
            .lock()
            .expect("scripted state poisoned")
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl CommandSink for ScriptedEngine {
    async fn submit(&self, request: CommandRequest) -> Result<()> {
        self.submitted
            .lock()
            .expect("submission log poisoned")
            .push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::fields;

    #[test]
    fn scripted_state_round_trips() {
        let engine = ScriptedEngine::new();
        engine.install(TorrentId(3), fields("three"));
        engine.install(TorrentId(1), fields("one"));

        assert_eq!(engine.torrent_count(), 2);
        assert_eq!(engine.torrent_ids(), [TorrentId(1), TorrentId(3)]);
        assert_eq!(
            engine.torrent_fields(TorrentId(3)).map(|f| f.name),
            Some("three".to_string())
        );
        assert!(engine.torrent_fields(TorrentId(9)).is_none());

        engine.update(TorrentId(1), |record| record.speed_up_kbps = 12.0);
        let updated = engine.torrent_fields(TorrentId(1)).expect("fields");
        assert!((updated.speed_up_kbps - 12.0).abs() < f32::EPSILON);

        engine.remove(TorrentId(1));
        assert_eq!(engine.torrent_count(), 1);
    }
}
