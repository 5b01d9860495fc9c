//! Candidate tracking and the poll loop.

use crate::error::{WatchDirError, WatchDirResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared poll cadence while candidates are tracked.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Minimum time a candidate must stay unmodified before ingestion.
const QUIESCENCE_WINDOW: Duration = Duration::from_secs(2);
/// Only files with this suffix are candidates.
const CANDIDATE_SUFFIX: &str = ".torrent";
/// Suffix appended after ingestion so the file is not re-discovered.
const INGESTED_SUFFIX: &str = ".added";

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn mark_ingested(path: &Path) {
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(INGESTED_SUFFIX);
    if let Err(err) = fs::rename(path, &renamed) {
        warn!(
            error = %err,
            path = %path.display(),
            "could not mark ingested torrent file"
        );
    }
}

/// Tracks candidate files in one directory and batches up the quiesced ones.
///
/// Discovery is event-driven ([`WatchDir::notify_created`], or a
/// [`WatchDir::scan`] over pre-existing files); quiescence is evaluated by
/// [`WatchDir::tick`] against the supplied clock. A candidate whose mtime
/// never settles simply stays tracked.
pub struct WatchDir {
    dir: PathBuf,
    tracked: Vec<PathBuf>,
    batches: mpsc::UnboundedSender<Vec<PathBuf>>,
}

impl WatchDir {
    /// Watch `dir`, delivering stabilized batches into `batches`.
    #[must_use]
    pub fn new(dir: PathBuf, batches: mpsc::UnboundedSender<Vec<PathBuf>>) -> Self {
        Self {
            dir,
            tracked: Vec::new(),
            batches,
        }
    }

    /// Number of files currently tracked.
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// Walk the directory and track every pre-existing candidate.
    ///
    /// # Errors
    ///
    /// Fails with [`WatchDirError::DirectoryUnavailable`] when the directory
    /// cannot be read.
    pub fn scan(&mut self) -> WatchDirResult<()> {
        let entries =
            fs::read_dir(&self.dir).map_err(|source| WatchDirError::DirectoryUnavailable {
                path: self.dir.clone(),
                source,
            })?;
        for entry in entries.flatten() {
            self.notify_created(entry.path());
        }
        Ok(())
    }

    /// Consider a newly created file for tracking.
    ///
    /// Non-candidate names and already-tracked paths are ignored.
    pub fn notify_created(&mut self, path: PathBuf) {
        let is_candidate = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(CANDIDATE_SUFFIX));
        if is_candidate && !self.tracked.contains(&path) {
            debug!(path = %path.display(), "tracking watch-dir candidate");
            self.tracked.push(path);
        }
    }

    /// Re-evaluate every tracked candidate against `now`.
    ///
    /// Candidates whose mtime is within the quiescence window stay tracked;
    /// the rest are delivered as one batch and renamed so a slow external
    /// tool's own monitor does not immediately re-discover them. Candidates
    /// that vanished from disk are dropped.
    pub fn tick(&mut self, now: SystemTime) {
        let mut changing = Vec::new();
        let mut stable = Vec::new();

        for path in self.tracked.drain(..) {
            let Some(mtime) = file_mtime(&path) else {
                debug!(path = %path.display(), "candidate vanished; dropped from tracking");
                continue;
            };
            let quiesced = now
                .duration_since(mtime)
                .is_ok_and(|age| age >= QUIESCENCE_WINDOW);
            if quiesced {
                stable.push(path);
            } else {
                changing.push(path);
            }
        }

        if !stable.is_empty() {
            info!(count = stable.len(), "watch-dir batch stabilized");
            if self.batches.send(stable.clone()).is_err() {
                debug!("batch consumer gone; ingestion batch dropped");
            }
            for path in &stable {
                mark_ingested(path);
            }
        }

        self.tracked = changing;
    }
}

/// Commands accepted by the spawned watch loop.
#[derive(Debug)]
pub enum WatchDirCommand {
    /// Walk the directory for pre-existing candidates.
    Scan,
    /// A file appeared in the directory (external monitor event).
    FileCreated(PathBuf),
    /// Stop the loop.
    Shutdown,
}

/// Clonable, `Send` entry point for the spawned watch loop.
#[derive(Clone)]
pub struct WatchDirHandle {
    commands: mpsc::UnboundedSender<WatchDirCommand>,
}

impl WatchDirHandle {
    /// Request a directory walk.
    pub fn scan(&self) {
        self.send(WatchDirCommand::Scan);
    }

    /// Report a newly created file.
    pub fn file_created(&self, path: PathBuf) {
        self.send(WatchDirCommand::FileCreated(path));
    }

    /// Stop the watch loop.
    pub fn shutdown(&self) {
        self.send(WatchDirCommand::Shutdown);
    }

    fn send(&self, command: WatchDirCommand) {
        if self.commands.send(command).is_err() {
            debug!("watch loop gone; command dropped");
        }
    }
}

/// Spawn the watch loop for `dir` on the current runtime.
///
/// The poll timer is lazy: while nothing is tracked the loop just waits for
/// commands, and the once-per-second evaluation only runs while candidates
/// exist — scheduling is idempotent by construction.
#[must_use]
pub fn spawn(
    dir: PathBuf,
    batches: mpsc::UnboundedSender<Vec<PathBuf>>,
) -> (WatchDirHandle, JoinHandle<()>) {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let handle = WatchDirHandle {
        commands: command_tx,
    };
    let join = tokio::spawn(async move {
        let mut watcher = WatchDir::new(dir, batches);
        loop {
            let command = if watcher.tracked_len() == 0 {
                command_rx.recv().await
            } else {
                tokio::select! {
                    command = command_rx.recv() => command,
                    () = tokio::time::sleep(POLL_INTERVAL) => {
                        watcher.tick(SystemTime::now());
                        continue;
                    }
                }
            };
            match command {
                Some(WatchDirCommand::Scan) => {
                    if let Err(err) = watcher.scan() {
                        warn!(error = %err, "watch directory scan failed");
                    }
                }
                Some(WatchDirCommand::FileCreated(path)) => watcher.notify_created(path),
                Some(WatchDirCommand::Shutdown) | None => break,
            }
        }
        debug!("watch loop stopped");
    });
    (handle, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs::File;
    use tempfile::TempDir;

    fn create_with_mtime(dir: &Path, name: &str, mtime: SystemTime) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("create candidate");
        file.set_modified(mtime).expect("set mtime");
        path
    }

    fn watcher_for(
        dir: &TempDir,
    ) -> (WatchDir, mpsc::UnboundedReceiver<Vec<PathBuf>>) {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        (WatchDir::new(dir.path().to_path_buf(), batch_tx), batch_rx)
    }

    #[test]
    fn only_candidate_suffixes_are_tracked() {
        let dir = TempDir::new().expect("tempdir");
        let (mut watcher, _batches) = watcher_for(&dir);

        watcher.notify_created(dir.path().join("linux.torrent"));
        watcher.notify_created(dir.path().join("notes.txt"));
        watcher.notify_created(dir.path().join("linux.torrent.added"));
        watcher.notify_created(dir.path().join("linux.torrent"));

        assert_eq!(watcher.tracked_len(), 1);
    }

    #[test]
    fn scan_picks_up_preexisting_candidates() -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let now = SystemTime::now();
        create_with_mtime(dir.path(), "one.torrent", now);
        create_with_mtime(dir.path(), "two.torrent", now);
        create_with_mtime(dir.path(), "ignored.dat", now);

        let (mut watcher, _batches) = watcher_for(&dir);
        watcher.scan()?;
        assert_eq!(watcher.tracked_len(), 2);
        Ok(())
    }

    #[test]
    fn scan_of_a_missing_directory_fails() {
        let dir = TempDir::new().expect("tempdir");
        let (batch_tx, _batch_rx) = mpsc::unbounded_channel();
        let mut watcher = WatchDir::new(dir.path().join("missing"), batch_tx);
        assert!(matches!(
            watcher.scan(),
            Err(WatchDirError::DirectoryUnavailable { .. })
        ));
    }

    #[test]
    fn a_file_still_being_written_stays_changing() {
        let dir = TempDir::new().expect("tempdir");
        let (mut watcher, mut batches) = watcher_for(&dir);
        let start = SystemTime::now();

        let path = create_with_mtime(dir.path(), "busy.torrent", start);
        watcher.notify_created(path.clone());

        // the mtime keeps advancing through t=5; every poll leaves it tracked
        for second in 1..=5_u64 {
            let file = File::options().write(true).open(&path).expect("reopen");
            file.set_modified(start + Duration::from_secs(second))
                .expect("advance mtime");
            watcher.tick(start + Duration::from_secs(second));
            assert_eq!(watcher.tracked_len(), 1, "still changing at t={second}");
        }
        assert!(batches.try_recv().is_err());

        // two quiet seconds after the last write it stabilizes
        watcher.tick(start + Duration::from_secs(7));
        assert_eq!(watcher.tracked_len(), 0);
        assert_eq!(batches.try_recv().expect("batch"), [path.clone()]);
    }

    #[test]
    fn stable_files_are_batched_and_marked() {
        let dir = TempDir::new().expect("tempdir");
        let (mut watcher, mut batches) = watcher_for(&dir);
        let now = SystemTime::now();

        let old = create_with_mtime(dir.path(), "done.torrent", now - Duration::from_secs(10));
        let older = create_with_mtime(dir.path(), "also.torrent", now - Duration::from_secs(20));
        let busy = create_with_mtime(dir.path(), "busy.torrent", now);
        watcher.notify_created(old.clone());
        watcher.notify_created(older.clone());
        watcher.notify_created(busy);

        watcher.tick(now);

        let batch = batches.try_recv().expect("batch");
        assert_eq!(batch.len(), 2);
        assert!(batch.contains(&old) && batch.contains(&older));
        assert_eq!(watcher.tracked_len(), 1);

        // ingested files are renamed out of candidate space
        assert!(!old.exists());
        assert!(dir.path().join("done.torrent.added").exists());
    }

    #[test]
    fn vanished_candidates_are_dropped() {
        let dir = TempDir::new().expect("tempdir");
        let (mut watcher, mut batches) = watcher_for(&dir);
        watcher.notify_created(dir.path().join("ghost.torrent"));

        watcher.tick(SystemTime::now());
        assert_eq!(watcher.tracked_len(), 0);
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_loop_polls_lazily_and_delivers_batches() {
        let dir = TempDir::new().expect("tempdir");
        let (batch_tx, mut batches) = mpsc::unbounded_channel();
        let (handle, join) = spawn(dir.path().to_path_buf(), batch_tx);

        create_with_mtime(
            dir.path(),
            "ready.torrent",
            SystemTime::now() - Duration::from_secs(30),
        );
        handle.scan();

        let batch = batches.recv().await.expect("batch delivered");
        assert_eq!(batch.len(), 1);
        assert!(dir.path().join("ready.torrent.added").exists());

        handle.shutdown();
        join.await.expect("watch loop panicked");
    }
}
