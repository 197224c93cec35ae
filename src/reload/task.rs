//! One reloadable synonym configuration.
//!
//! A [`ReloadTask`] owns the source, the table builder, the live table and
//! the consumer registry of one filter configuration, and knows how to run a
//! single reload round. Scheduling rounds is the job of
//! [`ReloadWorker`](super::worker::ReloadWorker).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;
use crate::synonym::builder::SynonymTableBuilder;
use crate::synonym::map::SynonymMap;

use super::live::{ConsumerRegistry, LiveTable};
use super::source::SynonymSource;

/// Lifecycle state of a reload task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Built but not yet scheduled.
    Idle,
    /// Scheduled on a worker.
    Running,
    /// Terminal; no further reloads.
    Stopped,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Idle,
            1 => TaskState::Running,
            _ => TaskState::Stopped,
        }
    }
}

/// What a single reload round did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The task was stopped.
    Skipped,
    /// The source reported no change.
    Unchanged,
    /// A new table was published.
    Reloaded { rules: usize },
    /// Change detection, fetch or build failed; the previous table stays.
    Failed,
}

/// Counters of a reload task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    /// Rounds run while not stopped.
    pub ticks: u64,
    /// Tables published by rounds.
    pub reloads: u64,
    /// Rounds that failed.
    pub failures: u64,
    /// When the last table was published (the initial build included).
    pub last_reload: Option<DateTime<Utc>>,
    /// Number of entries in the live table.
    pub entries: usize,
}

/// The reloadable state of one filter configuration.
pub struct ReloadTask {
    index: String,
    name: String,
    interval: Duration,
    source: Box<dyn SynonymSource>,
    builder: SynonymTableBuilder,
    live: LiveTable,
    consumers: Arc<ConsumerRegistry>,
    state: AtomicU8,
    reload_lock: Mutex<()>,
    stats: Mutex<TaskStats>,
}

impl ReloadTask {
    /// Fetch and build the initial table, returning an idle task.
    ///
    /// Unlike later reloads, any failure here is returned to the caller.
    pub fn bootstrap<I, N>(
        index: I,
        name: N,
        source: Box<dyn SynonymSource>,
        builder: SynonymTableBuilder,
        interval: Duration,
    ) -> Result<Self>
    where
        I: Into<String>,
        N: Into<String>,
    {
        let index = index.into();
        let name = name.into();

        let raw = source.fetch()?;
        let table = builder.build(&raw)?;
        info!(
            "loaded {} synonym entries for [{index}/{name}] from {}",
            table.len(),
            source.location()
        );

        let stats = TaskStats {
            last_reload: Some(Utc::now()),
            entries: table.len(),
            ..TaskStats::default()
        };

        Ok(ReloadTask {
            index,
            name,
            interval,
            source,
            builder,
            live: LiveTable::new(Arc::new(table)),
            consumers: Arc::new(ConsumerRegistry::new()),
            state: AtomicU8::new(TaskState::Idle as u8),
            reload_lock: Mutex::new(()),
            stats: Mutex::new(stats),
        })
    }

    /// Run one reload round.
    pub fn tick(&self) -> TickOutcome {
        let _round = self.reload_lock.lock();
        if self.is_stopped() {
            return TickOutcome::Skipped;
        }
        self.stats.lock().ticks += 1;

        match self.reload() {
            Ok(Some(table)) => {
                // A stop that raced the build wins.
                if self.is_stopped() {
                    return TickOutcome::Skipped;
                }
                let rules = table.len();
                let table = Arc::new(table);
                let version = self.live.publish(Arc::clone(&table));
                let updated = self.consumers.broadcast(&table);
                info!(
                    "reloaded {rules} synonym entries for [{}/{}] (version {version}, {updated} active streams)",
                    self.index, self.name
                );

                let mut stats = self.stats.lock();
                stats.reloads += 1;
                stats.last_reload = Some(Utc::now());
                stats.entries = rules;
                TickOutcome::Reloaded { rules }
            }
            Ok(None) => {
                debug!("no change in {}", self.source.location());
                TickOutcome::Unchanged
            }
            Err(e) => {
                error!(
                    "failed to reload synonyms for [{}/{}] from {}: {e}",
                    self.index,
                    self.name,
                    self.source.location()
                );
                self.stats.lock().failures += 1;
                TickOutcome::Failed
            }
        }
    }

    fn reload(&self) -> Result<Option<SynonymMap>> {
        if !self.source.changed()? {
            return Ok(None);
        }
        debug!(
            "synonym source {} changed, rebuilding [{}/{}]",
            self.source.location(),
            self.index,
            self.name
        );
        let raw = self.source.fetch()?;
        self.builder.build(&raw).map(Some)
    }

    /// Stop the task. Returns `true` only for the call that stopped it.
    pub fn stop(&self) -> bool {
        let previous = self
            .state
            .swap(TaskState::Stopped as u8, Ordering::AcqRel);
        let stopped = TaskState::from_u8(previous) != TaskState::Stopped;
        if stopped {
            debug!("stopped synonym reload for [{}/{}]", self.index, self.name);
        }
        stopped
    }

    /// Move from idle to running. Returns `false` in any other state.
    pub(crate) fn mark_running(&self) -> bool {
        self.state
            .compare_exchange(
                TaskState::Idle as u8,
                TaskState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the task was stopped.
    pub fn is_stopped(&self) -> bool {
        self.state() == TaskState::Stopped
    }

    /// The table new consumers start from.
    pub fn live(&self) -> &LiveTable {
        &self.live
    }

    /// Consumers currently rewriting a stream with this task's table.
    pub fn consumers(&self) -> &Arc<ConsumerRegistry> {
        &self.consumers
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        self.source.location()
    }

    /// Snapshot of the task counters.
    pub fn stats(&self) -> TaskStats {
        self.stats.lock().clone()
    }
}

impl std::fmt::Debug for ReloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadTask")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("location", &self.source.location())
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for ReloadTask {
    fn drop(&mut self) {
        debug!("released synonym table of [{}/{}]", self.index, self.name);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::error::SynonymError;

    /// In-memory source driven by the test.
    struct ScriptedSource {
        content: Mutex<Result<String>>,
        changed: Mutex<bool>,
        fetches: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(content: &str) -> Self {
            ScriptedSource {
                content: Mutex::new(Ok(content.to_string())),
                changed: Mutex::new(false),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SynonymSource for Arc<ScriptedSource> {
        fn location(&self) -> &str {
            "memory"
        }

        fn changed(&self) -> Result<bool> {
            Ok(std::mem::take(&mut *self.changed.lock()))
        }

        fn fetch(&self) -> Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &*self.content.lock() {
                Ok(content) => Ok(content.clone()),
                Err(e) => Err(SynonymError::fetch(e.to_string())),
            }
        }
    }

    fn update(source: &ScriptedSource, content: Result<String>) {
        *source.content.lock() = content;
        *source.changed.lock() = true;
    }

    fn builder() -> SynonymTableBuilder {
        SynonymTableBuilder::new(Arc::new(StandardAnalyzer::new()))
    }

    fn task(source: &Arc<ScriptedSource>) -> ReloadTask {
        ReloadTask::bootstrap(
            "index",
            "synonym",
            Box::new(Arc::clone(source)),
            builder(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_bootstrap_failure_is_returned() {
        let source = Arc::new(ScriptedSource::new("a => "));
        let result = ReloadTask::bootstrap(
            "index",
            "synonym",
            Box::new(source),
            builder(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(SynonymError::Build(_))));
    }

    #[test]
    fn test_tick_reloads_on_change() {
        let source = Arc::new(ScriptedSource::new("quick, fast"));
        let task = task(&source);
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.live().load().len(), 2);

        assert_eq!(task.tick(), TickOutcome::Unchanged);

        update(&source, Ok("quick, fast, rapid".to_string()));
        assert_eq!(task.tick(), TickOutcome::Reloaded { rules: 3 });
        assert!(task.live().load().lookup(&["rapid"]).is_some());

        let stats = task.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.reloads, 1);
        assert_eq!(stats.entries, 3);
    }

    #[test]
    fn test_failed_reload_keeps_previous_table() {
        let source = Arc::new(ScriptedSource::new("quick, fast"));
        let task = task(&source);
        let before = task.live().load();

        update(&source, Ok("quick => ".to_string()));
        assert_eq!(task.tick(), TickOutcome::Failed);
        assert!(Arc::ptr_eq(&before, &task.live().load()));

        update(
            &source,
            Err(SynonymError::fetch("connection refused")),
        );
        assert_eq!(task.tick(), TickOutcome::Failed);
        assert!(Arc::ptr_eq(&before, &task.live().load()));
        assert_eq!(task.stats().failures, 2);
    }

    #[test]
    fn test_reload_reaches_active_consumers() {
        let source = Arc::new(ScriptedSource::new("quick, fast"));
        let task = task(&source);
        let consumer = task.consumers().attach(task.live().load());

        update(&source, Ok("quick, rapid".to_string()));
        task.tick();
        assert!(Arc::ptr_eq(&consumer.table(), &task.live().load()));
    }

    #[test]
    fn test_stop_is_terminal_and_idempotent() {
        let source = Arc::new(ScriptedSource::new("quick, fast"));
        let task = task(&source);
        assert!(task.mark_running());
        assert!(!task.mark_running());

        assert!(task.stop());
        assert!(!task.stop());
        assert!(!task.mark_running());
        assert_eq!(task.state(), TaskState::Stopped);

        let fetches = source.fetches.load(Ordering::SeqCst);
        update(&source, Ok("quick, rapid".to_string()));
        assert_eq!(task.tick(), TickOutcome::Skipped);
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches);
    }

    #[test]
    fn test_concurrent_stop_has_one_winner() {
        let source = Arc::new(ScriptedSource::new("quick, fast"));
        let task = Arc::new(task(&source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let task = Arc::clone(&task);
                thread::spawn(move || task.stop())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|stopped| *stopped)
            .count();
        assert_eq!(winners, 1);
    }
}
