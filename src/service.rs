//! Process-wide state shared by every dynamic synonym filter.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::reload::registry::ConfigurationRegistry;
use crate::reload::source::{SynonymSource, open_source};
use crate::reload::task::ReloadTask;
use crate::reload::worker::ReloadWorker;

/// Host lifecycle notifications relevant to reload tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IndexEvent {
    /// A shard of the index was closed.
    ShardClosed { index: String, shard: u32 },
    /// A shard of the index was deleted.
    ShardDeleted { index: String, shard: u32 },
    /// The whole index was removed.
    IndexRemoved { index: String },
}

impl IndexEvent {
    /// The index the event is about.
    pub fn index(&self) -> &str {
        match self {
            IndexEvent::ShardClosed { index, .. }
            | IndexEvent::ShardDeleted { index, .. }
            | IndexEvent::IndexRemoved { index } => index,
        }
    }
}

/// The reload worker and configuration registry of one process.
///
/// Create one per process (or per test) and share it with every filter
/// factory.
#[derive(Debug)]
pub struct SynonymService {
    config: ServiceConfig,
    registry: ConfigurationRegistry,
    worker: ReloadWorker,
}

impl SynonymService {
    /// Start the service and its worker thread.
    pub fn new(config: ServiceConfig) -> Result<Arc<Self>> {
        let worker = ReloadWorker::spawn(&config.worker_name)?;
        Ok(Arc::new(SynonymService {
            config,
            registry: ConfigurationRegistry::new(),
            worker,
        }))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConfigurationRegistry {
        &self.registry
    }

    pub fn worker(&self) -> &ReloadWorker {
        &self.worker
    }

    /// Open a synonym source with this service's path resolution and timeout.
    pub fn open_source(&self, location: &str) -> Result<Box<dyn SynonymSource>> {
        open_source(
            location,
            self.config.config_dir.as_deref(),
            self.config.fetch_timeout(),
        )
    }

    /// Register `task` under its index and schedule it.
    ///
    /// Returns `Ok(false)` if the task was already scheduled or stopped.
    pub fn start(&self, task: &Arc<ReloadTask>) -> Result<bool> {
        if !self.worker.schedule(task)? {
            return Ok(false);
        }
        self.registry.register(task.index(), task);
        Ok(true)
    }

    /// React to a host lifecycle event, returning the number of tasks stopped.
    pub fn on_index_event(&self, event: &IndexEvent) -> usize {
        let stopped = self.registry.stop_index(event.index());
        if stopped > 0 {
            info!("{event:?} stopped {stopped} synonym reload task(s)");
        }
        stopped
    }

    /// Stop every task and the worker thread.
    pub fn shutdown(&self) {
        let stopped = self.registry.stop_all();
        info!("shutting down synonym service, {stopped} task(s) stopped");
        self.worker.shutdown();
    }
}
