//! Index-scoped bookkeeping of reload tasks.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::info;
use parking_lot::Mutex;

use super::task::ReloadTask;

/// Reload tasks grouped by the index that owns them.
///
/// Entries are weak: the registry never keeps a task alive. Dead entries are
/// pruned on every mutation.
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    tasks: Mutex<HashMap<String, Vec<Weak<ReloadTask>>>>,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `task` as belonging to `index`.
    pub fn register(&self, index: &str, task: &Arc<ReloadTask>) {
        let mut tasks = self.tasks.lock();
        prune(&mut tasks);
        tasks
            .entry(index.to_string())
            .or_default()
            .push(Arc::downgrade(task));
    }

    /// Stop and forget every task of `index`, returning how many were live.
    pub fn stop_index(&self, index: &str) -> usize {
        let removed = {
            let mut tasks = self.tasks.lock();
            prune(&mut tasks);
            tasks.remove(index).unwrap_or_default()
        };

        let stopped = stop_tasks(&removed);
        if stopped > 0 {
            info!("stopped {stopped} synonym reload task(s) of index [{index}]");
        }
        stopped
    }

    /// Stop and forget every task.
    pub fn stop_all(&self) -> usize {
        let removed: Vec<Weak<ReloadTask>> = {
            let mut tasks = self.tasks.lock();
            tasks.drain().flat_map(|(_, tasks)| tasks).collect()
        };
        stop_tasks(&removed)
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .flatten()
            .filter(|task| task.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices with at least one live task, sorted.
    pub fn indices(&self) -> Vec<String> {
        let mut indices: Vec<String> = self
            .tasks
            .lock()
            .iter()
            .filter(|(_, tasks)| tasks.iter().any(|task| task.strong_count() > 0))
            .map(|(index, _)| index.clone())
            .collect();
        indices.sort();
        indices
    }

    pub fn contains(&self, index: &str) -> bool {
        self.tasks
            .lock()
            .get(index)
            .is_some_and(|tasks| tasks.iter().any(|task| task.strong_count() > 0))
    }
}

/// Stop every live task, returning how many there were.
fn stop_tasks(entries: &[Weak<ReloadTask>]) -> usize {
    let mut live = 0;
    for task in entries.iter().filter_map(Weak::upgrade) {
        task.stop();
        live += 1;
    }
    live
}

fn prune(tasks: &mut HashMap<String, Vec<Weak<ReloadTask>>>) {
    tasks.retain(|_, entries| {
        entries.retain(|task| task.strong_count() > 0);
        !entries.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::error::Result;
    use crate::reload::source::SynonymSource;
    use crate::reload::task::TaskState;
    use crate::synonym::builder::SynonymTableBuilder;

    struct FixedSource;

    impl SynonymSource for FixedSource {
        fn location(&self) -> &str {
            "fixed"
        }

        fn changed(&self) -> Result<bool> {
            Ok(false)
        }

        fn fetch(&self) -> Result<String> {
            Ok("quick, fast".to_string())
        }
    }

    fn task(name: &str) -> Arc<ReloadTask> {
        Arc::new(
            ReloadTask::bootstrap(
                "index",
                name,
                Box::new(FixedSource),
                SynonymTableBuilder::new(Arc::new(StandardAnalyzer::new())),
                Duration::from_secs(60),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_stop_index() {
        let registry = ConfigurationRegistry::new();
        let a1 = task("a1");
        let a2 = task("a2");
        let b1 = task("b1");
        registry.register("a", &a1);
        registry.register("a", &a2);
        registry.register("b", &b1);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.indices(), vec!["a", "b"]);

        assert_eq!(registry.stop_index("a"), 2);
        assert!(a1.is_stopped());
        assert!(a2.is_stopped());
        assert_eq!(b1.state(), TaskState::Idle);
        assert!(!registry.contains("a"));

        assert_eq!(registry.stop_index("a"), 0);
        assert_eq!(registry.stop_index("missing"), 0);
    }

    #[test]
    fn test_registry_does_not_own_tasks() {
        let registry = ConfigurationRegistry::new();
        let kept = task("kept");
        registry.register("index", &kept);
        registry.register("index", &task("dropped"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stop_index("index"), 1);
    }

    #[test]
    fn test_stop_all() {
        let registry = ConfigurationRegistry::new();
        let a = task("a");
        let b = task("b");
        registry.register("x", &a);
        registry.register("y", &b);

        assert_eq!(registry.stop_all(), 2);
        assert!(a.is_stopped() && b.is_stopped());
        assert!(registry.is_empty());
    }
}
