//! The background thread that drives reload rounds.
//!
//! All tasks share one thread. Due times live in a min-heap; the thread
//! sleeps on the control channel until the earliest one, so scheduling or
//! shutting down wakes it immediately.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::error::{Result, SynonymError};

use super::task::{ReloadTask, TickOutcome};

/// Counter distinguishing the threads of successive workers.
static WORKER_SEQ: AtomicUsize = AtomicUsize::new(1);

enum Command {
    Schedule(Weak<ReloadTask>, Duration),
    Shutdown,
}

/// An entry of the deadline queue.
struct Scheduled {
    due: Instant,
    seq: u64,
    interval: Duration,
    task: Weak<ReloadTask>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Single background thread running the reload rounds of every task.
///
/// The worker only holds weak references: a task whose owners are gone, or
/// which was stopped, is dropped from the queue the next time it comes due.
#[derive(Debug)]
pub struct ReloadWorker {
    name: String,
    sender: Sender<Command>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ReloadWorker {
    /// Start a worker thread named `{prefix}-{n}`.
    pub fn spawn(prefix: &str) -> Result<Self> {
        let name = format!("{prefix}-{}", WORKER_SEQ.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = unbounded::<Command>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut queue: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();
                let mut seq = 0u64;

                loop {
                    let command = match queue.peek() {
                        Some(Reverse(next)) => match receiver.recv_deadline(next.due) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => break,
                        },
                        None => match receiver.recv() {
                            Ok(command) => Some(command),
                            Err(_) => break,
                        },
                    };

                    match command {
                        Some(Command::Schedule(task, interval)) => {
                            seq += 1;
                            queue.push(Reverse(Scheduled {
                                due: Instant::now() + interval,
                                seq,
                                interval,
                                task,
                            }));
                        }
                        Some(Command::Shutdown) => break,
                        None => run_due(&mut queue, &mut seq),
                    }
                }
                debug!("reload worker exiting with {} queued tasks", queue.len());
            })
            .map_err(|e| SynonymError::worker(format!("failed to spawn {name}: {e}")))?;

        info!("started synonym reload worker {name}");
        Ok(ReloadWorker {
            name,
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Thread name of this worker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedule `task` at a fixed rate of its interval, first round one
    /// interval from now.
    ///
    /// Returns `Ok(false)` if the task was not idle (already scheduled or
    /// stopped).
    pub fn schedule(&self, task: &Arc<ReloadTask>) -> Result<bool> {
        if !self.is_running() {
            return Err(SynonymError::worker(format!("{} is shut down", self.name)));
        }
        if !task.mark_running() {
            return Ok(false);
        }
        self.sender
            .send(Command::Schedule(Arc::downgrade(task), task.interval()))
            .map_err(|_| SynonymError::worker(format!("{} is not accepting tasks", self.name)))?;

        debug!(
            "scheduled synonym reload for [{}/{}] every {:?}",
            task.index(),
            task.name(),
            task.interval()
        );
        Ok(true)
    }

    /// Whether the thread is still accepting tasks.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Stop the thread and wait for it. Subsequent calls do nothing.
    pub fn shutdown(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.sender.send(Command::Shutdown);
        if handle.join().is_err() {
            error!("reload worker {} terminated abnormally", self.name);
        }
        info!("stopped synonym reload worker {}", self.name);
    }
}

impl Drop for ReloadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run every task that is due and put live ones back in the queue.
fn run_due(queue: &mut BinaryHeap<Reverse<Scheduled>>, seq: &mut u64) {
    let now = Instant::now();
    while queue
        .peek()
        .is_some_and(|Reverse(next)| next.due <= now)
    {
        let Some(Reverse(entry)) = queue.pop() else {
            break;
        };
        let Some(task) = entry.task.upgrade() else {
            debug!("dropping reload entry of a released task");
            continue;
        };
        if task.is_stopped() {
            continue;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| task.tick())) {
            Ok(TickOutcome::Skipped) => continue,
            Ok(_) => {}
            Err(_) => warn!(
                "synonym reload for [{}/{}] panicked",
                task.index(),
                task.name()
            ),
        }

        // Fixed rate; a round that overran resumes from now rather than bursting.
        let finished = Instant::now();
        let mut due = entry.due + entry.interval;
        if due <= finished {
            due = finished + entry.interval;
        }
        *seq += 1;
        queue.push(Reverse(Scheduled {
            due,
            seq: *seq,
            interval: entry.interval,
            task: entry.task,
        }));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::reload::source::LocalSynonymSource;
    use crate::synonym::builder::SynonymTableBuilder;

    fn task(dir: &TempDir, interval: Duration) -> Arc<ReloadTask> {
        let path = dir.path().join("synonym.txt");
        fs::write(&path, "quick, fast\n").unwrap();
        Arc::new(
            ReloadTask::bootstrap(
                "index",
                "synonym",
                Box::new(LocalSynonymSource::new(path)),
                SynonymTableBuilder::new(Arc::new(StandardAnalyzer::new())),
                interval,
            )
            .unwrap(),
        )
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_thread_name() {
        let worker = ReloadWorker::spawn("monitor-synonym").unwrap();
        assert!(worker.name().starts_with("monitor-synonym-"));
    }

    #[test]
    fn test_scheduled_task_ticks() {
        let dir = TempDir::new().unwrap();
        let task = task(&dir, Duration::from_millis(20));
        let worker = ReloadWorker::spawn("test-worker").unwrap();

        assert!(worker.schedule(&task).unwrap());
        assert!(!worker.schedule(&task).unwrap());
        assert!(wait_for(|| task.stats().ticks >= 3));
        worker.shutdown();
    }

    #[test]
    fn test_stopped_task_is_not_ticked() {
        let dir = TempDir::new().unwrap();
        let task = task(&dir, Duration::from_millis(20));
        let worker = ReloadWorker::spawn("test-worker").unwrap();
        worker.schedule(&task).unwrap();
        assert!(wait_for(|| task.stats().ticks >= 1));

        task.stop();
        let ticks = task.stats().ticks;
        thread::sleep(Duration::from_millis(100));
        assert_eq!(task.stats().ticks, ticks);
    }

    #[test]
    fn test_released_task_does_not_keep_worker_busy() {
        let dir = TempDir::new().unwrap();
        let task = task(&dir, Duration::from_millis(10));
        let weak = Arc::downgrade(&task);
        let worker = ReloadWorker::spawn("test-worker").unwrap();
        worker.schedule(&task).unwrap();

        drop(task);
        assert!(wait_for(|| weak.upgrade().is_none()));
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let worker = ReloadWorker::spawn("test-worker").unwrap();
        worker.shutdown();
        worker.shutdown();

        assert!(!worker.is_running());
        assert!(worker.schedule(&task(&dir, Duration::from_secs(1))).is_err());
    }
}
