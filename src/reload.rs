//! Hot reloading of synonym tables.
//!
//! # Components
//!
//! - [`source`] - Change detection and retrieval for local files and HTTP URLs
//! - [`live`] - Atomic publication of the current table and the consumer registry
//! - [`task`] - One reloadable configuration and its reload round
//! - [`worker`] - The shared background thread scheduling reload rounds
//! - [`registry`] - Tasks grouped by index, for lifecycle-driven shutdown
//!
//! ```text
//! worker ──tick──> task ──changed?/fetch──> source
//!                   │
//!                   ├─build──> SynonymMap
//!                   ├─publish──> LiveTable          (new streams)
//!                   └─broadcast──> ConsumerRegistry (active streams)
//! ```

pub mod live;
pub mod registry;
pub mod source;
pub mod task;
pub mod worker;

pub use live::{ConsumerHandle, ConsumerRegistry, LiveTable};
pub use registry::ConfigurationRegistry;
pub use source::{LocalSynonymSource, RemoteSynonymSource, SynonymSource, open_source};
pub use task::{ReloadTask, TaskState, TaskStats, TickOutcome};
pub use worker::ReloadWorker;
