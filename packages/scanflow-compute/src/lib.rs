//! scanflow-compute - server-side processing of analysis reports
//!
//! Each queued [`Task`] names a report file. A [`TaskWorker`] hands every
//! task to a fresh [`TaskContainer`], which loads the report, runs each
//! component's lines through the configured enrichers and commits one file
//! source per component in a single transaction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanflow_compute::{ComputeConfig, InMemoryTaskQueue, ServerContext, Task, TaskWorker};
//!
//! let config = ComputeConfig::from_yaml("scanflow.yaml")?;
//! scanflow_compute::logging::init_logging(&config.logging)?;
//!
//! let queue = Arc::new(InMemoryTaskQueue::new());
//! queue.push(Task::new("/var/spool/scanflow/analysis.report"));
//!
//! let parent = Arc::new(ServerContext::from_config(&config)?);
//! let stats = TaskWorker::new(queue, parent, config.workers)
//!     .run(CancellationToken::new())
//!     .await;
//! ```

pub mod config;
pub mod container;
pub mod enrichment;
pub mod error;
pub mod logging;
pub mod steps;
pub mod task;
pub mod worker;

pub use config::{ComputeConfig, ConfigError};
pub use container::{ContainerState, ResourceScope, ScopedResource, ServerContext, TaskContainer};
pub use enrichment::{EnrichedComponent, EnricherKind, LinePipeline, LineReader};
pub use error::{ComputeError, ErrorCategory, Result};
pub use steps::{ComputationStep, StepContext};
pub use task::{InMemoryTaskQueue, Task, TaskOutcome, TaskQueue, TaskStatus};
pub use worker::{TaskWorker, WorkerStats};
