//! # Image Reducer Library
//!
//! Batch image compression against a target file size, with a persisted handoff of the results
//! to a separate results step.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `selection`: Bounded set of images waiting to be compressed
//! - `compress`: Compressor trait and the target-size implementation
//! - `batch`: Sequential batch orchestration with a progress event stream
//! - `store`: Result handoff store with its storage backends
//! - `results`: Results view model, single download and zip export
//! - `session`: Upload session state machine tying the pieces together
//! - `config`: Run configuration and target-size validation
//! - `telemetry`: Logging setup for the binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Mutex;
//!
//! use image_reducer::batch::ProgressEvent;
//! use image_reducer::config::ReduceConfig;
//! use image_reducer::session::{Session, StartOutcome};
//! use image_reducer::store::{FileStorage, HandoffStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReduceConfig::default();
//! let handoff = Mutex::new(HandoffStore::new(FileStorage::new(&config.data_dir)));
//!
//! let mut session = Session::from_config(&config);
//! session.add_paths(&["photo.jpg", "scan.png"]);
//!
//! let sink = |event: &ProgressEvent| println!("{}", event.status());
//! if let StartOutcome::Completed { outcome, .. } =
//!     session.start(&mut |_: &str| true, &sink, &handoff).await?
//! {
//!     println!("{} image(s) compressed", outcome.results.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod compress;
pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod results;
pub mod selection;
pub mod session;
pub mod store;
pub mod telemetry;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, HasSeverity, Recoverable, ReduceError, ReduceResult};

pub use batch::{BatchOrchestrator, BatchOutcome, BatchRun, ProgressEvent, ProgressSink};
pub use compress::{CompressionConstraints, Compressor, TargetSizeCompressor};
pub use config::{ReduceConfig, TargetSize};
pub use model::CompressedResult;
pub use selection::{MAX_SELECTION, Selection, SourceImage};
pub use store::{HandoffStore, StoreView};
