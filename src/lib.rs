//! Touch Analyzer - event statistics for touch-screen interaction logs
//!
//! Logs are CSV files of `Time(ms), TouchX, TouchY, Layer Name` rows. The
//! analyzer runs a deterministic pipeline over them: load and combine →
//! classify layer names → reconstruct flicks on the unfiltered table →
//! filter by time range and exclude keywords → aggregate.
//!
//! A flick pairs a SWIPE with the nearest preceding non-SWIPE record. It is
//! counted once, by its SWIPE terminal, and its start never counts as a
//! standalone touch, whatever the filter keeps.
//!
//! ## Modules
//!
//! - **Store**: CSV loading, validation and the `data_dir/<user>/*.csv` layout
//! - **Classifier / Flick / Filter / Aggregator**: the analysis stages
//! - **Pipeline**: one-shot [`analyze`] and the memoizing [`AnalysisSession`]
//! - **Spatial / Report**: heatmap, flow path, timeline and text report

pub mod aggregator;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod flick;
pub mod pipeline;
pub mod report;
pub mod spatial;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{Aggregator, Stats};
pub use config::Config;
pub use error::AnalyzerError;
pub use filter::FilterSpec;
pub use flick::FlickIndex;
pub use pipeline::{analyze, analyze_files, AnalysisOutcome, AnalysisSession, AnalysisView};
pub use store::Loader;
pub use types::{Category, EventRecord, EventTable, FlickUnit, RecordId, TimeRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
