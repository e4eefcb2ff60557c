//! phbench-eval library interface
//!
//! Benchmarks machine-learned force-field phonon predictions against a DFT
//! reference. Data flows one way:
//! cache -> aggregator -> summary -> metrics engine -> export

pub mod aggregator;
pub mod cache;
pub mod codec;
pub mod error;
pub mod export;
pub mod key;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod stats;
pub mod summary;

pub use crate::aggregator::{Aggregator, MaterialIndex, MaterialRecord};
pub use crate::cache::{CacheStats, DocumentCache, Fetcher, StorageRoot};
pub use crate::codec::read_document;
pub use crate::error::{EvalError, EvalResult, FetchError};
pub use crate::key::StorageKey;
pub use crate::metrics::{MetricKey, MetricsEngine, MetricsKind, MetricsTable};
pub use crate::models::{BandStructure, HighSymmetryPoint, PhononDocument, PhononDos};
pub use crate::pipeline::{evaluate, evaluate_summary, load_or_build_summary, Evaluation};
pub use crate::stats::MetricValue;
pub use crate::summary::{FlagField, NumericField, SummaryRow, SummaryTable};
