//! # cw-pipeline
//!
//! The ingestion-normalization-analysis pipeline: per-run fetch
//! orchestration (adapter → content-hash gate → processor → publish),
//! the normalizer registry, and the subscriber workers that carry
//! fetched batches into analyzers and analysis findings into the alert
//! aggregator.
//!
//! ```text
//! scheduler ─▶ FetchRunner::run ─▶ gate ─▶ Processor ─▶ bus: *.fetched
//!                                                          │
//!                              AnalyzerWorker ◀────────────┘
//!                                   │
//!                                   ▼ bus: *.analysis
//!                            AggregatorWorker ─▶ alert store
//! ```

pub mod config;
pub mod logging;
pub mod normalize;
pub mod runner;
pub mod worker;

pub use config::PipelineConfig;
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use normalize::{
    DataFetchPayload, NormalizeError, NormalizerEntry, NormalizerRegistry, Processor,
};
pub use runner::{FetchRunner, RunError, RunReport};
pub use worker::{AggregatorWorker, AnalyzerWorker, WorkerError};
