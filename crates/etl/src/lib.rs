//! Weather ETL core.
//!
//! Provides:
//! - Normalization of Yr.no and Open-Meteo payloads into canonical observations
//! - Weighted consensus across providers
//! - [`EtlPipeline`]: fetch, normalize, load and consensus in one run

pub mod consensus;
pub mod normalize;
pub mod pipeline;

pub use consensus::{calculate_consensus, ConsensusEngine, SourceWeights};
pub use normalize::{normalize, normalize_or_empty};
pub use pipeline::{EtlPipeline, PipelineReport, SourceSummary};
