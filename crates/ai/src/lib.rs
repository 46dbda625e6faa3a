//! `ami-ai`
//!
//! **Responsibility:** AI-assisted valuation boundary.
//!
//! - The external model sits behind the [`Scorer`] trait; [`HttpScorer`] is the
//!   generic JSON-over-HTTP implementation.
//! - Every analysis kind has a deterministic local heuristic, so a caller always
//!   gets an estimate.
//! - Results are an explicit [`Assessment`]: `Scored` when the scorer answered,
//!   `Fallback` (with the reason) when the heuristic stood in.
//! - This crate never touches storage; callers persist what it returns.

pub mod analyzer;
pub mod heuristics;
pub mod http;
pub mod result;
pub mod scorer;

pub use analyzer::{AnalysisKind, Analyzer};
pub use http::HttpScorer;
pub use result::{AiError, Assessment, Estimate};
pub use scorer::{ScoreRequest, Scorer, UnconfiguredScorer};
