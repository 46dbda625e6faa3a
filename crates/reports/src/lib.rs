//! Reports domain module.
//!
//! A report is requested in `generating`, and a background job moves it to
//! exactly one terminal state. Payloads are produced by pure builder
//! functions looked up by [`ReportType`].

pub mod builders;
pub mod report;
pub mod report_type;

pub use builders::{BuildError, BuilderRegistry, ReportBuilder, ReportInput};
pub use report::{NewReport, Report, ReportArtifact, ReportDownload, ReportPatch, ReportStats, ReportStatus};
pub use report_type::ReportType;
