//! Request-path orchestrators. Each validates, persists and enqueues; none
//! waits for a job to finish.

pub mod ai;
pub mod assets;
pub mod auth;
pub mod email;
pub mod projects;
pub mod reports;
pub mod users;

pub use ai::AiService;
pub use assets::{AssetFilter, AssetsService, BulkImportRequest, ResidualSubmission};
pub use auth::{AuthService, CustomerSignup, PasswordResetRequested, SignUp};
pub use email::EmailService;
pub use projects::{ProjectFilter, ProjectsService};
pub use reports::{REPORT_TYPE_KEY, ReportFilter, ReportRequested, ReportsService};
pub use users::{InviteUser, UserStats, UsersService};
