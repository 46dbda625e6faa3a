//! Projects domain module.

pub mod project;

pub use project::{NewProject, Project, ProjectPatch, ProjectStats, ProjectStatus};
