//! Row storage and the owner-scoped repository built on it.

pub mod scoped;
pub mod store;

pub use scoped::Repository;
pub use store::{EntityStore, InMemoryEntityStore};
