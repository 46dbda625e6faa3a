//! Entity traits: identity, ownership.

use chrono::{DateTime, Utc};

use crate::id::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Human-readable entity name used in not-found / forbidden messages.
    const KIND: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Creation time; list operations order by it, newest first.
    fn created_at(&self) -> DateTime<Utc>;
}

/// An entity with exactly one owning user (its creator).
pub trait Owned: Entity {
    fn owner(&self) -> UserId;
}
