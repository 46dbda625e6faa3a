use std::sync::Arc;

use ami_auth::{Actor, access_scope, require_owner};
use ami_core::{DomainError, DomainResult, ExpectedVersion, Owned, Page, PageRequest, Versioned};

use super::store::EntityStore;

/// Owner-scoped access to one entity type.
///
/// Reads apply the actor's [`ami_auth::AccessScope`]: rows outside it look
/// exactly like rows that do not exist. Writes first resolve the row without
/// scope so a foreign row is reported as forbidden, not missing.
pub struct Repository<V: Owned> {
    store: Arc<dyn EntityStore<V>>,
}

impl<V: Owned> Clone for Repository<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<V> Repository<V>
where
    V: Owned + Versioned + Clone,
{
    pub fn new(store: Arc<dyn EntityStore<V>>) -> Self {
        Self { store }
    }

    pub fn insert(&self, value: V) -> DomainResult<V> {
        self.store.insert(value)
    }

    /// The row, if the actor may see it.
    pub fn find(&self, actor: &Actor, id: &V::Id) -> DomainResult<V> {
        match self.store.get(id)? {
            Some(row) if access_scope(actor, row.owner()).permits() => Ok(row),
            _ => Err(DomainError::not_found(V::KIND)),
        }
    }

    /// Every visible row matching `filter`, newest first.
    pub fn visible(&self, actor: &Actor, filter: &dyn Fn(&V) -> bool) -> DomainResult<Vec<V>> {
        let mut rows = self
            .store
            .scan(&|row: &V| access_scope(actor, row.owner()).permits() && filter(row))?;
        newest_first(&mut rows);
        Ok(rows)
    }

    pub fn list(
        &self,
        actor: &Actor,
        request: PageRequest,
        filter: &dyn Fn(&V) -> bool,
    ) -> DomainResult<Page<V>> {
        Ok(Page::from_sorted(self.visible(actor, filter)?, request))
    }

    pub fn count(&self, actor: &Actor, filter: &dyn Fn(&V) -> bool) -> DomainResult<usize> {
        Ok(self.visible(actor, filter)?.len())
    }

    /// Read-modify-write under the row lock.
    ///
    /// Missing rows are `NotFound`; rows owned by someone else are
    /// `Forbidden` and stay unchanged. Ownership is checked before the
    /// version, so a non-owner never learns the current version.
    pub fn update(
        &self,
        actor: &Actor,
        id: &V::Id,
        expected: ExpectedVersion,
        mut f: impl FnMut(&mut V) -> DomainResult<()>,
    ) -> DomainResult<V> {
        let updated = self.store.modify(id, ExpectedVersion::Any, &mut |row: &mut V| {
            require_owner(actor, row.owner(), V::KIND)?;
            expected.check(row.version())?;
            f(row)
        })?;
        updated.ok_or_else(|| DomainError::not_found(V::KIND))
    }

    pub fn delete(&self, actor: &Actor, id: &V::Id) -> DomainResult<V> {
        let removed = self.store.remove(id, &|row: &V| {
            require_owner(actor, row.owner(), V::KIND).map_err(DomainError::from)
        })?;
        removed.ok_or_else(|| DomainError::not_found(V::KIND))
    }

    /// Unscoped read for background processors.
    pub fn get(&self, id: &V::Id) -> DomainResult<Option<V>> {
        self.store.get(id)
    }

    /// Unscoped read-modify-write for background processors.
    pub fn update_unscoped(
        &self,
        id: &V::Id,
        mut f: impl FnMut(&mut V) -> DomainResult<()>,
    ) -> DomainResult<V> {
        self.store
            .modify(id, ExpectedVersion::Any, &mut |row: &mut V| f(row))?
            .ok_or_else(|| DomainError::not_found(V::KIND))
    }

    /// Unscoped scan, newest first.
    pub fn scan(&self, filter: &dyn Fn(&V) -> bool) -> DomainResult<Vec<V>> {
        let mut rows = self.store.scan(filter)?;
        newest_first(&mut rows);
        Ok(rows)
    }
}

fn newest_first<V: Owned>(rows: &mut [V]) {
    rows.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryEntityStore;
    use ami_auth::Role;
    use ami_core::{Entity, UserId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u32,
        owner: UserId,
        text: String,
        created_at: DateTime<Utc>,
        version: u64,
    }

    impl Entity for Note {
        type Id = u32;
        const KIND: &'static str = "Note";

        fn id(&self) -> &u32 {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    impl Owned for Note {
        fn owner(&self) -> UserId {
            self.owner
        }
    }

    impl Versioned for Note {
        fn version(&self) -> u64 {
            self.version
        }

        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn note(id: u32, owner: UserId, minutes: i64) -> Note {
        Note {
            id,
            owner,
            text: format!("note {id}"),
            created_at: base() + Duration::minutes(minutes),
            version: 0,
        }
    }

    fn repo() -> Repository<Note> {
        Repository::new(InMemoryEntityStore::<Note>::arc())
    }

    #[test]
    fn insert_sets_first_version_and_rejects_duplicates() {
        let repo = repo();
        let owner = UserId::new();
        let saved = repo.insert(note(1, owner, 0)).unwrap();
        assert_eq!(saved.version, 1);

        let err = repo.insert(note(1, owner, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn foreign_rows_are_invisible_to_customers() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        let bob = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();

        assert!(repo.find(&bob, &1).unwrap_err().is_not_found());
        assert!(repo.find(&alice, &1).is_ok());
        assert!(repo.find(&Actor::admin(UserId::new()), &1).is_ok());
        assert_eq!(repo.count(&bob, &|_| true).unwrap(), 0);
    }

    #[test]
    fn customer_admin_is_owner_scoped() {
        let repo = repo();
        let owner = UserId::new();
        repo.insert(note(1, owner, 0)).unwrap();
        let manager = Actor::new(UserId::new(), Role::CustomerAdmin);
        assert!(repo.find(&manager, &1).unwrap_err().is_not_found());
    }

    #[test]
    fn list_is_newest_first_and_paged() {
        let repo = repo();
        let owner = Actor::customer(UserId::new());
        for i in 0..5 {
            repo.insert(note(i, owner.id, i64::from(i))).unwrap();
        }
        let page = repo
            .list(&owner, PageRequest::new(1, 2).unwrap(), &|_| true)
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.iter().map(|n| n.id).collect::<Vec<_>>(), vec![4, 3]);

        let last = repo
            .list(&owner, PageRequest::new(3, 2).unwrap(), &|_| true)
            .unwrap();
        assert_eq!(last.items.iter().map(|n| n.id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn update_of_foreign_row_is_forbidden_and_leaves_it_unchanged() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        let bob = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();

        let err = repo
            .update(&bob, &1, ExpectedVersion::Any, |n| {
                n.text = "hijacked".into();
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_forbidden());

        let stored = repo.get(&1).unwrap().unwrap();
        assert_eq!(stored.text, "note 1");
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn foreign_update_with_stale_version_is_forbidden() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        let bob = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();

        let err = repo
            .update(&bob, &1, ExpectedVersion::Exact(9), |_| Ok(()))
            .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(repo.get(&1).unwrap().unwrap().version, 1);
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let repo = repo();
        let err = repo
            .update(&Actor::admin(UserId::new()), &7, ExpectedVersion::Any, |_| Ok(()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();
        repo.update(&alice, &1, ExpectedVersion::Exact(1), |n| {
            n.text = "first".into();
            Ok(())
        })
        .unwrap();

        let err = repo
            .update(&alice, &1, ExpectedVersion::Exact(1), |n| {
                n.text = "second".into();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(repo.get(&1).unwrap().unwrap().text, "first");
    }

    #[test]
    fn failed_mutation_does_not_persist_partial_changes() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();
        let err = repo
            .update(&alice, &1, ExpectedVersion::Any, |n| {
                n.text = "half".into();
                Err(DomainError::validation("nope"))
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(repo.get(&1).unwrap().unwrap().text, "note 1");
    }

    #[test]
    fn delete_respects_ownership() {
        let repo = repo();
        let alice = Actor::customer(UserId::new());
        let bob = Actor::customer(UserId::new());
        repo.insert(note(1, alice.id, 0)).unwrap();

        assert!(repo.delete(&bob, &1).unwrap_err().is_forbidden());
        assert!(repo.get(&1).unwrap().is_some());
        repo.delete(&alice, &1).unwrap();
        assert!(repo.get(&1).unwrap().is_none());
        assert!(repo.delete(&alice, &1).unwrap_err().is_not_found());
    }

    proptest! {
        /// Property: a customer's listing only ever contains their own rows.
        #[test]
        fn customer_listing_only_contains_own_rows(owners in proptest::collection::vec(0usize..3, 1..20)) {
            let repo = repo();
            let users = [UserId::new(), UserId::new(), UserId::new()];
            for (i, o) in owners.iter().enumerate() {
                repo.insert(note(i as u32, users[*o], i as i64)).unwrap();
            }
            let viewer = Actor::customer(users[0]);
            let rows = repo.visible(&viewer, &|_| true).unwrap();
            prop_assert!(rows.iter().all(|n| n.owner == users[0]));
            prop_assert_eq!(rows.len(), owners.iter().filter(|o| **o == 0).count());
        }
    }
}
