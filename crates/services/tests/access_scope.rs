mod common;

use ami_assets::{AssetPatch, AssetStatus};
use ami_auth::Role;
use ami_core::{ExpectedVersion, PageRequest};
use ami_projects::ProjectPatch;
use ami_services::services::AssetFilter;

use common::harness;

#[test]
fn foreign_rows_are_invisible_to_customers() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let bob = h.user("bob@example.com", Role::CustomerAdmin);
    let project = h.project(&alice, "Plant A");
    let asset = h.asset(&alice, "Press", Some(&project));

    let err = h.app.assets.find(&bob, asset.id).unwrap_err();
    assert!(err.is_not_found());
    assert!(h.app.projects.find(&bob, project.id).unwrap_err().is_not_found());

    let page = h
        .app
        .assets
        .list(&bob, PageRequest::default(), AssetFilter::default())
        .unwrap();
    assert_eq!(page.total, 0);

    let admin = h.user("root@example.com", Role::Admin);
    assert_eq!(h.app.assets.find(&admin, asset.id).unwrap().id, asset.id);
}

#[test]
fn foreign_mutation_is_forbidden_and_leaves_row_unchanged() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let mallory = h.user("mallory@example.com", Role::CustomerUser);
    let asset = h.asset(&alice, "Press", None);

    let patch = AssetPatch {
        name: Some("Stolen".to_string()),
        ..Default::default()
    };
    let err = h
        .app
        .assets
        .update(&mallory, asset.id, patch, ExpectedVersion::Any)
        .unwrap_err();
    assert!(err.is_forbidden());
    assert!(h.app.assets.update_status(&mallory, asset.id, AssetStatus::Inactive).unwrap_err().is_forbidden());
    assert!(h.app.assets.remove(&mallory, asset.id).unwrap_err().is_forbidden());

    let unchanged = h.app.assets.find(&alice, asset.id).unwrap();
    assert_eq!(unchanged, asset);
}

#[test]
fn stale_version_is_a_conflict() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");

    let patch = ProjectPatch {
        description: Some("first".to_string()),
        ..Default::default()
    };
    let updated = h
        .app
        .projects
        .update(&alice, project.id, patch.clone(), ExpectedVersion::Exact(project.version))
        .unwrap();
    assert_eq!(updated.version, project.version + 1);

    let err = h
        .app
        .projects
        .update(&alice, project.id, patch, ExpectedVersion::Exact(project.version))
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn deleting_a_project_detaches_its_assets() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let project = h.project(&alice, "Plant A");
    let asset = h.asset(&alice, "Press", Some(&project));

    h.app.projects.remove(&alice, project.id).unwrap();

    assert!(h.app.projects.find(&alice, project.id).unwrap_err().is_not_found());
    assert_eq!(h.app.assets.find(&alice, asset.id).unwrap().project_id, None);
}

#[test]
fn stats_only_count_visible_assets() {
    let h = harness();
    let alice = h.user("alice@example.com", Role::CustomerUser);
    let bob = h.user("bob@example.com", Role::CustomerUser);
    h.asset(&alice, "Press", None);
    h.asset(&alice, "Lathe", None);
    h.asset(&bob, "Drill", None);

    assert_eq!(h.app.assets.stats(&alice).unwrap().total_assets, 2);
    assert_eq!(h.app.assets.stats(&bob).unwrap().total_assets, 1);
}
