mod common;

use bankgate_core::{batch::Batch, quarantine::RunStatus, record::EntityKind};
use common::*;

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two records with the same primary key: the first is accepted, the second fails.
#[test]
fn intra_batch_duplicate_keeps_first_record() {
    let batch = Batch::new().with(
        EntityKind::Customer,
        vec![plain_customer(1), customer(1, "999999999999", "other")],
    );

    let outcome = engine("ref-dup").run(&batch);

    let clean = outcome.clean.records(EntityKind::Customer);
    assert_eq!(clean.len(), 1);
    assert_eq!(clean[0].str_field("Username"), Some("user1"));
    assert_eq!(outcome.resolution.intra_batch_duplicates, 1);
    assert!(outcome.report.issues[0].starts_with("Duplicate Customer.CustomerID 1"));
}

/// A reference to a key carried only by a rejected batch record fails once the
/// store lookup comes back empty, and the issue names the rejected target.
#[test]
fn reference_to_field_rejected_record_fails_without_store_copy() {
    let store = store();
    let batch = Batch::new()
        .with(EntityKind::Customer, vec![customer(1, "bad", "alice")])
        .with(EntityKind::Device, vec![device(10, 1, true)]);

    let outcome = engine("ref-rejected-target").with_store(&store).run(&batch);

    assert_eq!(outcome.resolution.deferred, 1);
    assert_eq!(outcome.resolution.rejected_targets, 1);
    assert_eq!(outcome.resolution.unresolved, 0);
    assert_eq!(
        outcome.report.issues[1],
        "Invalid foreign key: Device 10.CustomerID = 1 references a rejected Customer"
    );
    assert!(outcome.clean.is_empty());
}

/// A reference to a key absent from the batch is satisfied by the store.
#[test]
fn reference_resolved_from_store() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![plain_customer(7)]);
    let batch = Batch::new().with(EntityKind::Account, vec![account(100, 7, 10.0)]);

    let outcome = engine("ref-store").with_store(&store).run(&batch);

    assert_eq!(outcome.status(), RunStatus::Passed, "issues: {:?}", outcome.report.issues);
    assert_eq!(outcome.resolution.deferred, 1);
    assert_eq!(outcome.resolution.resolved_from_store, 1);
    assert_eq!(outcome.clean.records(EntityKind::Account).len(), 1);
}

/// A reference found neither in the batch nor the store fails after the batched lookup.
#[test]
fn unresolved_reference_fails() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![plain_customer(7)]);
    let batch = Batch::new().with(
        EntityKind::Account,
        vec![account(100, 7, 10.0), account(101, 8, 10.0)],
    );

    let outcome = engine("ref-unresolved").with_store(&store).run(&batch);

    assert_eq!(outcome.resolution.unresolved, 1);
    assert_eq!(
        outcome.report.issues,
        vec!["Unresolved foreign key: Account 101.CustomerID = 8 not found in this batch or the persisted store"]
    );
    assert!(outcome.report.warnings.is_empty(), "store was online: {:?}", outcome.report.warnings);
}

/// Records are processed in dependency order whatever order they are added in,
/// so a device inserted before its customer still links in the batch.
#[test]
fn dependency_order_is_independent_of_insertion_order() {
    let batch = Batch::new()
        .with(EntityKind::Device, vec![device(10, 1, true)])
        .with(EntityKind::Customer, vec![plain_customer(1)]);

    let outcome = engine("ref-order").run(&batch);

    assert_eq!(outcome.status(), RunStatus::Passed, "issues: {:?}", outcome.report.issues);
    assert_eq!(outcome.resolution.deferred, 0);
}

/// A customer rejected late (its NationalID already exists in the store)
/// takes every record that linked to it in the batch down with it, transitively.
#[test]
fn late_rejection_cascades_through_links() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![customer(50, "123456789012", "stored")]);
    let batch = Batch::new()
        .with(EntityKind::Customer, vec![customer(1, "123456789012", "fresh"), plain_customer(2)])
        .with(EntityKind::Device, vec![device(10, 1, true), device(20, 2, true)])
        .with(EntityKind::Account, vec![account(100, 1, 10.0), account(200, 2, 10.0)])
        .with(
            EntityKind::Transaction,
            vec![
                transaction(1000, 200, 200, 10, 5.0, &at("10:00:00")),
                transaction(1001, 200, 200, 20, 5.0, &at("10:01:00")),
            ],
        );

    let outcome = engine("ref-cascade").with_store(&store).run(&batch);

    assert_eq!(outcome.resolution.store_duplicates, 1);
    // Device 10 and Account 100 link to Customer 1; Transaction 1000 uses Device 10.
    assert_eq!(outcome.resolution.cascaded, 3, "issues: {:?}", outcome.report.issues);
    assert_eq!(outcome.clean.records(EntityKind::Customer).len(), 1);
    assert_eq!(outcome.clean.records(EntityKind::Device)[0].int_field("DeviceID"), Some(20));
    assert_eq!(outcome.clean.records(EntityKind::Account)[0].int_field("AccountID"), Some(200));
    assert_eq!(outcome.clean.records(EntityKind::Transaction)[0].int_field("TransactionID"), Some(1001));
    assert!(outcome
        .report
        .issues
        .contains(&"Invalid foreign key: Device 10.CustomerID = 1 references a rejected Customer".to_string()));
}

/// When the rejected batch record's key also exists in the store, the store
/// copy still satisfies references to it.
#[test]
fn store_copy_satisfies_reference_to_rejected_duplicate() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![plain_customer(1)]);
    let batch = Batch::new()
        .with(EntityKind::Customer, vec![customer(1, "555555555555", "renamed")])
        .with(EntityKind::Device, vec![device(10, 1, true)]);

    let outcome = engine("ref-store-copy").with_store(&store).run(&batch);

    assert_eq!(outcome.resolution.store_duplicates, 1);
    assert_eq!(outcome.resolution.cascaded, 0);
    assert_eq!(outcome.clean.records(EntityKind::Device).len(), 1);
    assert!(!outcome.clean.contains(EntityKind::Customer));
}

/// A batch customer that fails field validation does not hide the persisted
/// customer with the same id: the device still resolves through the store.
#[test]
fn store_copy_satisfies_reference_to_field_rejected_record() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![plain_customer(1)]);
    let batch = Batch::new()
        .with(EntityKind::Customer, vec![customer(1, "12345", "alice")])
        .with(EntityKind::Device, vec![device(10, 1, true)]);

    let outcome = engine("ref-store-copy-field").with_store(&store).run(&batch);

    assert_eq!(outcome.report.issues.len(), 1, "issues: {:?}", outcome.report.issues);
    assert!(outcome.report.issues[0].contains("NationalID"));
    assert_eq!(outcome.resolution.resolved_from_store, 1);
    assert_eq!(outcome.resolution.rejected_targets, 0);
    assert_eq!(outcome.clean.records(EntityKind::Device).len(), 1);
}

/// The same holds for a customer rejected as an intra-batch duplicate whose id
/// is also persisted.
#[test]
fn store_copy_satisfies_reference_to_intra_batch_duplicate() {
    let store = store();
    seed(&store, EntityKind::Customer, vec![plain_customer(2)]);
    let batch = Batch::new()
        .with(
            EntityKind::Customer,
            vec![customer(1, "777777777777", "first"), customer(2, "777777777777", "second")],
        )
        .with(EntityKind::Account, vec![account(100, 2, 10.0)]);

    let outcome = engine("ref-store-copy-dup").with_store(&store).run(&batch);

    assert_eq!(outcome.resolution.intra_batch_duplicates, 1);
    assert_eq!(outcome.resolution.resolved_from_store, 1);
    let accounts = outcome.clean.records(EntityKind::Account);
    assert_eq!(accounts.len(), 1, "issues: {:?}", outcome.report.issues);
    assert_eq!(accounts[0].int_field("AccountID"), Some(100));
}

/// A transaction whose accounts are only added to the batch after it still
/// resolves inside the batch, with no store involved.
#[test]
fn transaction_forward_reference_to_account_resolves() {
    let batch = Batch::new()
        .with(
            EntityKind::Transaction,
            vec![transaction(1000, 100, 200, 10, 25.0, &at("10:00:00"))],
        )
        .with(EntityKind::Customer, vec![plain_customer(1)])
        .with(EntityKind::Device, vec![device(10, 1, true)])
        .with(EntityKind::Account, vec![account(100, 1, 500.0), account(200, 1, 0.0)]);

    let outcome = engine("ref-forward").run(&batch);

    assert_eq!(outcome.status(), RunStatus::Passed, "issues: {:?}", outcome.report.issues);
    assert_eq!(outcome.clean.records(EntityKind::Transaction).len(), 1);
    assert_eq!(outcome.resolution.deferred, 0);
}
