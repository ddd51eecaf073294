//! Accounts: bootstrap, user creation, profile updates, passwords and blocking

mod common;

use common::{setup, ADMIN_EMAIL, ADMIN_PASSWORD};
use object_vault::core::codes;
use object_vault::core::id::{self, SYSTEM_ADMIN, SYSTEM_ORG, TYPE_USER};
use object_vault::core::registry::users as user_registry;
use object_vault::{Actor, EntityKind, Ref, UserUpdate, VaultError};

#[test]
fn test_bootstrap_only_once() {
    let fx = setup();
    assert_eq!(fx.admin.user, SYSTEM_ADMIN);
    let again = fx.vault.bootstrap("other@example.com", "other", "pw");
    assert!(matches!(again, Err(VaultError::Conflict(_))));
}

#[test]
fn test_created_user_matches_registry() {
    let fx = setup();
    let user = fx
        .vault
        .create_user(&fx.admin, "Alice@Example.com", "Alice", "Alice Liddell", "pw-alice")
        .unwrap();

    assert_eq!(id::type_of(user.id()), TYPE_USER);
    assert_eq!(id::shard_group(user.id()), 1);
    assert_eq!(user.username(), "alice");
    assert_eq!(user.email(), "alice@example.com");

    let registry = fx.vault.router().registry().unwrap();
    let entry = user_registry::find(&registry, &Ref::Id(user.id())).unwrap().unwrap();
    assert_eq!(entry.username, user.username());
    assert_eq!(entry.email, user.email());
    assert_eq!(entry.name, "Alice Liddell");
}

#[test]
fn test_duplicate_username_and_email() {
    let fx = setup();
    fx.user("alice", "pw");
    let by_name = fx.vault.create_user(&fx.admin, "other@example.com", "alice", "", "pw");
    assert!(matches!(by_name, Err(VaultError::Conflict(_))));
    let by_email = fx.vault.create_user(&fx.admin, "alice@example.com", "alice2", "", "pw");
    assert!(matches!(by_email, Err(VaultError::Conflict(_))));
}

#[test]
fn test_only_system_admin_creates_users() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let denied = fx.vault.create_user(&alice, "bob@example.com", "bob", "", "pw");
    assert!(matches!(
        denied,
        Err(VaultError::NotFound {
            entity: EntityKind::Membership,
            ..
        })
    ));

    let anonymous = fx.vault.create_user(&Actor::anonymous(), "bob@example.com", "bob", "", "pw");
    assert!(matches!(anonymous, Err(VaultError::NotAuthenticated)));
}

#[test]
fn test_password_check() {
    let fx = setup();
    fx.user("alice", "correct horse");

    let by_email = Ref::Email("alice@example.com".to_string());
    assert!(fx.vault.test_password(&by_email, "correct horse").unwrap());
    assert!(!fx.vault.test_password(&by_email, "battery staple").unwrap());
    assert!(fx.vault.test_password(&Ref::Email(ADMIN_EMAIL.to_string()), ADMIN_PASSWORD).unwrap());

    let missing = fx.vault.test_password(&Ref::Alias("nobody".to_string()), "x");
    assert!(matches!(
        missing,
        Err(VaultError::NotFound {
            entity: EntityKind::User,
            ..
        })
    ));
}

#[test]
fn test_update_own_profile() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    fx.user("bob", "pw");

    let updated = fx
        .vault
        .update_user(
            &alice,
            &Ref::Id(alice.user),
            UserUpdate {
                email: Some("alice@wonderland.example".to_string()),
                name: Some("Alice L.".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.email(), "alice@wonderland.example");

    let registry = fx.vault.router().registry().unwrap();
    let entry = user_registry::find(&registry, &Ref::Email("alice@wonderland.example".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(entry.id, alice.user);
    assert_eq!(entry.name, "Alice L.");

    let taken = fx.vault.update_user(
        &alice,
        &Ref::Id(alice.user),
        UserUpdate {
            username: Some("bob".to_string()),
            ..Default::default()
        },
    );
    assert!(matches!(taken, Err(VaultError::Conflict(_))));
}

#[test]
fn test_update_other_user_needs_system_rights() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let bob = fx.user("bob", "pw");
    let update = UserUpdate {
        name: Some("Robert".to_string()),
        ..Default::default()
    };

    assert!(fx.vault.update_user(&alice, &Ref::Id(bob.user), update.clone()).is_err());
    let updated = fx.vault.update_user(&fx.admin, &Ref::Id(bob.user), update).unwrap();
    assert_eq!(updated.name(), "Robert");
}

#[test]
fn test_change_password() {
    let fx = setup();
    let alice = fx.user("alice", "old-pw");
    let by_id = Ref::Id(alice.user);

    let wrong = fx.vault.change_password(&alice, "not-it", "new-pw");
    assert!(matches!(wrong, Err(VaultError::WrongPassword)));

    fx.vault.change_password(&alice, "old-pw", "new-pw").unwrap();
    assert!(!fx.vault.test_password(&by_id, "old-pw").unwrap());
    assert!(fx.vault.test_password(&by_id, "new-pw").unwrap());
}

#[test]
fn test_blocked_user_is_refused() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let target = Ref::Id(alice.user);

    fx.vault.set_user_blocked(&fx.admin, &target, true).unwrap();
    let refused = fx.vault.user_objects(&alice, None).unwrap_err();
    assert!(matches!(refused, VaultError::UserBlocked(_)));
    assert_eq!(refused.code(), codes::USER_BLOCKED);
    let org = fx.vault.org(&alice, &Ref::Id(SYSTEM_ORG));
    assert!(matches!(org, Err(VaultError::UserBlocked(_))));

    fx.vault.set_user_blocked(&fx.admin, &target, false).unwrap();
    assert!(fx.vault.user_objects(&alice, None).unwrap().is_empty());

    let own = fx.vault.set_user_blocked(&fx.admin, &Ref::Id(fx.admin.user), true);
    assert!(matches!(own, Err(VaultError::SelfNotAllowed)));
}

#[test]
fn test_delete_user() {
    let fx = setup();
    let alice = fx.user("alice", "pw");

    let system = fx.vault.delete_user(&fx.admin, &Ref::Id(SYSTEM_ADMIN));
    assert!(matches!(system, Err(VaultError::InvalidParameter(_))));

    fx.vault.delete_user(&fx.admin, &Ref::Id(alice.user)).unwrap();
    assert!(matches!(
        fx.vault.user(&alice, &Ref::Id(alice.user)),
        Err(VaultError::AccessDenied(_))
    ));
}
