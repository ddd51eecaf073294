//! Organizations, stores, memberships and the access rules around them

mod common;

use common::{setup, ADMIN_PASSWORD};
use object_vault::core::codes;
use object_vault::core::id::{self, SYSTEM_ORG, TYPE_ORG, TYPE_STORE};
use object_vault::core::registry::{orgs as org_registry, users as user_registry};
use object_vault::core::roles::{
    admin_roles, role, CATEGORY_ORG, CATEGORY_STORE, FUNCTION_READ, FUNCTION_READ_LIST, SUBCATEGORY_ORG,
    SUBCATEGORY_STORE,
};
use object_vault::core::state::STATE_BLOCKED;
use object_vault::{
    EntityKind, OrgUpdate, Ref, StoreUpdate, VaultError, ACTION_CASCADE_ORG, ACTION_CASCADE_STORE,
};

#[test]
fn test_create_org() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "Acme", "Acme Corporation").unwrap();

    assert_eq!(id::type_of(org.id()), TYPE_ORG);
    assert_eq!(id::shard_group(org.id()), 1);
    assert_eq!(org.alias(), "acme");

    let registry = fx.vault.router().registry().unwrap();
    let entry = org_registry::find(&registry, &Ref::Alias("acme".to_string())).unwrap().unwrap();
    assert_eq!(entry.id, org.id());
    assert_eq!(entry.name, "Acme Corporation");

    let members = fx.vault.members(&fx.admin, org.id()).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user(), fx.admin.user);
    assert!(members[0].is_roles_manager());

    let objects = fx.vault.user_objects(&fx.admin, Some(TYPE_ORG)).unwrap();
    let aliases: Vec<&str> = objects.iter().map(|o| o.alias.as_str()).collect();
    assert!(aliases.contains(&"system"));
    assert!(aliases.contains(&"acme"));

    let again = fx.vault.create_org(&fx.admin, "acme", "Other");
    assert!(matches!(again, Err(VaultError::Conflict(_))));
}

#[test]
fn test_update_org_alias() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    fx.vault
        .update_org(
            &fx.admin,
            &Ref::Id(org.id()),
            OrgUpdate {
                alias: Some("acme2".to_string()),
                name: None,
            },
        )
        .unwrap();

    let found = fx.vault.org(&fx.admin, &Ref::Alias("acme2".to_string())).unwrap();
    assert_eq!(found.id(), org.id());
    assert!(fx.vault.org(&fx.admin, &Ref::Alias("acme".to_string())).is_err());
}

#[test]
fn test_member_roles_are_enforced() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let bob = fx.user("bob", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let target = Ref::Id(org.id());

    fx.vault
        .add_member(
            &fx.admin,
            org.id(),
            &Ref::Alias("alice".to_string()),
            &[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)],
        )
        .unwrap();

    assert_eq!(fx.vault.org(&alice, &target).unwrap().id(), org.id());
    let update = fx.vault.update_org(&alice, &target, OrgUpdate::default());
    assert!(matches!(update, Err(VaultError::AccessDenied(_))));

    let outsider = fx.vault.org(&bob, &target);
    assert!(matches!(
        outsider,
        Err(VaultError::NotFound {
            entity: EntityKind::Membership,
            ..
        })
    ));

    let twice = fx.vault.add_member(&fx.admin, org.id(), &Ref::Id(alice.user), &[]);
    assert!(matches!(twice, Err(VaultError::Conflict(_))));

    let wrong_category = fx.vault.add_member(
        &fx.admin,
        org.id(),
        &Ref::Id(bob.user),
        &[role(CATEGORY_STORE | SUBCATEGORY_STORE, FUNCTION_READ)],
    );
    assert!(matches!(wrong_category, Err(VaultError::InvalidParameter(_))));

    let listed = fx.vault.user_objects(&alice, None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].object, org.id());
    assert_eq!(listed[0].alias, "acme");
}

#[test]
fn test_last_manager_is_kept() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let read_only = [role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)];

    let demote = fx.vault.set_member_roles(&fx.admin, org.id(), fx.admin.user, &read_only);
    assert!(matches!(demote, Err(VaultError::LastManager(_))));
    let remove = fx.vault.remove_member(&fx.admin, org.id(), fx.admin.user);
    assert!(matches!(remove, Err(VaultError::LastManager(_))));

    fx.vault
        .add_member(&fx.admin, org.id(), &Ref::Id(alice.user), &admin_roles(CATEGORY_ORG))
        .unwrap();
    fx.vault.remove_member(&fx.admin, org.id(), fx.admin.user).unwrap();

    let members = fx.vault.members(&alice, org.id()).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user(), alice.user);
    assert!(fx.vault.user_objects(&fx.admin, Some(TYPE_ORG)).unwrap().iter().all(|o| o.object != org.id()));
}

#[test]
fn test_blocked_manager_does_not_count() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    fx.vault
        .add_member(&fx.admin, org.id(), &Ref::Id(alice.user), &admin_roles(CATEGORY_ORG))
        .unwrap();
    fx.vault.set_member_state(&fx.admin, org.id(), alice.user, STATE_BLOCKED, 0).unwrap();

    let remove = fx.vault.remove_member(&fx.admin, org.id(), fx.admin.user);
    assert!(matches!(remove, Err(VaultError::LastManager(_))));
    let read_only = [role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)];
    let demote = fx.vault.set_member_roles(&fx.admin, org.id(), fx.admin.user, &read_only);
    assert!(matches!(demote, Err(VaultError::LastManager(_))));

    fx.vault.set_member_state(&fx.admin, org.id(), alice.user, 0, STATE_BLOCKED).unwrap();
    fx.vault.remove_member(&fx.admin, org.id(), fx.admin.user).unwrap();
    assert_eq!(fx.vault.members(&alice, org.id()).unwrap().len(), 1);
}

#[test]
fn test_blocked_membership() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    fx.vault
        .add_member(
            &fx.admin,
            org.id(),
            &Ref::Id(alice.user),
            &[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)],
        )
        .unwrap();

    let state = fx.vault.set_member_state(&fx.admin, org.id(), alice.user, STATE_BLOCKED, 0).unwrap();
    assert_eq!(state & STATE_BLOCKED, STATE_BLOCKED);
    assert!(matches!(
        fx.vault.org(&alice, &Ref::Id(org.id())),
        Err(VaultError::UserBlocked(_))
    ));

    fx.vault.set_member_state(&fx.admin, org.id(), alice.user, 0, STATE_BLOCKED).unwrap();
    assert!(fx.vault.org(&alice, &Ref::Id(org.id())).is_ok());

    let own = fx.vault.set_member_state(&fx.admin, org.id(), fx.admin.user, STATE_BLOCKED, 0);
    assert!(matches!(own, Err(VaultError::SelfNotAllowed)));
}

#[test]
fn test_blocked_org() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let target = Ref::Id(org.id());

    fx.vault.set_org_blocked(&fx.admin, &target, true).unwrap();
    let blocked = fx.vault.org(&fx.admin, &target).unwrap_err();
    assert!(matches!(blocked, VaultError::ObjectBlocked(_)));
    assert_eq!(blocked.code(), codes::OBJECT_BLOCKED);
    fx.vault.set_org_blocked(&fx.admin, &target, false).unwrap();
    assert!(fx.vault.org(&fx.admin, &target).is_ok());

    let system = fx.vault.set_org_blocked(&fx.admin, &Ref::Id(SYSTEM_ORG), true);
    assert!(matches!(system, Err(VaultError::InvalidParameter(_))));
}

#[test]
fn test_create_and_find_store() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let org_ref = Ref::Id(org.id());

    let wrong = fx.vault.create_store(&fx.admin, &org_ref, "main", "Main", "not-the-password");
    assert!(matches!(wrong, Err(VaultError::WrongPassword)));

    let store = fx
        .vault
        .create_store(&fx.admin, &org_ref, "main", "Main store", ADMIN_PASSWORD)
        .unwrap();
    assert_eq!(id::type_of(store.id()), TYPE_STORE);
    assert_eq!(store.org(), org.id());

    let by_alias = fx
        .vault
        .store(&fx.admin, &Ref::Alias("acme".to_string()), &Ref::Alias("main".to_string()))
        .unwrap();
    assert_eq!(by_alias.id(), store.id());

    let duplicate = fx.vault.create_store(&fx.admin, &org_ref, "main", "Again", ADMIN_PASSWORD);
    assert!(matches!(duplicate, Err(VaultError::Conflict(_))));

    let stores = fx.vault.org_stores(&fx.admin, &org_ref).unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].alias, "main");

    let members = fx.vault.members(&fx.admin, store.id()).unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].store_key().is_some());

    let store_objects = fx.vault.user_objects(&fx.admin, Some(TYPE_STORE)).unwrap();
    assert_eq!(store_objects.len(), 1);
    assert_eq!(store_objects[0].alias, "main");
}

#[test]
fn test_rename_store() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let org_ref = Ref::Id(org.id());
    let store = fx
        .vault
        .create_store(&fx.admin, &org_ref, "main", "Main", ADMIN_PASSWORD)
        .unwrap();

    fx.vault
        .update_store(
            &fx.admin,
            store.id(),
            StoreUpdate {
                alias: Some("vault".to_string()),
                name: Some("Primary".to_string()),
            },
        )
        .unwrap();

    let renamed = fx.vault.store(&fx.admin, &org_ref, &Ref::Alias("vault".to_string())).unwrap();
    assert_eq!(renamed.id(), store.id());
    assert_eq!(renamed.name(), "Primary");
    assert!(fx.vault.store(&fx.admin, &org_ref, &Ref::Alias("main".to_string())).is_err());
}

#[test]
fn test_delete_store_emits_cascade() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let org_ref = Ref::Id(org.id());
    let store = fx
        .vault
        .create_store(&fx.admin, &org_ref, "main", "Main", ADMIN_PASSWORD)
        .unwrap();

    let action = fx.vault.delete_store(&fx.admin, store.id()).unwrap();
    assert_eq!(action.action_type(), ACTION_CASCADE_STORE);
    assert_eq!(action.parameters().get_str("store"), Some(id::format_id(store.id()).as_str()));

    let messages = fx.publisher.messages();
    let (_, message) = messages.last().unwrap();
    assert_eq!(message.guid, action.guid());
    assert_eq!(message.action_type, ACTION_CASCADE_STORE);

    assert!(fx.vault.org_stores(&fx.admin, &org_ref).unwrap().is_empty());
    assert!(matches!(
        fx.vault.store(&fx.admin, &org_ref, &Ref::Id(store.id())),
        Err(VaultError::AccessDenied(_))
    ));
}

#[test]
fn test_delete_org_emits_cascade() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let target = Ref::Id(org.id());

    let system = fx.vault.delete_org(&fx.admin, &Ref::Id(SYSTEM_ORG));
    assert!(matches!(system, Err(VaultError::InvalidParameter(_))));

    let action = fx.vault.delete_org(&fx.admin, &target).unwrap();
    assert_eq!(action.action_type(), ACTION_CASCADE_ORG);
    assert_eq!(action.parameters().get_str("alias"), Some("acme"));
    fx.vault.pipeline().mark_processed(action.guid()).unwrap();

    assert!(matches!(fx.vault.org(&fx.admin, &target), Err(VaultError::AccessDenied(_))));
}

#[test]
fn test_favorites() {
    let fx = setup();
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    fx.vault.set_favorite(&fx.admin, org.id(), true).unwrap();

    let objects = fx.vault.user_objects(&fx.admin, None).unwrap();
    let acme = objects.iter().find(|o| o.object == org.id()).unwrap();
    assert!(acme.favorite);

    let missing = fx.vault.set_favorite(&fx.admin, id::make_id(1, TYPE_ORG, 5, 999), true);
    assert!(matches!(
        missing,
        Err(VaultError::NotFound {
            entity: EntityKind::Membership,
            ..
        })
    ));
}

#[test]
fn test_org_store_listing_needs_role() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let org_ref = Ref::Id(org.id());
    fx.vault
        .add_member(
            &fx.admin,
            org.id(),
            &Ref::Id(alice.user),
            &[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)],
        )
        .unwrap();
    assert!(matches!(fx.vault.org_stores(&alice, &org_ref), Err(VaultError::AccessDenied(_))));

    fx.vault
        .set_member_roles(
            &fx.admin,
            org.id(),
            alice.user,
            &[role(CATEGORY_ORG | SUBCATEGORY_STORE, FUNCTION_READ_LIST)],
        )
        .unwrap();
    assert!(fx.vault.org_stores(&alice, &org_ref).unwrap().is_empty());

    let registry = fx.vault.router().registry().unwrap();
    assert!(user_registry::find(&registry, &Ref::Id(alice.user)).unwrap().is_some());
}

#[test]
fn test_org_invitation_carries_no_key() {
    let fx = setup();
    let alice = fx.user("alice", "pw");
    let org = fx.vault.create_org(&fx.admin, "acme", "Acme").unwrap();
    let session = object_vault::MemorySession::new();

    let invited = fx
        .vault
        .invite(
            &fx.admin,
            &session,
            org.id(),
            "alice@example.com",
            &[role(CATEGORY_ORG | SUBCATEGORY_ORG, FUNCTION_READ)],
            "join us",
        )
        .unwrap();
    assert_eq!(invited.invitation.key(), 0);
    assert!(invited.action.parameters().get_str("pick").is_none());
    assert_eq!(invited.action.parameters().get_str("alias"), Some("acme"));

    let membership = fx
        .vault
        .accept_invitation(&alice, invited.invitation.uid(), "", "pw")
        .unwrap();
    assert!(membership.store_key().is_none());
    assert_eq!(fx.vault.org(&alice, &Ref::Id(org.id())).unwrap().id(), org.id());
}
