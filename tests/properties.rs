//! Property-based tests for the codecs and role sets
//!
//! Uses proptest to check identifier, role, envelope and session-token
//! invariants across random inputs.

use chrono::Utc;
use object_vault::core::crypto;
use object_vault::core::id;
use object_vault::core::roles::{
    role, RoleSet, CATEGORY_ORG, CATEGORY_STORE, CATEGORY_SYSTEM, FUNCTION_READ, FUNCTION_READ_LIST,
    FUNCTION_UPDATE, SUBCATEGORY_ROLES, SUBCATEGORY_USER,
};
use object_vault::core::session::StoreSession;
use proptest::prelude::*;

fn category() -> impl Strategy<Value = u32> {
    prop_oneof![Just(CATEGORY_SYSTEM), Just(CATEGORY_ORG), Just(CATEGORY_STORE)]
}

fn valid_role() -> impl Strategy<Value = u32> {
    (category(), 0u32..=7, 1u32..=0xFFFF).prop_map(|(c, sub, functions)| role(c | (sub << 16), functions))
}

fn org_role() -> impl Strategy<Value = u32> {
    (0u32..=7, 1u32..=0xFFFF).prop_map(|(sub, functions)| role(CATEGORY_ORG | (sub << 16), functions))
}

proptest! {
    #[test]
    fn prop_id_fields_survive(group in 0u8..16, object_type: u8, shard in 0u16..4096, local: u32) {
        let packed = id::make_id(group, object_type, shard, local);
        prop_assert_eq!(id::decode(packed), (group, object_type, shard, local));
        prop_assert_eq!(id::parse_id(&id::format_id(packed)).unwrap(), packed);
    }

    #[test]
    fn prop_role_set_add_remove_idempotent(
        initial in prop::collection::vec(valid_role(), 0..12),
        r in valid_role()
    ) {
        let mut once = RoleSet::from_roles(&initial);
        once.add(r);
        let mut twice = once.clone();
        twice.add(r);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.has_role(r));

        let mut removed = RoleSet::from_roles(&initial);
        removed.remove(r);
        let mut removed_twice = removed.clone();
        removed_twice.remove(r);
        prop_assert_eq!(removed, removed_twice);
    }

    #[test]
    fn prop_manager_flag_derivation(roles in prop::collection::vec(org_role(), 0..10)) {
        let set = RoleSet::from_roles(&roles);
        let expected = set.has_role(role(CATEGORY_ORG | SUBCATEGORY_USER, FUNCTION_READ_LIST))
            && set.has_role(role(CATEGORY_ORG | SUBCATEGORY_ROLES, FUNCTION_READ | FUNCTION_UPDATE));
        prop_assert_eq!(set.is_roles_manager(), expected);
    }

    #[test]
    fn prop_envelope_opens_only_with_its_key(
        key in prop::array::uniform32(any::<u8>()),
        other in prop::array::uniform32(any::<u8>()),
        message in prop::collection::vec(any::<u8>(), 0..512)
    ) {
        let sealed = crypto::seal(&key, &message).unwrap();
        prop_assert_eq!(crypto::open(&key, &sealed).unwrap(), message);
        if other != key {
            prop_assert!(crypto::open(&other, &sealed).is_err());
        }
    }

    #[test]
    fn prop_session_token_round_trip(
        store in 1u64..,
        key in prop::array::uniform32(any::<u8>()),
        minutes in 1i64..100_000
    ) {
        let session = StoreSession::new(store, key, Utc::now(), minutes);
        let imported = StoreSession::import(&session.export()).unwrap();
        prop_assert_eq!(imported, session);
    }

    #[test]
    fn prop_session_token_needs_three_parts(parts in prop::collection::vec("[0-9a-f]{1,8}", 0..6)) {
        prop_assume!(parts.len() != 3);
        let token = format!("/{}/", parts.join("/"));
        prop_assert!(StoreSession::import(&token).is_err());
    }
}

#[test]
fn test_session_token_rejects_empty_forms() {
    assert!(StoreSession::import("").is_err());
    assert!(StoreSession::import("/").is_err());
    assert!(StoreSession::import("//").is_err());
}
