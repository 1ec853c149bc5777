//! Property-based tests for identifier allocation, validation and patching.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use iosdevops_cli::domain::config::{VALID_CONFIG_KEYS, validate_config_key};
use iosdevops_cli::domain::pbxproj::{
    self, IdAllocator, ResourceSpec, generate_object_id, is_object_id,
};

const FIXTURE: &str = include_str!("../fixtures/project.pbxproj");
const RESOURCES_PHASE: &str = "02DAD4482E70CC2D00BB3786";

// ============================================================================
// Identifier allocation
// ============================================================================

proptest! {
    /// Allocated ids never collide with ids already in the manifest or with
    /// each other.
    #[test]
    fn prop_allocator_avoids_existing_ids(existing in prop::collection::vec("[0-9A-F]{24}", 0..20)) {
        let manifest = existing
            .iter()
            .map(|id| format!("\t\t{id} /* x */ = {{isa = PBXFileReference; }};"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut alloc = IdAllocator::from_manifest(&manifest);
        let ids = alloc.object_ids();
        for id in [&ids.group, &ids.file, &ids.build_file] {
            prop_assert!(is_object_id(id), "malformed: {}", id);
            prop_assert!(!existing.contains(id), "collision: {}", id);
        }
        prop_assert_ne!(&ids.group, &ids.file);
        prop_assert_ne!(&ids.file, &ids.build_file);
        prop_assert_ne!(&ids.group, &ids.build_file);
    }

    /// Lowercase or wrong-length strings are never object ids.
    #[test]
    fn prop_is_object_id_rejects_bad_shapes(s in "[0-9a-f]{24}|[0-9A-F]{1,23}|[0-9A-F]{25,30}") {
        prop_assume!(!s.chars().all(|c| c.is_ascii_digit()) || s.len() != 24);
        prop_assert!(!is_object_id(&s), "accepted {}", s);
    }

    /// Any plain resource name patches the fixture completely and adds exactly
    /// one entry to the resources phase.
    #[test]
    fn prop_patch_is_complete_for_plain_names(name in "res_[A-Za-z0-9_.-]{1,20}") {
        let spec = ResourceSpec { name, ..ResourceSpec::default() };
        let ids = IdAllocator::from_manifest(FIXTURE).object_ids();
        let out = pbxproj::patch(FIXTURE, &spec, &ids);
        prop_assert!(out.is_complete(), "missed: {:?}", out.missed);
        let before = pbxproj::list_entries(FIXTURE, RESOURCES_PHASE, "files").expect("files");
        let after = pbxproj::list_entries(&out.text, RESOURCES_PHASE, "files").expect("files");
        prop_assert_eq!(after.len(), before.len() + 1);
    }
}

#[test]
fn test_generated_ids_are_well_formed_and_unique() {
    let ids: std::collections::HashSet<_> = (0..100).map(|_| generate_object_id()).collect();
    assert_eq!(ids.len(), 100, "duplicate IDs generated");
    assert!(ids.iter().all(|id| is_object_id(id)));
}

#[test]
fn test_allocate_with_skips_taken_candidates() {
    let taken = "000000000000000000000001";
    let mut alloc = IdAllocator::from_manifest(&format!("{taken} = {{}};"));
    let mut candidates = vec![
        "000000000000000000000002".to_string(),
        taken.to_string(),
        taken.to_string(),
    ];
    let id = alloc.allocate_with(|| candidates.pop().expect("candidate"));
    assert_eq!(id, "000000000000000000000002");
    assert!(alloc.is_taken(&id));
}

// ============================================================================
// validate_config_key() property tests
// ============================================================================

proptest! {
    /// Keys outside the whitelist are rejected.
    #[test]
    fn prop_arbitrary_keys_rejected(key in "[a-z]{1,20}\\.[a-z_]{1,20}") {
        prop_assume!(!VALID_CONFIG_KEYS.contains(&key.as_str()));
        prop_assert!(validate_config_key(&key).is_err(), "accepted invalid key: {}", key);
    }
}

#[test]
fn test_every_whitelisted_key_is_accepted() {
    for key in VALID_CONFIG_KEYS {
        assert!(validate_config_key(key).is_ok(), "rejected {key}");
    }
}
