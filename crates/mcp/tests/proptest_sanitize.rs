//! Property-based tests for the bridge's safe-name algorithm.

use std::collections::HashSet;

use mcp_client::sanitize::{safe_name, sanitize};
use proptest::prelude::*;

proptest! {
    /// Invariant 1 & 4: every sanitized name stays in the `[a-z0-9_]` charset,
    /// never starts/ends with `_`, and sanitizing twice is a no-op.
    #[test]
    fn sanitize_is_idempotent_and_well_formed(input in ".{0,64}") {
        let once = sanitize(&input);
        let twice = sanitize(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.is_empty());
        prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!once.starts_with('_') && !once.ends_with('_'));
    }

    /// Invariant 1: for arbitrary (server_id, tool_name) pairs, `safe_name`
    /// never exceeds the 64-byte cap and always stays in charset.
    #[test]
    fn safe_name_respects_length_and_charset(
        server_id in "[a-zA-Z0-9/_.-]{1,80}",
        tool_name in "[a-zA-Z0-9/_.-]{1,80}",
    ) {
        let mut used = HashSet::new();
        let name = safe_name(&server_id, &tool_name, &mut used);
        prop_assert!(name.len() <= 64);
        prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!name.starts_with('_') && !name.ends_with('_'));
    }

    /// Invariant 2: a batch of distinct pairs registered against the same
    /// `used` set never collides on the resulting name.
    #[test]
    fn safe_name_batch_is_pairwise_distinct(
        tool_names in prop::collection::vec("[a-z0-9]{1,20}", 1..30),
    ) {
        let mut used = HashSet::new();
        let mut seen = HashSet::new();
        for (i, tool_name) in tool_names.iter().enumerate() {
            let name = safe_name("fixed-server", &format!("{tool_name}-{i}"), &mut used);
            prop_assert!(seen.insert(name), "duplicate safe name produced for distinct input");
        }
    }
}
