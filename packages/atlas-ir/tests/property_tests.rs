//! Property tests for the small algebraic pieces

use atlas_ir::features::heap_analysis::EscapeState;
use atlas_ir::features::incremental::ChangeSet;
use atlas_ir::features::taint::AccessPath;
use atlas_ir::shared::utils::DenseBitSet;
use proptest::prelude::*;

fn escape_states() -> impl Strategy<Value = EscapeState> {
    prop_oneof![
        Just(EscapeState::NoEscape),
        Just(EscapeState::ArgEscape),
        Just(EscapeState::ReturnEscape),
        Just(EscapeState::FieldEscape),
        Just(EscapeState::ArrayEscape),
        Just(EscapeState::GlobalEscape),
        Just(EscapeState::Unknown),
    ]
}

proptest! {
    #[test]
    fn bitset_matches_hashset(ops in prop::collection::vec((0u32..2048, any::<bool>()), 0..200)) {
        let mut bitset = DenseBitSet::new(0);
        let mut reference = std::collections::HashSet::new();

        for (value, insert) in ops {
            if insert {
                bitset.insert(value);
                reference.insert(value);
            } else {
                bitset.remove(value);
                reference.remove(&value);
            }
        }

        prop_assert_eq!(bitset.len(), reference.len());
        for value in &reference {
            prop_assert!(bitset.contains(*value));
        }
        let mut collected: Vec<u32> = bitset.iter().collect();
        collected.sort_unstable();
        let mut expected: Vec<u32> = reference.into_iter().collect();
        expected.sort_unstable();
        prop_assert_eq!(collected, expected);
    }

    #[test]
    fn escape_join_is_commutative_and_idempotent(a in escape_states(), b in escape_states()) {
        prop_assert_eq!(a.join(b), b.join(a));
        prop_assert_eq!(a.join(a), a);
        // Join never loses information
        prop_assert!(a.join(b).rank() >= a.rank());
        prop_assert!(a.join(b).rank() >= b.rank());
    }

    #[test]
    fn access_path_display_parse_roundtrip(
        base in "[a-z][a-z0-9_]{0,8}",
        fields in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..4),
    ) {
        let mut path = AccessPath::var(base);
        for field in &fields {
            path = path.child(field.clone());
        }
        let parsed = AccessPath::parse(&path.to_string());
        prop_assert_eq!(parsed, path);
    }

    #[test]
    fn change_set_paths_stay_disjoint(
        ops in prop::collection::vec((0u8..3, "[a-z]{1,6}\\.py"), 0..60),
    ) {
        let mut change_set = ChangeSet::new();
        for (op, path) in ops {
            match op {
                0 => change_set.add_added(path),
                1 => change_set.add_modified(path),
                _ => change_set.add_deleted(path),
            }
        }

        // A path appears in at most one bucket
        for path in &change_set.added {
            prop_assert!(!change_set.modified.contains(path));
            prop_assert!(!change_set.deleted.contains(path));
        }
        for path in &change_set.modified {
            prop_assert!(!change_set.deleted.contains(path));
        }
    }

    #[test]
    fn stable_ids_are_pure(
        fqn in "[a-z]{1,8}\\.[a-z]{1,8}",
        line in 0u32..5000,
        col in 0u32..200,
    ) {
        use atlas_ir::{Node, NodeKind, Span};
        let span = Span::new(line, col, line + 1, 0);
        let a = Node::stable_id("repo", &fqn, NodeKind::Function, span);
        let b = Node::stable_id("repo", &fqn, NodeKind::Function, span);
        prop_assert_eq!(a, b);
    }
}
