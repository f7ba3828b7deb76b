//! Incremental build tests (P2, P6, scenarios 3 and 4)

use atlas_ir::config::{AnalysisConfig, CacheTierConfig};
use atlas_ir::pipeline::{BuildResult, CancellationToken, PipelineOrchestrator};
use atlas_ir::shared::models::{LanguageId, RepoSnapshot, SourceFile};
use std::sync::Arc;

fn snapshot() -> RepoSnapshot {
    RepoSnapshot::new("repo", "snap-1", "/tmp/repo")
}

fn sources(files: &[(String, String)]) -> Vec<SourceFile> {
    files
        .iter()
        .map(|(path, content)| SourceFile::new(path.clone(), LanguageId::Python, content.clone()))
        .collect()
}

fn no_cache_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    for tier in [
        &mut config.cache.l0,
        &mut config.cache.l1,
        &mut config.cache.l2,
    ] {
        *tier = CacheTierConfig {
            enabled: false,
            ..CacheTierConfig::default()
        };
    }
    config
}

fn orchestrator() -> PipelineOrchestrator {
    PipelineOrchestrator::new(no_cache_config()).unwrap()
}

fn hundred_file_repo() -> Vec<(String, String)> {
    (0..100)
        .map(|i| {
            (
                format!("mod_{:03}.py", i),
                format!("def func_{0}(x):\n    y = x + {0}\n    return y\n", i),
            )
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────
// Scenario 3: body-only edit rebuilds exactly one file
// ────────────────────────────────────────────────────────────────────

#[test]
fn body_only_change_affects_single_file() {
    let files = hundred_file_repo();
    let orchestrator = orchestrator();
    let full = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    // Change one function body; signature and imports untouched
    let mut edited = files.clone();
    edited[42].1 = "def func_42(x):\n    y = x * 99\n    return y\n".to_string();

    let incremental = orchestrator
        .build_incremental(&full, sources(&edited), &CancellationToken::new())
        .unwrap();

    // Affected set is exactly the edited file
    assert_eq!(incremental.stats.files_analyzed, 1);

    // Its fingerprint changed
    assert_ne!(
        full.documents["mod_042.py"].fingerprint,
        incremental.documents["mod_042.py"].fingerprint
    );

    // No other document was re-emitted (pointer identity preserved)
    for (path, doc) in &incremental.documents {
        if path != "mod_042.py" {
            assert!(
                Arc::ptr_eq(doc, &full.documents[path]),
                "{} was rebuilt unnecessarily",
                path
            );
        }
    }

    // GlobalContext is unchanged in value
    assert_eq!(full.context.file_deps, incremental.context.file_deps);
    assert_eq!(
        full.context.symbol_index.len(),
        incremental.context.symbol_index.len()
    );
}

// ────────────────────────────────────────────────────────────────────
// P2: incremental equivalence with a fresh full build
// ────────────────────────────────────────────────────────────────────

#[test]
fn incremental_build_matches_full_rebuild() {
    let files = vec![
        (
            "mod_a.py".to_string(),
            "def foo(x):\n    return x + 1\n".to_string(),
        ),
        (
            "mod_b.py".to_string(),
            "from mod_a import foo\n\ndef bar():\n    return foo(2)\n".to_string(),
        ),
    ];
    let orchestrator = orchestrator();
    let first = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    let mut edited = files.clone();
    edited[0].1 = "def foo(x):\n    return x + 2\n".to_string();

    let incremental = orchestrator
        .build_incremental(&first, sources(&edited), &CancellationToken::new())
        .unwrap();
    let full = orchestrator
        .build_full(&snapshot(), sources(&edited), &CancellationToken::new())
        .unwrap();

    fn doc_json(result: &BuildResult, path: &str) -> String {
        serde_json::to_string(result.documents[path].as_ref()).unwrap()
    }

    assert_eq!(doc_json(&incremental, "mod_a.py"), doc_json(&full, "mod_a.py"));
    assert_eq!(doc_json(&incremental, "mod_b.py"), doc_json(&full, "mod_b.py"));
    assert_eq!(incremental.context.file_deps, full.context.file_deps);
    assert_eq!(
        serde_json::to_string(&incremental.findings).unwrap(),
        serde_json::to_string(&full.findings).unwrap()
    );
}

// ────────────────────────────────────────────────────────────────────
// Scenario 4 + P6: rename detection and identity
// ────────────────────────────────────────────────────────────────────

#[test]
fn identical_content_move_is_a_rename() {
    let body = "def foo(x):\n    y = x + 1\n    return y\n".repeat(10);
    let files = vec![("a.py".to_string(), body.clone())];

    let orchestrator = orchestrator();
    let full = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    let moved = vec![("b.py".to_string(), body)];
    let incremental = orchestrator
        .build_incremental(&full, sources(&moved), &CancellationToken::new())
        .unwrap();

    // The change set classified the move as a rename
    assert!(incremental.change_set.added.is_empty());
    assert!(incremental.change_set.deleted.is_empty());
    assert_eq!(
        incremental.change_set.renamed.get("a.py").map(|s| s.as_str()),
        Some("b.py")
    );

    // Module path was relative, so FQNs change with the file
    assert!(incremental.documents.contains_key("b.py"));
    assert!(!incremental.documents.contains_key("a.py"));
    let doc = &incremental.documents["b.py"];
    assert!(doc.nodes.iter().any(|n| n.fqn == "b.foo"));
    assert_eq!(doc.nodes.iter().find(|n| n.fqn == "a.foo"), None);
}

#[test]
fn stable_ids_follow_fqn_not_path() {
    use atlas_ir::{Node, NodeKind, Span};

    // Same FQN and span: id independent of the file's location
    let span = Span::new(3, 0, 6, 0);
    let id = Node::stable_id("repo", "pkg.mod.f", NodeKind::Function, span);
    let id_again = Node::stable_id("repo", "pkg.mod.f", NodeKind::Function, span);
    assert_eq!(id, id_again);

    // Different FQN: different identity
    assert_ne!(
        id,
        Node::stable_id("repo", "pkg.other.f", NodeKind::Function, span)
    );
}

// ────────────────────────────────────────────────────────────────────
// Structural change invalidates importers
// ────────────────────────────────────────────────────────────────────

#[test]
fn import_change_rebuilds_dependents() {
    let files = vec![
        (
            "base.py".to_string(),
            "def helper():\n    return 1\n".to_string(),
        ),
        (
            "user.py".to_string(),
            "from base import helper\n\ndef run():\n    return helper()\n".to_string(),
        ),
    ];
    let orchestrator = orchestrator();
    let full = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    // Add an import to base.py: structural change
    let mut edited = files.clone();
    edited[0].1 = "import os\n\ndef helper():\n    return 1\n".to_string();

    let incremental = orchestrator
        .build_incremental(&full, sources(&edited), &CancellationToken::new())
        .unwrap();

    // base.py changed structurally, so user.py rebuilt as well
    assert_eq!(incremental.stats.files_analyzed, 2);
}

// ────────────────────────────────────────────────────────────────────
// No-op incremental build reuses everything
// ────────────────────────────────────────────────────────────────────

#[test]
fn unchanged_snapshot_rebuilds_nothing() {
    let files = hundred_file_repo();
    let orchestrator = orchestrator();
    let full = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    let incremental = orchestrator
        .build_incremental(&full, sources(&files), &CancellationToken::new())
        .unwrap();

    assert_eq!(incremental.stats.files_analyzed, 0);
    for (path, doc) in &incremental.documents {
        assert!(Arc::ptr_eq(doc, &full.documents[path]));
    }
}
