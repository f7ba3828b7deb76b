//! End-to-end pipeline tests

use atlas_ir::config::{AnalysisConfig, CacheTierConfig};
use atlas_ir::features::taint::RuleCatalog;
use atlas_ir::pipeline::{BuildResult, CancellationToken, PipelineOrchestrator};
use atlas_ir::shared::models::{LanguageId, RepoSnapshot, SourceFile};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn snapshot() -> RepoSnapshot {
    RepoSnapshot::new("repo", "snap-1", "/tmp/repo")
}

fn sources(files: &[(&str, &str)]) -> Vec<SourceFile> {
    files
        .iter()
        .map(|(path, content)| SourceFile::new(*path, LanguageId::Python, *content))
        .collect()
}

fn no_cache_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.cache.l0 = CacheTierConfig {
        enabled: false,
        ..CacheTierConfig::default()
    };
    config.cache.l1 = CacheTierConfig {
        enabled: false,
        ..CacheTierConfig::default()
    };
    config.cache.l2 = CacheTierConfig {
        enabled: false,
        ..CacheTierConfig::default()
    };
    config
}

fn build(files: &[(&str, &str)]) -> BuildResult {
    let orchestrator = PipelineOrchestrator::new(no_cache_config()).unwrap();
    orchestrator
        .build_full(&snapshot(), sources(files), &CancellationToken::new())
        .unwrap()
}

fn documents_json(result: &BuildResult) -> String {
    let mut paths: Vec<&String> = result.documents.keys().collect();
    paths.sort();
    let docs: Vec<_> = paths
        .iter()
        .map(|p| result.documents.get(*p).unwrap().as_ref())
        .collect();
    serde_json::to_string(&docs).unwrap()
}

// ────────────────────────────────────────────────────────────────────
// P1: determinism
// ────────────────────────────────────────────────────────────────────

#[test]
fn full_build_is_deterministic() {
    init_tracing();
    let files = [
        ("pkg/a.py", "def foo(x):\n    y = x + 1\n    return y\n"),
        ("pkg/b.py", "from pkg.a import foo\n\ndef bar():\n    return foo(2)\n"),
    ];

    let first = build(&files);
    let second = build(&files);

    assert_eq!(documents_json(&first), documents_json(&second));
    assert_eq!(
        serde_json::to_string(&first.findings).unwrap(),
        serde_json::to_string(&second.findings).unwrap()
    );
    assert_eq!(first.context.file_deps, second.context.file_deps);
}

// ────────────────────────────────────────────────────────────────────
// P3: cache equivalence
// ────────────────────────────────────────────────────────────────────

#[test]
fn cache_tiers_do_not_change_artifacts() {
    let files = [
        ("m.py", "def f(x):\n    return x * 2\n\ndef g():\n    return f(1)\n"),
    ];

    let without_cache = build(&files);

    let temp = tempfile::TempDir::new().unwrap();
    let mut cached_config = AnalysisConfig::default();
    cached_config.cache.l2.path = Some(temp.path().to_path_buf());
    let orchestrator = PipelineOrchestrator::new(cached_config).unwrap();

    // First run populates, second run hits the cache
    let cold = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();
    let warm = orchestrator
        .build_full(&snapshot(), sources(&files), &CancellationToken::new())
        .unwrap();

    assert!(warm.stats.files_from_cache > 0);
    assert_eq!(documents_json(&without_cache), documents_json(&cold));
    assert_eq!(documents_json(&cold), documents_json(&warm));
}

// ────────────────────────────────────────────────────────────────────
// Scenario 5: cross-file call resolution
// ────────────────────────────────────────────────────────────────────

#[test]
fn cross_file_call_resolves_to_definition() {
    let result = build(&[
        ("mod_a.py", "def foo():\n    return 1\n"),
        ("mod_b.py", "from mod_a import foo\nfoo()\n"),
    ]);

    let foo = result.context.resolve("mod_a.foo").unwrap();
    let mod_b = &result.documents["mod_b.py"];

    let call = mod_b
        .edges
        .iter()
        .find(|e| e.kind == atlas_ir::EdgeKind::Calls)
        .unwrap();
    assert_eq!(call.target_id, foo.node_id);

    let import = mod_b
        .edges
        .iter()
        .find(|e| e.kind == atlas_ir::EdgeKind::Imports)
        .unwrap();
    assert_eq!(import.target_id, foo.node_id);
    assert!(!import.target_id.starts_with("external:"));
}

// ────────────────────────────────────────────────────────────────────
// Scenario 1 + 2: taint findings through the full pipeline
// ────────────────────────────────────────────────────────────────────

#[test]
fn null_dereference_finding() {
    let result = build(&[("m.py", "def f(x):\n    return x.value\nf(None)\n")]);

    let nulls: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.category == "NullDereference")
        .collect();
    assert_eq!(nulls.len(), 1);
    // Path begins at the None call site and ends at the x.value access
    assert_eq!(nulls[0].source.span.start_line, 2);
    assert_eq!(nulls[0].sink.span.start_line, 1);
}

#[test]
fn sql_injection_finding() {
    let catalog = RuleCatalog::from_yaml_str(
        r#"
rules:
  - id: py.web.source.get_item
    kind: source
    pattern: "req.GET.__getitem__"
    label: user_input
  - id: py.sql.sink.execute
    kind: sink
    pattern: "db.execute"
    label: sql
    category: SQLInjection
    severity: high
    cwe: CWE-89
    sink_args: [0]
"#,
    )
    .unwrap();

    let orchestrator = PipelineOrchestrator::new(no_cache_config())
        .unwrap()
        .with_rule_catalog(catalog);
    let result = orchestrator
        .build_full(
            &snapshot(),
            sources(&[(
                "app.py",
                "def handler(req):\n    q = \"SELECT * FROM t WHERE id=\" + req.GET[\"id\"]\n    db.execute(q)\n",
            )]),
            &CancellationToken::new(),
        )
        .unwrap();

    let sql: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.category == "SQLInjection")
        .collect();
    assert_eq!(sql.len(), 1);
    assert_eq!(sql[0].cwe.as_deref(), Some("CWE-89"));
    assert_eq!(sql[0].path.len(), 3);
    assert!(sql[0].sanitizers_encountered.is_empty());
}

// ────────────────────────────────────────────────────────────────────
// Scenario 6: escape classification
// ────────────────────────────────────────────────────────────────────

#[test]
fn closure_captured_dict_is_return_escape() {
    let result = build(&[(
        "m.py",
        "def f():\n    d = {}\n    def g():\n        return d\n    return g\n",
    )]);

    let info = result
        .escape
        .values()
        .find(|i| i.function_fqn == "m.f")
        .unwrap();
    assert_eq!(info.state_of("d"), atlas_ir::EscapeState::ReturnEscape);
    assert!(!info.is_thread_local("d"));
    assert!(!info.is_heap_escape("d"));
}

// ────────────────────────────────────────────────────────────────────
// P4: invariants hold after the build
// ────────────────────────────────────────────────────────────────────

#[test]
fn invariants_hold_after_full_build() {
    let result = build(&[
        ("pkg/a.py", "class Base:\n    pass\n"),
        (
            "pkg/b.py",
            "from pkg.a import Base\n\nclass Child(Base):\n    def run(self):\n        x = 1\n        return x\n",
        ),
    ]);

    for doc in result.documents.values() {
        doc.validate().unwrap();
    }

    // Snapshot-wide: every edge endpoint resolves or is External
    let documents: Vec<_> = result.documents.values().cloned().collect();
    atlas_ir::features::cross_file::CrossFileResolver::validate_snapshot(
        &documents,
        &result.context,
    )
    .unwrap();

    // Every semantic IR satisfies the SSA dominance invariant
    for ir in result.semantic.values() {
        atlas_ir::features::ssa::SsaBuilder::validate(&ir.ssa, &ir.dominators).unwrap();
    }
}

// ────────────────────────────────────────────────────────────────────
// P5: SSA round-trip
// ────────────────────────────────────────────────────────────────────

#[test]
fn ssa_dissolve_preserves_def_use() {
    let result = build(&[(
        "m.py",
        "def f(x):\n    if x:\n        y = 1\n    else:\n        y = 2\n    return y\n",
    )]);

    for ir in result.semantic.values() {
        for (stmt_idx, defs, uses) in ir.ssa.dissolve() {
            let stmt = &ir.cfg.stmts[stmt_idx as usize];
            assert_eq!(stmt.defs, defs);
            for used in &uses {
                assert!(stmt.uses.contains(used));
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────
// Cancellation
// ────────────────────────────────────────────────────────────────────

#[test]
fn cancelled_token_aborts_cleanly() {
    let orchestrator = PipelineOrchestrator::new(no_cache_config()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = orchestrator
        .build_full(&snapshot(), sources(&[("m.py", "x = 1\n")]), &token)
        .unwrap_err();
    assert_eq!(err.kind, atlas_ir::ErrorKind::Cancelled);
}

// ────────────────────────────────────────────────────────────────────
// Degraded files never abort the run
// ────────────────────────────────────────────────────────────────────

#[test]
fn parse_errors_degrade_not_fail() {
    let result = build(&[
        ("ok.py", "def f():\n    return 1\n"),
        ("broken.py", "def broken(:\n    pass\n"),
    ]);

    assert_eq!(result.documents.len(), 2);
    assert!(result
        .errors
        .degraded_files
        .contains(&"broken.py".to_string()));

    // The healthy file is fully analyzed
    assert!(result.context.resolve("ok.f").is_some());
}

// ────────────────────────────────────────────────────────────────────
// Chunk stream
// ────────────────────────────────────────────────────────────────────

#[test]
fn chunks_are_emitted_for_every_level() {
    use atlas_ir::features::chunking::{MemoryLexicalStore, MemoryVectorStore};
    use std::sync::Arc;

    let vector = Arc::new(MemoryVectorStore::new());
    let lexical = Arc::new(MemoryLexicalStore::new());
    let orchestrator = PipelineOrchestrator::new(no_cache_config())
        .unwrap()
        .with_index_stores(vector.clone(), lexical.clone());

    let result = orchestrator
        .build_full(
            &snapshot(),
            sources(&[(
                "pkg/m.py",
                "class C:\n    def m(self):\n        pass\n\ndef f():\n    return 1\n",
            )]),
            &CancellationToken::new(),
        )
        .unwrap();

    assert!(result.stats.chunks_emitted >= 4);
    assert!(vector.active_count() >= 4);
    assert!(!lexical.is_empty());
}
