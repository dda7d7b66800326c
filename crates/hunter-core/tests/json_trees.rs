//! Integration tests over syntax trees in the JSON form a host parser emits.

use std::fs;
use std::path::Path;

use hunter_core::ast::Node;
use hunter_core::{AnalysisEngine, Finding, SyntaxTree};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

fn load_fixture(name: &str) -> SyntaxTree {
    let path = Path::new(FIXTURES_DIR).join(name);
    let json = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    SyntaxTree::from_json(&json)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", path.display(), e))
}

fn summary(findings: &[Finding]) -> Vec<(&str, usize, usize)> {
    findings
        .iter()
        .map(|f| (f.rule_id.as_str(), f.line, f.column))
        .collect()
}

#[test]
fn indirect_taint_through_local_variable() {
    let tree = load_fixture("deploy_injection.json");

    let findings = AnalysisEngine::new().analyze(&tree);

    assert_eq!(summary(&findings), vec![("IH001", 3, 1)]);
    assert_eq!(findings[0].file, "deploy.ps1");
    assert_eq!(findings[0].detector, "InjectionRisk.InvokeExpression");
}

#[test]
fn suppression_covers_only_the_annotated_function() {
    let tree = load_fixture("suppressed_function.json");

    let report = AnalysisEngine::new().analyze_with_report(&tree);

    assert_eq!(summary(&report.findings), vec![("IH001", 8, 5)]);
    assert_eq!(summary(&report.suppressed), vec![("IH001", 4, 5)]);
}

#[test]
fn detectors_report_in_registration_order() {
    let tree = load_fixture("interpreter_and_members.json");

    let findings = AnalysisEngine::new().analyze(&tree);

    assert_eq!(
        summary(&findings),
        vec![("IH002", 6, 1), ("IH004", 2, 1), ("IH005", 3, 10), ("IH006", 5, 1)]
    );
}

#[test]
fn escaping_is_reported_alongside_the_sink() {
    let tree = load_fixture("escaping.json");

    let findings = AnalysisEngine::new().analyze(&tree);

    assert_eq!(summary(&findings), vec![("IH001", 3, 1), ("IH007", 3, 1)]);
}

#[test]
fn unknown_node_kinds_load_as_unsupported() {
    let tree = load_fixture("escaping.json");

    assert!(matches!(
        tree.root.statements.last(),
        Some(Node::Unsupported(node)) if node.kind == "TrapStatement"
    ));
}

#[test]
fn sink_inside_unmodelled_statement_is_reported() {
    let tree = load_fixture("try_block.json");

    let findings = AnalysisEngine::new().analyze(&tree);

    assert_eq!(summary(&findings), vec![("IH001", 3, 5)]);
}

#[test]
fn malformed_json_is_an_error() {
    let result = SyntaxTree::from_json(r#"{"path": "a.ps1", "root": {"statements": 3}}"#);

    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Invalid syntax tree JSON"));
}

#[test]
fn batch_over_all_fixtures() {
    let names = [
        "deploy_injection.json",
        "suppressed_function.json",
        "interpreter_and_members.json",
        "escaping.json",
    ];
    let trees: Vec<SyntaxTree> = names.iter().map(|name| load_fixture(name)).collect();

    let reports = AnalysisEngine::new().analyze_batch(&trees);

    let counts: Vec<(&str, usize)> = reports
        .iter()
        .map(|r| (r.path.as_str(), r.findings.len()))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("deploy.ps1", 1),
            ("allowlist.ps1", 1),
            ("tasks.ps1", 4),
            ("lookup.ps1", 2),
        ]
    );
}
