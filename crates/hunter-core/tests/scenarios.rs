//! End-to-end behaviour of the engine on representative script shapes.

use hunter_core::ast::builder::TreeBuilder;
use hunter_core::ast::{Node, SyntaxTree};
use hunter_core::semantic::{Bindings, Classification, ScopeTracker, classify};
use hunter_core::{AnalysisEngine, Finding};

fn analyze(tree: &SyntaxTree) -> Vec<Finding> {
    AnalysisEngine::new().analyze(tree)
}

fn rule_ids(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.rule_id.as_str()).collect()
}

#[test]
fn classifier_is_total_over_node_kinds() {
    let b = TreeBuilder::new();
    let bindings = Bindings::new();
    let nodes: Vec<Node> = vec![
        b.lit("x"),
        b.string("a $b", vec![b.var("b")]),
        b.var("v"),
        b.type_lit("[int]"),
        b.concat(b.lit("a"), b.lit("b")),
        b.array(vec![b.lit("a")]),
        b.paren(b.lit("a")),
        b.sub_expression(vec![b.lit("a")]),
        b.cast("string", b.var("v")),
        b.command("Get-Date", vec![]),
        b.pipeline(vec![b.lit("a")]),
        b.invoke(b.var("o"), "M", vec![]),
        b.member(b.var("o"), "P"),
        b.script_block(vec![]),
        b.function("F", &[], vec![]),
        b.if_stmt(b.var("c"), vec![]),
        b.foreach_loop("i", b.var("items"), vec![]),
        b.unsupported("SwitchStatement", vec![b.var("v")]),
    ];

    for node in &nodes {
        let class = classify(node, &bindings);
        assert!(matches!(class, Classification::Constant | Classification::NonConstant));
    }
    let unknown = b.unsupported("IndexExpression", vec![]);
    assert_eq!(classify(&unknown, &bindings), Classification::NonConstant);
}

#[test]
fn literal_arguments_never_produce_findings() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "safe.ps1",
        b.script(
            &[],
            vec![
                b.command("Invoke-Expression", vec![b.arg(b.lit("Get-Date"))]),
                b.invoke_static("[ScriptBlock]", "Create", vec![b.lit("Get-Date")]),
                b.command(
                    "Add-Type",
                    vec![b.param("TypeDefinition", Some(b.lit("public class C {}")))],
                ),
                b.command("pwsh", vec![b.param("Command", Some(b.lit("Get-Date")))]),
                b.command("ForEach-Object", vec![b.arg(b.lit("Name"))]),
                b.invoke(b.var("obj"), "ToString", vec![]),
            ],
        ),
    );

    assert!(analyze(&tree).is_empty());
}

#[test]
fn indirection_matches_inline_taint() {
    let b = TreeBuilder::new();
    let inline = b.tree(
        "inline.ps1",
        b.script(
            &["p"],
            vec![b.command("Add-Type", vec![b.arg(b.concat(b.lit("class C {"), b.var("p")))])],
        ),
    );
    let indirect = b.tree(
        "indirect.ps1",
        b.script(
            &["p"],
            vec![
                b.assign(b.var("code"), b.concat(b.lit("class C {"), b.var("p"))),
                b.command("Add-Type", vec![b.arg(b.var("code"))]),
            ],
        ),
    );

    assert_eq!(rule_ids(&analyze(&inline)), rule_ids(&analyze(&indirect)));
    assert_eq!(rule_ids(&analyze(&indirect)), vec!["IH003"]);
}

#[test]
fn taint_is_sticky_after_reassignment() {
    let b = TreeBuilder::new();
    let block = b.block(
        &["p"],
        vec![
            b.assign(b.var("x"), b.var("p")),
            b.assign(b.var("x"), b.lit("safe")),
        ],
    );
    let bindings = ScopeTracker::build(&block);
    let later_use = b.var("x");

    assert_eq!(classify(&later_use, &bindings), Classification::NonConstant);
}

#[test]
fn reassignment_in_loop_reaches_earlier_use() {
    let b = TreeBuilder::new();
    let initial = b.assign(b.var("cmd"), b.lit("Get-Date"));
    let items = b.var("p");
    let body = vec![
        b.command("iex", vec![b.arg(b.var("cmd"))]),
        b.assign(b.var("cmd"), b.var("i")),
    ];
    let tree = b.tree(
        "loop.ps1",
        b.script(&["p"], vec![initial, b.foreach_loop("i", items, body)]),
    );

    assert_eq!(rule_ids(&analyze(&tree)), vec!["IH001"]);
}

#[test]
fn constant_command_before_loop_is_clean() {
    let b = TreeBuilder::new();
    let initial = b.assign(b.var("cmd"), b.lit("Get-Date"));
    let call = b.command("iex", vec![b.arg(b.var("cmd"))]);
    let items = b.var("p");
    let body = vec![b.assign(b.var("cmd"), b.var("i"))];
    let tree = b.tree(
        "loop.ps1",
        b.script(&["p"], vec![initial, call, b.foreach_loop("i", items, body)]),
    );

    assert!(analyze(&tree).is_empty());
}

#[test]
fn sinks_inside_unmodelled_statements_are_reported() {
    let b = TreeBuilder::new();
    let guarded = b.unsupported(
        "TryStatement",
        vec![b.command("iex", vec![b.arg(b.var("p"))])],
    );
    let table = b.unsupported(
        "Hashtable",
        vec![b.invoke_static("[ScriptBlock]", "Create", vec![b.var("p")])],
    );
    let tree = b.tree("try.ps1", b.script(&["p"], vec![guarded, table]));

    assert_eq!(rule_ids(&analyze(&tree)), vec!["IH001", "IH002"]);
}

#[test]
fn suppression_does_not_leak_to_sibling_functions() {
    let b = TreeBuilder::new();
    let annotated = b.suppress(
        b.block(&["p"], vec![b.command("iex", vec![b.arg(b.var("p"))])]),
        "InjectionRisk.InvokeExpression",
        "reviewed",
    );
    let tree = b.tree(
        "funcs.ps1",
        b.script(
            &[],
            vec![
                b.function_with("Annotated", annotated),
                b.function("Sibling", &["p"], vec![b.command("iex", vec![b.arg(b.var("p"))])]),
            ],
        ),
    );

    let report = AnalysisEngine::new().analyze_with_report(&tree);

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.suppressed.len(), 1);
    assert!(report.findings[0].span.start > report.suppressed[0].span.start);
}

#[test]
fn escaping_does_not_launder_taint() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "escape.ps1",
        b.script(
            &["p"],
            vec![
                b.assign(b.var("e"), b.replace(b.var("p"), "'", "''")),
                b.command(
                    "Invoke-Expression",
                    vec![b.arg(b.concat(
                        b.concat(b.lit("cmd -x '"), b.var("e")),
                        b.lit("'"),
                    ))],
                ),
            ],
        ),
    );

    let findings = analyze(&tree);

    assert_eq!(rule_ids(&findings), vec!["IH001", "IH007"]);
    assert_eq!(findings[0].span, findings[1].span);
}

#[test]
fn per_item_member_name_exemption() {
    let b = TreeBuilder::new();
    let literal = b.tree(
        "literal.ps1",
        b.script(&[], vec![b.invoke(b.var("items"), "ForEach", vec![b.lit("Name")])]),
    );
    let tainted = b.tree(
        "tainted.ps1",
        b.script(&["p"], vec![b.invoke(b.var("items"), "ForEach", vec![b.var("p")])]),
    );

    assert!(analyze(&literal).is_empty());
    assert_eq!(rule_ids(&analyze(&tainted)), vec!["IH005"]);
}

#[test]
fn concatenated_parameter_reaches_eval() {
    let b = TreeBuilder::new();
    let call = b.command(
        "Invoke-Expression",
        vec![b.arg(b.concat(b.lit("cmd -x "), b.var("P")))],
    );
    let call_span = call.span();
    let tree = b.tree("s1.ps1", b.script(&["P"], vec![call]));

    let findings = analyze(&tree);

    assert_eq!(rule_ids(&findings), vec!["IH001"]);
    assert_eq!(findings[0].span, call_span);
}

#[test]
fn type_definition_is_reported_at_the_compile_call() {
    let b = TreeBuilder::new();
    let assignment = b.assign(
        b.var("code"),
        b.concat(b.concat(b.lit("class C {"), b.var("P")), b.lit("}")),
    );
    let compile = b.command("Add-Type", vec![b.arg(b.var("code"))]);
    let compile_span = compile.span();
    let tree = b.tree("s2.ps1", b.script(&["P"], vec![assignment, compile]));

    let findings = analyze(&tree);

    assert_eq!(rule_ids(&findings), vec!["IH003"]);
    assert_eq!(findings[0].span, compile_span);
}

#[test]
fn constant_type_definition_is_clean() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "s3.ps1",
        b.script(
            &[],
            vec![b.command("Add-Type", vec![b.arg(b.string("class C { fixed }", vec![]))])],
        ),
    );

    assert!(analyze(&tree).is_empty());
}

#[test]
fn interpreter_with_command_array() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "s4.ps1",
        b.script(
            &["P"],
            vec![b.command(
                "powershell",
                vec![b.arg(b.array(vec![b.lit("-c"), b.concat(b.lit("ping "), b.var("P"))]))],
            )],
        ),
    );

    assert_eq!(rule_ids(&analyze(&tree)), vec!["IH004"]);
}

#[test]
fn foreach_with_parameter_and_with_literal() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "s5.ps1",
        b.script(
            &["P"],
            vec![
                b.pipeline(vec![
                    b.var("items"),
                    b.command("ForEach-Object", vec![b.arg(b.var("P"))]),
                ]),
                b.pipeline(vec![
                    b.var("items"),
                    b.command("ForEach-Object", vec![b.arg(b.lit("Name"))]),
                ]),
            ],
        ),
    );

    let findings = analyze(&tree);

    assert_eq!(rule_ids(&findings), vec!["IH005"]);
}

#[test]
fn closure_capture_is_non_constant() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "capture.ps1",
        b.script(
            &[],
            vec![
                b.assign(b.var("cmd"), b.lit("Get-Date")),
                b.command(
                    "Invoke-Command",
                    vec![b.arg(b.script_block(vec![b.command("iex", vec![b.arg(b.var("cmd"))])]))],
                ),
            ],
        ),
    );

    assert_eq!(rule_ids(&analyze(&tree)), vec!["IH001"]);
}

#[test]
fn files_without_sinks_are_clean() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "plain.ps1",
        b.script(
            &["p"],
            vec![
                b.assign(b.var("x"), b.var("p")),
                b.command("Write-Output", vec![b.arg(b.var("x"))]),
            ],
        ),
    );

    let report = AnalysisEngine::new().analyze_with_report(&tree);

    assert!(report.is_clean());
    assert!(report.suppressed.is_empty());
}

#[test]
fn analysis_is_deterministic() {
    let b = TreeBuilder::new();
    let tree = b.tree(
        "det.ps1",
        b.script(
            &["p"],
            vec![
                b.command("iex", vec![b.arg(b.var("p"))]),
                b.invoke_member(b.var("o"), b.var("p"), vec![], false),
                b.command("cmd", vec![b.arg(b.lit("/c")), b.arg(b.var("p"))]),
            ],
        ),
    );
    let engine = AnalysisEngine::new();

    let first = engine.analyze(&tree);
    let second = engine.analyze(&tree);

    assert_eq!(first, second);
    assert_eq!(rule_ids(&first), vec!["IH001", "IH004", "IH006"]);
}
