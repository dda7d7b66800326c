//! InjectionRisk.MemberInjection (IH006): members named by non-constant input
//!
//! `$obj.$name()` invokes whatever method the input names, and `$obj.$name`
//! can return a method reference that is invoked later. Static access
//! (`[Type]::$name`) is reported separately because it reaches process-wide
//! APIs such as `[Diagnostics.Process]::Start`.

use std::ops::ControlFlow;

use crate::ast::{MemberAccess, MethodInvocation, Node, Span, SyntaxTree};
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::SinkRegistry;
use crate::visitor::{AstVisitor, VisitorContext, walk_tree};

declare_rule!(
    MemberInjection,
    id = "IH006",
    name = "InjectionRisk.MemberInjection",
    description = "Disallow invoking or obtaining members whose names come from non-constant input",
    severity = Warning,
    confidence = Medium,
    examples = "# Bad\n$obj.$Method()\n[Math]::$Name(1)\n\n# Good\nswitch ($Method) { 'Start' { $obj.Start() } 'Stop' { $obj.Stop() } }"
);

impl Rule for MemberInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, _sinks: &SinkRegistry) -> Vec<Finding> {
        let mut visitor = MemberInjectionVisitor {
            meta: &self.metadata,
            tree,
            findings: Vec::new(),
        };
        walk_tree(tree, &mut visitor);
        let mut findings = visitor.findings;
        dedup_by_site(&mut findings);
        findings
    }
}

struct MemberInjectionVisitor<'a> {
    meta: &'a RuleMetadata,
    tree: &'a SyntaxTree,
    findings: Vec<Finding>,
}

impl MemberInjectionVisitor<'_> {
    fn check_member(
        &mut self,
        member: &Node,
        span: Span,
        is_static: bool,
        invoked: bool,
        ctx: &VisitorContext,
    ) {
        if member.as_literal().is_some() || !ctx.is_non_constant(member) {
            return;
        }

        let message = match (invoked, is_static) {
            (true, true) => "Possible member injection: a static method named by non-constant input is invoked",
            (true, false) => "Possible member injection: a method named by non-constant input is invoked",
            (false, true) => {
                "Possible member injection: a static member named by non-constant input is obtained and may be invoked later"
            }
            (false, false) => {
                "Possible member injection: a member named by non-constant input is obtained and may be invoked later"
            }
        };

        self.findings.push(
            finding(self.meta, self.tree, span, message).with_suggestion(
                "Map the input to a fixed set of member names, e.g. with a switch statement",
            ),
        );
    }
}

impl AstVisitor for MemberInjectionVisitor<'_> {
    fn visit_method_invocation(
        &mut self,
        node: &MethodInvocation,
        ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        self.check_member(&node.member, node.span, node.is_static, true, ctx);
        ControlFlow::Continue(())
    }

    fn visit_member_access(
        &mut self,
        node: &MemberAccess,
        ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        self.check_member(&node.member, node.span, node.is_static, false, ctx);
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::TreeBuilder;

    fn run_member_injection(tree: &SyntaxTree) -> Vec<Finding> {
        MemberInjection::new().check(tree, &SinkRegistry::with_defaults())
    }

    #[test]
    fn detects_dynamic_instance_method_call() {
        let b = TreeBuilder::new();
        let tree = b.tree(
            "a.ps1",
            b.script(
                &["Method"],
                vec![b.invoke_member(b.var("obj"), b.var("Method"), vec![], false)],
            ),
        );

        let findings = run_member_injection(&tree);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "IH006");
        assert!(findings[0].message.contains("method named by non-constant input is invoked"));
    }

    #[test]
    fn distinguishes_static_and_obtained_members() {
        let b = TreeBuilder::new();
        let tree = b.tree(
            "a.ps1",
            b.script(
                &["n"],
                vec![
                    b.invoke_member(b.type_lit("[Math]"), b.var("n"), vec![b.lit("1")], true),
                    b.assign(b.var("m"), b.member_access(b.var("obj"), b.var("n"), false)),
                    b.member_access(b.type_lit("[Environment]"), b.var("n"), true),
                ],
            ),
        );

        let findings = run_member_injection(&tree);

        assert_eq!(findings.len(), 3);
        assert!(findings[0].message.contains("static method"));
        assert!(findings[1].message.contains("obtained"));
        assert!(!findings[1].message.contains("static"));
        assert!(findings[2].message.contains("static member"));
    }

    #[test]
    fn detects_interpolated_member_names() {
        let b = TreeBuilder::new();
        let tree = b.tree(
            "a.ps1",
            b.script(
                &["suffix"],
                vec![b.invoke_member(
                    b.var("obj"),
                    b.string("Get$suffix", vec![b.var("suffix")]),
                    vec![],
                    false,
                )],
            ),
        );

        assert_eq!(run_member_injection(&tree).len(), 1);
    }

    #[test]
    fn ignores_literal_and_constant_member_names() {
        let b = TreeBuilder::new();
        let tree = b.tree(
            "a.ps1",
            b.script(
                &[],
                vec![
                    b.invoke(b.var("obj"), "Start", vec![]),
                    b.member(b.var("obj"), "Name"),
                    b.assign(b.var("prop"), b.lit("Length")),
                    b.member_access(b.var("obj"), b.var("prop"), false),
                    b.invoke_member(b.var("obj"), b.string("ToString", vec![]), vec![], false),
                ],
            ),
        );

        assert!(run_member_injection(&tree).is_empty());
    }

    #[test]
    fn checks_members_inside_functions() {
        let b = TreeBuilder::new();
        let tree = b.tree(
            "a.ps1",
            b.script(
                &[],
                vec![b.function(
                    "Invoke-Member",
                    &["Name"],
                    vec![b.invoke_member(b.var("obj"), b.var("Name"), vec![], false)],
                )],
            ),
        );

        assert_eq!(run_member_injection(&tree).len(), 1);
    }
}
