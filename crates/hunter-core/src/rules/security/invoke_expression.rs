//! InjectionRisk.InvokeExpression (IH001): non-constant strings reaching Invoke-Expression

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::{SinkCategory, SinkRegistry};

declare_rule!(
    InvokeExpressionInjection,
    id = "IH001",
    name = "InjectionRisk.InvokeExpression",
    description = "Disallow evaluating strings built from non-constant input",
    severity = Error,
    examples = "# Bad\nInvoke-Expression \"Get-Process -Name $Name\"\n$Name | iex\n\n# Good\nGet-Process -Name $Name"
);

impl Rule for InvokeExpressionInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.category == SinkCategory::DynamicEvaluation && site.tainted)
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Possible code injection: '{}' evaluates a string built from non-constant input",
                        site.sink
                    ),
                )
                .with_suggestion(
                    "Call the command directly, or use a script block and pass data as arguments: & { param($x) ... } $value",
                )
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
