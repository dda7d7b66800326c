//! InjectionRisk.UnsafeEscaping (IH007): hand-rolled quote escaping of input
//! that is then evaluated as code
//!
//! `-replace "'", "''"` and friends look like sanitization, but they miss
//! other quote characters and sub-expressions. The sink detectors still
//! report the call itself; this detector points at the escaping attempt.

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::SinkRegistry;

declare_rule!(
    UnsafeEscaping,
    id = "IH007",
    name = "InjectionRisk.UnsafeEscaping",
    description = "Disallow relying on manual quote escaping before evaluating input as code",
    severity = Warning,
    confidence = Medium,
    examples = "# Bad\n$safe = $Name -replace \"'\", \"''\"\nInvoke-Expression \"Get-Item '$safe'\"\n\n# Good\nGet-Item -LiteralPath $Name"
);

impl Rule for UnsafeEscaping {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.escaped && site.category.evaluates_code())
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Unsafe escaping: input escaped by hand is evaluated by '{}'; quote replacement does not prevent injection",
                        site.sink
                    ),
                )
                .with_suggestion(
                    "Pass the value as an argument (script block parameter, -LiteralPath) instead of escaping it into code",
                )
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
