//! InjectionRisk.ForEachObjectInjection (IH005): a non-constant operand to
//! `ForEach-Object` or `.ForEach()`, which may name a member to invoke on
//! every item

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::{SinkCategory, SinkRegistry};

declare_rule!(
    ForEachObjectInjection,
    id = "IH005",
    name = "InjectionRisk.ForEachObjectInjection",
    description = "Disallow non-constant member names in per-item operators",
    severity = Warning,
    confidence = Medium,
    examples = "# Bad\n$items | ForEach-Object $Member\n$items.ForEach($Member)\n\n# Good\n$items | ForEach-Object { $_.Name }\n$items | ForEach-Object Name"
);

impl Rule for ForEachObjectInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.category == SinkCategory::PerItemOperator && site.tainted)
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Possible member injection: '{}' receives a non-constant operand that may name a method to invoke on each item",
                        site.sink
                    ),
                )
                .with_suggestion("Pass a script block literal or a constant member name")
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
