//! InjectionRisk.DangerousMethod (IH002): script text built from input passed to
//! engine methods such as `InvokeScript` or `[ScriptBlock]::Create`

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::{SinkCategory, SinkRegistry};

declare_rule!(
    DangerousMethodInjection,
    id = "IH002",
    name = "InjectionRisk.DangerousMethod",
    description = "Disallow passing non-constant script text to script-executing engine methods",
    severity = Error,
    examples = "# Bad\n$ExecutionContext.InvokeCommand.InvokeScript(\"Get-Item $Path\")\n[ScriptBlock]::Create(\"Get-Item $Path\")\n\n# Good\n$sb = { param($p) Get-Item $p }\n& $sb $Path"
);

impl Rule for DangerousMethodInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.category == SinkCategory::ReflectiveMethod && site.tainted)
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Possible code injection: '{}' runs script text built from non-constant input",
                        site.sink
                    ),
                )
                .with_suggestion(
                    "Use a script block literal and pass data as arguments instead of building script text",
                )
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
