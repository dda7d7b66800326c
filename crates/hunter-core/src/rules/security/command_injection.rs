//! InjectionRisk.CommandInjection (IH004): input reaching the command line of
//! a nested interpreter (`powershell -Command`, `pwsh -c`, `cmd /c`)

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::{SinkCategory, SinkRegistry};

declare_rule!(
    CommandInjection,
    id = "IH004",
    name = "InjectionRisk.CommandInjection",
    description = "Disallow passing non-constant text as a command line to a nested shell",
    severity = Error,
    examples = "# Bad\npowershell.exe -Command \"Get-Item $Path\"\ncmd /c \"dir $Path\"\n\n# Good\npowershell.exe -File .\\show.ps1 -Path $Path"
);

impl Rule for CommandInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.category == SinkCategory::ExternalInterpreter && site.tainted)
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Possible command injection: the command line passed to '{}' contains non-constant input",
                        site.sink
                    ),
                )
                .with_suggestion(
                    "Run a script with -File and pass the data as script arguments, or call the command directly",
                )
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
