//! InjectionRisk.AddType (IH003): type source built from input compiled with Add-Type

use crate::ast::SyntaxTree;
use crate::declare_rule;
use crate::diagnostic::Finding;
use crate::rules::helpers::{code_sites, dedup_by_site, finding};
use crate::rules::{Rule, RuleMetadata};
use crate::taint::{SinkCategory, SinkRegistry};

declare_rule!(
    AddTypeInjection,
    id = "IH003",
    name = "InjectionRisk.AddType",
    description = "Disallow compiling type definitions built from non-constant input",
    severity = Error,
    examples = "# Bad\nAdd-Type -TypeDefinition \"public class C { $Body }\"\n\n# Good\nAdd-Type -TypeDefinition 'public class C { public static int F(int x) { return x; } }'"
);

impl Rule for AddTypeInjection {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding> {
        let mut findings: Vec<Finding> = code_sites(tree, sinks)
            .into_iter()
            .filter(|site| site.category == SinkCategory::TypeDefinition && site.tainted)
            .map(|site| {
                finding(
                    &self.metadata,
                    tree,
                    site.span,
                    format!(
                        "Possible code injection: '{}' compiles source built from non-constant input",
                        site.sink
                    ),
                )
                .with_suggestion(
                    "Keep type definitions constant and pass data to the compiled type at runtime",
                )
            })
            .collect();
        dedup_by_site(&mut findings);
        findings
    }
}
