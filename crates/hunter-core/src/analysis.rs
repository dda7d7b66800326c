//! Analysis engine: runs the detectors over syntax trees
//!
//! Provides the entry point for hosts. The engine runs every enabled detector
//! in registration order, drops findings silenced by suppression annotations
//! and reports detector faults next to the findings.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::ast::SyntaxTree;
use crate::config::Config;
use crate::diagnostic::{DetectorFault, Finding};
use crate::rules::RuleRegistry;
use crate::rules::security::{
    AddTypeInjection, CommandInjection, DangerousMethodInjection, ForEachObjectInjection,
    InvokeExpressionInjection, MemberInjection, UnsafeEscaping,
};
use crate::suppression::SuppressionIndex;
use crate::taint::SinkRegistry;

const DETECTOR_NAMESPACE: &str = "InjectionRisk.";

/// Everything the engine learned about one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub path: String,
    pub findings: Vec<Finding>,
    /// Findings silenced by a suppression annotation.
    pub suppressed: Vec<Finding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<DetectorFault>,
}

impl AnalysisReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.faults.is_empty()
    }
}

pub struct AnalysisEngine {
    registry: RuleRegistry,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self {
            registry: create_default_registry(),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        let mut registry = create_default_registry();
        registry.configure(&config.rules);
        if !config.sinks.is_empty() {
            registry.set_sinks(SinkRegistry::with_config(&config.sinks));
        }
        Self { registry }
    }

    /// Runs a caller-assembled registry instead of the built-in detectors.
    pub fn from_registry(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn analyze(&self, tree: &SyntaxTree) -> Vec<Finding> {
        self.analyze_with_report(tree).findings
    }

    pub fn analyze_with_report(&self, tree: &SyntaxTree) -> AnalysisReport {
        let suppressions = SuppressionIndex::from_tree(tree);
        self.warn_unknown_suppressions(tree, &suppressions);

        let (all, faults) = self.registry.run_all_with_faults(tree);
        let mut findings = Vec::new();
        let mut suppressed = Vec::new();
        for finding in all {
            match suppressions.covering(&finding.detector, finding.span) {
                Some(scope) => {
                    trace!(
                        file = %tree.path,
                        detector = %finding.detector,
                        scope = ?scope.kind,
                        name = scope.name.as_deref().unwrap_or_default(),
                        "Finding suppressed"
                    );
                    suppressed.push(finding);
                }
                None => findings.push(finding),
            }
        }

        debug!(
            file = %tree.path,
            findings = findings.len(),
            suppressed = suppressed.len(),
            faults = faults.len(),
            "Analyzed file"
        );

        AnalysisReport {
            path: tree.path.clone(),
            findings,
            suppressed,
            faults,
        }
    }

    /// Analyzes independent files in parallel. Reports come back in input order.
    pub fn analyze_batch(&self, trees: &[SyntaxTree]) -> Vec<AnalysisReport> {
        trees
            .par_iter()
            .map(|tree| self.analyze_with_report(tree))
            .collect()
    }

    fn warn_unknown_suppressions(&self, tree: &SyntaxTree, suppressions: &SuppressionIndex) {
        for entry in suppressions.entries() {
            if entry.detector.starts_with(DETECTOR_NAMESPACE)
                && self.registry.get_rule_by_name(&entry.detector).is_none()
            {
                warn!(
                    file = %tree.path,
                    detector = %entry.detector,
                    "Suppression names an unknown detector"
                );
            }
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    registry.register(Box::new(InvokeExpressionInjection::new()));
    registry.register(Box::new(DangerousMethodInjection::new()));
    registry.register(Box::new(AddTypeInjection::new()));
    registry.register(Box::new(CommandInjection::new()));
    registry.register(Box::new(ForEachObjectInjection::new()));
    registry.register(Box::new(MemberInjection::new()));
    registry.register(Box::new(UnsafeEscaping::new()));

    registry
}
