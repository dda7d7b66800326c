//! Rule system for injection detection
//!
//! Each detector is a [`Rule`]: a stateless check over one syntax tree. The
//! [`RuleRegistry`] runs them in registration order, applies configuration
//! and isolates a detector that panics from the others.

pub mod helpers;
pub mod security;

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::error;

use crate::ast::SyntaxTree;
use crate::config::RulesConfig;
use crate::diagnostic::{DetectorFault, Finding};
use crate::taint::SinkRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn level(&self) -> u8 {
        match self {
            Confidence::High => 3,
            Confidence::Medium => 2,
            Confidence::Low => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub confidence: Confidence,
    pub examples: Option<&'static str>,
}

pub trait Rule: Send + Sync {
    fn metadata(&self) -> &RuleMetadata;
    fn check(&self, tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<Finding>;
}

pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
    sinks: SinkRegistry,
    disabled_rules: HashSet<String>,
    severity_overrides: HashMap<String, Severity>,
    min_confidence: Confidence,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            sinks: SinkRegistry::with_defaults(),
            disabled_rules: HashSet::new(),
            severity_overrides: HashMap::new(),
            min_confidence: Confidence::Low,
        }
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn set_sinks(&mut self, sinks: SinkRegistry) {
        self.sinks = sinks;
    }

    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    pub fn configure(&mut self, config: &RulesConfig) {
        self.disabled_rules.clear();
        self.severity_overrides.clear();

        for rule_ref in &config.disabled {
            self.disabled_rules.insert(rule_ref.clone());
        }

        for (rule_ref, severity_value) in &config.severity {
            self.severity_overrides
                .insert(rule_ref.clone(), (*severity_value).into());
        }

        self.min_confidence = config
            .min_confidence
            .map(Confidence::from)
            .unwrap_or(Confidence::Low);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn run_all(&self, tree: &SyntaxTree) -> Vec<Finding> {
        self.run_all_with_faults(tree).0
    }

    /// Runs every enabled rule. A rule that panics contributes no findings and
    /// one [`DetectorFault`]; the remaining rules still run.
    pub fn run_all_with_faults(&self, tree: &SyntaxTree) -> (Vec<Finding>, Vec<DetectorFault>) {
        let mut findings = Vec::new();
        let mut faults = Vec::new();

        for rule in self.rules.iter().filter(|r| self.should_run_rule(r.as_ref())) {
            let metadata = rule.metadata();
            match panic::catch_unwind(AssertUnwindSafe(|| rule.check(tree, &self.sinks))) {
                Ok(mut rule_findings) => {
                    self.apply_severity_overrides(rule.as_ref(), &mut rule_findings);
                    rule_findings
                        .retain(|f| f.confidence.level() >= self.min_confidence.level());
                    findings.extend(rule_findings);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        rule = metadata.id,
                        detector = metadata.name,
                        file = %tree.path,
                        "Detector failed: {}",
                        message
                    );
                    faults.push(DetectorFault {
                        rule_id: metadata.id.to_string(),
                        detector: metadata.name.to_string(),
                        message,
                    });
                }
            }
        }

        (findings, faults)
    }

    fn should_run_rule(&self, rule: &dyn Rule) -> bool {
        !self.is_rule_disabled(rule.metadata())
    }

    fn is_rule_disabled(&self, metadata: &RuleMetadata) -> bool {
        self.disabled_rules.contains(metadata.id) || self.disabled_rules.contains(metadata.name)
    }

    fn apply_severity_overrides(&self, rule: &dyn Rule, findings: &mut [Finding]) {
        let metadata = rule.metadata();

        let override_severity = self
            .severity_overrides
            .get(metadata.id)
            .or_else(|| self.severity_overrides.get(metadata.name));

        if let Some(severity) = override_severity {
            for finding in findings.iter_mut() {
                finding.severity = *severity;
            }
        }
    }

    pub fn is_rule_enabled(&self, id_or_name: &str) -> bool {
        self.get_rule(id_or_name)
            .or_else(|| self.get_rule_by_name(id_or_name))
            .is_some_and(|rule| self.should_run_rule(rule))
    }

    pub fn get_rule(&self, id: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|r| r.metadata().id == id)
            .map(|r| r.as_ref())
    }

    pub fn get_rule_by_name(&self, name: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|r| r.metadata().name == name)
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "detector panicked".to_string()
    }
}

#[macro_export]
macro_rules! declare_rule {
    (
        $name:ident,
        id = $id:literal,
        name = $rule_name:literal,
        description = $desc:literal,
        severity = $sev:ident
        $(, confidence = $conf:ident)?
        $(, examples = $examples:literal)?
    ) => {
        pub struct $name {
            metadata: $crate::rules::RuleMetadata,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    metadata: $crate::rules::RuleMetadata {
                        id: $id,
                        name: $rule_name,
                        description: $desc,
                        severity: $crate::rules::Severity::$sev,
                        confidence: $crate::declare_rule!(@confidence $($conf)?),
                        examples: $crate::declare_rule!(@examples $($examples)?),
                    },
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    (@confidence $conf:ident) => { $crate::rules::Confidence::$conf };
    (@confidence) => { $crate::rules::Confidence::High };
    (@examples $examples:literal) => { Some($examples) };
    (@examples) => { None };
}
