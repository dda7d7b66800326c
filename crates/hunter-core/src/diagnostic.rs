//! Findings reported by the detectors
//!
//! A [`Finding`] is immutable once the detector that produced it returns; the
//! host formats it. [`DetectorFault`] records a detector that failed
//! internally so the host can surface it without losing the other results.

use serde::Serialize;

use crate::ast::Span;
use crate::rules::{Confidence, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Short rule id, e.g. `IH001`.
    pub rule_id: String,
    /// Stable detector name, e.g. `InjectionRisk.InvokeExpression`. Suppression
    /// annotations match against this.
    pub detector: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub message: String,
    pub span: Span,
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        detector: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            detector: detector.into(),
            severity,
            confidence: Confidence::default(),
            message: message.into(),
            span,
            file: file.into(),
            line: 1,
            column: 1,
            suggestion: None,
        }
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectorFault {
    pub rule_id: String,
    pub detector: String,
    pub message: String,
}
