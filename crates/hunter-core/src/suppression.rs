//! Scope-bounded suppression of findings
//!
//! A declaration annotated with
//! `[Diagnostics.CodeAnalysis.SuppressMessageAttribute('InjectionRisk.AddType', '...')]`
//! silences that one detector for findings inside the declaration's body.
//! Names match exactly; the justification is carried but never consulted.

use crate::ast::{Span, SyntaxTree};
use crate::semantic::{Scope, ScopeBuilder, ScopeTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedSuppression {
    pub detector: String,
    pub justification: Option<String>,
    /// Body of the annotated declaration.
    pub body: Span,
}

impl ScopedSuppression {
    pub fn new(detector: impl Into<String>, body: Span) -> Self {
        Self {
            detector: detector.into(),
            justification: None,
            body,
        }
    }

    pub fn covers(&self, detector: &str, span: Span) -> bool {
        self.detector == detector && self.body.contains(span)
    }
}

/// Whether any of `suppressions` silences `detector` at `span`.
pub fn is_suppressed(detector: &str, span: Span, suppressions: &[ScopedSuppression]) -> bool {
    suppressions.iter().any(|s| s.covers(detector, span))
}

/// Suppressions of one file, resolved through its scope tree.
#[derive(Default)]
pub struct SuppressionIndex {
    scopes: ScopeTree,
}

impl SuppressionIndex {
    pub fn from_scope_tree(scopes: ScopeTree) -> Self {
        Self { scopes }
    }

    pub fn from_tree(tree: &SyntaxTree) -> Self {
        Self::from_scope_tree(ScopeBuilder::build(tree))
    }

    /// The scope whose annotation silences `detector` at `span`, searching
    /// from the innermost enclosing scope outwards.
    pub fn covering(&self, detector: &str, span: Span) -> Option<&Scope> {
        let innermost = self.scopes.innermost_containing(span)?;
        self.scopes
            .ancestors(innermost)
            .find(|scope| is_suppressed(detector, span, &scope.suppressions))
    }

    pub fn is_suppressed(&self, detector: &str, span: Span) -> bool {
        self.covering(detector, span).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScopedSuppression> {
        self.scopes
            .scopes()
            .flat_map(|scope| scope.suppressions.iter())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}
