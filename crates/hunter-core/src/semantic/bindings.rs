//! Per-scope variable bindings
//!
//! [`ScopeTracker`] makes one linear pass over a scope's statements and
//! records, for each local variable, how its classification evolves. Lookups
//! are positional: a use only sees assignments that complete before it.
//!
//! Taint is sticky within a scope. A second assignment, a non-constant
//! right-hand side, or a parameter/loop-variable declaration turns the
//! variable `NonConstant` for every later use, even if a literal is assigned
//! afterwards.
//!
//! Loop bodies run more than once, so a variable assigned anywhere in a body
//! is `NonConstant` from the top of that body on. Unmodelled statements may be
//! loops (`while`, `do`, `switch`) and are treated the same way.

use std::collections::HashMap;

use tracing::trace;

use crate::ast::{AssignmentOperator, Node, ScriptBlock, Variable};
use crate::taint::escaping;

use super::classify::{Classification, classify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingState {
    pub classification: Classification,
    /// Value was produced by a hand-rolled quote-escaping transform over
    /// non-constant input.
    pub escaped: bool,
}

#[derive(Debug, Clone, Copy)]
struct BindingEvent {
    at: u32,
    state: BindingState,
}

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    by_name: HashMap<String, Vec<BindingEvent>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classification of `var` at its own position. Absent bindings are
    /// `NonConstant`.
    pub fn lookup(&self, var: &Variable) -> Classification {
        if var.is_scope_qualified() {
            return Classification::NonConstant;
        }
        self.state_at(&var.key(), var.span.start)
            .map_or(Classification::NonConstant, |state| state.classification)
    }

    pub fn is_escaped(&self, var: &Variable) -> bool {
        !var.is_scope_qualified()
            && self
                .state_at(&var.key(), var.span.start)
                .is_some_and(|state| state.escaped)
    }

    /// State after the last event recorded at or before `offset`.
    pub fn state_at(&self, key: &str, offset: u32) -> Option<BindingState> {
        let events = self.by_name.get(key)?;
        let idx = events.partition_point(|event| event.at <= offset);
        idx.checked_sub(1).map(|i| events[i].state)
    }

    pub fn declare_non_constant(&mut self, key: &str, at: u32) {
        self.record(key, at, Classification::NonConstant, false);
    }

    fn record(&mut self, key: &str, at: u32, classification: Classification, escaped: bool) {
        let events = self.by_name.entry(key.to_string()).or_default();
        // `state_at` binary-searches, so offsets never go backwards.
        let at = events.last().map_or(at, |prev| at.max(prev.at));
        let state = match events.last() {
            // More than one reaching assignment: never constant again.
            Some(prev) => BindingState {
                classification: Classification::NonConstant,
                escaped: escaped || prev.state.escaped,
            },
            None => BindingState {
                classification,
                escaped,
            },
        };
        trace!(variable = key, at, ?state, "binding recorded");
        events.push(BindingEvent { at, state });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_name.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

pub struct ScopeTracker {
    bindings: Bindings,
}

impl ScopeTracker {
    /// Builds the bindings for one scope. Nested script blocks and function
    /// definitions are skipped; they get their own pass.
    pub fn build(block: &ScriptBlock) -> Bindings {
        let mut tracker = Self {
            bindings: Bindings::new(),
        };

        for param in &block.params {
            tracker
                .bindings
                .declare_non_constant(&param.name.to_ascii_lowercase(), block.span.start);
        }

        for statement in &block.statements {
            tracker.visit(statement);
        }

        tracker.bindings
    }

    fn visit(&mut self, node: &Node) {
        match node {
            Node::Assignment(assignment) => {
                // Right-hand side first so chained assignments record in order.
                self.visit(&assignment.value);
                // `+=` reads the previous value, which is unknown or already reassigned.
                let classification = match assignment.operator {
                    AssignmentOperator::Assign => classify(&assignment.value, &self.bindings),
                    AssignmentOperator::Compound => Classification::NonConstant,
                };
                let escaped = escaping::carries_escaped_taint(&assignment.value, &self.bindings);
                self.bind_target(&assignment.target, assignment.span.end, classification, escaped);
            }
            Node::ForEach(stmt) => {
                self.visit(&stmt.iterable);
                let entry = stmt.iterable.span().end;
                self.bindings.declare_non_constant(&stmt.variable.key(), entry);
                let body: Vec<&Node> = stmt.body.iter().collect();
                self.visit_loop_body(&body, entry);
            }
            Node::Unsupported(node) => {
                let body: Vec<&Node> = node.children.iter().collect();
                self.visit_loop_body(&body, node.span.start);
            }
            other => {
                for child in other.children() {
                    self.visit(child);
                }
            }
        }
    }

    /// Assignments later in the body reach uses earlier in it on the next
    /// iteration.
    fn visit_loop_body(&mut self, body: &[&Node], entry: u32) {
        let mut assigned = Vec::new();
        for node in body {
            collect_assigned(node, &mut assigned);
        }
        assigned.sort();
        assigned.dedup();
        for key in &assigned {
            trace!(variable = key.as_str(), entry, "assigned in loop body");
            self.bindings.declare_non_constant(key, entry);
        }

        for node in body {
            self.visit(node);
        }
    }

    fn bind_target(
        &mut self,
        target: &Node,
        at: u32,
        classification: Classification,
        escaped: bool,
    ) {
        match target {
            Node::Variable(var) => {
                if !var.is_scope_qualified() {
                    self.bindings.record(&var.key(), at, classification, escaped);
                }
            }
            Node::Cast(cast) => self.bind_target(&cast.operand, at, classification, escaped),
            Node::ArrayLiteral(array) => {
                for element in &array.elements {
                    self.bind_target(element, at, classification, escaped);
                }
            }
            // `$a.b = ...` mutates `$a`.
            Node::MemberAccess(access) => {
                if let Some(var) = base_variable(&access.target) {
                    if !var.is_scope_qualified() {
                        self.bindings.declare_non_constant(&var.key(), at);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Keys of the variables `node` assigns within the current scope.
fn collect_assigned(node: &Node, out: &mut Vec<String>) {
    match node {
        Node::Assignment(assignment) => collect_target_keys(&assignment.target, out),
        Node::ForEach(stmt) => {
            if !stmt.variable.is_scope_qualified() {
                out.push(stmt.variable.key());
            }
        }
        _ => {}
    }
    for child in node.children() {
        collect_assigned(child, out);
    }
}

fn collect_target_keys(target: &Node, out: &mut Vec<String>) {
    let var = match target {
        Node::Variable(var) => Some(var),
        Node::MemberAccess(access) => base_variable(&access.target),
        Node::Cast(cast) => return collect_target_keys(&cast.operand, out),
        Node::ArrayLiteral(array) => {
            for element in &array.elements {
                collect_target_keys(element, out);
            }
            return;
        }
        _ => None,
    };
    if let Some(var) = var.filter(|var| !var.is_scope_qualified()) {
        out.push(var.key());
    }
}

fn base_variable(node: &Node) -> Option<&Variable> {
    match node {
        Node::Variable(var) => Some(var),
        Node::MemberAccess(access) => base_variable(&access.target),
        Node::MethodInvocation(call) => base_variable(&call.target),
        Node::Paren(paren) => base_variable(&paren.inner),
        _ => None,
    }
}
