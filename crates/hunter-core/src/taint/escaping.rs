//! Hand-rolled quote escaping
//!
//! Recognizes the transforms scripts use to "make input safe" before pasting
//! it into generated code: the `CodeGeneration::Escape*` helpers and
//! `-replace` / `.Replace()` calls that double or backtick quote characters.
//! The classifier still treats their output as non-constant; this module
//! only answers whether a value went through such a transform.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{BinaryOperator, Node};
use crate::semantic::{Bindings, classify};

const ESCAPING_METHODS: &[&str] = &[
    "escapesinglequotedstringcontent",
    "escapeblockcommentcontent",
    "escapeformatstringcontent",
    "escapevariablename",
];

/// A replace pattern made only of quote characters, optionally regex-escaped.
static QUOTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:\\?['"`\x{2018}\x{2019}\x{201A}\x{201B}\x{201C}\x{201D}])+$"#)
        .expect("Invalid regex pattern")
});

pub fn is_quote_pattern(pattern: &str) -> bool {
    QUOTE_PATTERN.is_match(pattern)
}

fn literal_text(node: &Node) -> Option<&str> {
    match node {
        Node::Literal(lit) => Some(lit.value.as_str()),
        Node::ExpandableString(s) if s.holes.is_empty() => Some(s.value.as_str()),
        _ => None,
    }
}

/// If `node` is a quote-escaping transform, the expression being escaped.
pub fn escaped_operand(node: &Node) -> Option<&Node> {
    match node {
        Node::MethodInvocation(call) => {
            let name = call.member_name()?.to_ascii_lowercase();
            if ESCAPING_METHODS.contains(&name.as_str()) {
                return call.arguments.first();
            }
            let pattern = call.arguments.first().and_then(literal_text)?;
            (name == "replace" && call.arguments.len() >= 2 && is_quote_pattern(pattern))
                .then_some(call.target.as_ref())
        }
        Node::Binary(bin) if bin.operator == BinaryOperator::Replace => {
            let pattern = match bin.right.as_ref() {
                Node::ArrayLiteral(args) => args.elements.first().and_then(literal_text),
                other => literal_text(other),
            }?;
            is_quote_pattern(pattern).then_some(bin.left.as_ref())
        }
        Node::Paren(paren) => escaped_operand(&paren.inner),
        _ => None,
    }
}

/// Whether `node` contains, directly or through a local variable, the
/// output of an escaping transform applied to non-constant input.
pub fn carries_escaped_taint(node: &Node, bindings: &Bindings) -> bool {
    if let Some(operand) = escaped_operand(node) {
        if !classify(operand, bindings).is_constant() {
            return true;
        }
    }
    match node {
        Node::Variable(var) => bindings.is_escaped(var),
        other => other
            .children()
            .into_iter()
            .any(|child| carries_escaped_taint(child, bindings)),
    }
}
