//! Constant vs non-constant expression classification
//!
//! Every detector asks the same question of a sink argument: is its value
//! fixed at analysis time, or may it carry caller-supplied data? Anything the
//! classifier cannot prove constant is `NonConstant`.

use serde::Serialize;

use crate::ast::Node;

use super::bindings::Bindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Constant,
    NonConstant,
}

impl Classification {
    pub fn is_constant(self) -> bool {
        self == Classification::Constant
    }

    /// `NonConstant` wins.
    pub fn join(self, other: Classification) -> Classification {
        if self.is_constant() && other.is_constant() {
            Classification::Constant
        } else {
            Classification::NonConstant
        }
    }

    pub fn all<'a>(nodes: impl IntoIterator<Item = &'a Node>, bindings: &Bindings) -> Self {
        nodes
            .into_iter()
            .map(|node| classify(node, bindings))
            .fold(Classification::Constant, Classification::join)
    }
}

pub fn classify(node: &Node, bindings: &Bindings) -> Classification {
    match node {
        Node::Literal(_) | Node::TypeLiteral(_) | Node::ScriptBlock(_) => Classification::Constant,
        Node::ExpandableString(s) => Classification::all(&s.holes, bindings),
        Node::Variable(var) => {
            if var.is_constant_automatic() {
                Classification::Constant
            } else {
                bindings.lookup(var)
            }
        }
        Node::Assignment(assignment) => classify(&assignment.value, bindings),
        // Escaping transforms (`-replace "'", "''"`) land here too: the result
        // is exactly as tainted as the operand.
        Node::Binary(bin) => classify(&bin.left, bindings).join(classify(&bin.right, bindings)),
        Node::ArrayLiteral(array) => Classification::all(&array.elements, bindings),
        Node::Paren(paren) => classify(&paren.inner, bindings),
        Node::Cast(cast) => classify(&cast.operand, bindings),
        Node::Pipeline(pipeline) => match pipeline.elements.as_slice() {
            [single] if !matches!(single, Node::Command(_)) => classify(single, bindings),
            _ => Classification::NonConstant,
        },
        Node::Command(_)
        | Node::MethodInvocation(_)
        | Node::MemberAccess(_)
        | Node::SubExpression(_)
        | Node::FunctionDefinition(_)
        | Node::If(_)
        | Node::ForEach(_)
        | Node::Unsupported(_) => Classification::NonConstant,
    }
}
