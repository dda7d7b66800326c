//! Visitor context providing file and scope information during traversal.

use std::cell::OnceCell;

use crate::ast::{Node, ScriptBlock, SyntaxTree};
use crate::semantic::{Bindings, Classification, ScopeTracker, classify};

pub struct VisitorContext<'a> {
    tree: &'a SyntaxTree,
    scope: &'a ScriptBlock,
    bindings: OnceCell<Bindings>,
}

impl<'a> VisitorContext<'a> {
    pub fn new(tree: &'a SyntaxTree, scope: &'a ScriptBlock) -> Self {
        Self {
            tree,
            scope,
            bindings: OnceCell::new(),
        }
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    /// Bindings of the current scope, computed on first use.
    pub fn bindings(&self) -> &Bindings {
        self.bindings.get_or_init(|| ScopeTracker::build(self.scope))
    }

    pub fn classify(&self, node: &Node) -> Classification {
        classify(node, self.bindings())
    }

    pub fn is_non_constant(&self, node: &Node) -> bool {
        !self.classify(node).is_constant()
    }
}
