//! Visitor pattern for syntax tree traversal.
//!
//! The walker hands every node to the visitor together with the context of
//! the scope it belongs to. Function bodies and script-block literals get a
//! fresh context, so bindings never leak across scopes.

mod context;
mod traits;

pub use context::VisitorContext;
pub use traits::AstVisitor;

use std::ops::ControlFlow;

use crate::ast::{Node, ScriptBlock, SyntaxTree};

struct Walker<'v, V: AstVisitor> {
    visitor: &'v mut V,
    stopped: bool,
}

impl<V: AstVisitor> Walker<'_, V> {
    fn enter_scope(&mut self, tree: &SyntaxTree, block: &ScriptBlock) {
        if self.stopped {
            return;
        }
        let ctx = VisitorContext::new(tree, block);
        if let ControlFlow::Break(()) = self.visitor.visit_script_block(block, &ctx) {
            self.stopped = true;
            return;
        }
        for param in &block.params {
            if let Some(default) = &param.default {
                self.walk_node(default, &ctx);
            }
        }
        for statement in &block.statements {
            self.walk_node(statement, &ctx);
        }
    }

    fn walk_node(&mut self, node: &Node, ctx: &VisitorContext) {
        if self.stopped {
            return;
        }

        let flow = match node {
            Node::FunctionDefinition(def) => self.visitor.visit_function_definition(def, ctx),
            Node::Assignment(assignment) => self.visitor.visit_assignment(assignment, ctx),
            Node::Command(cmd) => self.visitor.visit_command(cmd, ctx),
            Node::Pipeline(pipeline) => self.visitor.visit_pipeline(pipeline, ctx),
            Node::MethodInvocation(call) => self.visitor.visit_method_invocation(call, ctx),
            Node::MemberAccess(access) => self.visitor.visit_member_access(access, ctx),
            Node::Binary(bin) => self.visitor.visit_binary(bin, ctx),
            Node::Variable(var) => self.visitor.visit_variable(var, ctx),
            _ => ControlFlow::Continue(()),
        };
        if let ControlFlow::Break(()) = flow {
            self.stopped = true;
            return;
        }

        match node {
            Node::ScriptBlock(block) => self.enter_scope(ctx.tree(), block),
            Node::FunctionDefinition(def) => self.enter_scope(ctx.tree(), &def.body),
            other => {
                for child in other.children() {
                    self.walk_node(child, ctx);
                }
            }
        }
    }
}

pub fn walk_tree<V: AstVisitor>(tree: &SyntaxTree, visitor: &mut V) {
    let mut walker = Walker {
        visitor,
        stopped: false,
    };
    walker.enter_scope(tree, &tree.root);
}
