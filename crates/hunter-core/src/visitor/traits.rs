//! AstVisitor trait for uniform syntax tree traversal.

use std::ops::ControlFlow;

use crate::ast::{
    Assignment, Binary, Command, FunctionDefinition, MemberAccess, MethodInvocation, Pipeline,
    ScriptBlock, Variable,
};

use super::context::VisitorContext;

pub trait AstVisitor {
    /// Called on entry to every scope, the file's root block included.
    fn visit_script_block(
        &mut self,
        _node: &ScriptBlock,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_function_definition(
        &mut self,
        _node: &FunctionDefinition,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_assignment(&mut self, _node: &Assignment, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_command(&mut self, _node: &Command, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_pipeline(&mut self, _node: &Pipeline, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_method_invocation(
        &mut self,
        _node: &MethodInvocation,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_member_access(
        &mut self,
        _node: &MemberAccess,
        _ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_binary(&mut self, _node: &Binary, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_variable(&mut self, _node: &Variable, _ctx: &VisitorContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}
