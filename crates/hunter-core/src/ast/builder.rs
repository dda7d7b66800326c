//! Programmatic construction of syntax trees.
//!
//! Every leaf receives the next free offset, and every composite node spans
//! its children, so construction order is document order. This lets hosts
//! that embed their own parser, tests and benches build realistic trees
//! without hand-writing spans.

use std::cell::Cell;

use super::{
    ArrayLiteral, Assignment, AssignmentOperator, Binary, BinaryOperator, Cast, Command,
    CommandElement, ExpandableString, ForEachStatement, FunctionDefinition, IfClause,
    IfStatement, Literal, MemberAccess, MethodInvocation, Node, Paren, Parameter, Pipeline,
    ScriptBlock, Span, SubExpression, SuppressionAnnotation, SyntaxTree, TypeLiteral,
    UnsupportedNode, Variable,
};

#[derive(Debug, Default)]
pub struct TreeBuilder {
    next: Cell<u32>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn leaf_span(&self) -> Span {
        let start = self.next.get();
        self.next.set(start + 2);
        Span::new(start, start + 1)
    }

    fn cover<'a>(&self, nodes: impl IntoIterator<Item = &'a Node>) -> Span {
        nodes
            .into_iter()
            .map(Node::span)
            .reduce(Span::cover)
            .unwrap_or_else(|| self.leaf_span())
    }

    pub fn lit(&self, value: &str) -> Node {
        Node::Literal(Literal {
            value: value.to_string(),
            span: self.leaf_span(),
        })
    }

    /// Expandable string; `holes` are the interpolated expressions.
    pub fn string(&self, value: &str, holes: Vec<Node>) -> Node {
        let span = holes
            .iter()
            .map(Node::span)
            .fold(self.leaf_span(), |acc, s| acc.cover(s));
        Node::ExpandableString(ExpandableString {
            value: value.to_string(),
            holes,
            span,
        })
    }

    pub fn var(&self, name: &str) -> Node {
        Node::Variable(self.variable(name))
    }

    pub fn variable(&self, name: &str) -> Variable {
        Variable {
            name: name.to_string(),
            span: self.leaf_span(),
        }
    }

    pub fn type_lit(&self, name: &str) -> Node {
        Node::TypeLiteral(TypeLiteral {
            name: name.to_string(),
            span: self.leaf_span(),
        })
    }

    pub fn assign(&self, target: Node, value: Node) -> Node {
        self.assignment(target, value, AssignmentOperator::Assign)
    }

    pub fn append(&self, target: Node, value: Node) -> Node {
        self.assignment(target, value, AssignmentOperator::Compound)
    }

    fn assignment(&self, target: Node, value: Node, operator: AssignmentOperator) -> Node {
        let span = target.span().cover(value.span());
        Node::Assignment(Assignment {
            target: Box::new(target),
            value: Box::new(value),
            operator,
            span,
        })
    }

    pub fn binary(&self, operator: BinaryOperator, left: Node, right: Node) -> Node {
        let span = left.span().cover(right.span());
        Node::Binary(Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            span,
        })
    }

    pub fn concat(&self, left: Node, right: Node) -> Node {
        self.binary(BinaryOperator::Add, left, right)
    }

    /// `$operand -replace pattern, replacement`
    pub fn replace(&self, operand: Node, pattern: &str, replacement: &str) -> Node {
        let args = self.array(vec![self.lit(pattern), self.lit(replacement)]);
        self.binary(BinaryOperator::Replace, operand, args)
    }

    pub fn array(&self, elements: Vec<Node>) -> Node {
        let span = self.cover(&elements);
        Node::ArrayLiteral(ArrayLiteral { elements, span })
    }

    pub fn paren(&self, inner: Node) -> Node {
        let span = inner.span();
        Node::Paren(Paren {
            inner: Box::new(inner),
            span,
        })
    }

    pub fn sub_expression(&self, statements: Vec<Node>) -> Node {
        let span = self.cover(&statements);
        Node::SubExpression(SubExpression { statements, span })
    }

    pub fn cast(&self, type_name: &str, operand: Node) -> Node {
        let span = operand.span();
        Node::Cast(Cast {
            type_name: type_name.to_string(),
            operand: Box::new(operand),
            span,
        })
    }

    pub fn arg(&self, value: Node) -> CommandElement {
        CommandElement::Argument { value }
    }

    pub fn param(&self, name: &str, argument: Option<Node>) -> CommandElement {
        let span = self.leaf_span();
        let span = argument.as_ref().map_or(span, |arg| span.cover(arg.span()));
        CommandElement::Parameter {
            name: name.to_string(),
            argument,
            span,
        }
    }

    pub fn command(&self, name: &str, elements: Vec<CommandElement>) -> Node {
        let name = self.lit(name);
        self.command_with(name, elements)
    }

    /// `& <name> ...` where the command name is an arbitrary expression.
    pub fn command_with(&self, name: Node, elements: Vec<CommandElement>) -> Node {
        let mut span = name.span();
        for element in &elements {
            match element {
                CommandElement::Argument { value } => span = span.cover(value.span()),
                CommandElement::Parameter { span: s, .. } => span = span.cover(*s),
            }
        }
        Node::Command(Command {
            name: Box::new(name),
            elements,
            span,
        })
    }

    pub fn pipeline(&self, elements: Vec<Node>) -> Node {
        let span = self.cover(&elements);
        Node::Pipeline(Pipeline { elements, span })
    }

    /// `$target.method(args)`
    pub fn invoke(&self, target: Node, method: &str, arguments: Vec<Node>) -> Node {
        let member = self.lit(method);
        self.invoke_member(target, member, arguments, false)
    }

    /// `[Type]::method(args)`
    pub fn invoke_static(&self, type_name: &str, method: &str, arguments: Vec<Node>) -> Node {
        let target = self.type_lit(type_name);
        let member = self.lit(method);
        self.invoke_member(target, member, arguments, true)
    }

    pub fn invoke_member(
        &self,
        target: Node,
        member: Node,
        arguments: Vec<Node>,
        is_static: bool,
    ) -> Node {
        let span = arguments
            .iter()
            .map(Node::span)
            .fold(target.span().cover(member.span()), Span::cover);
        Node::MethodInvocation(MethodInvocation {
            target: Box::new(target),
            member: Box::new(member),
            arguments,
            is_static,
            span,
        })
    }

    /// `$target.name`
    pub fn member(&self, target: Node, name: &str) -> Node {
        let member = self.lit(name);
        self.member_access(target, member, false)
    }

    pub fn member_access(&self, target: Node, member: Node, is_static: bool) -> Node {
        let span = target.span().cover(member.span());
        Node::MemberAccess(MemberAccess {
            target: Box::new(target),
            member: Box::new(member),
            is_static,
            span,
        })
    }

    pub fn block(&self, params: &[&str], statements: Vec<Node>) -> ScriptBlock {
        let params: Vec<Parameter> = params
            .iter()
            .map(|name| Parameter {
                name: name.to_string(),
                span: self.leaf_span(),
                default: None,
            })
            .collect();
        let span = params
            .iter()
            .map(|p| p.span)
            .fold(self.cover(&statements), Span::cover);
        ScriptBlock {
            span,
            params,
            suppressions: Vec::new(),
            statements,
        }
    }

    /// `{ ... }` as an expression.
    pub fn script_block(&self, statements: Vec<Node>) -> Node {
        Node::ScriptBlock(self.block(&[], statements))
    }

    pub fn suppress(&self, mut block: ScriptBlock, rule: &str, justification: &str) -> ScriptBlock {
        let span = self.leaf_span();
        block.span = block.span.cover(span);
        block.suppressions.push(SuppressionAnnotation {
            rule: rule.to_string(),
            justification: Some(justification.to_string()),
            span,
        });
        block
    }

    pub fn function(&self, name: &str, params: &[&str], statements: Vec<Node>) -> Node {
        let body = self.block(params, statements);
        self.function_with(name, body)
    }

    pub fn function_with(&self, name: &str, body: ScriptBlock) -> Node {
        let span = body.span.cover(self.leaf_span());
        Node::FunctionDefinition(FunctionDefinition {
            name: name.to_string(),
            span,
            body,
        })
    }

    pub fn if_stmt(&self, condition: Node, body: Vec<Node>) -> Node {
        let span = body.iter().map(Node::span).fold(condition.span(), Span::cover);
        Node::If(IfStatement {
            clauses: vec![IfClause { condition, body }],
            else_body: None,
            span,
        })
    }

    pub fn foreach_loop(&self, variable: &str, iterable: Node, body: Vec<Node>) -> Node {
        let variable = self.variable(variable);
        let span = body
            .iter()
            .map(Node::span)
            .fold(variable.span.cover(iterable.span()), Span::cover);
        Node::ForEach(ForEachStatement {
            variable,
            iterable: Box::new(iterable),
            body,
            span,
        })
    }

    /// A node of a kind the detectors do not model, e.g. `TryStatement`.
    pub fn unsupported(&self, kind: &str, children: Vec<Node>) -> Node {
        let span = self.cover(&children);
        Node::Unsupported(UnsupportedNode {
            kind: kind.to_string(),
            span,
            children,
        })
    }

    pub fn script(&self, params: &[&str], statements: Vec<Node>) -> ScriptBlock {
        self.block(params, statements)
    }

    pub fn tree(&self, path: &str, root: ScriptBlock) -> SyntaxTree {
        SyntaxTree::new(path, root)
    }
}
