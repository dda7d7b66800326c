//! Syntax tree consumed by the detectors
//!
//! The tree is produced by an external PowerShell parser and handed to the
//! engine either as Rust values (see [`builder::TreeBuilder`]) or as JSON via
//! [`SyntaxTree::from_json`]. Only the node kinds the detectors reason about
//! are modelled; everything else deserializes into [`Node::Unsupported`],
//! which keeps the nodes nested inside it.
//!
//! Names follow the language: commands, parameters, variables and members
//! compare ASCII case-insensitively.

pub mod builder;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// File-relative byte range of a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Invalid syntax tree JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub path: String,
    /// Byte offset of the first character of every line, as reported by the parser.
    #[serde(default)]
    pub line_starts: Vec<u32>,
    pub root: ScriptBlock,
}

impl SyntaxTree {
    pub fn new(path: impl Into<String>, root: ScriptBlock) -> Self {
        Self {
            path: path.into(),
            line_starts: Vec::new(),
            root,
        }
    }

    pub fn with_line_starts(mut self, line_starts: Vec<u32>) -> Self {
        self.line_starts = line_starts;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 1-based line and column of the start of `span`.
    ///
    /// Without line information every span is reported on line 1.
    pub fn span_to_location(&self, span: Span) -> (usize, usize) {
        let offset = span.start;
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);

        (line_idx + 1, (offset - line_start.min(offset)) as usize + 1)
    }
}

/// A function body, script-block literal, or the whole file. Each one is a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub span: Span,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub suppressions: Vec<SuppressionAnnotation>,
    #[serde(default)]
    pub statements: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub span: Span,
    #[serde(default)]
    pub default: Option<Node>,
}

/// `[Diagnostics.CodeAnalysis.SuppressMessage(rule, justification)]` on a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionAnnotation {
    pub rule: String,
    #[serde(default)]
    pub justification: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    Literal(Literal),
    ExpandableString(ExpandableString),
    Variable(Variable),
    TypeLiteral(TypeLiteral),
    Assignment(Assignment),
    Binary(Binary),
    ArrayLiteral(ArrayLiteral),
    Paren(Paren),
    SubExpression(SubExpression),
    Cast(Cast),
    Command(Command),
    Pipeline(Pipeline),
    MethodInvocation(MethodInvocation),
    MemberAccess(MemberAccess),
    ScriptBlock(ScriptBlock),
    FunctionDefinition(FunctionDefinition),
    If(IfStatement),
    ForEach(ForEachStatement),
    #[serde(untagged)]
    Unsupported(UnsupportedNode),
}

/// Non-interpolated constant: single-quoted string, bareword, or number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub span: Span,
}

/// Double-quoted string or here-string with `$var` / `$(...)` holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandableString {
    pub value: String,
    #[serde(default)]
    pub holes: Vec<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Name without the leading `$`, scope qualifier included (`env:PATH`).
    pub name: String,
    pub span: Span,
}

const CONSTANT_AUTOMATIC_VARIABLES: &[&str] = &["true", "false", "null"];

impl Variable {
    /// Lookup key: lower-cased, `local:` qualifier dropped.
    pub fn key(&self) -> String {
        let lower = self.name.to_ascii_lowercase();
        match lower.strip_prefix("local:") {
            Some(rest) => rest.to_string(),
            None => lower,
        }
    }

    /// `$env:X`, `$global:X`, `$using:X` and friends live outside the current scope.
    pub fn is_scope_qualified(&self) -> bool {
        self.key().contains(':')
    }

    pub fn is_constant_automatic(&self) -> bool {
        let key = self.key();
        CONSTANT_AUTOMATIC_VARIABLES.contains(&key.as_str())
    }
}

/// `[TypeName]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeLiteral {
    pub name: String,
    pub span: Span,
}

impl TypeLiteral {
    pub fn normalized_name(&self) -> String {
        self.name
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentOperator {
    #[default]
    Assign,
    /// `+=`, `-=`, `*=` ...
    Compound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Box<Node>,
    pub value: Box<Node>,
    #[serde(default)]
    pub operator: AssignmentOperator,
    pub span: Span,
}

/// Case variants (`-ireplace`, `-creplace`) are normalized by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOperator {
    Add,
    Format,
    Replace,
    Join,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binary {
    pub operator: BinaryOperator,
    pub left: Box<Node>,
    pub right: Box<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    #[serde(default)]
    pub elements: Vec<Node>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paren {
    pub inner: Box<Node>,
    pub span: Span,
}

/// `$( ... )`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubExpression {
    #[serde(default)]
    pub statements: Vec<Node>,
    pub span: Span,
}

/// `[string]$x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub type_name: String,
    pub operand: Box<Node>,
    pub span: Span,
}

/// A command invocation. `name` is a literal for ordinary calls and any
/// expression for `& $expr` / `. $expr`.
///
/// The parser binds `-Name value` pairs into [`CommandElement::Parameter`]
/// when it knows the command's signature; for native executables the value is
/// left as the following positional argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: Box<Node>,
    #[serde(default)]
    pub elements: Vec<CommandElement>,
    pub span: Span,
}

impl Command {
    pub fn name_text(&self) -> Option<&str> {
        match self.name.as_ref() {
            Node::Literal(lit) => Some(lit.value.as_str()),
            _ => None,
        }
    }

    pub fn positional_arguments(&self) -> impl Iterator<Item = &Node> {
        self.elements.iter().filter_map(|element| match element {
            CommandElement::Argument { value } => Some(value),
            CommandElement::Parameter { .. } => None,
        })
    }

    pub fn positional(&self, index: usize) -> Option<&Node> {
        self.positional_arguments().nth(index)
    }

    /// Argument of the first parameter that abbreviates one of `names`.
    ///
    /// `-Co` binds `Command`, as the language accepts any unambiguous prefix.
    /// An unbound parameter takes the positional argument that follows it.
    pub fn named_argument(&self, names: &[&str]) -> Option<&Node> {
        self.elements
            .iter()
            .enumerate()
            .find_map(|(idx, element)| match element {
                CommandElement::Parameter { name, argument, .. }
                    if names.iter().any(|full| parameter_matches(name, full)) =>
                {
                    Some(argument.as_ref().or_else(|| match self.elements.get(idx + 1) {
                        Some(CommandElement::Argument { value }) => Some(value),
                        _ => None,
                    }))
                }
                _ => None,
            })
            .flatten()
    }

    pub fn has_parameter(&self, names: &[&str]) -> bool {
        self.elements.iter().any(|element| match element {
            CommandElement::Parameter { name, .. } => {
                names.iter().any(|full| parameter_matches(name, full))
            }
            CommandElement::Argument { .. } => false,
        })
    }
}

/// `written` is a non-empty case-insensitive prefix of `full`.
pub fn parameter_matches(written: &str, full: &str) -> bool {
    !written.is_empty()
        && full
            .get(..written.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(written))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommandElement {
    Argument {
        value: Node,
    },
    Parameter {
        /// Name without the leading dash.
        name: String,
        #[serde(default)]
        argument: Option<Node>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub elements: Vec<Node>,
    pub span: Span,
}

/// `$x.Method(...)` or `[Type]::Method(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocation {
    pub target: Box<Node>,
    /// A [`Literal`] for `.Name(...)`; any expression for `.$name(...)`.
    pub member: Box<Node>,
    #[serde(default)]
    pub arguments: Vec<Node>,
    #[serde(default)]
    pub is_static: bool,
    pub span: Span,
}

impl MethodInvocation {
    pub fn member_name(&self) -> Option<&str> {
        literal_text(&self.member)
    }
}

/// `$x.Name`, `$x.$name`, `[Type]::Name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub target: Box<Node>,
    pub member: Box<Node>,
    #[serde(default)]
    pub is_static: bool,
    pub span: Span,
}

impl MemberAccess {
    pub fn member_name(&self) -> Option<&str> {
        literal_text(&self.member)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub span: Span,
    pub body: ScriptBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfClause {
    pub condition: Node,
    #[serde(default)]
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub clauses: Vec<IfClause>,
    #[serde(default)]
    pub else_body: Option<Vec<Node>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachStatement {
    pub variable: Variable,
    pub iterable: Box<Node>,
    #[serde(default)]
    pub body: Vec<Node>,
    pub span: Span,
}

/// A statement or expression of a kind the detectors do not model: `try`,
/// `while`, `switch`, `trap`, hashtables, index expressions.
///
/// Every node found in its fields is kept in `children`, in document order,
/// so sinks and assignments inside it are still analyzed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UnsupportedNode {
    pub kind: String,
    pub span: Span,
    pub children: Vec<Node>,
}

impl<'de> Deserialize<'de> for UnsupportedNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::Object(mut fields) = Value::deserialize(deserializer)? else {
            return Err(D::Error::custom("syntax tree node must be an object"));
        };
        let kind = match fields.remove("kind") {
            Some(Value::String(kind)) => kind,
            _ => return Err(D::Error::custom("syntax tree node has no `kind`")),
        };
        let span = match fields.remove("span") {
            Some(span) => Span::deserialize(span).map_err(D::Error::custom)?,
            None => Span::default(),
        };

        let mut children = Vec::new();
        for (_, field) in fields {
            collect_nested_nodes(field, &mut children);
        }
        children.sort_by_key(|child| child.span().start);

        Ok(Self {
            kind,
            span,
            children,
        })
    }
}

/// Collects the outermost nodes in `value`. Objects without a `kind`, such
/// as a `try` body or a `catch` clause, are searched through: statement
/// blocks do not open a scope.
fn collect_nested_nodes(value: Value, out: &mut Vec<Node>) {
    match value {
        Value::Object(fields) if fields.contains_key("kind") => {
            if let Ok(node) = Node::deserialize(Value::Object(fields)) {
                out.push(node);
            }
        }
        Value::Object(fields) => {
            for (_, field) in fields {
                collect_nested_nodes(field, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nested_nodes(item, out);
            }
        }
        _ => {}
    }
}

fn literal_text(node: &Node) -> Option<&str> {
    match node {
        Node::Literal(lit) => Some(lit.value.as_str()),
        _ => None,
    }
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Literal(n) => n.span,
            Node::ExpandableString(n) => n.span,
            Node::Variable(n) => n.span,
            Node::TypeLiteral(n) => n.span,
            Node::Assignment(n) => n.span,
            Node::Binary(n) => n.span,
            Node::ArrayLiteral(n) => n.span,
            Node::Paren(n) => n.span,
            Node::SubExpression(n) => n.span,
            Node::Cast(n) => n.span,
            Node::Command(n) => n.span,
            Node::Pipeline(n) => n.span,
            Node::MethodInvocation(n) => n.span,
            Node::MemberAccess(n) => n.span,
            Node::ScriptBlock(n) => n.span,
            Node::FunctionDefinition(n) => n.span,
            Node::If(n) => n.span,
            Node::ForEach(n) => n.span,
            Node::Unsupported(n) => n.span,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        literal_text(self)
    }

    /// Direct children that belong to the same scope as `self`.
    ///
    /// Script-block literals and function definitions open a new scope, so
    /// their bodies are not returned.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Literal(_)
            | Node::Variable(_)
            | Node::TypeLiteral(_)
            | Node::ScriptBlock(_)
            | Node::FunctionDefinition(_) => Vec::new(),
            Node::ExpandableString(n) => n.holes.iter().collect(),
            Node::Assignment(n) => vec![n.target.as_ref(), n.value.as_ref()],
            Node::Binary(n) => vec![n.left.as_ref(), n.right.as_ref()],
            Node::ArrayLiteral(n) => n.elements.iter().collect(),
            Node::Paren(n) => vec![n.inner.as_ref()],
            Node::SubExpression(n) => n.statements.iter().collect(),
            Node::Cast(n) => vec![n.operand.as_ref()],
            Node::Command(n) => {
                let mut children = vec![n.name.as_ref()];
                for element in &n.elements {
                    match element {
                        CommandElement::Argument { value } => children.push(value),
                        CommandElement::Parameter {
                            argument: Some(arg),
                            ..
                        } => children.push(arg),
                        CommandElement::Parameter { argument: None, .. } => {}
                    }
                }
                children
            }
            Node::Pipeline(n) => n.elements.iter().collect(),
            Node::MethodInvocation(n) => {
                let mut children = vec![n.target.as_ref(), n.member.as_ref()];
                children.extend(n.arguments.iter());
                children
            }
            Node::MemberAccess(n) => vec![n.target.as_ref(), n.member.as_ref()],
            Node::If(n) => {
                let mut children = Vec::new();
                for clause in &n.clauses {
                    children.push(&clause.condition);
                    children.extend(clause.body.iter());
                }
                if let Some(else_body) = &n.else_body {
                    children.extend(else_body.iter());
                }
                children
            }
            Node::ForEach(n) => {
                let mut children = vec![n.iterable.as_ref()];
                children.extend(n.body.iter());
                children
            }
            Node::Unsupported(n) => n.children.iter().collect(),
        }
    }
}
