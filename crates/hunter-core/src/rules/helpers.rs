//! Shared helper functions for rule implementations.
//!
//! Most detectors ask the same question at different call sites: "does text
//! reaching this sink depend on input?". [`code_sites`] walks a file once per
//! detector, resolves every sink call against the registry and records the
//! classification of the text it receives.

use std::collections::HashSet;
use std::ops::ControlFlow;

use tracing::trace;

use crate::ast::{
    Command, CommandElement, MethodInvocation, Node, Pipeline, Span, SyntaxTree, parameter_matches,
};
use crate::diagnostic::Finding;
use crate::rules::RuleMetadata;
use crate::taint::{LocalAliases, SinkCategory, SinkRegistry, carries_escaped_taint};
use crate::visitor::{AstVisitor, VisitorContext, walk_tree};

/// One call to a sink, with what the engine knows about its code argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSite {
    pub category: SinkCategory,
    /// Name as written at the call site (`iex`, `cmd.exe`, `InvokeScript`).
    pub sink: String,
    pub span: Span,
    /// Some part of the code argument is non-constant.
    pub tainted: bool,
    /// Some part of the code argument went through a quote-escaping transform.
    pub escaped: bool,
}

pub fn code_sites(tree: &SyntaxTree, sinks: &SinkRegistry) -> Vec<CodeSite> {
    let mut collector = CodeSiteCollector {
        sinks,
        aliases: LocalAliases::collect(tree, sinks),
        sites: Vec::new(),
    };
    walk_tree(tree, &mut collector);
    collector.sites
}

struct CodeSiteCollector<'s> {
    sinks: &'s SinkRegistry,
    aliases: LocalAliases,
    sites: Vec<CodeSite>,
}

impl CodeSiteCollector<'_> {
    fn record(
        &mut self,
        category: SinkCategory,
        sink: &str,
        span: Span,
        code: &[&Node],
        ctx: &VisitorContext,
    ) {
        let tainted = code.iter().any(|node| ctx.is_non_constant(node));
        let escaped = code
            .iter()
            .any(|node| carries_escaped_taint(node, ctx.bindings()));
        trace!(
            category = category.as_str(),
            sink,
            tainted,
            escaped,
            "Sink call resolved"
        );
        self.sites.push(CodeSite {
            category,
            sink: sink.to_string(),
            span,
            tainted,
            escaped,
        });
    }
}

impl AstVisitor for CodeSiteCollector<'_> {
    fn visit_command(&mut self, node: &Command, ctx: &VisitorContext) -> ControlFlow<()> {
        let sinks = self.sinks;
        let Some(sink) = sinks.command_sink(node, &self.aliases) else {
            return ControlFlow::Continue(());
        };
        let written = node.name_text().unwrap_or(sink.canonical.as_str()).to_string();

        match sink.category {
            SinkCategory::DynamicEvaluation
            | SinkCategory::TypeDefinition
            | SinkCategory::PerItemOperator => {
                if let Some(code) = sink.code_argument(node) {
                    self.record(sink.category, &written, node.span, &[code], ctx);
                }
            }
            SinkCategory::ExternalInterpreter => {
                let tokens = element_tokens(&node.elements);
                let line = interpreter_command_line(&tokens);
                if !line.is_empty() {
                    self.record(sink.category, &written, node.span, &line, ctx);
                }
            }
            SinkCategory::ProcessLauncher => {
                let program = node
                    .named_argument(&["FilePath"])
                    .or_else(|| node.positional(0))
                    .and_then(Node::as_literal);
                let Some(program) = program.filter(|p| sinks.is_interpreter(p)) else {
                    return ControlFlow::Continue(());
                };
                if let Some(arguments) = sink.code_argument(node) {
                    let mut tokens = Vec::new();
                    push_value_tokens(arguments, &mut tokens);
                    let line = interpreter_command_line(&tokens);
                    if !line.is_empty() {
                        let program = program.to_string();
                        self.record(
                            SinkCategory::ExternalInterpreter,
                            &program,
                            node.span,
                            &line,
                            ctx,
                        );
                    }
                }
            }
            SinkCategory::ReflectiveMethod | SinkCategory::AliasDefinition => {}
        }
        ControlFlow::Continue(())
    }

    /// `$code | Invoke-Expression`: with no code argument the upstream element
    /// is what gets evaluated.
    fn visit_pipeline(&mut self, node: &Pipeline, ctx: &VisitorContext) -> ControlFlow<()> {
        let sinks = self.sinks;
        for (idx, element) in node.elements.iter().enumerate().skip(1) {
            let Node::Command(cmd) = element else {
                continue;
            };
            let Some(sink) = sinks.command_sink(cmd, &self.aliases) else {
                continue;
            };
            if sink.category == SinkCategory::DynamicEvaluation && sink.code_argument(cmd).is_none()
            {
                let written = cmd.name_text().unwrap_or(sink.canonical.as_str()).to_string();
                let upstream = &node.elements[idx - 1];
                self.record(sink.category, &written, cmd.span, &[upstream], ctx);
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_method_invocation(
        &mut self,
        node: &MethodInvocation,
        ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        let sinks = self.sinks;
        let Some(sink) = sinks.method_sink(node) else {
            return ControlFlow::Continue(());
        };
        if let Some(code) = node.arguments.get(sink.arg_position) {
            let written = node.member_name().unwrap_or(sink.method.as_str()).to_string();
            self.record(sink.category, &written, node.span, &[code], ctx);
        }
        ControlFlow::Continue(())
    }
}

#[derive(Debug)]
enum Token<'a> {
    /// `-Name`, `/c`: lower-cased with its prefix character.
    Flag {
        name: String,
        argument: Option<&'a Node>,
    },
    Value(&'a Node),
}

fn element_tokens(elements: &[CommandElement]) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for element in elements {
        match element {
            CommandElement::Parameter { name, argument, .. } => tokens.push(Token::Flag {
                name: format!("-{}", name.to_ascii_lowercase()),
                argument: argument.as_ref(),
            }),
            CommandElement::Argument { value } => push_value_tokens(value, &mut tokens),
        }
    }
    tokens
}

/// Flattens array arguments; literal tokens that look like switches become flags.
fn push_value_tokens<'a>(node: &'a Node, tokens: &mut Vec<Token<'a>>) {
    match node {
        Node::ArrayLiteral(array) => {
            for element in &array.elements {
                push_value_tokens(element, tokens);
            }
        }
        Node::Paren(paren) => push_value_tokens(&paren.inner, tokens),
        other => match other.as_literal() {
            Some(text) if text.starts_with('-') || text.starts_with('/') => {
                tokens.push(Token::Flag {
                    name: text.to_ascii_lowercase(),
                    argument: None,
                });
            }
            _ => tokens.push(Token::Value(other)),
        },
    }
}

fn is_command_flag(flag: &str) -> bool {
    match flag.strip_prefix('-') {
        Some(name) => {
            parameter_matches(name, "command")
                || parameter_matches(name, "encodedcommand")
                || name == "ec"
        }
        None => matches!(flag, "/c" | "/k" | "/r"),
    }
}

fn is_file_flag(flag: &str) -> bool {
    flag.strip_prefix('-')
        .is_some_and(|name| parameter_matches(name, "file"))
}

/// The part of an interpreter's argument list it will execute as script.
///
/// Everything after `-Command` / `/c` is the command line. A script run with
/// `-File` only receives data. Without either, the positional arguments are
/// the command line.
fn interpreter_command_line<'a>(tokens: &[Token<'a>]) -> Vec<&'a Node> {
    for (idx, token) in tokens.iter().enumerate() {
        let Token::Flag { name, argument } = token else {
            continue;
        };
        if is_command_flag(name) {
            let mut line: Vec<&Node> = argument.iter().copied().collect();
            for rest in &tokens[idx + 1..] {
                match rest {
                    Token::Value(node) => line.push(node),
                    Token::Flag {
                        argument: Some(node),
                        ..
                    } => line.push(node),
                    Token::Flag { argument: None, .. } => {}
                }
            }
            return line;
        }
        if is_file_flag(name) {
            return Vec::new();
        }
    }

    tokens
        .iter()
        .filter_map(|token| match token {
            Token::Value(node) => Some(*node),
            Token::Flag { .. } => None,
        })
        .collect()
}

/// Builds a finding for `meta` located at `span` in `tree`.
pub fn finding(
    meta: &RuleMetadata,
    tree: &SyntaxTree,
    span: Span,
    message: impl Into<String>,
) -> Finding {
    let (line, column) = tree.span_to_location(span);
    Finding::new(meta.id, meta.name, meta.severity, message, &tree.path, span)
        .with_location(line, column)
        .with_confidence(meta.confidence)
}

/// Keeps the first finding per span.
pub fn dedup_by_site(findings: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    findings.retain(|finding| seen.insert(finding.span));
}
