//! Sink registry
//!
//! A closed table of the commands and methods that execute, compile or
//! re-interpret text as script. Sinks are resolved by lexical name only:
//! static types are rarely known, so no nominal type resolution happens.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use crate::ast::{Command, MethodInvocation, Node, SyntaxTree};
use crate::config::SinksConfig;
use crate::visitor::{AstVisitor, VisitorContext, walk_tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkCategory {
    DynamicEvaluation,
    ReflectiveMethod,
    TypeDefinition,
    ExternalInterpreter,
    ProcessLauncher,
    PerItemOperator,
    AliasDefinition,
}

impl SinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkCategory::DynamicEvaluation => "dynamic_evaluation",
            SinkCategory::ReflectiveMethod => "reflective_method",
            SinkCategory::TypeDefinition => "type_definition",
            SinkCategory::ExternalInterpreter => "external_interpreter",
            SinkCategory::ProcessLauncher => "process_launcher",
            SinkCategory::PerItemOperator => "per_item_operator",
            SinkCategory::AliasDefinition => "alias_definition",
        }
    }

    /// Whether the sink parses its argument as script or source code.
    pub fn evaluates_code(&self) -> bool {
        matches!(
            self,
            SinkCategory::DynamicEvaluation
                | SinkCategory::ReflectiveMethod
                | SinkCategory::TypeDefinition
                | SinkCategory::ExternalInterpreter
                | SinkCategory::ProcessLauncher
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSink {
    /// Display name, e.g. `Invoke-Expression`.
    pub canonical: String,
    pub category: SinkCategory,
    /// Parameters carrying the dangerous argument, full names.
    pub parameters: Vec<String>,
    /// Position of the dangerous argument when passed positionally.
    pub position: Option<usize>,
}

impl CommandSink {
    /// The argument this sink treats as code, by name first, then by position.
    pub fn code_argument<'a>(&self, cmd: &'a Command) -> Option<&'a Node> {
        let names: Vec<&str> = self.parameters.iter().map(String::as_str).collect();
        cmd.named_argument(&names)
            .or_else(|| self.position.and_then(|pos| cmd.positional(pos)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSink {
    pub method: String,
    pub category: SinkCategory,
    pub arg_position: usize,
    /// When non-empty, only `[Type]::Method(...)` on one of these types matches.
    pub static_receivers: Vec<String>,
}

impl MethodSink {
    fn matches_receiver(&self, call: &MethodInvocation) -> bool {
        if self.static_receivers.is_empty() {
            return true;
        }
        match call.target.as_ref() {
            Node::TypeLiteral(ty) if call.is_static => {
                let name = ty.normalized_name();
                self.static_receivers.iter().any(|r| *r == name)
            }
            _ => false,
        }
    }
}

/// Lower-cases a command name and drops any path, module qualifier and
/// `.exe` suffix: `C:\Windows\System32\cmd.exe` and `cmd` are the same sink.
pub fn normalize_command_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let base = lower.rsplit(['\\', '/']).next().unwrap_or(lower.as_str());
    base.strip_suffix(".exe").unwrap_or(base).to_string()
}

#[derive(Debug)]
pub struct SinkRegistry {
    commands: Vec<CommandSink>,
    command_index: HashMap<String, usize>,
    methods: Vec<MethodSink>,
    method_index: HashMap<String, Vec<usize>>,
    interpreters: HashSet<String>,
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            command_index: HashMap::new(),
            methods: Vec::new(),
            method_index: HashMap::new(),
            interpreters: HashSet::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_evaluation_sinks();
        registry.register_reflective_methods();
        registry.register_type_compiler();
        registry.register_interpreters();
        registry.register_per_item_operators();
        registry.register_alias_commands();
        registry
    }

    pub fn with_config(config: &SinksConfig) -> Self {
        let mut registry = Self::with_defaults();
        registry.extend_from_config(config);
        registry
    }

    fn register_evaluation_sinks(&mut self) {
        self.register_command(
            command_sink_entry(
                "Invoke-Expression",
                SinkCategory::DynamicEvaluation,
                &["Command"],
                Some(0),
            ),
            &["iex"],
        );
    }

    fn register_reflective_methods(&mut self) {
        let methods = [
            "InvokeScript",
            "CreateNestedPipeline",
            "AddScript",
            "NewScriptBlock",
            "ExpandString",
        ];
        for method in methods {
            self.register_method(method_sink_entry(method, SinkCategory::ReflectiveMethod, &[]));
        }

        // `Create` is too common a method name to denylist on any receiver.
        self.register_method(method_sink_entry(
            "Create",
            SinkCategory::ReflectiveMethod,
            &["scriptblock", "system.management.automation.scriptblock"],
        ));
    }

    fn register_type_compiler(&mut self) {
        self.register_command(
            command_sink_entry(
                "Add-Type",
                SinkCategory::TypeDefinition,
                &["TypeDefinition", "MemberDefinition"],
                Some(0),
            ),
            &[],
        );
    }

    fn register_interpreters(&mut self) {
        for name in ["powershell", "pwsh", "cmd"] {
            self.register_interpreter(name);
        }

        self.register_command(
            command_sink_entry(
                "Start-Process",
                SinkCategory::ProcessLauncher,
                &["ArgumentList"],
                Some(1),
            ),
            &["saps", "start"],
        );
    }

    fn register_per_item_operators(&mut self) {
        self.register_command(
            command_sink_entry(
                "ForEach-Object",
                SinkCategory::PerItemOperator,
                &["Process", "MemberName"],
                Some(0),
            ),
            &["%", "foreach"],
        );
        self.register_method(method_sink_entry("ForEach", SinkCategory::PerItemOperator, &[]));
    }

    fn register_alias_commands(&mut self) {
        for (name, alias) in [("Set-Alias", "sal"), ("New-Alias", "nal")] {
            self.register_command(
                command_sink_entry(name, SinkCategory::AliasDefinition, &["Value"], Some(1)),
                &[alias],
            );
        }
    }

    fn register_interpreter(&mut self, name: &str) {
        self.interpreters.insert(normalize_command_name(name));
        self.register_command(
            command_sink_entry(name, SinkCategory::ExternalInterpreter, &[], None),
            &[],
        );
    }

    pub fn register_command(&mut self, sink: CommandSink, aliases: &[&str]) {
        let index = self.commands.len();
        self.command_index
            .insert(normalize_command_name(&sink.canonical), index);
        for alias in aliases {
            self.command_index
                .insert(normalize_command_name(alias), index);
        }
        self.commands.push(sink);
    }

    pub fn register_method(&mut self, sink: MethodSink) {
        let index = self.methods.len();
        self.method_index
            .entry(sink.method.to_ascii_lowercase())
            .or_default()
            .push(index);
        self.methods.push(sink);
    }

    /// Adds the site-specific names from `[sinks]` as custom sinks.
    pub fn extend_from_config(&mut self, config: &SinksConfig) {
        if let Some(&eval) = self.command_index.get("invoke-expression") {
            for alias in &config.eval_aliases {
                self.command_index.insert(normalize_command_name(alias), eval);
            }
        }

        for method in &config.dangerous_methods {
            self.register_method(method_sink_entry(method, SinkCategory::ReflectiveMethod, &[]));
        }

        for interpreter in &config.interpreters {
            self.register_interpreter(interpreter);
        }
    }

    /// Resolves a command name, following file-local aliases.
    pub fn resolve_command(&self, name: &str, aliases: &LocalAliases) -> Option<&CommandSink> {
        let mut current = normalize_command_name(name);
        // Alias chains are short; the bound only guards against cycles.
        for _ in 0..=aliases.len() {
            if let Some(&index) = self.command_index.get(&current) {
                return Some(&self.commands[index]);
            }
            current = aliases.target_of(&current)?.to_string();
        }
        None
    }

    pub fn command_sink(&self, cmd: &Command, aliases: &LocalAliases) -> Option<&CommandSink> {
        cmd.name_text()
            .and_then(|name| self.resolve_command(name, aliases))
    }

    pub fn method_sink(&self, call: &MethodInvocation) -> Option<&MethodSink> {
        let name = call.member_name()?.to_ascii_lowercase();
        self.method_index
            .get(&name)?
            .iter()
            .map(|&idx| &self.methods[idx])
            .find(|sink| sink.matches_receiver(call))
    }

    pub fn is_interpreter(&self, name: &str) -> bool {
        self.interpreters.contains(&normalize_command_name(name))
    }

    pub fn commands(&self) -> &[CommandSink] {
        &self.commands
    }

    pub fn methods(&self) -> &[MethodSink] {
        &self.methods
    }
}

fn command_sink_entry(
    canonical: &str,
    category: SinkCategory,
    parameters: &[&str],
    position: Option<usize>,
) -> CommandSink {
    CommandSink {
        canonical: canonical.to_string(),
        category,
        parameters: parameters.iter().map(|p| p.to_string()).collect(),
        position,
    }
}

fn method_sink_entry(
    method: &str,
    category: SinkCategory,
    static_receivers: &[&str],
) -> MethodSink {
    MethodSink {
        method: method.to_string(),
        category,
        arg_position: 0,
        static_receivers: static_receivers.iter().map(|r| r.to_string()).collect(),
    }
}

/// Aliases a script defines for itself with `Set-Alias` / `New-Alias`.
///
/// Collected across the whole file: an alias defined in one function is
/// visible to callers at runtime, so scoping it would miss the bypass.
#[derive(Debug, Clone, Default)]
pub struct LocalAliases {
    targets: HashMap<String, String>,
}

impl LocalAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(tree: &SyntaxTree, sinks: &SinkRegistry) -> Self {
        let mut collector = AliasCollector {
            sinks,
            aliases: LocalAliases::new(),
        };
        walk_tree(tree, &mut collector);
        collector.aliases
    }

    pub fn insert(&mut self, alias: &str, target: &str) {
        self.targets
            .insert(normalize_command_name(alias), normalize_command_name(target));
    }

    pub fn target_of(&self, alias: &str) -> Option<&str> {
        self.targets.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

struct AliasCollector<'s> {
    sinks: &'s SinkRegistry,
    aliases: LocalAliases,
}

impl AstVisitor for AliasCollector<'_> {
    fn visit_command(&mut self, node: &Command, _ctx: &VisitorContext) -> ControlFlow<()> {
        let is_alias_definition = node
            .name_text()
            .and_then(|name| self.sinks.resolve_command(name, &LocalAliases::new()))
            .is_some_and(|sink| sink.category == SinkCategory::AliasDefinition);
        if !is_alias_definition {
            return ControlFlow::Continue(());
        }

        let name = node
            .named_argument(&["Name"])
            .or_else(|| node.positional(0))
            .and_then(Node::as_literal);
        let value = node
            .named_argument(&["Value"])
            .or_else(|| node.positional(1))
            .and_then(Node::as_literal);
        if let (Some(name), Some(value)) = (name, value) {
            self.aliases.insert(name, value);
        }
        ControlFlow::Continue(())
    }
}
