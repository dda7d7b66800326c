//! Scope tree for a script file
//!
//! One scope per script file, function body and script-block literal. Each
//! scope keeps the suppression annotations declared on it; the suppression
//! resolver finds the innermost scope around a finding and walks outwards.

use id_arena::{Arena, Id};

use crate::ast::{Node, ScriptBlock, Span, SyntaxTree};
use crate::suppression::ScopedSuppression;

pub type ScopeId = Id<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Script,
    Function,
    ScriptBlock,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Span of the body; findings inside it belong to this scope.
    pub span: Span,
    /// Annotations on the declaration, each covering `span`.
    pub suppressions: Vec<ScopedSuppression>,
}

pub struct ScopeTree {
    arena: Arena<Scope>,
    root: Option<ScopeId>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        block: &ScriptBlock,
        name: Option<&str>,
    ) -> ScopeId {
        let id = self.arena.alloc_with_id(|id| Scope {
            id,
            kind,
            name: name.map(str::to_string),
            parent,
            children: Vec::new(),
            span: block.span,
            suppressions: block
                .suppressions
                .iter()
                .map(|annotation| ScopedSuppression {
                    detector: annotation.rule.clone(),
                    justification: annotation.justification.clone(),
                    body: block.span,
                })
                .collect(),
        });

        if let Some(parent_id) = parent {
            self.arena[parent_id].children.push(id);
        }

        if self.root.is_none() {
            self.root = Some(id);
        }

        id
    }

    pub fn root(&self) -> Option<ScopeId> {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id]
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.arena.iter().map(|(_, scope)| scope)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn ancestors(&self, id: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            current: Some(id),
        }
    }

    /// Innermost scope whose body contains `span`. The script scope holds
    /// everything, even when the parser gave it a narrower span.
    pub fn innermost_containing(&self, span: Span) -> Option<ScopeId> {
        let mut current = self.root?;
        'descend: loop {
            for &child in &self.arena[current].children {
                if self.arena[child].span.contains(span) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }
}

pub struct AncestorIter<'a> {
    tree: &'a ScopeTree,
    current: Option<ScopeId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current?;
        let scope = &self.tree.arena[current_id];
        self.current = scope.parent;
        Some(scope)
    }
}

pub struct ScopeBuilder {
    scope_tree: ScopeTree,
}

impl ScopeBuilder {
    pub fn build(tree: &SyntaxTree) -> ScopeTree {
        let mut builder = Self {
            scope_tree: ScopeTree::new(),
        };
        let root = builder
            .scope_tree
            .create_scope(ScopeKind::Script, None, &tree.root, None);
        builder.visit_block(&tree.root, root);
        builder.scope_tree
    }

    fn visit_block(&mut self, block: &ScriptBlock, scope: ScopeId) {
        for param in &block.params {
            if let Some(default) = &param.default {
                self.visit_node(default, scope);
            }
        }
        for statement in &block.statements {
            self.visit_node(statement, scope);
        }
    }

    fn visit_node(&mut self, node: &Node, scope: ScopeId) {
        match node {
            Node::FunctionDefinition(def) => {
                let child = self.scope_tree.create_scope(
                    ScopeKind::Function,
                    Some(scope),
                    &def.body,
                    Some(&def.name),
                );
                self.visit_block(&def.body, child);
            }
            Node::ScriptBlock(block) => {
                let child =
                    self.scope_tree
                        .create_scope(ScopeKind::ScriptBlock, Some(scope), block, None);
                self.visit_block(block, child);
            }
            other => {
                for child in other.children() {
                    self.visit_node(child, scope);
                }
            }
        }
    }
}
