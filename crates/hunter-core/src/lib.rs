//! Detectors for script-injection risks in PowerShell syntax trees.
//!
//! A host parses a script, hands the tree to an [`AnalysisEngine`] and gets
//! back findings for calls where non-constant input reaches code evaluation:
//! `Invoke-Expression`, script-accepting engine methods, `Add-Type`, nested
//! interpreters, per-item operators, dynamic member names and hand-rolled
//! escaping.

pub mod analysis;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod rules;
pub mod semantic;
pub mod suppression;
pub mod taint;
pub mod visitor;

pub use analysis::{AnalysisEngine, AnalysisReport};
pub use ast::SyntaxTree;
pub use diagnostic::{DetectorFault, Finding};
