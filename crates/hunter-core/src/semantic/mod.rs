//! Semantic analysis module
//!
//! Provides the scope tree, per-scope variable bindings and the
//! constant/non-constant expression classifier shared by every detector.

pub mod bindings;
pub mod classify;
pub mod scope;

pub use bindings::{BindingState, Bindings, ScopeTracker};
pub use classify::{Classification, classify};
pub use scope::{AncestorIter, Scope, ScopeBuilder, ScopeId, ScopeKind, ScopeTree};
