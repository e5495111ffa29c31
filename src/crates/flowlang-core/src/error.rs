//! Error types for the flowlang compiler core.
//!
//! Recoverable input problems (lexical, syntactic, referential, semantic — see the
//! taxonomy in the crate's design notes) are represented as [`Diagnostic`] values that
//! accumulate in caller-supplied buffers; they never unwind the stack. [`FlowError`] is
//! reserved for the small set of *structural* conditions (cycles, illegal scope parents)
//! and for internal inconsistencies the emitter refuses to paper over.

use std::fmt;

/// Top-level error type returned by fallible core operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The control-flow graph contains a cycle; compilation cannot proceed.
    #[error("cycle detected among nodes: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// A node instance's `parent` reference does not target a scope its parent type opens.
    #[error("instance '{instance}' declares parent scope '{scope}' on '{parent}', which does not open that scope")]
    IllegalScopeParent {
        instance: String,
        parent: String,
        scope: String,
    },

    /// Two sugar macros imply overlapping, conflicting edges.
    #[error("conflicting macros over connection {0} -> {1}")]
    ConflictingMacro(String, String),

    /// The emitter found a branch it could not schedule (an analyzer/emitter invariant
    /// violation, not a user-facing authoring mistake).
    #[error("internal inconsistency: unreachable branch region for node '{0}'")]
    UnreachableBranch(String),

    /// Recursion depth ceiling (1000) would be exceeded by a nested workflow call.
    #[error("recursion depth exceeded ({0} >= 1000)")]
    RecursionDepthExceeded(u32),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// A closed set of diagnostic codes. Exhaustive matching is intentional: adding a new
/// code is a compile error everywhere codes are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    LexicalError,
    SyntaxError,
    UnknownNodeType,
    UnknownSourceNode,
    UnknownTargetNode,
    UnknownSourcePort,
    UnknownTargetPort,
    UnknownScope,
    UndefinedNode,
    IllegalScopeParent,
    ConflictingMacro,
    ObjectTypeMismatch,
    RequiredPortUnconnected,
    SyncWorkflowWithAsyncNode,
    Cycle,
    ReservedNameCollision,
    DuplicateInstanceId,
    DuplicateNodeType,
    UnreachableInstance,
}

impl DiagnosticCode {
    /// The stable wire-format name of this code, e.g. `"UNKNOWN_NODE_TYPE"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::LexicalError => "LEXICAL_ERROR",
            DiagnosticCode::SyntaxError => "SYNTAX_ERROR",
            DiagnosticCode::UnknownNodeType => "UNKNOWN_NODE_TYPE",
            DiagnosticCode::UnknownSourceNode => "UNKNOWN_SOURCE_NODE",
            DiagnosticCode::UnknownTargetNode => "UNKNOWN_TARGET_NODE",
            DiagnosticCode::UnknownSourcePort => "UNKNOWN_SOURCE_PORT",
            DiagnosticCode::UnknownTargetPort => "UNKNOWN_TARGET_PORT",
            DiagnosticCode::UnknownScope => "UNKNOWN_SCOPE",
            DiagnosticCode::UndefinedNode => "UNDEFINED_NODE",
            DiagnosticCode::IllegalScopeParent => "ILLEGAL_SCOPE_PARENT",
            DiagnosticCode::ConflictingMacro => "CONFLICTING_MACRO",
            DiagnosticCode::ObjectTypeMismatch => "OBJECT_TYPE_MISMATCH",
            DiagnosticCode::RequiredPortUnconnected => "REQUIRED_PORT_UNCONNECTED",
            DiagnosticCode::SyncWorkflowWithAsyncNode => "SYNC_WORKFLOW_WITH_ASYNC_NODE",
            DiagnosticCode::Cycle => "CYCLE",
            DiagnosticCode::ReservedNameCollision => "RESERVED_NAME_COLLISION",
            DiagnosticCode::DuplicateInstanceId => "DUPLICATE_INSTANCE_ID",
            DiagnosticCode::DuplicateNodeType => "DUPLICATE_NODE_TYPE",
            DiagnosticCode::UnreachableInstance => "UNREACHABLE_INSTANCE",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source location, (line, column), both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A single parser, assembler, or validator finding.
///
/// Diagnostics never cause a panic or an `Err` return on their own — they accumulate in
/// a `Vec<Diagnostic>` that the caller inspects. Only [`FlowError`] aborts a compile.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            location: None,
            suggestions: Vec::new(),
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            location: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.location = Some(Location { line, column });
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(loc) = self.location {
            write!(f, " ({}:{})", loc.line, loc.column)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, " (did you mean: {}?)", self.suggestions.join(", "))?;
        }
        Ok(())
    }
}
