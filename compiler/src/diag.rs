// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by the validator, the pass
// runner, and snapshot normalization.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0201`, `W0400`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // E00xx: graph shape
    pub const E0001: DiagCode = DiagCode("E0001"); // empty graph

    // E01xx: node records
    pub const E0100: DiagCode = DiagCode("E0100"); // missing label
    pub const E0101: DiagCode = DiagCode("E0101"); // missing component type
    pub const E0102: DiagCode = DiagCode("E0102"); // duplicate node id
    pub const E0103: DiagCode = DiagCode("E0103"); // duplicate argument id

    // E02xx: argument references
    pub const E0200: DiagCode = DiagCode("E0200"); // unknown pipeline parameter
    pub const E0201: DiagCode = DiagCode("E0201"); // unknown node
    pub const E0202: DiagCode = DiagCode("E0202"); // unknown output on node
    pub const E0203: DiagCode = DiagCode("E0203"); // no source selected
    pub const E0204: DiagCode = DiagCode("E0204"); // ambiguous anonymous output

    // E03xx: edges
    pub const E0300: DiagCode = DiagCode("E0300"); // dangling edge endpoint
    pub const W0301: DiagCode = DiagCode("W0301"); // duplicate edge
    pub const W0302: DiagCode = DiagCode("W0302"); // edge from a node to itself

    // W04xx: ordering
    pub const W0400: DiagCode = DiagCode("W0400"); // cycle, original order kept

    // W05xx: normalization repairs
    pub const W0500: DiagCode = DiagCode("W0500"); // unknown argument mode
    pub const W0501: DiagCode = DiagCode("W0501"); // duplicate argument id regenerated
    pub const W0502: DiagCode = DiagCode("W0502"); // duplicate output id regenerated
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Location ─────────────────────────────────────────────────────────────

/// Where in the graph snapshot a diagnostic points.
///
/// Nodes are identified by label (what the user sees) and id; arguments by
/// their position in the node's argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_index: Option<usize>,
}

impl Location {
    pub fn node(id: &str, label: &str) -> Self {
        Self {
            node_id: Some(id.to_string()),
            node_label: Some(label.to_string()),
            arg_index: None,
        }
    }

    pub fn arg(id: &str, label: &str, index: usize) -> Self {
        Self {
            arg_index: Some(index),
            ..Self::node(id, label)
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, location: Location, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, location, message)
    }

    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, location, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }

    /// The human-readable message prefixed with its node/argument context,
    /// e.g. `Node "Load", Arg 0: references non-existent node 'ghost'`.
    pub fn contextual_message(&self) -> String {
        let loc = &self.location;
        match (&loc.node_label, loc.arg_index) {
            (Some(label), Some(idx)) => {
                format!("Node \"{}\", Arg {}: {}", label, idx, self.message)
            }
            (Some(label), None) => format!("Node \"{}\": {}", label, self.message),
            (None, _) => self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.contextual_message())?;
        } else {
            write!(f, "{}: {}", level, self.contextual_message())?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic in the slice is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::error(Location::default(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_argument_context() {
        let d = Diagnostic::error(Location::arg("node_1", "Train", 2), "bad reference")
            .with_code(codes::E0201);
        assert_eq!(
            format!("{d}"),
            "error[E0201]: Node \"Train\", Arg 2: bad reference"
        );
    }

    #[test]
    fn display_node_context_with_hint() {
        let d = Diagnostic::warning(Location::node("n", "Load"), "odd")
            .with_code(codes::W0400)
            .with_hint("remove an edge");
        assert_eq!(
            format!("{d}"),
            "warning[W0400]: Node \"Load\": odd\n  hint: remove an edge"
        );
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let warn = Diagnostic::warning(Location::default(), "w");
        assert!(!has_errors(&[warn.clone()]));
        let err = Diagnostic::error(Location::default(), "e");
        assert!(has_errors(&[warn, err]));
    }

    #[test]
    fn serializes_level_lowercase() {
        let d = Diagnostic::error(Location::node("a", "A"), "x").with_code(codes::E0100);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"level\":\"error\""));
        assert!(json.contains("\"code\":\"E0100\""));
        assert!(!json.contains("arg_index"));
    }
}
