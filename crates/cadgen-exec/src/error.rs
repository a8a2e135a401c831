use std::fmt;

use serde::Serialize;

/// Failure classes for a kernel run, ordered by match priority.
///
/// A message can plausibly carry several signatures (a kernel panic
/// that mentions a parameter, say); the first matching class wins, so
/// the more actionable categories sit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Parameter,
    Geometry,
    Kernel,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Parameter => "parameter",
            ErrorCategory::Geometry => "geometry",
            ErrorCategory::Kernel => "kernel",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        }
    }

}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SIGNATURES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Syntax,
        &[
            "syntaxerror",
            "indentationerror",
            "taberror",
            "invalid syntax",
            "unexpected token",
            "unterminated",
            "unclosed",
        ],
    ),
    (
        ErrorCategory::Parameter,
        &[
            "nameerror",
            "typeerror",
            "attributeerror",
            "valueerror",
            "not defined",
            "parameter",
            "argument",
        ],
    ),
    (
        ErrorCategory::Geometry,
        &[
            "topology",
            "degenerate",
            "invalid shape",
            "no pending wires",
            "no suitable edges",
            "brep",
            "loft",
            "revolve",
            "fillet",
            "shell",
            "boolean",
        ],
    ),
    (
        ErrorCategory::Kernel,
        &["kernel", "occ", "standard_", "internal error", "panic"],
    ),
    (ErrorCategory::Timeout, &["timed out", "timeout", "deadline"]),
];

/// Map a raw failure message onto an [`ErrorCategory`].
pub fn categorize(message: &str) -> ErrorCategory {
    let haystack = message.to_lowercase();
    for (category, needles) in SIGNATURES {
        if needles.iter().any(|n| haystack.contains(n)) {
            return *category;
        }
    }
    ErrorCategory::Unknown
}
