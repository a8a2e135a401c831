use std::time::Duration;

use cadgen_classify::Params;
use cadgen_exec::{ErrorCategory, Mesh, MeshAnalysis};
use serde::Serialize;

/// One failed attempt's classification and diagnostic, carried in the
/// terminal error event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptError {
    pub category: ErrorCategory,
    pub message: String,
}

/// Events emitted while a generation runs. Serialized with a `type`
/// tag so stream consumers can dispatch without inspecting fields.
///
/// Every run ends with exactly one `Complete` or one `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Status {
        /// Percentage, never decreasing within a run.
        progress: u8,
        message: String,
    },
    Code {
        code: String,
    },
    Complete {
        /// Always 100; kept so stream consumers can treat status and
        /// completion uniformly.
        progress: u8,
        mesh: Mesh,
        code: String,
        params: Params,
        analysis: MeshAnalysis,
        attempts: u32,
        elapsed: Duration,
    },
    Error {
        /// Every attempt's failure, oldest first.
        errors: Vec<AttemptError>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }
}

pub trait ProgressSink {
    fn emit(&self, event: &ProgressEvent);
}

/// Sink that drops every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &ProgressEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Silent,
    Minimal,
    Verbose,
}

/// Human-readable progress on stderr, keeping stdout free for the
/// generated code and artifact paths.
pub struct StderrSink {
    mode: ProgressMode,
}

impl StderrSink {
    pub fn new(mode: ProgressMode) -> Self {
        StderrSink { mode }
    }
}

impl ProgressSink for StderrSink {
    fn emit(&self, event: &ProgressEvent) {
        if matches!(self.mode, ProgressMode::Silent) {
            return;
        }
        match event {
            ProgressEvent::Status { progress, message } => {
                if matches!(self.mode, ProgressMode::Verbose) {
                    eprintln!("[cadgen] {progress:>3}% {message}");
                }
            }
            ProgressEvent::Code { code } => {
                if matches!(self.mode, ProgressMode::Verbose) {
                    eprintln!("[cadgen] candidate code ready ({} lines)", code.lines().count());
                }
            }
            ProgressEvent::Complete {
                analysis,
                attempts,
                elapsed,
                ..
            } => {
                eprintln!(
                    "[cadgen] complete: {} triangles, {} vertices, {} attempt(s) in {:.1}s",
                    analysis.triangle_count,
                    analysis.vertex_count,
                    attempts,
                    elapsed.as_secs_f64()
                );
            }
            ProgressEvent::Error {
                errors, attempts, ..
            } => {
                match errors.last() {
                    Some(last) => eprintln!(
                        "[cadgen] failed ({}) after {attempts} attempt(s): {}",
                        last.category, last.message
                    ),
                    None => eprintln!("[cadgen] failed after {attempts} attempt(s)"),
                }
            }
        }
    }
}
