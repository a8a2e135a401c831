//! Generation pipeline: description in, validated mesh out.
//!
//! A request is classified once, routed to either a parametric
//! template or the three-stage chain, then every code candidate passes
//! the syntax gate and the sandboxed kernel. Failures are classified
//! and fed to the repairer until the attempt budget runs out.

mod event;

pub use event::{AttemptError, NullSink, ProgressEvent, ProgressMode, ProgressSink, StderrSink};

use std::cell::Cell;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use cadgen_classify::{ClassificationResult, DetectedType, classify};
use cadgen_cot::{Chain, Stage};
use cadgen_exec::{ErrorCategory, ExecutionResult, Mesh, MeshAnalysis, SandboxExecutor};
use cadgen_heal::{Failure, Repairer};
use cadgen_llm::TextCompletion;
use cadgen_syntax::ValidationResult;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub description: String,
    pub model: String,
    pub timeout: Duration,
    /// Repair calls allowed after the first candidate fails.
    pub max_repair_attempts: u32,
    pub created_at: SystemTime,
}

impl GenerationRequest {
    pub fn new(
        description: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_repair_attempts: u32,
    ) -> Self {
        GenerationRequest {
            description: description.into(),
            model: model.into(),
            timeout,
            max_repair_attempts,
            created_at: SystemTime::now(),
        }
    }

    /// Stable short identifier for logs and artifact correlation.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.description.as_bytes());
        hasher.update(b"\n--model--\n");
        hasher.update(self.model.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Route {
    Template { detected: DetectedType },
    Chain,
}

/// One code candidate and how it fared. Appended to the attempt
/// history in order, never removed.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub index: u32,
    pub code: String,
    pub validation: Option<ValidationResult>,
    /// Execution failure class; `None` on success or when the
    /// candidate never reached the kernel.
    pub category: Option<ErrorCategory>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl GenerationAttempt {
    fn succeeded(index: u32, code: &str, elapsed: Duration) -> Self {
        GenerationAttempt {
            index,
            code: code.to_string(),
            validation: Some(ValidationResult::Pass),
            category: None,
            error: None,
            elapsed,
        }
    }

    fn failed(
        index: u32,
        code: &str,
        validation: ValidationResult,
        category: ErrorCategory,
        error: &str,
        elapsed: Duration,
    ) -> Self {
        GenerationAttempt {
            index,
            code: code.to_string(),
            validation: Some(validation),
            category: Some(category),
            error: Some(error.to_string()),
            elapsed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub request_id: String,
    pub route: Route,
    pub classification: ClassificationResult,
    pub code: String,
    pub mesh: Mesh,
    pub brep: Option<String>,
    pub analysis: MeshAnalysis,
    pub attempts: Vec<GenerationAttempt>,
    pub elapsed: Duration,
}

/// Terminal pipeline failure, carried inside `anyhow` so callers can
/// still read the category and attempt history.
#[derive(Debug, Error)]
#[error("generation failed ({category}) after {attempts} attempt(s): {message}")]
pub struct GenerationFailure {
    pub category: ErrorCategory,
    pub message: String,
    pub attempts: u32,
    /// Every attempt's failure, oldest first.
    pub errors: Vec<AttemptError>,
}

/// Progress wrapper enforcing that percentages never go backwards,
/// even when the repair loop revisits earlier phases.
struct Emitter<'a> {
    sink: &'a dyn ProgressSink,
    last: Cell<u8>,
}

impl<'a> Emitter<'a> {
    fn new(sink: &'a dyn ProgressSink) -> Self {
        Emitter {
            sink,
            last: Cell::new(0),
        }
    }

    fn status(&self, progress: u8, message: impl Into<String>) {
        let progress = progress.max(self.last.get());
        self.last.set(progress);
        self.sink.emit(&ProgressEvent::Status {
            progress,
            message: message.into(),
        });
    }

    /// Re-emit at the level already reached, for phases that revisit
    /// earlier work instead of advancing.
    fn hold(&self, message: impl Into<String>) {
        self.sink.emit(&ProgressEvent::Status {
            progress: self.last.get(),
            message: message.into(),
        });
    }

    fn raw(&self, event: &ProgressEvent) {
        self.sink.emit(event);
    }
}

/// Run one request end to end, emitting progress on `sink`.
///
/// Exactly one terminal event is emitted: `Complete` on `Ok`, `Error`
/// on `Err`.
pub fn generate(
    client: &dyn TextCompletion,
    executor: &SandboxExecutor,
    sink: &dyn ProgressSink,
    request: &GenerationRequest,
) -> Result<GenerationReport> {
    let emit = Emitter::new(sink);
    let started = Instant::now();
    match run_pipeline(client, executor, &emit, request, started) {
        Ok(report) => Ok(report),
        Err(err) => {
            let event = match err.downcast_ref::<GenerationFailure>() {
                Some(failure) => ProgressEvent::Error {
                    errors: failure.errors.clone(),
                    attempts: failure.attempts,
                    elapsed: started.elapsed(),
                },
                None => {
                    let message = format!("{err:#}");
                    ProgressEvent::Error {
                        errors: vec![AttemptError {
                            category: cadgen_exec::categorize(&message),
                            message,
                        }],
                        attempts: 0,
                        elapsed: started.elapsed(),
                    }
                }
            };
            emit.raw(&event);
            Err(err)
        }
    }
}

fn run_pipeline(
    client: &dyn TextCompletion,
    executor: &SandboxExecutor,
    emit: &Emitter<'_>,
    request: &GenerationRequest,
    started: Instant,
) -> Result<GenerationReport> {
    emit.status(10, "analyzing request");
    let classification = classify(&request.description);

    let (route, mut code) = if classification.detected.is_known() {
        emit.status(
            45,
            format!("filling '{}' template", classification.detected.as_str()),
        );
        let code = cadgen_templates::fill(classification.detected, &classification.params)
            .context("routed type has no template")?;
        (
            Route::Template {
                detected: classification.detected,
            },
            code,
        )
    } else {
        let chain = Chain::new(client, &request.model);
        let output = chain.run(&request.description, |stage| {
            let (progress, message) = match stage {
                Stage::Analysis => (40, "analyzing design requirements"),
                Stage::Plan => (50, "drafting modeling plan"),
                Stage::Synthesis => (60, "synthesizing code"),
            };
            emit.status(progress, message);
        })?;
        (Route::Chain, output.code)
    };

    let repairer = Repairer::new(client, &request.model);
    let mut attempts: Vec<GenerationAttempt> = Vec::new();
    let allowed = request.max_repair_attempts as usize + 1;

    loop {
        let index = attempts.len() as u32;
        let attempt_started = Instant::now();

        // Candidates are surfaced before validation so callers see
        // what was generated even when it turns out to be invalid.
        emit.status(70, "code candidate ready");
        emit.raw(&ProgressEvent::Code { code: code.clone() });
        emit.status(75, format!("validating syntax (candidate {})", index + 1));

        let validation = cadgen_syntax::check(&code);
        let failure = match validation.diagnostic() {
            Some(diagnostic) => Failure {
                category: ErrorCategory::Syntax,
                message: diagnostic,
            },
            None => {
                emit.status(80, "executing in sandbox");
                match executor.run(&code, request.timeout) {
                    ExecutionResult::Success { mesh, brep } => {
                        attempts.push(GenerationAttempt::succeeded(
                            index,
                            &code,
                            attempt_started.elapsed(),
                        ));
                        let analysis = mesh.analyze();
                        let elapsed = started.elapsed();
                        emit.status(100, "complete");
                        emit.raw(&ProgressEvent::Complete {
                            progress: 100,
                            mesh: mesh.clone(),
                            code: code.clone(),
                            params: classification.params.clone(),
                            analysis: analysis.clone(),
                            attempts: attempts.len() as u32,
                            elapsed,
                        });
                        return Ok(GenerationReport {
                            request_id: request.id(),
                            route,
                            classification,
                            code,
                            mesh,
                            brep,
                            analysis,
                            attempts,
                            elapsed,
                        });
                    }
                    ExecutionResult::Failure {
                        category, message, ..
                    } => Failure { category, message },
                }
            }
        };

        attempts.push(GenerationAttempt::failed(
            index,
            &code,
            validation,
            failure.category,
            &failure.message,
            attempt_started.elapsed(),
        ));

        if attempts.len() >= allowed {
            let errors = attempts
                .iter()
                .filter_map(|a| {
                    Some(AttemptError {
                        category: a.category?,
                        message: a.error.clone().unwrap_or_default(),
                    })
                })
                .collect();
            return Err(GenerationFailure {
                category: failure.category,
                message: failure.message,
                attempts: attempts.len() as u32,
                errors,
            }
            .into());
        }

        emit.hold(format!("repairing (attempt {})", attempts.len()));
        code = repairer.repair(&code, &failure, attempts.len() as u32)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_stable_and_input_sensitive() {
        let request = GenerationRequest::new(
            "a wrist splint",
            "qwen2.5-coder",
            Duration::from_secs(30),
            2,
        );
        let id = request.id();
        assert_eq!(id.len(), 12);
        assert_eq!(id, request.id());

        let other = GenerationRequest {
            model: "llama3".to_string(),
            ..request
        };
        assert_ne!(id, other.id());
    }

    #[test]
    fn routes_serialize_with_a_kind_tag() {
        let json = serde_json::to_string(&Route::Template {
            detected: DetectedType::Splint,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"template","detected":"splint"}"#);
        assert_eq!(
            serde_json::to_string(&Route::Chain).unwrap(),
            r#"{"kind":"chain"}"#
        );
    }
}
