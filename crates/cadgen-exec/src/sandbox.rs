use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::{ErrorCategory, ExecutionResult, GeometryKernel, categorize};

/// Runs a [`GeometryKernel`] on a worker thread under a hard deadline.
///
/// When the deadline passes the executor raises the cancel flag and
/// detaches the worker; a cooperative kernel winds down shortly after,
/// and a stuck one can no longer affect the caller either way.
pub struct SandboxExecutor {
    kernel: Arc<dyn GeometryKernel>,
}

impl SandboxExecutor {
    pub fn new(kernel: Arc<dyn GeometryKernel>) -> Self {
        SandboxExecutor { kernel }
    }

    pub fn run(&self, code: &str, timeout: Duration) -> ExecutionResult {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let kernel = Arc::clone(&self.kernel);
        let flag = Arc::clone(&cancel);
        let script = code.to_string();
        thread::spawn(move || {
            let outcome = kernel.run(&script, timeout, &flag);
            // The receiver is gone after a timeout; nothing to do then.
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(output)) => ExecutionResult::Success {
                mesh: output.mesh,
                brep: output.brep,
            },
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                ExecutionResult::Failure {
                    category: categorize(&message),
                    message,
                    code: code.to_string(),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::SeqCst);
                ExecutionResult::Failure {
                    category: ErrorCategory::Timeout,
                    message: format!("execution timed out after {timeout:?}"),
                    code: code.to_string(),
                }
            }
            Err(RecvTimeoutError::Disconnected) => ExecutionResult::Failure {
                category: ErrorCategory::Kernel,
                message: "kernel worker terminated unexpectedly".to_string(),
                code: code.to_string(),
            },
        }
    }
}
