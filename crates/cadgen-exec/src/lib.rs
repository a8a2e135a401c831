//! Sandboxed execution of generated CAD scripts.
//!
//! A [`GeometryKernel`] turns a script into mesh and BREP output. The
//! [`SandboxExecutor`] runs the kernel on a worker thread under a hard
//! time budget and classifies every failure into an [`ErrorCategory`]
//! so callers can decide whether a repair pass is worth attempting.

mod error;
mod sandbox;
mod session;

pub use error::{ErrorCategory, categorize};
pub use sandbox::SandboxExecutor;
pub use session::{Artifacts, Session};

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Triangle mesh produced by a kernel run. Flat layout: three floats
/// per vertex, three indices per face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub faces: Vec<u32>,
    pub normals: Vec<f32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.faces.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Axis-aligned bounding box, `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<([f32; 3], [f32; 3])> {
        if self.vertices.len() < 3 {
            return None;
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for v in self.vertices.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        Some((min, max))
    }

    pub fn analyze(&self) -> MeshAnalysis {
        let (min, max) = self.bounding_box().unwrap_or(([0.0; 3], [0.0; 3]));
        MeshAnalysis {
            triangle_count: self.triangle_count(),
            vertex_count: self.vertex_count(),
            bbox_min: min,
            bbox_max: max,
        }
    }
}

/// Summary statistics for a produced mesh, reported alongside the
/// final result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshAnalysis {
    pub triangle_count: usize,
    pub vertex_count: usize,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
}

/// Raw output of a successful kernel run.
#[derive(Debug, Clone)]
pub struct KernelOutput {
    pub mesh: Mesh,
    /// STEP text of the solid, when the kernel can provide one.
    pub brep: Option<String>,
}

/// A geometry backend that evaluates a CAD script.
///
/// Implementations must poll `cancel` at reasonable intervals and bail
/// out once it is set; the executor raises it when the time budget is
/// exhausted and detaches the worker.
pub trait GeometryKernel: Send + Sync {
    fn run(&self, code: &str, budget: Duration, cancel: &AtomicBool) -> Result<KernelOutput>;
}

/// Outcome of one sandboxed run.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Success {
        mesh: Mesh,
        brep: Option<String>,
    },
    Failure {
        category: ErrorCategory,
        message: String,
        /// The script that failed, kept for the repair prompt.
        code: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}
