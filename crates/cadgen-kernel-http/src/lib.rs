//! HTTP client for a remote geometry kernel.
//!
//! The kernel service accepts a CAD script on `POST /run` and replies
//! with the tessellated mesh and optional STEP text, or a plain-text
//! error body describing why evaluation failed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cadgen_exec::{GeometryKernel, KernelOutput, Mesh};
use serde::{Deserialize, Serialize};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HttpKernel {
    base_url: String,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    vertices: Vec<f32>,
    faces: Vec<u32>,
    #[serde(default)]
    normals: Vec<f32>,
    #[serde(default)]
    step: Option<String>,
}

impl HttpKernel {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        HttpKernel { base_url }
    }

    /// Cheap liveness probe against the kernel's health endpoint.
    pub fn is_reachable(&self) -> bool {
        let Ok(client) = reqwest::blocking::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
        else {
            return false;
        };
        client
            .get(format!("{}/health", self.base_url))
            .send()
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }
}

impl GeometryKernel for HttpKernel {
    fn run(&self, code: &str, budget: Duration, cancel: &AtomicBool) -> Result<KernelOutput> {
        if cancel.load(Ordering::SeqCst) {
            bail!("cancelled before dispatch");
        }

        // The request timeout doubles as the cooperative cancel point:
        // the call never outlives the budget by more than one round trip.
        let client = reqwest::blocking::Client::builder()
            .timeout(budget)
            .build()
            .context("could not build HTTP client")?;

        let response = client
            .post(format!("{}/run", self.base_url))
            .json(&RunRequest { code })
            .send()
            .with_context(|| format!("kernel at {} is unreachable", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("kernel rejected the script ({status}): {body}");
        }

        let parsed: RunResponse = response
            .json()
            .context("kernel returned a malformed response")?;

        if cancel.load(Ordering::SeqCst) {
            bail!("cancelled");
        }

        Ok(KernelOutput {
            mesh: Mesh {
                vertices: parsed.vertices,
                faces: parsed.faces,
                normals: parsed.normals,
            },
            brep: parsed.step,
        })
    }
}
