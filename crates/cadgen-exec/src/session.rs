use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use crate::Mesh;

const STL_NAME: &str = "model.stl";
const STEP_NAME: &str = "model.step";
const CODE_NAME: &str = "model.py";

/// On-disk store for the artifacts of the most recent run.
///
/// Files use fixed names and are overwritten on each persist, so the
/// export surface always serves the latest result.
pub struct Session {
    root: PathBuf,
}

/// Paths written by [`Session::persist`].
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub stl: PathBuf,
    pub step: Option<PathBuf>,
    pub code: PathBuf,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Session { root: root.into() }
    }

    /// Default store under the user's home directory.
    pub fn default_root() -> Result<PathBuf> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".cadgen").join("output"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write mesh, optional STEP text, and the generating script.
    ///
    /// Kernel output is not trusted: a face referencing a vertex the
    /// mesh does not have is rejected here rather than encoded.
    pub fn persist(&self, mesh: &Mesh, brep: Option<&str>, code: &str) -> Result<Artifacts> {
        let vertex_count = mesh.vertex_count() as u32;
        if let Some(&bad) = mesh.faces.iter().find(|&&i| i >= vertex_count) {
            bail!("mesh face references vertex {bad}, but only {vertex_count} vertices exist");
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("could not create {}", self.root.display()))?;

        let stl = self.root.join(STL_NAME);
        let bytes = encode_stl(mesh);
        fs::write(&stl, bytes).with_context(|| format!("could not write {}", stl.display()))?;

        let step = match brep {
            Some(text) => {
                let path = self.root.join(STEP_NAME);
                fs::write(&path, text)
                    .with_context(|| format!("could not write {}", path.display()))?;
                Some(path)
            }
            None => None,
        };

        let code_path = self.root.join(CODE_NAME);
        fs::write(&code_path, code)
            .with_context(|| format!("could not write {}", code_path.display()))?;

        Ok(Artifacts {
            stl,
            step,
            code: code_path,
        })
    }

    pub fn stl_path(&self) -> Result<PathBuf> {
        self.existing(STL_NAME, "no mesh has been generated yet")
    }

    pub fn step_path(&self) -> Result<PathBuf> {
        self.existing(STEP_NAME, "no STEP model has been generated yet")
    }

    pub fn code(&self) -> Result<String> {
        let path = self.existing(CODE_NAME, "no script has been generated yet")?;
        fs::read_to_string(&path).with_context(|| format!("could not read {}", path.display()))
    }

    fn existing(&self, name: &str, missing: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(anyhow!("{missing}"))
        }
    }
}

/// Binary STL encoding of a triangle mesh.
///
/// Normals are recomputed per facet from the winding order; stored
/// vertex normals are for shading and do not belong in the file.
fn encode_stl(mesh: &Mesh) -> Vec<u8> {
    let triangles = mesh.triangle_count();
    let mut out = Vec::with_capacity(84 + triangles * 50);

    let mut header = b"cadgen binary STL (units: mm)".to_vec();
    header.resize(80, b' ');
    out.extend_from_slice(&header);
    out.extend_from_slice(&(triangles as u32).to_le_bytes());

    for tri in mesh.faces.chunks_exact(3) {
        let a = vertex(mesh, tri[0]);
        let b = vertex(mesh, tri[1]);
        let c = vertex(mesh, tri[2]);
        let n = facet_normal(a, b, c);

        for v in [n, a, b, c] {
            for coord in v {
                out.extend_from_slice(&coord.to_le_bytes());
            }
        }
        // Attribute byte count, always zero.
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

fn vertex(mesh: &Mesh, index: u32) -> [f32; 3] {
    let i = index as usize * 3;
    [mesh.vertices[i], mesh.vertices[i + 1], mesh.vertices[i + 2]]
}

fn facet_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > f32::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}
