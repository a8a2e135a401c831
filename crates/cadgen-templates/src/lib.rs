//! Parameterized code skeletons for the recognized object types. Filling is
//! deterministic: identical (type, parameters) always yields identical code.

use cadgen_classify::{DetectedType, ParamValue, Params};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// Routing guarantees a skeleton exists for every known type, so hitting
    /// this is a registry defect, not a request problem.
    #[error("no skeleton registered for type '{0}'")]
    MissingSkeleton(&'static str),
}

/// Fills the skeleton registered for `detected`, substituting extracted
/// parameters and type-specific defaults for anything absent.
pub fn fill(detected: DetectedType, params: &Params) -> Result<String, TemplateError> {
    match detected {
        DetectedType::Splint => Ok(splint(params)),
        DetectedType::Stent => Ok(stent(params)),
        DetectedType::Heatsink => Ok(heatsink(params)),
        DetectedType::Honeycomb => Ok(honeycomb(params)),
        DetectedType::Gripper => Ok(gripper(params)),
        DetectedType::LatticeSc => Ok(lattice(params, "sc")),
        DetectedType::LatticeBcc => Ok(lattice(params, "bcc")),
        DetectedType::LatticeFcc => Ok(lattice(params, "fcc")),
        DetectedType::Unknown => Err(TemplateError::MissingSkeleton("unknown")),
    }
}

fn num(params: &Params, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(ParamValue::as_number)
        .unwrap_or(default)
}

fn splint(p: &Params) -> String {
    let length = num(p, "length", 270.0);
    let width = num(p, "width", 70.0);
    let thickness = num(p, "thickness", 3.5);
    let edge_radius = num(p, "edge_radius", 2.0);
    format!(
        r#"import cadquery as cq

length = {length:.3}
width = {width:.3}
thickness = {thickness:.3}
edge_radius = {edge_radius:.3}
arc_deg = 220.0

shell = (
    cq.Workplane("YZ")
    .circle(width / 2.0)
    .circle(width / 2.0 - thickness)
    .extrude(length)
)
trough = (
    cq.Workplane("YZ")
    .rect(width * 2.0, width)
    .extrude(length)
    .translate((0, 0, width * (arc_deg / 360.0)))
)
result = shell.cut(trough).edges("|X").fillet(edge_radius)
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

fn stent(p: &Params) -> String {
    let outer_radius = num(p, "outer_radius", 8.0);
    let length = num(p, "length", 40.0);
    let n_peaks = num(p, "n_peaks", 8.0) as u32;
    let n_rings = num(p, "n_rings", 6.0) as u32;
    let strut_width = num(p, "strut_width", 0.6);
    format!(
        r#"import cadquery as cq
import math

outer_radius = {outer_radius:.3}
length = {length:.3}
n_peaks = {n_peaks}
n_rings = {n_rings}
strut_width = {strut_width:.3}
ring_spacing = length / n_rings

result = cq.Workplane("XY")
for ring in range(n_rings):
    z0 = ring * ring_spacing
    points = []
    for i in range(n_peaks * 2 + 1):
        theta = math.pi * i / n_peaks
        z = z0 + (ring_spacing / 2.0) * (1 if i % 2 == 0 else 0)
        points.append((outer_radius * math.cos(theta), outer_radius * math.sin(theta), z))
    ring_wire = cq.Workplane("XY").polyline([(x, y) for x, y, _ in points]).close()
    result = result.union(ring_wire.extrude(strut_width).translate((0, 0, z0)))
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

fn heatsink(p: &Params) -> String {
    let plate_w = num(p, "plate_w", 40.0);
    let plate_h = num(p, "plate_h", 40.0);
    let plate_t = num(p, "plate_t", 3.0);
    let fin_len = num(p, "fin_len", 22.0);
    let fin_angle = num(p, "fin_angle", 20.0);
    let n_fins = num(p, "n_fins", 12.0) as u32;
    format!(
        r#"import cadquery as cq

plate_w = {plate_w:.3}
plate_h = {plate_h:.3}
plate_t = {plate_t:.3}
fin_len = {fin_len:.3}
fin_angle = {fin_angle:.3}
n_fins = {n_fins}

plate = cq.Workplane("XY").box(plate_w, plate_h, plate_t)
pitch = plate_w / (n_fins + 1)
fins = cq.Workplane("XY")
for i in range(n_fins):
    x = -plate_w / 2.0 + (i + 1) * pitch
    fin = (
        cq.Workplane("XY")
        .box(pitch * 0.4, plate_h, fin_len)
        .rotate((0, 0, 0), (0, 1, 0), fin_angle)
        .translate((x, 0, plate_t / 2.0 + fin_len / 2.0))
    )
    fins = fins.union(fin)
result = plate.union(fins)
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

fn honeycomb(p: &Params) -> String {
    let panel_width = num(p, "panel_width", 300.0);
    let panel_height = num(p, "panel_height", 380.0);
    let panel_thickness = num(p, "panel_thickness", 40.0);
    let cell_size = num(p, "cell_size", 12.0);
    let wall_thickness = num(p, "wall_thickness", 2.2);
    format!(
        r#"import cadquery as cq
import math

panel_width = {panel_width:.3}
panel_height = {panel_height:.3}
panel_thickness = {panel_thickness:.3}
cell_size = {cell_size:.3}
wall_thickness = {wall_thickness:.3}

panel = cq.Workplane("XY").box(panel_width, panel_height, panel_thickness)
pitch_x = (cell_size + wall_thickness) * 1.5
pitch_y = (cell_size + wall_thickness) * math.sqrt(3) / 2.0
centers = []
row = 0
y = -panel_height / 2.0 + cell_size
while y < panel_height / 2.0 - cell_size:
    offset = pitch_x / 2.0 if row % 2 else 0.0
    x = -panel_width / 2.0 + cell_size + offset
    while x < panel_width / 2.0 - cell_size:
        centers.append((x, y))
        x += pitch_x
    y += pitch_y
    row += 1
result = (
    panel.faces(">Z")
    .workplane()
    .pushPoints(centers)
    .polygon(6, cell_size)
    .cutThruAll()
)
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

fn gripper(p: &Params) -> String {
    let arm_length = num(p, "arm_length", 25.0);
    let arm_width = num(p, "arm_width", 8.0);
    let thickness = num(p, "thickness", 1.5);
    let n_arms = num(p, "n_arms", 4.0) as u32;
    format!(
        r#"import cadquery as cq

arm_length = {arm_length:.3}
arm_width = {arm_width:.3}
thickness = {thickness:.3}
n_arms = {n_arms}
center_diameter = 6.0

hub = cq.Workplane("XY").circle(center_diameter).extrude(thickness)
result = hub
for i in range(n_arms):
    angle = 360.0 * i / n_arms
    arm = (
        cq.Workplane("XY")
        .box(arm_length, arm_width, thickness, centered=(False, True, False))
        .translate((center_diameter / 2.0, 0, 0))
        .rotate((0, 0, 0), (0, 0, 1), angle)
    )
    result = result.union(arm)
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

fn lattice(p: &Params, cell_style: &str) -> String {
    let block_x = num(p, "block_x", 30.0);
    let block_y = num(p, "block_y", 30.0);
    let block_z = num(p, "block_z", 30.0);
    let cell_size = num(p, "cell_size", 15.0);
    let strut_radius = num(p, "strut_radius", 1.2);
    format!(
        r#"import cadquery as cq

cell_style = "{cell_style}"
block_x = {block_x:.3}
block_y = {block_y:.3}
block_z = {block_z:.3}
cell_size = {cell_size:.3}
strut_radius = {strut_radius:.3}

def strut(p0, p1):
    direction = cq.Vector(p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2])
    return cq.Solid.makeCylinder(strut_radius, direction.Length, cq.Vector(*p0), direction)

def cell_edges(o, s):
    c = [(o[0] + dx * s, o[1] + dy * s, o[2] + dz * s)
         for dx in (0, 1) for dy in (0, 1) for dz in (0, 1)]
    edges = [(c[0], c[1]), (c[0], c[2]), (c[0], c[4]),
             (c[3], c[1]), (c[3], c[2]), (c[3], c[7]),
             (c[5], c[1]), (c[5], c[4]), (c[5], c[7]),
             (c[6], c[2]), (c[6], c[4]), (c[6], c[7])]
    center = (o[0] + s / 2.0, o[1] + s / 2.0, o[2] + s / 2.0)
    if cell_style == "bcc":
        edges += [(corner, center) for corner in c]
    if cell_style == "fcc":
        edges += [(c[0], c[3]), (c[5], c[6]), (c[0], c[5]), (c[3], c[6]),
                  (c[1], c[7]), (c[2], c[4])]
    return edges

result = cq.Workplane("XY")
nx = max(1, int(block_x / cell_size))
ny = max(1, int(block_y / cell_size))
nz = max(1, int(block_z / cell_size))
for ix in range(nx):
    for iy in range(ny):
        for iz in range(nz):
            origin = (ix * cell_size, iy * cell_size, iz * cell_size)
            for p0, p1 in cell_edges(origin, cell_size):
                result = result.union(cq.Workplane("XY").add(strut(p0, p1)))
cq.exporters.export(result, "output/model.stl")
cq.exporters.export(result, "output/model.step")
"#
    )
}

#[cfg(test)]
mod tests {
    use super::{TemplateError, fill};
    use cadgen_classify::{DetectedType, ParamValue, Params, classify};

    #[test]
    fn identical_inputs_give_identical_code() {
        let mut params = Params::new();
        params.insert("length".to_string(), ParamValue::Number(270.0));
        params.insert("width".to_string(), ParamValue::Number(70.0));

        let a = fill(DetectedType::Splint, &params).expect("fill should pass");
        let b = fill(DetectedType::Splint, &params).expect("fill should pass");
        assert_eq!(a, b);
    }

    #[test]
    fn missing_parameters_use_type_defaults() {
        let code = fill(DetectedType::Splint, &Params::new()).expect("fill should pass");
        assert!(code.contains("length = 270.000"));
        assert!(code.contains("width = 70.000"));
        assert!(code.contains("thickness = 3.500"));
    }

    #[test]
    fn extracted_parameters_override_defaults() {
        let result = classify("create a wrist splint 270mm long, 70mm wide, 3.5mm thick");
        let code = fill(result.detected, &result.params).expect("fill should pass");
        assert!(code.contains("length = 270.000"));
        assert!(code.contains("thickness = 3.500"));
    }

    #[test]
    fn unknown_type_has_no_skeleton() {
        let err = fill(DetectedType::Unknown, &Params::new()).expect_err("must fail");
        assert!(matches!(err, TemplateError::MissingSkeleton("unknown")));
    }

    #[test]
    fn every_known_type_has_a_skeleton() {
        let known = [
            DetectedType::Splint,
            DetectedType::Stent,
            DetectedType::Heatsink,
            DetectedType::Honeycomb,
            DetectedType::Gripper,
            DetectedType::LatticeSc,
            DetectedType::LatticeBcc,
            DetectedType::LatticeFcc,
        ];
        for ty in known {
            let code = fill(ty, &Params::new()).expect("fill should pass");
            assert!(code.contains("cq.exporters.export"), "{ty:?} exports nothing");
        }
    }

    #[test]
    fn gripper_arm_count_reaches_skeleton() {
        let mut params = Params::new();
        params.insert("n_arms".to_string(), ParamValue::Number(3.0));
        let code = fill(DetectedType::Gripper, &params).expect("fill should pass");
        assert!(code.contains("n_arms = 3"));
    }

    #[test]
    fn snapshot_missing_skeleton_error() {
        let err = fill(DetectedType::Unknown, &Params::new()).expect_err("must fail");
        insta::assert_snapshot!(err.to_string(), @"no skeleton registered for type 'unknown'");
    }
}
