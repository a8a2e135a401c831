use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Minimum keyword hits before a scored match is trusted; below this the
/// request routes to chain-of-thought. Tunable rather than hard-coded into
/// the router.
pub const ROUTING_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedType {
    Splint,
    Stent,
    Heatsink,
    Honeycomb,
    Gripper,
    LatticeSc,
    LatticeBcc,
    LatticeFcc,
    Unknown,
}

impl DetectedType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Splint => "splint",
            Self::Stent => "stent",
            Self::Heatsink => "heatsink",
            Self::Honeycomb => "honeycomb",
            Self::Gripper => "gripper",
            Self::LatticeSc => "lattice_sc",
            Self::LatticeBcc => "lattice_bcc",
            Self::LatticeFcc => "lattice_fcc",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

/// Extracted parameters, keyed by unique name. Ordered so template fill and
/// event payloads are deterministic.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub detected: DetectedType,
    pub confidence: f32,
    pub params: Params,
}

/// Keyword signal per type, in tie-break declaration order.
const KEYWORDS: &[(DetectedType, &[&str])] = &[
    (DetectedType::Heatsink, &["heatsink", "heat sink", "cooling fins", "thermal dissipator", "radiator"]),
    (DetectedType::Gripper, &["gripper", "surgical gripper", "medical gripper"]),
    (DetectedType::Stent, &["stent", "vascular", "serpentine", "expandable", "coronary", "artery"]),
    (DetectedType::Honeycomb, &["honeycomb panel", "alveolar", "hexagonal cells", "hex panel", "cellular panel"]),
    (DetectedType::LatticeBcc, &["bcc", "body centered cubic", "body-centered"]),
    (DetectedType::LatticeFcc, &["fcc", "face centered cubic", "face-centered"]),
    (DetectedType::LatticeSc, &["lattice sc", "simple cubic", "cubic lattice"]),
    (DetectedType::Splint, &["splint", "orthosis", "brace", "wrist", "forearm", "hand", "finger"]),
];

/// Maps free text to a detected type plus best-effort parameters. Pure and
/// total: malformed input classifies as `Unknown`, never an error.
pub fn classify(text: &str) -> ClassificationResult {
    let lower = text.to_lowercase();
    let (detected, confidence) = detect_type(&lower);

    ClassificationResult {
        detected,
        confidence,
        params: extract_params(detected, &lower),
    }
}

fn detect_type(lower: &str) -> (DetectedType, f32) {
    // Unambiguous signal words first; scoring only decides the leftovers.
    if lower.contains("heatsink") || lower.contains("heat sink") {
        return (DetectedType::Heatsink, 1.0);
    }
    if lower.contains("gripper") {
        return (DetectedType::Gripper, 1.0);
    }
    if lower.contains("stent") {
        return (DetectedType::Stent, 1.0);
    }
    if lower.contains("alveolar")
        || lower.contains("hexagonal cells")
        || lower.contains("cellular panel")
        || (lower.contains("honeycomb") && (lower.contains("panel") || lower.contains("cell")))
    {
        return (DetectedType::Honeycomb, 1.0);
    }
    if lower.contains("bcc") || lower.contains("body centered") || lower.contains("body-centered") {
        return (DetectedType::LatticeBcc, 1.0);
    }
    if lower.contains("fcc") || lower.contains("face centered") || lower.contains("face-centered") {
        return (DetectedType::LatticeFcc, 1.0);
    }
    if lower.contains("simple cubic") || lower.contains("lattice sc") {
        return (DetectedType::LatticeSc, 1.0);
    }

    let mut best = DetectedType::Unknown;
    let mut best_score = 0u32;
    for (ty, words) in KEYWORDS {
        let score = words.iter().filter(|w| lower.contains(*w)).count() as u32;
        if score > best_score {
            best = *ty;
            best_score = score;
        }
    }

    if best_score < ROUTING_THRESHOLD {
        return (DetectedType::Unknown, 0.0);
    }

    (best, (best_score.min(4) as f32) / 4.0)
}

fn extract_params(detected: DetectedType, lower: &str) -> Params {
    let specs: &[(&str, &[&str])] = match detected {
        DetectedType::Splint => &[
            ("length", &[r"(\d+(?:\.\d+)?)\s*mm\s+long", r"length\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("width", &[r"(\d+(?:\.\d+)?)\s*mm\s+wide", r"width\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("thickness", &[r"(\d+(?:\.\d+)?)\s*mm\s+thick", r"thickness\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("edge_radius", &[r"(?:edge|edges)\s*:?\s*(\d+(?:\.\d+)?)\s*mm\s+radius"]),
        ],
        DetectedType::Stent => &[
            ("outer_radius", &[r"radius\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("length", &[r"length\s*:?\s*(\d+(?:\.\d+)?)\s*mm", r"(\d+(?:\.\d+)?)\s*mm\s+long"]),
            ("n_peaks", &[r"(\d+)\s+peaks?"]),
            ("n_rings", &[r"(\d+)\s+rings?"]),
            ("strut_width", &[r"strut.*?width\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
        ],
        DetectedType::Heatsink => &[
            ("plate_w", &[r"plate.*?width\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("plate_h", &[r"plate.*?height\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("plate_t", &[r"plate.*?thickness\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("fin_len", &[r"(?:bar|fin).*?length\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("fin_angle", &[r"(?:bar|fin).*?angle\s*:?\s*(\d+(?:\.\d+)?)\s*(?:deg|°)"]),
            ("n_fins", &[r"(\d+)\s+(?:fins|bars)"]),
        ],
        DetectedType::Honeycomb => &[
            ("panel_width", &[r"(?:panel\s+)?width\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("panel_height", &[r"(?:panel\s+)?height\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("panel_thickness", &[r"(?:panel\s+)?thickness\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("cell_size", &[r"cell\s+size\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("wall_thickness", &[r"wall\s+thickness\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
        ],
        DetectedType::Gripper => &[
            ("arm_length", &[r"arm.*?length\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("arm_width", &[r"arm.*?width\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("thickness", &[r"thickness\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("n_arms", &[r"(\d+)[- ]arm"]),
        ],
        DetectedType::LatticeSc | DetectedType::LatticeBcc | DetectedType::LatticeFcc => &[
            ("block_x", &[r"(?:width|block\s*x)\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("block_y", &[r"(?:depth|block\s*y)\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("block_z", &[r"(?:height|block\s*z)\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("cell_size", &[r"cell\s*size\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
            ("strut_radius", &[r"strut\s*radius\s*:?\s*(\d+(?:\.\d+)?)\s*mm"]),
        ],
        DetectedType::Unknown => &[],
    };

    let mut params = Params::new();
    for (name, patterns) in specs {
        if let Some(value) = find_number(lower, patterns) {
            params.insert((*name).to_string(), ParamValue::Number(value));
        }
    }
    params
}

/// Tries each pattern in order; the first one whose single capture group
/// parses as a number wins. Extraction is best-effort, so a pattern that
/// fails to compile or match simply yields nothing.
fn find_number(text: &str, patterns: &[&str]) -> Option<f64> {
    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(text)
            && let Some(m) = caps.get(1)
            && let Ok(value) = m.as_str().parse::<f64>()
        {
            return Some(value);
        }
    }
    None
}
