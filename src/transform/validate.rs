//! Geometry validation and best-effort repair.
//!
//! Validation never fails: problems are reported as [`ValidationIssue`]
//! values. Errors mean the geometry should not be used downstream; warnings
//! are advisory.

use crate::geometry::measure::{path_length, signed_ring_area};
use crate::geometry::ops::{close_ring, open_ring};
use crate::topology::{locate_in_ring, segments_intersect, RingLocation};
use geoscope_types::{Geometry, Position, Ring};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    NonFiniteCoordinate,
    RingNotClosed,
    RingTooShort,
    LineTooShort,
    NoRings,
    EmptyGeometry,
    SelfIntersection,
    HoleOutsideShell,
    WrongOrientation,
    DuplicatePoints,
    ZeroArea,
    ZeroLength,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::NonFiniteCoordinate => "non_finite_coordinate",
            IssueCode::RingNotClosed => "ring_not_closed",
            IssueCode::RingTooShort => "ring_too_short",
            IssueCode::LineTooShort => "line_too_short",
            IssueCode::NoRings => "no_rings",
            IssueCode::EmptyGeometry => "empty_geometry",
            IssueCode::SelfIntersection => "self_intersection",
            IssueCode::HoleOutsideShell => "hole_outside_shell",
            IssueCode::WrongOrientation => "wrong_orientation",
            IssueCode::DuplicatePoints => "duplicate_points",
            IssueCode::ZeroArea => "zero_area",
            IssueCode::ZeroLength => "zero_length",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    /// Path to the offending part, e.g. `"polygon 1 ring 0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|issue| issue.code == code)
    }
}

struct Collector {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Collector {
    fn push(&mut self, severity: Severity, code: IssueCode, message: String, location: &str) {
        let issue = ValidationIssue {
            severity,
            code,
            message,
            location: (!location.is_empty()).then(|| location.to_string()),
        };
        match severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
        }
    }

    fn error(&mut self, code: IssueCode, message: impl Into<String>, location: &str) {
        self.push(Severity::Error, code, message.into(), location);
    }

    fn warning(&mut self, code: IssueCode, message: impl Into<String>, location: &str) {
        self.push(Severity::Warning, code, message.into(), location);
    }
}

fn join(prefix: &str, part: String) -> String {
    if prefix.is_empty() {
        part
    } else {
        format!("{} {}", prefix, part)
    }
}

/// Reports the first non-finite position; returns false when one was found.
fn check_finite(positions: &[Position], location: &str, out: &mut Collector) -> bool {
    match positions.iter().position(|p| !p.is_finite()) {
        Some(idx) => {
            out.error(
                IssueCode::NonFiniteCoordinate,
                format!("Position {} has a non-finite coordinate", idx),
                location,
            );
            false
        }
        None => true,
    }
}

fn check_duplicates(positions: &[Position], location: &str, out: &mut Collector) {
    let count = positions
        .windows(2)
        .filter(|w| w[0].equals_2d(&w[1]))
        .count();
    if count > 0 {
        out.warning(
            IssueCode::DuplicatePoints,
            format!("{} duplicate consecutive position(s)", count),
            location,
        );
    }
}

/// Non-adjacent segment pairs that touch or cross.
fn has_self_intersection(positions: &[Position]) -> bool {
    let n = positions.len();
    if n < 4 {
        return false;
    }
    let closed = positions[0].equals_2d(&positions[n - 1]);
    let segs: Vec<(&Position, &Position)> = positions
        .windows(2)
        .filter(|w| !w[0].equals_2d(&w[1]))
        .map(|w| (&w[0], &w[1]))
        .collect();
    let m = segs.len();
    for i in 0..m {
        for j in (i + 2)..m {
            if closed && i == 0 && j == m - 1 {
                continue;
            }
            if segments_intersect(segs[i].0, segs[i].1, segs[j].0, segs[j].1) {
                return true;
            }
        }
    }
    false
}

fn validate_line(line: &[Position], location: &str, out: &mut Collector) {
    if line.len() < 2 {
        out.error(
            IssueCode::LineTooShort,
            format!("LineString needs at least 2 positions, has {}", line.len()),
            location,
        );
        return;
    }
    if !check_finite(line, location, out) {
        return;
    }
    check_duplicates(line, location, out);
    if path_length(line) == 0.0 {
        out.warning(IssueCode::ZeroLength, "LineString has zero length", location);
    } else if has_self_intersection(line) {
        out.warning(IssueCode::SelfIntersection, "LineString intersects itself", location);
    }
}

/// Returns false when the ring is structurally unusable.
fn validate_ring(ring: &[Position], is_hole: bool, location: &str, out: &mut Collector) -> bool {
    if ring.len() < 4 {
        out.error(
            IssueCode::RingTooShort,
            format!("Ring needs at least 4 positions, has {}", ring.len()),
            location,
        );
        return false;
    }
    if !check_finite(ring, location, out) {
        return false;
    }
    if !ring[0].equals_2d(&ring[ring.len() - 1]) {
        out.error(
            IssueCode::RingNotClosed,
            "First and last positions differ",
            location,
        );
        return false;
    }
    check_duplicates(ring, location, out);
    if has_self_intersection(ring) {
        out.error(IssueCode::SelfIntersection, "Ring intersects itself", location);
    }

    let signed = signed_ring_area(ring);
    if signed == 0.0 {
        out.warning(IssueCode::ZeroArea, "Ring encloses zero area", location);
    } else if is_hole && signed > 0.0 {
        out.warning(
            IssueCode::WrongOrientation,
            "Hole should be clockwise",
            location,
        );
    } else if !is_hole && signed < 0.0 {
        out.warning(
            IssueCode::WrongOrientation,
            "Exterior ring should be counter-clockwise",
            location,
        );
    }
    true
}

fn validate_polygon(rings: &[Ring], location: &str, out: &mut Collector) {
    let Some((exterior, holes)) = rings.split_first() else {
        out.error(IssueCode::NoRings, "Polygon has no rings", location);
        return;
    };
    let exterior_ok = validate_ring(exterior, false, &join(location, "ring 0".into()), out);

    for (idx, hole) in holes.iter().enumerate() {
        let hole_location = join(location, format!("ring {}", idx + 1));
        let hole_ok = validate_ring(hole, true, &hole_location, out);
        if exterior_ok
            && hole_ok
            && open_ring(hole)
                .iter()
                .any(|p| locate_in_ring(p, exterior) == RingLocation::Outside)
        {
            out.error(
                IssueCode::HoleOutsideShell,
                "Hole extends outside the exterior ring",
                &hole_location,
            );
        }
    }
}

fn validate_into(geometry: &Geometry, location: &str, out: &mut Collector) {
    match geometry {
        Geometry::Point(p) => {
            check_finite(std::slice::from_ref(p), location, out);
        }
        Geometry::MultiPoint(points) => {
            if points.is_empty() {
                out.error(IssueCode::EmptyGeometry, "MultiPoint is empty", location);
            } else {
                check_finite(points, location, out);
            }
        }
        Geometry::LineString(line) => validate_line(line, location, out),
        Geometry::MultiLineString(lines) => {
            if lines.is_empty() {
                out.error(IssueCode::EmptyGeometry, "MultiLineString is empty", location);
            }
            for (idx, line) in lines.iter().enumerate() {
                validate_line(line, &join(location, format!("line {}", idx)), out);
            }
        }
        Geometry::Polygon(rings) => validate_polygon(rings, location, out),
        Geometry::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                out.error(IssueCode::EmptyGeometry, "MultiPolygon is empty", location);
            }
            for (idx, rings) in polygons.iter().enumerate() {
                validate_polygon(rings, &join(location, format!("polygon {}", idx)), out);
            }
        }
        Geometry::GeometryCollection(geometries) => {
            for (idx, g) in geometries.iter().enumerate() {
                validate_into(g, &join(location, format!("geometry {}", idx)), out);
            }
        }
    }
}

/// Run every structural and advisory check.
///
/// # Examples
///
/// ```
/// use geoscope::transform::validate::{validate, IssueCode};
/// use geoscope::{Geometry, Position};
///
/// // Clockwise exterior: valid, but with an orientation warning.
/// let cw = Geometry::Polygon(vec![vec![
///     Position::new(0.0, 0.0),
///     Position::new(0.0, 1.0),
///     Position::new(1.0, 1.0),
///     Position::new(1.0, 0.0),
///     Position::new(0.0, 0.0),
/// ]]);
/// let report = validate(&cw);
/// assert!(report.valid);
/// assert!(report.has_code(IssueCode::WrongOrientation));
/// ```
pub fn validate(geometry: &Geometry) -> ValidationReport {
    let mut out = Collector {
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    validate_into(geometry, "", &mut out);
    ValidationReport {
        valid: out.errors.is_empty(),
        errors: out.errors,
        warnings: out.warnings,
    }
}

pub fn is_valid(geometry: &Geometry) -> bool {
    validate(geometry).valid
}

fn fix_ring(ring: &Ring, counter_clockwise: bool) -> Ring {
    let mut fixed = if ring.len() >= 3 {
        close_ring(ring.clone())
    } else {
        ring.clone()
    };
    let signed = signed_ring_area(&fixed);
    if (counter_clockwise && signed < 0.0) || (!counter_clockwise && signed > 0.0) {
        fixed.reverse();
    }
    fixed
}

fn fix_polygon(rings: &[Ring]) -> Vec<Ring> {
    rings
        .iter()
        .enumerate()
        .map(|(idx, ring)| fix_ring(ring, idx == 0))
        .collect()
}

/// Close open rings and orient exteriors counter-clockwise and holes
/// clockwise. Nothing else is repaired.
pub fn fix(geometry: &Geometry) -> Geometry {
    match geometry {
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::LineString(_)
        | Geometry::MultiLineString(_) => geometry.clone(),
        Geometry::Polygon(rings) => Geometry::Polygon(fix_polygon(rings)),
        Geometry::MultiPolygon(polygons) => {
            Geometry::MultiPolygon(polygons.iter().map(|p| fix_polygon(p)).collect())
        }
        Geometry::GeometryCollection(geometries) => {
            Geometry::GeometryCollection(geometries.iter().map(fix).collect())
        }
    }
}
