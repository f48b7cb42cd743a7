//! Geometry transforms. Every function returns a new geometry and leaves
//! its input untouched.

pub mod buffer;
pub mod overlay;
pub mod simplify;
pub mod validate;

pub use buffer::{buffer, BufferOptions, CapStyle, Units};
pub use overlay::{
    convex_hull, difference, dissolve, dissolve_by_property, intersection, symmetric_difference,
    union,
};
pub use simplify::{
    densify, douglas_peucker, radial_distance, remove_spikes, simplify, smooth,
    visvalingam_whyatt, SimplifyOptions,
};
pub use validate::{
    fix, is_valid, validate, IssueCode, Severity, ValidationIssue, ValidationReport,
};
