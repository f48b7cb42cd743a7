//! Geometry construction, measurement and structural helpers.

pub mod factory;
pub mod measure;
pub mod ops;

pub use factory::{
    check_geometry, create_circle, create_ellipse, create_geometry_collection,
    create_line_string, create_multi_line_string, create_multi_point, create_multi_polygon,
    create_point, create_polygon, create_rectangle, create_regular_polygon, create_star,
};
pub use measure::{
    EARTH_RADIUS_M, area, bounds, centroid, distance, haversine_distance, haversine_length,
    length, mean_position, path_length, signed_ring_area,
};
pub use ops::{close_ring, extract_positions, reverse, segments, try_map_positions};
