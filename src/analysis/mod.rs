//! Spatial analysis algorithms.
//!
//! Point-based analyses ([`proximity`], [`density`], [`cluster`]) take
//! position slices. Raster analyses ([`terrain`], [`viewshed`],
//! [`interpolation`]) read and produce a [`Grid`]. Routing lives in
//! [`network`].

pub mod cluster;
pub mod density;
pub mod grid;
pub mod interpolation;
pub mod network;
pub mod proximity;
pub mod terrain;
pub mod viewshed;

pub use cluster::{
    Cluster, ClusterMetric, Clustering, DbscanOptions, KMeansOptions, KMeansResult, dbscan,
    hierarchical, kmeans, silhouette_score,
};
pub use density::{
    Hotspot, HotspotClass, Kernel, KernelDensityOptions, getis_ord_gi_star, kernel_density,
    line_density, normal_cdf, point_density,
};
pub use grid::{Grid, GridSpec};
pub use interpolation::{
    IdwOptions, KrigingResult, Variogram, VariogramBin, VariogramModel, empirical_variogram,
    fit_variogram, idw, kriging,
};
pub use network::{Edge, Network, NetworkNode, Route, ServiceArea, Tour};
pub use proximity::{
    DistanceMetric, distance_between, distance_matrix, k_nearest_neighbors, nearest_n,
    point_to_line_distance, point_to_segment_distance, within_corridor, within_distance,
};
pub use terrain::{SlopeUnits, aspect, curvature, flow_accumulation, flow_direction, hillshade, slope};
pub use viewshed::{
    LineOfSight, Viewpoint, ViewshedOptions, bresenham_line, cumulative_viewshed, line_of_sight,
    optimal_viewpoint, viewshed,
};
