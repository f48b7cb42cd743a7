use geoscope::analysis::{
    DbscanOptions, DistanceMetric, Grid, GridSpec, IdwOptions, KMeansOptions, Network, Variogram,
    VariogramModel, ViewshedOptions, dbscan, idw, kmeans, kriging, viewshed,
};
use geoscope::geometry::{create_line_string, create_multi_polygon, create_polygon};
use geoscope::projection::ProjectionRegistry;
use geoscope::query::{SpatialQuery, execute};
use geoscope::topology::relate_named;
use geoscope::transform::{BufferOptions, IssueCode, buffer, intersection, validate};
use geoscope::{Bounds, CancelToken, Config, Geometry, GeoscopeError, Position, SpatialIndex};

fn p(x: f64, y: f64) -> Position {
    Position::new(x, y)
}

/// Structural problems fail at construction time.
#[test]
fn test_malformed_geometries_are_rejected() {
    assert!(matches!(create_line_string(vec![p(0.0, 0.0)]), Err(GeoscopeError::Geometry(_))));
    assert!(matches!(create_polygon(vec![]), Err(GeoscopeError::Geometry(_))));
    assert!(matches!(
        create_polygon(vec![vec![p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)]]),
        Err(GeoscopeError::Geometry(_))
    ));
    assert!(matches!(create_multi_polygon(vec![]), Err(GeoscopeError::Geometry(_))));
}

/// Validation reports issues as values instead of failing.
#[test]
fn test_validation_reports_self_intersection() {
    let bowtie = Geometry::Polygon(vec![vec![
        p(0.0, 0.0),
        p(2.0, 2.0),
        p(2.0, 0.0),
        p(0.0, 2.0),
        p(0.0, 0.0),
    ]]);
    let report = validate(&bowtie);
    assert!(!report.valid);
    assert!(report.has_code(IssueCode::SelfIntersection));
}

#[test]
fn test_unknown_relationship_name() {
    let a = Geometry::Point(p(0.0, 0.0));
    assert!(matches!(relate_named(&a, &a, "near"), Err(GeoscopeError::Topology(_))));
}

#[test]
fn test_buffer_rejects_bad_distances() {
    let point = Geometry::Point(p(0.0, 0.0));
    for d in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            buffer(&point, &BufferOptions::new(d)),
            Err(GeoscopeError::InvalidInput(_))
        ));
    }
}

#[test]
fn test_disjoint_overlay_is_empty_not_error() {
    let a = create_polygon(vec![vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0), p(0.0, 0.0)]]).unwrap();
    let b = create_polygon(vec![vec![p(5.0, 5.0), p(6.0, 5.0), p(6.0, 6.0), p(5.0, 6.0), p(5.0, 5.0)]]).unwrap();
    assert_eq!(intersection(&a, &b).unwrap(), None);
}

#[test]
fn test_index_rejects_non_finite_items_and_queries() {
    let mut index: SpatialIndex<Position> = SpatialIndex::new();
    assert!(index.insert(p(f64::NAN, 0.0)).is_err());
    index.insert(p(1.0, 1.0)).unwrap();
    assert!(index.search(&Bounds::new(f64::NEG_INFINITY, 0.0, f64::NAN, 2.0)).is_empty());
    assert_eq!(index.search(&Bounds::new(0.0, 0.0, 2.0, 2.0)).len(), 1);
    assert!(SpatialIndex::<Position>::with_config(&Config::default().with_index_capacity(4, 3)).is_err());
}

#[test]
fn test_network_errors_and_absence() {
    let mut network = Network::with_metric(DistanceMetric::Euclidean);
    network.add_node("A", p(0.0, 0.0));
    network.add_node("B", p(1.0, 0.0));
    network.add_node("island", p(9.0, 9.0));
    assert!(network.add_edge("ax", "A", "X", 1.0).is_err());
    assert!(network.add_edge("ab", "A", "B", f64::NAN).is_err());
    network.add_edge("ab", "A", "B", 1.0).unwrap();

    assert!(network.dijkstra("A", "island").unwrap().is_none());
    assert!(matches!(network.dijkstra("A", "nowhere"), Err(GeoscopeError::InvalidInput(_))));

    let same = network.dijkstra("A", "A").unwrap().unwrap();
    assert_eq!(same.total_cost, 0.0);
    assert!(matches!(same.geometry, Geometry::Point(_)));

    network.add_directed_edge("neg", "B", "A", -0.5).unwrap();
    assert!(matches!(network.dijkstra("A", "B"), Err(GeoscopeError::Topology(_))));
}

#[test]
fn test_clustering_parameter_errors() {
    let points = vec![p(0.0, 0.0), p(1.0, 1.0)];
    assert!(dbscan(&points, &DbscanOptions::new(0.0, 2)).is_err());
    assert!(dbscan(&points, &DbscanOptions::new(1.0, 0)).is_err());
    assert!(kmeans(&points, &KMeansOptions::new(0)).is_err());
    assert!(kmeans(&points, &KMeansOptions::new(3)).is_err());
    assert!(dbscan(&[p(f64::NAN, 0.0)], &DbscanOptions::new(1.0, 1)).is_err());

    let empty = dbscan(&[], &DbscanOptions::new(1.0, 2)).unwrap();
    assert!(empty.clusters.is_empty());
}

#[test]
fn test_cancellation() {
    let token = CancelToken::new();
    token.cancel();

    let spec = GridSpec::new(20, 20, p(0.0, 20.0), 1.0).unwrap();
    let options = IdwOptions::new(spec).with_cancel(token.clone());
    assert_eq!(
        idw(&[p(1.0, 1.0)], &[3.0], &options).unwrap_err(),
        GeoscopeError::Cancelled
    );

    let points: Vec<Position> = (0..10).map(|i| p(i as f64, 0.0)).collect();
    let km = KMeansOptions::new(2).with_cancel(token.clone());
    assert_eq!(kmeans(&points, &km).unwrap_err(), GeoscopeError::Cancelled);

    let dem = Grid::filled(spec, 0.0);
    let vs = ViewshedOptions::default().with_cancel(token);
    assert_eq!(viewshed(&dem, &p(10.0, 10.0), &vs).unwrap_err(), GeoscopeError::Cancelled);
}

#[test]
fn test_kriging_singular_system() {
    let points = vec![p(1.0, 1.0), p(1.0, 1.0), p(3.0, 3.0)];
    let values = vec![1.0, 1.0, 2.0];
    let variogram = Variogram::new(VariogramModel::Spherical, 0.0, 1.0, 5.0);
    let spec = GridSpec::new(4, 4, p(0.0, 4.0), 1.0).unwrap();
    assert!(matches!(
        kriging(&points, &values, &variogram, spec, None),
        Err(GeoscopeError::InvalidInput(_))
    ));
}

#[test]
fn test_grid_spec_rejects_degenerate_grids() {
    assert!(matches!(GridSpec::new(0, 5, p(0.0, 5.0), 1.0), Err(GeoscopeError::InvalidInput(_))));
    assert!(GridSpec::new(5, 5, p(0.0, 5.0), -1.0).is_err());
    assert!(GridSpec::new(5, 5, p(f64::NAN, 5.0), 1.0).is_err());
}

#[test]
fn test_viewshed_observer_outside_grid() {
    let dem = Grid::filled(GridSpec::new(5, 5, p(0.0, 5.0), 1.0).unwrap(), 0.0);
    assert!(viewshed(&dem, &p(50.0, 50.0), &ViewshedOptions::default()).is_err());
}

#[test]
fn test_projection_errors() {
    let registry = ProjectionRegistry::with_defaults();
    let origin = p(0.0, 0.0);
    assert!(matches!(
        registry.transform(&origin, "EPSG:4326", "EPSG:1234"),
        Err(GeoscopeError::Projection(_))
    ));
    assert!(matches!(
        registry.transform(&origin, "EPSG:4326", "EPSG:32661"),
        Err(GeoscopeError::Projection(_))
    ));
    assert!(registry.transform(&origin, "not a code", "EPSG:4326").is_err());

    // Web Mercator clamps rather than returning infinities at the poles.
    let pole = registry.transform(&p(0.0, 90.0), "EPSG:4326", "EPSG:3857").unwrap();
    assert!(pole.y.is_finite());
}

#[test]
fn test_query_over_empty_input() {
    let query = SpatialQuery::new().with_where("a = 1").with_limit(0);
    assert!(execute(&query, &[], None).unwrap().is_empty());
}
