use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geoscope::analysis::{
    DbscanOptions, DistanceMetric, GridSpec, KernelDensityOptions, Network, dbscan, kernel_density,
};
use geoscope::projection::ProjectionRegistry;
use geoscope::transform::douglas_peucker;
use geoscope::{Bounds, Position, SpatialIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(n: usize, seed: u64) -> Vec<Position> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Position::new(rng.gen_range(-180.0..180.0), rng.gen_range(-85.0..85.0)))
        .collect()
}

fn benchmark_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree");

    for size in [1_000, 10_000] {
        let points = random_points(size, 1);

        group.bench_with_input(BenchmarkId::new("insert", size), &points, |b, points| {
            b.iter(|| {
                let mut index = SpatialIndex::new();
                for p in points {
                    index.insert(*p).unwrap();
                }
                black_box(index.len())
            })
        });

        let mut index = SpatialIndex::new();
        index.bulk_insert(points.iter().copied()).unwrap();
        let window = Bounds::new(-10.0, -10.0, 10.0, 10.0);

        group.bench_with_input(BenchmarkId::new("search", size), &index, |b, index| {
            b.iter(|| black_box(index.search(black_box(&window)).len()))
        });

        group.bench_with_input(BenchmarkId::new("nearest_10", size), &index, |b, index| {
            b.iter(|| black_box(index.nearest(black_box(&Position::new(2.0, 48.0)), 10)))
        });
    }

    group.finish();
}

fn benchmark_simplify(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let line: Vec<Position> = (0..5_000)
        .map(|i| {
            let t = i as f64 / 50.0;
            Position::new(t, t.sin() * 10.0 + rng.r#gen::<f64>())
        })
        .collect();

    c.bench_function("douglas_peucker_5000", |b| {
        b.iter(|| black_box(douglas_peucker(black_box(&line), 0.5)))
    });
}

fn grid_network(side: usize) -> Network {
    let mut network = Network::with_metric(DistanceMetric::Euclidean);
    let id = |x: usize, y: usize| format!("{}:{}", x, y);
    for x in 0..side {
        for y in 0..side {
            network.add_node(id(x, y), Position::new(x as f64, y as f64));
        }
    }
    for x in 0..side {
        for y in 0..side {
            if x + 1 < side {
                let from = id(x, y);
                let to = id(x + 1, y);
                network
                    .add_edge(format!("{}>{}", from, to), &from, &to, 1.0)
                    .unwrap();
            }
            if y + 1 < side {
                let from = id(x, y);
                let to = id(x, y + 1);
                network
                    .add_edge(format!("{}>{}", from, to), &from, &to, 1.0)
                    .unwrap();
            }
        }
    }
    network
}

fn benchmark_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let network = grid_network(50);

    group.bench_function("dijkstra_50x50", |b| {
        b.iter(|| black_box(network.dijkstra("0:0", "49:49").unwrap()))
    });
    group.bench_function("astar_50x50", |b| {
        b.iter(|| black_box(network.astar("0:0", "49:49").unwrap()))
    });

    group.finish();
}

fn benchmark_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");

    let mut rng = StdRng::seed_from_u64(3);
    let points: Vec<Position> = (0..2_000)
        .map(|_| Position::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
        .collect();

    group.bench_function("dbscan_2000", |b| {
        let options = DbscanOptions::new(2.0, 5);
        b.iter(|| black_box(dbscan(black_box(&points), &options).unwrap()))
    });

    group.bench_function("kernel_density_200x200", |b| {
        let spec = GridSpec::new(200, 200, Position::new(0.0, 100.0), 0.5).unwrap();
        let options = KernelDensityOptions::new(spec, 3.0);
        b.iter(|| black_box(kernel_density(black_box(&points), None, &options).unwrap()))
    });

    group.finish();
}

fn benchmark_projection(c: &mut Criterion) {
    let registry = ProjectionRegistry::with_defaults();
    let points = random_points(1_000, 4);

    let mut group = c.benchmark_group("projection");
    for target in ["EPSG:3857", "EPSG:32633", "EPSG:5070"] {
        group.bench_with_input(BenchmarkId::new("from_wgs84", target), &target, |b, target| {
            b.iter(|| {
                for p in &points {
                    black_box(registry.transform(p, "EPSG:4326", target).ok());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_index,
    benchmark_simplify,
    benchmark_routing,
    benchmark_analysis,
    benchmark_projection
);
criterion_main!(benches);
