use geoscope::{Bounds, Feature, Geometry, Position, SyncSpatialIndex};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_inserts_and_searches() {
    let index: SyncSpatialIndex<Arc<Feature>> = SyncSpatialIndex::new();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let index = index.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    let x = t as f64 * 100.0 + (i % 50) as f64;
                    let y = (i / 50) as f64;
                    let feature = Feature::new(Geometry::Point(Position::new(x, y)))
                        .with_id(format!("{}-{}", t, i));
                    index.insert(Arc::new(feature)).unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let index = index.clone();
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..100 {
                let hits = index.search(&Bounds::new(-1.0, -1.0, 1000.0, 1000.0)).len();
                assert!(hits >= last);
                last = hits;
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(index.len(), 1000);
    let first_block = index.search(&Bounds::new(-0.5, -0.5, 49.5, 4.5));
    assert_eq!(first_block.len(), 250);

    let nearest = index.nearest(&Position::new(300.2, 0.0), 1);
    assert_eq!(nearest.len(), 1);
    assert_eq!(nearest[0].0.id.as_ref().map(|id| id.to_string()), Some("3-0".to_string()));
}

#[test]
fn test_remove_under_write_lock() {
    let index: SyncSpatialIndex<Position> = SyncSpatialIndex::new();
    {
        let mut guard = index.write();
        for i in 0..20 {
            guard.insert(Position::new(i as f64, i as f64)).unwrap();
        }
    }
    assert!(index.remove(&Position::new(5.0, 5.0)));
    assert!(!index.remove(&Position::new(5.0, 5.0)));
    assert_eq!(index.len(), 19);
    assert!(index.read().search(&Bounds::new(4.5, 4.5, 5.5, 5.5)).is_empty());
}
