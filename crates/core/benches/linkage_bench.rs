use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use geolink_core::resolver::Resolver;
use geolink_core::{
    Coord, IncidentPayload, LinkageInputs, MultiPolygon, PipelineBuilder, PointRecord, Polygon,
    PolygonRecord, PolygonSet, ResolverConfig, Ring, SilentObserver,
};
use geolink_names::NameMapping;

/// A `side` x `side` grid of 0.01° squares starting at (-111.0, 29.0)
fn grid(side: usize) -> Vec<PolygonRecord> {
    let mut polygons = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let lon = -111.0 + col as f64 * 0.01;
            let lat = 29.0 + row as f64 * 0.01;
            let ring = Ring::new(vec![
                Coord::lon_lat(lon, lat),
                Coord::lon_lat(lon + 0.01, lat),
                Coord::lon_lat(lon + 0.01, lat + 0.01),
                Coord::lon_lat(lon, lat + 0.01),
            ])
            .unwrap();
            let geometry: MultiPolygon = Polygon::new(ring, vec![]).into();
            polygons.push(PolygonRecord::new(
                format!("{:03}{:03}", row, col),
                format!("COLONIA {} {}", row, col),
                geometry,
            ));
        }
    }
    polygons
}

/// Points spread over and just outside the grid; every tenth has no coordinates
fn points(count: usize, side: usize) -> Vec<PointRecord> {
    let extent = side as f64 * 0.01;
    (0..count)
        .map(|i| {
            let t = i as f64 / count as f64;
            let location = (i % 10 != 0).then(|| {
                let lon = -111.0 - 0.002 + t * (extent + 0.004);
                let lat = 29.0 + (t * 7.0).fract() * extent;
                Coord::lon_lat(lon, lat)
            });
            let name = format!("COLONIA {} {}", i % side, (i / side) % side);
            PointRecord::new(i, Some(name), location, IncidentPayload::default())
        })
        .collect()
}

fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");
    let set = PolygonSet::new(grid(30)).unwrap();
    let mapping = NameMapping::new();
    let points = points(10_000, 30);
    group.throughput(Throughput::Elements(points.len() as u64));

    group.bench_function("cascade_10k_900_polygons", |b| {
        let resolver = Resolver::new(&set, &mapping, ResolverConfig::default()).unwrap();
        b.iter(|| black_box(resolver.resolve(&points, &mut SilentObserver)));
    });

    group.bench_function("exact_only_10k", |b| {
        let config = ResolverConfig {
            buffer_meters: 0.0,
            name_fallback: false,
        };
        let resolver = Resolver::new(&set, &mapping, config).unwrap();
        b.iter(|| black_box(resolver.resolve(&points, &mut SilentObserver)));
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let pipeline = PipelineBuilder::new().build().unwrap();

    group.bench_function("full_run_5k", |b| {
        b.iter(|| {
            let inputs = LinkageInputs {
                polygons: grid(20),
                incidents: points(5_000, 20),
                ..Default::default()
            };
            black_box(pipeline.run(inputs).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_resolver, bench_pipeline);
criterion_main!(benches);
