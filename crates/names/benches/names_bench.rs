use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geolink_names::similarity::gestalt_ratio;
use geolink_names::{GroupingConfig, NameGrouper, RawNameRecord, TextNormalizer};

const STEMS: &[&str] = &[
    "VILLA SATELITE",
    "LAS QUINTAS",
    "REAL DEL CARMEN",
    "LOMAS DEL PRADO",
    "SAN BENITO",
    "PUERTA REAL",
    "LOS PINOS",
    "EL LLANO",
    "PARQUE INDUSTRIAL",
    "VALLE VERDE",
];

/// Synthetic names: each stem with suffixes and occasional typos
fn synthetic_names(count: usize) -> Vec<RawNameRecord> {
    (0..count)
        .map(|i| {
            let stem = STEMS[i % STEMS.len()];
            let name = match i % 4 {
                0 => format!("{} {}", stem, i / STEMS.len()),
                1 => format!("{}S {}", stem, i / STEMS.len()),
                2 => format!(" {} SECTOR {}", stem.to_lowercase(), i % 7),
                _ => format!("{} {}", stem.replace('A', "Á"), i / STEMS.len()),
            };
            RawNameRecord::new(name, (i % 13) as u64 + 1)
        })
        .collect()
}

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    let samples = vec![
        "Villa Satélite",
        "  PARQUE   INDUSTRIAL ",
        "\"Las Quintas\",",
        "PeÃ±a Blanca",
        "Real\u{00A0}del Carmen Sector 2",
        "col. centro",
    ];

    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("matching", |b| {
        let normalizer = TextNormalizer::matching();
        b.iter(|| {
            for text in &samples {
                black_box(normalizer.normalize(text));
            }
        });
    });

    group.bench_function("preserving", |b| {
        let normalizer = TextNormalizer::preserving();
        b.iter(|| {
            for text in &samples {
                black_box(normalizer.normalize(text));
            }
        });
    });

    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    group.bench_function("gestalt_short", |b| {
        b.iter(|| {
            black_box(gestalt_ratio(
                black_box("PUERTA REAL VI"),
                black_box("PUERTA REAL VIII"),
            ))
        });
    });
    group.bench_function("gestalt_long", |b| {
        b.iter(|| {
            black_box(gestalt_ratio(
                black_box("FRACCIONAMIENTO RESIDENCIAL LOMAS DEL PRADO SECCION B"),
                black_box("FRACC RESIDENCIAL LOMAS DE PRADO SECCION B"),
            ))
        });
    });
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouping");
    group.sample_size(20);

    for size in [200usize, 1000] {
        let names = synthetic_names(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("blocked", size), &names, |b, names| {
            let grouper = NameGrouper::new(GroupingConfig::default()).unwrap();
            b.iter(|| black_box(grouper.group(names)));
        });

        group.bench_with_input(BenchmarkId::new("full_scan", size), &names, |b, names| {
            let config = GroupingConfig {
                use_blocking: false,
                ..Default::default()
            };
            let grouper = NameGrouper::new(config).unwrap();
            b.iter(|| black_box(grouper.group(names)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalization, bench_similarity, bench_grouping);
criterion_main!(benches);
