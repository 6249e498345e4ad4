use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use terrastream::chunk::ChunkCoord;
use terrastream::generation::{ChunkSynthesizer, WorldConfig};
use terrastream::terrain::{TerrainGenerator, TerrainParams};

fn synthesizer() -> ChunkSynthesizer {
    ChunkSynthesizer::new(12345, Arc::new(WorldConfig::default()), 1)
}

fn bench_height_sampling(c: &mut Criterion) {
    let generator = TerrainGenerator::new(12345, TerrainParams::default());

    c.bench_function("height_at_1k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for i in 0..1000 {
                let x = (i % 40) as f32 * 3.7;
                let z = (i / 40) as f32 * 5.1;
                sum += generator.height_at(black_box(x), black_box(z));
            }
            sum
        });
    });
}

fn bench_synthesize_chunk(c: &mut Criterion) {
    let synth = synthesizer();

    c.bench_function("synthesize_chunk", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            synth.synthesize(black_box(ChunkCoord::new(x, 0)))
        });
    });
}

fn bench_batch_vs_serial(c: &mut Criterion) {
    let synth = synthesizer();
    let mut group = c.benchmark_group("chunk_square");
    group.sample_size(10);

    for radius in [1i32, 2] {
        let coords: Vec<ChunkCoord> = (-radius..=radius)
            .flat_map(|z| (-radius..=radius).map(move |x| ChunkCoord::new(x, z)))
            .collect();

        group.bench_with_input(BenchmarkId::new("serial", coords.len()), &coords, |b, coords| {
            b.iter(|| coords.iter().map(|&c| synth.synthesize(c)).collect::<Vec<_>>());
        });
        group.bench_with_input(BenchmarkId::new("batch", coords.len()), &coords, |b, coords| {
            b.iter(|| synth.synthesize_batch(black_box(coords)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_height_sampling,
    bench_synthesize_chunk,
    bench_batch_vs_serial,
);

criterion_main!(benches);
