//! World generator binary - synthesizes a square of chunks and reports stats.
//!
//! Usage: cargo run --release --bin generate_world -- [OPTIONS]
//!
//! Options:
//!   --seed <SEED>      Random seed (default: 12345)
//!   --radius <N>       Chunks around the origin in each direction (default: 4)
//!   --config <PATH>    World config JSON (default: built-in defaults)
//!   --jobs <N>         Parallel chunk builds (default: rayon's choice)
//!   --summary <PATH>   Write a JSON summary of the run

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use terrastream::chunk::ChunkCoord;
use terrastream::generation::{ChunkSynthesizer, GeneratedChunk, WorldConfig};
use terrastream::terrain::{BiomeCategory, BiomeWeights};

fn main() {
    terrastream::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let radius = parse_u32_arg(&args, "--radius").unwrap_or(4) as i32;
    let config_path = parse_str_arg(&args, "--config").map(PathBuf::from);
    let summary_path = parse_str_arg(&args, "--summary").map(PathBuf::from);

    if let Some(jobs) = parse_usize_arg(&args, "--jobs") {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .expect("Failed to configure thread pool");
    }

    let config = match &config_path {
        Some(path) => WorldConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => WorldConfig::default(),
    };

    let side = 2 * radius + 1;
    println!("=== Terrastream World Generator ===");
    println!("Seed:   {}", seed);
    println!(
        "Chunks: {} x {} ({} m each, resolution {})",
        side, side, config.chunk.size, config.chunk.resolution
    );
    if let Some(path) = &config_path {
        println!("Config: {}", path.display());
    }
    println!();

    let synthesizer = ChunkSynthesizer::new(seed, Arc::new(config), 1);
    let coords: Vec<ChunkCoord> = (-radius..=radius)
        .flat_map(|z| (-radius..=radius).map(move |x| ChunkCoord::new(x, z)))
        .collect();

    let start = Instant::now();
    let chunks = synthesizer.synthesize_batch(&coords);
    let elapsed = start.elapsed().as_secs_f64();

    let stats = WorldStats::collect(&chunks);
    println!(
        "Generated {} chunks in {:.2}s ({:.0} chunks/sec)",
        chunks.len(),
        elapsed,
        chunks.len() as f64 / elapsed.max(1e-9)
    );
    println!("Height:  {:.1} m .. {:.1} m", stats.min_height, stats.max_height);
    println!(
        "Objects: {} trees, {} rocks, {} grass patches",
        stats.trees, stats.rocks, stats.grass
    );
    println!();
    println!("Biome coverage (dominant per vertex):");
    for (name, fraction) in stats.coverage() {
        println!("  {:<9} {:>5.1}%", name, fraction * 100.0);
    }

    if let Some(path) = summary_path {
        let summary = json!({
            "seed": seed,
            "radius": radius,
            "chunks": chunks.len(),
            "seconds": elapsed,
            "height": { "min": stats.min_height, "max": stats.max_height },
            "objects": { "trees": stats.trees, "rocks": stats.rocks, "grass": stats.grass },
            "biomes": stats.coverage().into_iter().collect::<BTreeMap<_, _>>(),
        });
        let text = serde_json::to_string_pretty(&summary).expect("summary serializes");
        std::fs::write(&path, text).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        });
        println!();
        println!("Summary: {}", path.display());
    }
}

struct WorldStats {
    min_height: f32,
    max_height: f32,
    trees: usize,
    rocks: usize,
    grass: usize,
    biome_vertices: [usize; 4],
}

impl WorldStats {
    fn collect(chunks: &[GeneratedChunk]) -> Self {
        let mut stats = Self {
            min_height: f32::INFINITY,
            max_height: f32::NEG_INFINITY,
            trees: 0,
            rocks: 0,
            grass: 0,
            biome_vertices: [0; 4],
        };
        for chunk in chunks {
            stats.min_height = stats.min_height.min(chunk.heightfield.min_height());
            stats.max_height = stats.max_height.max(chunk.heightfield.max_height());
            stats.trees += chunk.tree_count();
            stats.rocks += chunk.rock_count();
            stats.grass += chunk.grass_count();
            for v in chunk.heightfield.vertices() {
                stats.biome_vertices[BiomeWeights(v.blend).dominant().index()] += 1;
            }
        }
        stats
    }

    fn coverage(&self) -> Vec<(String, f64)> {
        let total = self.biome_vertices.iter().sum::<usize>().max(1) as f64;
        BiomeCategory::ALL
            .iter()
            .map(|c| (format!("{:?}", c), self.biome_vertices[c.index()] as f64 / total))
            .collect()
    }
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
