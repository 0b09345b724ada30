//! Criterion benchmarks for grid critical paths
//!
//! Benchmarks the core performance-critical operations:
//! - Resolve: definition to concrete grid
//! - Geometry: path generation per grid type
//! - XML: encode and decode of multi-slice record sets
//! - Raster: burning generated geometry into an image

use combined_grids::batch::apply_to_slices;
use combined_grids::geometry::generate;
use combined_grids::models::{
    Calibration, GridDefinition, GridRecord, GridType, ImageInfo, PlacementMode, Ratio, Slice,
};
use combined_grids::renderer::{RasterRenderer, Renderer};
use combined_grids::resolve::resolve;
use combined_grids::xml::{decode, encode, SchemaVersion};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

// =============================================================================
// Test Data Generators
// =============================================================================

fn image(size: u32) -> ImageInfo {
    ImageInfo::new(size, size, "bench.tif").with_calibration(Calibration::new(0.5, 0.5, "um"))
}

fn definition(grid_type: GridType) -> GridDefinition {
    GridDefinition::new(grid_type, 900.0).with_ratio(Ratio::OneToNine)
}

fn stack_records(slices: u32) -> Vec<GridRecord> {
    let image = image(2048);
    let def = definition(GridType::CombinedPoint);
    let slice_list: Vec<Slice> = (1..=slices).map(Slice::Index).collect();
    let mut rng = StdRng::seed_from_u64(7);
    match apply_to_slices(&def, &slice_list, &image, &mut rng) {
        Ok(grids) => grids.iter().map(|g| g.record("2024/01/01 00:00:00", "bench.tif")).collect(),
        Err(e) => panic!("bench setup failed: {}", e),
    }
}

// =============================================================================
// Resolve Benchmarks
// =============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let calibration = Calibration::new(0.5, 0.5, "um");

    for placement in [PlacementMode::Random, PlacementMode::Fixed] {
        let def = definition(GridType::DoubleLattice).with_placement(placement);
        let mut rng = StdRng::seed_from_u64(1);
        group.bench_function(placement.name(), |b| {
            b.iter(|| resolve(black_box(&def), 4096, 4096, &calibration, &mut rng))
        });
    }

    group.finish();
}

// =============================================================================
// Geometry Benchmarks
// =============================================================================

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");
    let calibration = Calibration::new(0.5, 0.5, "um");

    for grid_type in GridType::ALL {
        for size in [512u32, 2048] {
            let def = definition(grid_type).with_placement(PlacementMode::Fixed);
            let mut rng = StdRng::seed_from_u64(0);
            let grid = match resolve(&def, size, size, &calibration, &mut rng) {
                Ok(grid) => grid,
                Err(e) => panic!("bench setup failed: {}", e),
            };
            group.throughput(Throughput::Elements(u64::from(grid.lines_v() * grid.lines_h())));
            group.bench_with_input(BenchmarkId::new(grid_type.name(), size), &grid, |b, grid| {
                b.iter(|| generate(black_box(grid), size, size))
            });
        }
    }

    group.finish();
}

// =============================================================================
// XML Benchmarks
// =============================================================================

fn bench_xml(c: &mut Criterion) {
    let mut group = c.benchmark_group("xml");

    for slices in [1u32, 50, 500] {
        let records = stack_records(slices);
        group.throughput(Throughput::Elements(u64::from(slices)));
        group.bench_with_input(BenchmarkId::new("encode_v2", slices), &records, |b, records| {
            b.iter(|| encode(black_box(records), SchemaVersion::V2))
        });

        let document = match encode(&records, SchemaVersion::V2) {
            Ok(document) => document,
            Err(e) => panic!("bench setup failed: {}", e),
        };
        group.bench_with_input(BenchmarkId::new("decode_v2", slices), &document, |b, doc| {
            b.iter(|| decode(black_box(doc)))
        });
    }

    group.finish();
}

// =============================================================================
// Raster Benchmarks
// =============================================================================

fn bench_raster(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster");
    let calibration = Calibration::new(0.5, 0.5, "um");

    for grid_type in [GridType::CombinedPoint, GridType::DoubleLattice] {
        let def = definition(grid_type).with_placement(PlacementMode::Fixed);
        let mut rng = StdRng::seed_from_u64(0);
        let grid = match resolve(&def, 1024, 1024, &calibration, &mut rng) {
            Ok(grid) => grid,
            Err(e) => panic!("bench setup failed: {}", e),
        };
        let segments = generate(&grid, 1024, 1024);
        group.bench_function(grid_type.name(), |b| {
            b.iter(|| {
                let mut raster = RasterRenderer::blank(1024, 1024);
                raster
                    .render(black_box(&segments), grid.color())
                    .unwrap_or_else(|never| match never {});
                raster
            })
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(benches, bench_resolve, bench_geometry, bench_xml, bench_raster);

criterion_main!(benches);
