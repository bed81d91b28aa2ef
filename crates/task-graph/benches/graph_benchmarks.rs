//! Benchmarks for task graph compilation
//!
//! Run with: cargo bench -p tessera-task-graph

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tessera_task_graph::grid::{Grid, IndexRange, IntVector, Level, Region, RegionId};
use tessera_task_graph::{
    AccessDeclaration, GhostType, GraphCompilation, MaterialSet, PlacementPolicy, RegionSet,
    StaticPlacement, VarLabel, WorkUnit, sort_units,
};

/// `n`^3 regions of 8^3 cells each.
fn generate_grid(n: i32) -> Grid {
    let mut regions = Vec::new();
    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                let low = IntVector::new(x, y, z) * IntVector::splat(8);
                let id = RegionId(((x * n + y) * n + z) as u32);
                regions.push(Region::new(id, 0, IndexRange::new(low, low + IntVector::splat(8))));
            }
        }
    }
    Grid::new(vec![Level::new(0, IntVector::ONE, [true, false, false], regions).unwrap()]).unwrap()
}

fn all_regions(grid: &Grid) -> RegionSet {
    grid.regions().map(|r| r.id).collect()
}

fn unit(name: String, regions: &RegionSet) -> WorkUnit {
    WorkUnit::new(name, PlacementPolicy::PerRegion)
        .on_regions(regions.clone())
        .with_materials(MaterialSet::single([0]))
}

/// Many units reading a single root value.
fn generate_wide_units(count: usize, regions: &RegionSet) -> Vec<WorkUnit> {
    let mut units = vec![unit("root".into(), regions).computes(AccessDeclaration::new(VarLabel::cell("root")))];
    for i in 0..count {
        units.push(
            unit(format!("task_{i}"), regions)
                .requires(AccessDeclaration::new(VarLabel::cell("root")))
                .computes(AccessDeclaration::new(VarLabel::cell(format!("out_{i}")))),
        );
    }
    units
}

/// A linear chain, declared back to front so the sorter has work to do.
fn generate_deep_units(depth: usize, regions: &RegionSet) -> Vec<WorkUnit> {
    let mut units: Vec<WorkUnit> = (0..depth)
        .map(|i| {
            let mut u = unit(format!("task_{i}"), regions)
                .computes(AccessDeclaration::new(VarLabel::cell(format!("v_{i}"))));
            if i > 0 {
                u = u.requires(AccessDeclaration::new(VarLabel::cell(format!("v_{}", i - 1))));
            }
            u
        })
        .collect();
    units.reverse();
    units
}

/// A stencil pipeline with halo reads and a global reduction.
fn generate_ghosted_units(stages: usize, regions: &RegionSet) -> Vec<WorkUnit> {
    let mut units = vec![unit("init".into(), regions).computes(AccessDeclaration::new(VarLabel::cell("u_0")))];
    for i in 1..=stages {
        units.push(
            unit(format!("stencil_{i}"), regions)
                .requires(
                    AccessDeclaration::new(VarLabel::cell(format!("u_{}", i - 1)))
                        .ghost(GhostType::CornerAdjacent, 1),
                )
                .computes(AccessDeclaration::new(VarLabel::cell(format!("u_{i}")))),
        );
    }
    units.push(
        unit("norm".into(), regions)
            .requires(AccessDeclaration::new(VarLabel::cell(format!("u_{stages}"))))
            .computes(AccessDeclaration::new(VarLabel::reduction("norm"))),
    );
    units.push(
        WorkUnit::new("reduce", PlacementPolicy::Synchronizing)
            .requires(AccessDeclaration::new(VarLabel::reduction("norm"))),
    );
    units
}

fn benchmark_sort_deep_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_deep_chain");
    let regions = RegionSet::new([RegionId(0)]);

    for depth in [10, 50, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let units = generate_deep_units(depth, &regions);
            b.iter(|| black_box(sort_units(units.clone()).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_compile_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_wide");
    let grid = generate_grid(2);
    let placement = StaticPlacement::serial(&grid);
    let regions = all_regions(&grid);

    for count in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let units = generate_wide_units(count, &regions);
            let compilation = GraphCompilation::new(&grid, &placement);
            b.iter(|| black_box(compilation.compile(units.clone()).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_compile_ghosted(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_ghosted");

    for n in [2, 4, 6] {
        let grid = generate_grid(n);
        let placement = StaticPlacement::serial(&grid);
        let regions = all_regions(&grid);
        let label = format!("{n}x{n}x{n}");
        group.bench_with_input(BenchmarkId::from_parameter(&label), &n, |b, _| {
            let units = generate_ghosted_units(4, &regions);
            let compilation = GraphCompilation::new(&grid, &placement);
            b.iter(|| black_box(compilation.compile(units.clone()).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_parallel_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_groups");

    for n in [2, 4] {
        let grid = generate_grid(n);
        let placement = StaticPlacement::serial(&grid);
        let compiled = GraphCompilation::new(&grid, &placement)
            .compile(generate_ghosted_units(4, &all_regions(&grid)))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| black_box(compiled.graph().parallel_groups()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sort_deep_chain,
    benchmark_compile_wide,
    benchmark_compile_ghosted,
    benchmark_parallel_groups,
);

criterion_main!(benches);
