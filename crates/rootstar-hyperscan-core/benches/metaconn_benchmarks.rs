//! Benchmarks for meta-connectivity expansion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rootstar_hyperscan_core::{
    ChannelConnectivity, Diagonal, ElectrodePosition, HyperLayout, MetaConnectivity,
    PairNeighborhood, PairSelection, SelectionMode, SelfPairs, SensorPairs,
};

/// Channels on a unit-spaced square grid, linked to their 4-neighbours
fn grid_connectivity(n_channels: usize) -> ChannelConnectivity {
    let side = (n_channels as f64).sqrt().ceil() as usize;
    let positions: Vec<ElectrodePosition> = (0..n_channels)
        .map(|i| ElectrodePosition::planar((i % side) as f64, (i / side) as f64))
        .collect();
    ChannelConnectivity::from_positions(&positions, 1.0, Diagonal::Linked)
        .expect("grid positions are finite")
}

fn cartesian_pairs(n_channels: usize) -> SensorPairs {
    SensorPairs::build(
        &HyperLayout::with_channel_count(n_channels),
        &PairSelection::Cartesian {
            self_pairs: SelfPairs::Include,
        },
    )
    .expect("cartesian pairs")
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("metaconn_expand");

    for n_channels in [8, 32, 64].iter() {
        let conn = grid_connectivity(*n_channels);
        let pairs = cartesian_pairs(*n_channels);

        group.bench_with_input(
            BenchmarkId::from_parameter(n_channels),
            n_channels,
            |b, _| {
                b.iter(|| {
                    black_box(
                        MetaConnectivity::for_pairs(
                            black_box(&conn),
                            black_box(&pairs),
                            30,
                            SelectionMode::PairsAndConnectivity,
                        )
                        .expect("expand"),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_to_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("metaconn_to_dense");

    for n_freq in [5, 20, 40].iter() {
        let conn = grid_connectivity(32);
        let pairs = cartesian_pairs(32);
        let meta = MetaConnectivity::for_pairs(&conn, &pairs, *n_freq, SelectionMode::PairsOnly)
            .expect("expand");

        group.bench_with_input(BenchmarkId::from_parameter(n_freq), n_freq, |b, _| {
            b.iter(|| black_box(meta.to_dense()));
        });
    }

    group.finish();
}

fn bench_pair_neighborhood(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_neighborhood");

    for n_channels in [8, 16].iter() {
        let conn = grid_connectivity(*n_channels);
        let pairs = cartesian_pairs(*n_channels);

        group.bench_with_input(
            BenchmarkId::from_parameter(n_channels),
            n_channels,
            |b, _| {
                b.iter(|| {
                    black_box(PairNeighborhood::expand(&conn, &pairs, 4).expect("neighborhood"))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_expand, bench_to_dense, bench_pair_neighborhood);
criterion_main!(benches);
