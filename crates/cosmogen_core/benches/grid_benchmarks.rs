use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cosmogen_core::config::{GridConfig, SimConfig};
use cosmogen_core::friedmann::{ExpansionState, ParameterSet};
use cosmogen_core::grid::PerturbationGrid;
use cosmogen_core::poisson::SpectralSolver;

fn bench_config(n: usize) -> GridConfig {
    GridConfig {
        resolution: n,
        ..GridConfig::default()
    }
}

fn matter_state(params: &ParameterSet) -> ExpansionState {
    let hubble = 1e-3;
    let rho = 3.0 * hubble * hubble / (8.0 * std::f64::consts::PI * params.gravitational_constant);
    ExpansionState {
        time_s: 1e15,
        scale_factor: 1e-3,
        hubble,
        rho_matter: rho,
        rho_radiation: rho * 1e-4,
        rho_lambda: 0.0,
        curvature_term: 0.0,
    }
}

/// Benchmark the periodic Poisson solve on a 32-cube.
fn bench_poisson_solve(c: &mut Criterion) {
    let solver = SpectralSolver::new(32);
    let grid = PerturbationGrid::seeded(bench_config(32));
    let source = grid.contrast().to_vec();

    c.bench_function("poisson_solve_32", |b| {
        b.iter(|| {
            let potential = solver.solve_poisson(black_box(&source));
            black_box(potential)
        })
    });
}

/// Benchmark a linear-regime grid step.
fn bench_grid_linear_step(c: &mut Criterion) {
    let params = ParameterSet::from_config(&SimConfig::default()).unwrap();
    let mut grid = PerturbationGrid::seeded(bench_config(32));
    let state = matter_state(&params);

    c.bench_function("grid_linear_step_32", |b| {
        b.iter(|| {
            let summary = grid.advance(&params, black_box(&state), 10.0).unwrap();
            black_box(summary)
        })
    });
}

/// Benchmark a nonlinear collapse step with an established overdensity.
fn bench_grid_collapse_step(c: &mut Criterion) {
    let params = ParameterSet::from_config(&SimConfig::default()).unwrap();
    let mut grid = PerturbationGrid::seeded(bench_config(32));
    grid.inject_overdensity((16, 16, 16), 80.0);
    let state = matter_state(&params);

    c.bench_function("grid_collapse_step_32", |b| {
        b.iter(|| {
            let summary = grid.advance(&params, black_box(&state), 1.0).unwrap();
            black_box(summary)
        })
    });
}

/// Benchmark grid seeding end to end (noise, spectral filter, normalize).
fn bench_grid_seeding(c: &mut Criterion) {
    c.bench_function("grid_seeding_32", |b| {
        b.iter(|| {
            let grid = PerturbationGrid::seeded(bench_config(32));
            black_box(grid)
        })
    });
}

criterion_group!(
    benches,
    bench_poisson_solve,
    bench_grid_linear_step,
    bench_grid_collapse_step,
    bench_grid_seeding
);
criterion_main!(benches);
