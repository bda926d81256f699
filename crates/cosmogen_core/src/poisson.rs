//! Periodic Poisson solver on the cubic lattice, via 3-D FFT.
//!
//! Works in cell units: the discrete Laplacian is the 6-point second
//! difference with unit spacing, whose eigenvalues under the DFT basis are
//! `sum_axis (2 cos(2 pi m / N) - 2)`. Solving divides each mode by its
//! eigenvalue; the zero mode is discarded, which both makes the periodic
//! problem well-posed and pins the solution mean to zero.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// FFT plans for one cube size, built once and reused every solve.
pub struct SpectralSolver {
    n: usize,
    forward_plan: Arc<dyn Fft<f64>>,
    inverse_plan: Arc<dyn Fft<f64>>,
}

impl SpectralSolver {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            n,
            forward_plan: planner.plan_fft_forward(n),
            inverse_plan: planner.plan_fft_inverse(n),
        }
    }

    pub fn resolution(&self) -> usize {
        self.n
    }

    pub fn cells(&self) -> usize {
        self.n * self.n * self.n
    }

    /// Forward 3-D transform of a real field. Unnormalized, like the
    /// underlying 1-D transforms.
    pub fn forward(&self, field: &[f64]) -> Vec<Complex<f64>> {
        debug_assert_eq!(field.len(), self.cells());
        let mut spectrum: Vec<Complex<f64>> =
            field.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.transform_3d(&mut spectrum, &self.forward_plan);
        spectrum
    }

    /// Inverse 3-D transform back to a real field, with the 1/N^3
    /// normalization applied here.
    pub fn inverse(&self, mut spectrum: Vec<Complex<f64>>) -> Vec<f64> {
        self.transform_3d(&mut spectrum, &self.inverse_plan);
        let norm = 1.0 / self.cells() as f64;
        spectrum.iter().map(|c| c.re * norm).collect()
    }

    /// Multiplies every mode by `factor(mx, my, mz)`.
    pub fn scale_modes<F>(&self, spectrum: &mut [Complex<f64>], mut factor: F)
    where
        F: FnMut(usize, usize, usize) -> f64,
    {
        debug_assert_eq!(spectrum.len(), self.cells());
        let n = self.n;
        let mut idx = 0;
        for mz in 0..n {
            for my in 0..n {
                for mx in 0..n {
                    spectrum[idx] *= factor(mx, my, mz);
                    idx += 1;
                }
            }
        }
    }

    /// Solves `lap psi = source` on the periodic lattice, cell units.
    /// The source mean is discarded; the returned potential has zero mean.
    pub fn solve_poisson(&self, source: &[f64]) -> Vec<f64> {
        let n = self.n;
        let mut spectrum = self.forward(source);
        self.scale_modes(&mut spectrum, |mx, my, mz| {
            let lam = axis_eigenvalue(n, mx) + axis_eigenvalue(n, my) + axis_eigenvalue(n, mz);
            if lam == 0.0 {
                0.0
            } else {
                1.0 / lam
            }
        });
        self.inverse(spectrum)
    }

    /// Runs the 1-D plan over every line of the cube, axis by axis. The
    /// x-axis lines are contiguous and go through as one batched call; the
    /// other two axes gather strided lines through a scratch buffer.
    fn transform_3d(&self, data: &mut [Complex<f64>], plan: &Arc<dyn Fft<f64>>) {
        let n = self.n;
        plan.process(data);

        let mut line = vec![Complex::default(); n];
        for z in 0..n {
            for x in 0..n {
                let base = z * n * n + x;
                for (j, slot) in line.iter_mut().enumerate() {
                    *slot = data[base + j * n];
                }
                plan.process(&mut line);
                for (j, value) in line.iter().enumerate() {
                    data[base + j * n] = *value;
                }
            }
        }

        let plane = n * n;
        for y in 0..n {
            for x in 0..n {
                let base = y * n + x;
                for (j, slot) in line.iter_mut().enumerate() {
                    *slot = data[base + j * plane];
                }
                plan.process(&mut line);
                for (j, value) in line.iter().enumerate() {
                    data[base + j * plane] = *value;
                }
            }
        }
    }
}

impl std::fmt::Debug for SpectralSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralSolver").field("n", &self.n).finish()
    }
}

/// Eigenvalue of the 1-D periodic second difference at integer frequency m.
pub fn axis_eigenvalue(n: usize, m: usize) -> f64 {
    2.0 * (std::f64::consts::TAU * m as f64 / n as f64).cos() - 2.0
}

/// Integer frequency folded to the symmetric range [-N/2, N/2).
pub fn folded_mode(n: usize, m: usize) -> f64 {
    if m <= n / 2 {
        m as f64
    } else {
        m as f64 - n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_field(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n * n * n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    /// 6-point periodic Laplacian in cell units, reference implementation.
    fn apply_laplacian(n: usize, field: &[f64]) -> Vec<f64> {
        let idx = |x: usize, y: usize, z: usize| (z * n + y) * n + x;
        let mut out = vec![0.0; field.len()];
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let c = field[idx(x, y, z)];
                    let sum = field[idx((x + 1) % n, y, z)]
                        + field[idx((x + n - 1) % n, y, z)]
                        + field[idx(x, (y + 1) % n, z)]
                        + field[idx(x, (y + n - 1) % n, z)]
                        + field[idx(x, y, (z + 1) % n)]
                        + field[idx(x, y, (z + n - 1) % n)];
                    out[idx(x, y, z)] = sum - 6.0 * c;
                }
            }
        }
        out
    }

    #[test]
    fn test_forward_inverse_is_identity() {
        let solver = SpectralSolver::new(8);
        let field = random_field(8, 7);
        let back = solver.inverse(solver.forward(&field));
        for (a, b) in field.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_poisson_solution_satisfies_laplacian() {
        let n = 8;
        let solver = SpectralSolver::new(n);
        let field = random_field(n, 11);
        let mean = field.iter().sum::<f64>() / field.len() as f64;
        let potential = solver.solve_poisson(&field);
        let lap = apply_laplacian(n, &potential);
        for (l, s) in lap.iter().zip(field.iter()) {
            assert!(
                (l - (s - mean)).abs() < 1e-9,
                "laplacian mismatch: {l} vs {}",
                s - mean
            );
        }
    }

    #[test]
    fn test_constant_source_yields_flat_potential() {
        let n = 8;
        let solver = SpectralSolver::new(n);
        let source = vec![3.5; n * n * n];
        let potential = solver.solve_poisson(&source);
        for v in &potential {
            assert!(v.abs() < 1e-12);
        }
    }

    #[test]
    fn test_potential_mean_is_zero() {
        let n = 8;
        let solver = SpectralSolver::new(n);
        let potential = solver.solve_poisson(&random_field(n, 13));
        let mean = potential.iter().sum::<f64>() / potential.len() as f64;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn test_folded_mode_symmetry() {
        assert_eq!(folded_mode(8, 0), 0.0);
        assert_eq!(folded_mode(8, 3), 3.0);
        assert_eq!(folded_mode(8, 4), 4.0);
        assert_eq!(folded_mode(8, 5), -3.0);
        assert_eq!(folded_mode(8, 7), -1.0);
    }
}
