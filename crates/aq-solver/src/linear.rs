//! Linear solve of the assembled head equations.

use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::matrix::LinearSystem;
use crate::sparsity::SparsePattern;

/// Solves an assembled system for junction heads.
///
/// Implementations must report a singular system through
/// [`SolverError::Singular`] with the row where factorization broke down;
/// the solver uses it to look for a misbehaving control valve.
pub trait LinearSolver: Send {
    fn solve(&mut self, system: &LinearSystem, pattern: &SparsePattern)
    -> SolverResult<DVector<f64>>;
}

/// Dense Cholesky factorization through nalgebra.
///
/// The head matrix is symmetric positive definite whenever every junction
/// has a path to a fixed-grade node; a breakdown points at the row that
/// lost it.
#[derive(Debug, Default)]
pub struct DenseCholesky {
    matrix: Option<DMatrix<f64>>,
}

impl DenseCholesky {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self, system: &LinearSystem, pattern: &SparsePattern) -> DMatrix<f64> {
        let n = pattern.row_count();
        let mut a = match self.matrix.take() {
            Some(m) if m.nrows() == n => m,
            _ => DMatrix::zeros(n, n),
        };
        a.fill(0.0);
        for i in 0..n {
            a[(i, i)] = system.diag(i);
        }
        for (k, rows) in pattern.links().iter().enumerate() {
            if let Some((i, j)) = rows.offdiag() {
                let v = system.offdiag(k);
                a[(i, j)] += v;
                a[(j, i)] += v;
            }
        }
        a
    }
}

impl LinearSolver for DenseCholesky {
    fn solve(
        &mut self,
        system: &LinearSystem,
        pattern: &SparsePattern,
    ) -> SolverResult<DVector<f64>> {
        let a = self.fill(system, pattern);
        let b = DVector::from_fn(a.nrows(), |i, _| system.rhs(i));

        let x = match a.clone().cholesky() {
            Some(chol) => chol.solve(&b),
            None => {
                let row = first_bad_pivot(&a).unwrap_or(0);
                self.matrix = Some(a);
                return Err(SolverError::Singular { row });
            }
        };
        self.matrix = Some(a);

        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite { what: "head" });
        }
        Ok(x)
    }
}

/// First row whose Cholesky pivot is not positive.
fn first_bad_pivot(a: &DMatrix<f64>) -> Option<usize> {
    let n = a.nrows();
    let mut l = DMatrix::<f64>::zeros(n, n);
    for j in 0..n {
        let mut d = a[(j, j)];
        for k in 0..j {
            d -= l[(j, k)] * l[(j, k)];
        }
        if d <= 0.0 || !d.is_finite() {
            return Some(j);
        }
        let d = d.sqrt();
        l[(j, j)] = d;
        for i in (j + 1)..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = s / d;
        }
    }
    None
}
