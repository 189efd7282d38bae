//! MNA system matrix with cached factorization.
//!
//! The matrix is assembled once per topology activation from additive
//! component stamps; the LU factorization is computed once and reused for
//! every per-step solve until the active topology changes.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{SolverError, SolverResult};

/// Entries with no larger magnitude than this count as structurally zero.
const ZERO_TOL: f64 = 1e-12;

pub struct MnaSystem {
    dim: usize,
    matrix: DMatrix<f64>,
    lu: Option<LU<f64, Dyn, Dyn>>,
}

impl MnaSystem {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            matrix: DMatrix::zeros(dim, dim),
            lu: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Mutable access for component stamps. Invalidates the cached
    /// factorization.
    pub fn matrix_mut(&mut self) -> &mut DMatrix<f64> {
        self.lu = None;
        &mut self.matrix
    }

    /// Put a 1 on the diagonal of an otherwise empty row, pinning an
    /// unknown that no active component constrains (virtual rows of
    /// components absent from the current topology).
    pub fn pin_row(&mut self, row: usize) {
        self.lu = None;
        self.matrix[(row, row)] = 1.0;
    }

    pub fn is_factorized(&self) -> bool {
        self.lu.is_some()
    }

    /// Factorize and cache. `row_label` names rows in diagnostics.
    pub fn factorize(&mut self, row_label: &dyn Fn(usize) -> String) -> SolverResult<()> {
        // Structurally empty rows make the failure mode obvious; catch
        // them before LU turns them into an opaque zero pivot.
        let zero_rows: Vec<String> = (0..self.dim)
            .filter(|&i| (0..self.dim).all(|j| self.matrix[(i, j)].abs() <= ZERO_TOL))
            .map(|i| row_label(i))
            .collect();
        if !zero_rows.is_empty() {
            return Err(SolverError::SingularSystem { rows: zero_rows });
        }

        let lu = self.matrix.clone().lu();
        if !lu.is_invertible() {
            let u = lu.u();
            let rows: Vec<String> = (0..self.dim)
                .filter(|&i| u[(i, i)].abs() <= ZERO_TOL)
                .map(|i| row_label(i))
                .collect();
            return Err(SolverError::SingularSystem { rows });
        }

        tracing::debug!(dim = self.dim, "factorized system matrix");
        self.lu = Some(lu);
        Ok(())
    }

    /// Back-substitute through the cached factorization.
    pub fn solve(&self, b: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let lu = self.lu.as_ref().ok_or_else(|| SolverError::ProblemSetup {
            what: "solve called before factorize".to_string(),
        })?;
        lu.solve(b).ok_or_else(|| SolverError::SingularSystem {
            rows: vec!["back-substitution failed".to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(i: usize) -> String {
        format!("row{i}")
    }

    #[test]
    fn factorize_once_solve_many() {
        let mut sys = MnaSystem::new(2);
        {
            let m = sys.matrix_mut();
            m[(0, 0)] = 2.0;
            m[(0, 1)] = 1.0;
            m[(1, 0)] = 1.0;
            m[(1, 1)] = 3.0;
        }
        sys.factorize(&label).unwrap();

        for k in 0..5 {
            let b = DVector::from_vec(vec![k as f64, 1.0 - k as f64]);
            let x_cached = sys.solve(&b).unwrap();

            // fresh factorization every time must agree
            let fresh = sys.matrix().clone().lu().solve(&b).unwrap();
            assert!((x_cached - fresh).norm() < 1e-12);
        }
    }

    #[test]
    fn zero_row_is_reported_by_name() {
        let mut sys = MnaSystem::new(2);
        sys.matrix_mut()[(0, 0)] = 1.0;
        let err = sys.factorize(&|i| format!("n{i}")).unwrap_err();
        match err {
            SolverError::SingularSystem { rows } => assert_eq!(rows, vec!["n1".to_string()]),
            other => panic!("expected SingularSystem, got {other}"),
        }
    }

    #[test]
    fn dependent_rows_are_singular() {
        let mut sys = MnaSystem::new(2);
        {
            let m = sys.matrix_mut();
            m[(0, 0)] = 1.0;
            m[(0, 1)] = 2.0;
            m[(1, 0)] = 2.0;
            m[(1, 1)] = 4.0;
        }
        assert!(matches!(
            sys.factorize(&label),
            Err(SolverError::SingularSystem { .. })
        ));
    }

    #[test]
    fn stamping_invalidates_factorization() {
        let mut sys = MnaSystem::new(1);
        sys.matrix_mut()[(0, 0)] = 1.0;
        sys.factorize(&label).unwrap();
        assert!(sys.is_factorized());
        sys.matrix_mut()[(0, 0)] = 2.0;
        assert!(!sys.is_factorized());
    }

    #[test]
    fn pinned_row_solves_to_rhs() {
        let mut sys = MnaSystem::new(2);
        sys.matrix_mut()[(0, 0)] = 4.0;
        sys.pin_row(1);
        sys.factorize(&label).unwrap();
        let x = sys.solve(&DVector::from_vec(vec![8.0, 0.0])).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert_eq!(x[1], 0.0);
    }
}
