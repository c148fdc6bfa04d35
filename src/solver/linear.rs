//! Dense linear solver: Gaussian elimination with partial pivoting.
//!
//! Circuit-agnostic; knows nothing about MNA semantics. Returns `None`
//! when the system has no unique solution instead of dividing by a
//! near-zero pivot.

use super::PIVOT_EPSILON;

/// A dense square matrix, row-major.
#[derive(Debug, Clone)]
pub struct Matrix {
    data: Vec<f64>,
    size: usize,
}

impl Matrix {
    /// Create a zeroed n-by-n matrix.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] += value;
    }
}

/// Solve Ax = b by Gaussian elimination with partial pivoting.
///
/// The row with the largest absolute coefficient in the current column is
/// selected as pivot for numerical stability. Returns `None` if the best
/// pivot magnitude falls below [`PIVOT_EPSILON`].
pub fn solve(a: &Matrix, b: &[f64]) -> Option<Vec<f64>> {
    let n = a.size;
    debug_assert_eq!(b.len(), n);

    if n == 0 {
        return Some(Vec::new());
    }

    // Work on an augmented copy so callers keep their assembled system
    let mut m = a.data.clone();
    let mut x: Vec<f64> = b.to_vec();

    for k in 0..n {
        // Partial pivot: largest |coefficient| in column k at or below row k
        let mut max_val = m[k * n + k].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let val = m[i * n + k].abs();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val < PIVOT_EPSILON {
            return None;
        }

        if max_row != k {
            for j in 0..n {
                m.swap(k * n + j, max_row * n + j);
            }
            x.swap(k, max_row);
        }

        // Eliminate below the pivot
        let pivot = m[k * n + k];
        for i in (k + 1)..n {
            let factor = m[i * n + k] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                m[i * n + j] -= factor * m[k * n + j];
            }
            x[i] -= factor * x[k];
        }
    }

    // Back substitution
    for i in (0..n).rev() {
        for j in (i + 1)..n {
            let xj = x[j];
            x[i] -= m[i * n + j] * xj;
        }
        x[i] /= m[i * n + i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix_from(rows: &[&[f64]]) -> Matrix {
        let n = rows.len();
        let mut m = Matrix::new(n);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                m.set(i, j, v);
            }
        }
        m
    }

    #[test]
    fn test_solve_identity() {
        let a = matrix_from(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let x = solve(&a, &[3.0, -2.0]).unwrap();
        assert_relative_eq!(x[0], 3.0);
        assert_relative_eq!(x[1], -2.0);
    }

    #[test]
    fn test_solve_2x2() {
        // 2x + y = 5, x - y = 1 => x = 2, y = 1
        let a = matrix_from(&[&[2.0, 1.0], &[1.0, -1.0]]);
        let x = solve(&a, &[5.0, 1.0]).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero on the diagonal: naive elimination would divide by zero
        let a = matrix_from(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let x = solve(&a, &[2.0, 3.0]).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_3x3() {
        let a = matrix_from(&[
            &[2.0, -1.0, 0.0],
            &[-1.0, 2.0, -1.0],
            &[0.0, -1.0, 2.0],
        ]);
        let x = solve(&a, &[1.0, 0.0, 1.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[2], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_reported() {
        // Second row is a multiple of the first
        let a = matrix_from(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(solve(&a, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_near_singular_reported() {
        let a = matrix_from(&[&[1.0, 1.0], &[1.0, 1.0 + 1e-15]]);
        assert!(solve(&a, &[1.0, 1.0]).is_none());
    }

    #[test]
    fn test_empty_system() {
        let a = Matrix::new(0);
        assert_eq!(solve(&a, &[]), Some(Vec::new()));
    }
}
