/// Diagonal entries at or below this fraction of the largest diagonal are
/// treated as singular during back-substitution.
const SINGULAR_RELATIVE_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// UpperTriangular – small dense matrix for the sectioning transform
// ---------------------------------------------------------------------------

/// Dense `n × n` upper-triangular matrix, row-major.
///
/// Row `i` is the apparent (section) size bin, column `j` the true size bin.
/// A section is never larger than the sphere it cuts, so every entry with
/// `i > j` is zero and the system can be solved by back-substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct UpperTriangular {
    n: usize,
    data: Vec<f64>,
}

/// Output of [`UpperTriangular::solve_back`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackSubstitution {
    /// Solution vector; NaN where the diagonal was singular.
    pub solution: Vec<f64>,
    /// Rows whose diagonal coefficient was (near) zero.
    pub singular: Vec<usize>,
}

impl UpperTriangular {
    pub fn zeros(n: usize) -> Self {
        UpperTriangular {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from a coefficient function evaluated on the upper triangle.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in i..n {
                m.data[i * n + j] = f(i, j);
            }
        }
        m
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(i <= j, "entry ({i}, {j}) lies below the diagonal");
        self.data[i * self.n + j] = value;
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.get(i, i)).collect()
    }

    /// Forward transform `P · x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.n, "vector length does not match matrix");
        (0..self.n)
            .map(|i| (i..self.n).map(|j| self.get(i, j) * x[j]).sum())
            .collect()
    }

    /// Solve `P · x = rhs`, from the last row up.
    ///
    /// A singular diagonal does not abort the solve: that unknown becomes NaN
    /// and contributes nothing to the rows above it.
    pub fn solve_back(&self, rhs: &[f64]) -> BackSubstitution {
        assert_eq!(rhs.len(), self.n, "right-hand side length does not match matrix");

        let scale = self
            .diagonal()
            .iter()
            .map(|d| d.abs())
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        let threshold = scale * SINGULAR_RELATIVE_EPS;

        let mut solution = vec![0.0; self.n];
        let mut singular = Vec::new();

        for i in (0..self.n).rev() {
            let diag = self.get(i, i);
            if !diag.is_finite() || diag.abs() <= threshold {
                solution[i] = f64::NAN;
                singular.push(i);
                continue;
            }
            let above: f64 = ((i + 1)..self.n)
                .filter(|&j| solution[j].is_finite())
                .map(|j| self.get(i, j) * solution[j])
                .sum();
            solution[i] = (rhs[i] - above) / diag;
        }

        singular.reverse();
        BackSubstitution { solution, singular }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_matrix() -> UpperTriangular {
        UpperTriangular::from_fn(3, |i, j| 1.0 + i as f64 + 2.0 * j as f64)
    }

    #[test]
    fn entries_below_diagonal_are_zero() {
        let m = sample_matrix();
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.get(2, 1), 0.0);
        assert_eq!(m.get(0, 2), 5.0);
    }

    #[test]
    fn solve_inverts_forward_transform() {
        let m = sample_matrix();
        let x = [0.5, -2.0, 3.25];
        let b = m.mul_vec(&x);
        let solved = m.solve_back(&b);
        assert!(solved.singular.is_empty());
        for (got, want) in solved.solution.iter().zip(x) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn singular_diagonal_marks_only_that_row() {
        let mut m = sample_matrix();
        m.set(1, 1, 0.0);
        let solved = m.solve_back(&[1.0, 1.0, 7.0]);
        assert_eq!(solved.singular, vec![1]);
        assert!(solved.solution[1].is_nan());
        assert_relative_eq!(solved.solution[2], 1.0);
        // Row 0 skips the undefined unknown: (1 - 5 * 1) / 1
        assert_relative_eq!(solved.solution[0], -4.0);
    }

    #[test]
    #[should_panic(expected = "below the diagonal")]
    fn setting_lower_triangle_panics() {
        let mut m = UpperTriangular::zeros(2);
        m.set(1, 0, 1.0);
    }
}
