//! Dense linear algebra used by the least-squares solver
//!
//! Contains:
//! - Householder QR decomposition with a per-column rank check
//! - Back substitution and triangular inversion

use crate::{MathError, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

/// Relative tolerance below which a column is treated as aliased.
pub const RANK_TOLERANCE: f64 = 1e-7;

/// Householder QR decomposition of a tall matrix (`n >= p`)
#[derive(Debug, Clone)]
pub struct Qr {
    /// Upper `p x p` block holds R, the rest is scratch
    packed: Array2<f64>,
    /// Householder vectors, one per column, `None` when the column was already zero
    reflectors: Vec<Option<Array1<f64>>>,
    /// Euclidean norm of every input column before reduction
    column_norms: Vec<f64>,
}

impl Qr {
    /// Decompose `a` into `Q R`
    pub fn decompose(a: ArrayView2<f64>) -> Result<Self> {
        let (n, p) = a.dim();
        if p == 0 {
            return Err(MathError::InvalidInput(
                "Matrix must have at least one column".to_string(),
            ));
        }
        if n < p {
            return Err(MathError::InsufficientData(format!(
                "QR needs at least as many rows as columns, have {} rows and {} columns",
                n, p
            )));
        }

        let column_norms = a
            .columns()
            .into_iter()
            .map(|col| col.dot(&col).sqrt())
            .collect();

        let mut packed = a.to_owned();
        let mut reflectors = Vec::with_capacity(p);

        for k in 0..p {
            let x = packed.slice(s![k.., k]).to_owned();
            let norm = x.dot(&x).sqrt();
            if norm == 0.0 {
                reflectors.push(None);
                continue;
            }

            let alpha = if x[0] >= 0.0 { -norm } else { norm };
            let mut v = x;
            v[0] -= alpha;
            let v_norm2 = v.dot(&v);
            if v_norm2 == 0.0 {
                reflectors.push(None);
                continue;
            }

            for j in k..p {
                let mut col = packed.slice_mut(s![k.., j]);
                let scale = 2.0 * v.dot(&col) / v_norm2;
                col.scaled_add(-scale, &v);
            }
            packed[[k, k]] = alpha;
            packed.slice_mut(s![k + 1.., k]).fill(0.0);

            reflectors.push(Some(v));
        }

        Ok(Self {
            packed,
            reflectors,
            column_norms,
        })
    }

    /// Number of columns in the decomposed matrix
    pub fn ncols(&self) -> usize {
        self.reflectors.len()
    }

    /// Diagonal of R
    pub fn r_diagonal(&self) -> Vec<f64> {
        (0..self.ncols()).map(|k| self.packed[[k, k]]).collect()
    }

    /// The `p x p` upper triangular factor
    pub fn r(&self) -> Array2<f64> {
        let p = self.ncols();
        let mut r = self.packed.slice(s![..p, ..]).to_owned();
        for i in 0..p {
            for j in 0..i {
                r[[i, j]] = 0.0;
            }
        }
        r
    }

    /// Fail with the first column whose diagonal entry vanishes relative to its norm
    pub fn check_rank(&self) -> Result<()> {
        for (k, &norm) in self.column_norms.iter().enumerate() {
            let diag = self.packed[[k, k]].abs();
            if norm == 0.0 || diag <= RANK_TOLERANCE * norm {
                return Err(MathError::RankDeficient { column: k, rank: k });
            }
        }
        Ok(())
    }

    /// Compute `Q^T y`
    pub fn apply_qt(&self, y: ArrayView1<f64>) -> Result<Array1<f64>> {
        if y.len() != self.packed.nrows() {
            return Err(MathError::InvalidInput(format!(
                "Vector length {} does not match matrix rows {}",
                y.len(),
                self.packed.nrows()
            )));
        }

        let mut out = y.to_owned();
        for (k, reflector) in self.reflectors.iter().enumerate() {
            if let Some(v) = reflector {
                let mut tail = out.slice_mut(s![k..]);
                let scale = 2.0 * v.dot(&tail) / v.dot(v);
                tail.scaled_add(-scale, v);
            }
        }
        Ok(out)
    }

    /// Least-squares solution of `A b = y`
    pub fn solve(&self, y: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_rank()?;
        let qty = self.apply_qt(y)?;
        let p = self.ncols();
        back_substitute(self.packed.slice(s![..p, ..]), qty.slice(s![..p]))
    }

    /// Inverse of R, used for the coefficient covariance `(R^T R)^-1`
    pub fn r_inverse(&self) -> Result<Array2<f64>> {
        self.check_rank()?;
        upper_triangular_inverse(self.r().view())
    }
}

/// Solve `R x = b` for upper triangular `R`
pub fn back_substitute(r: ArrayView2<f64>, b: ArrayView1<f64>) -> Result<Array1<f64>> {
    let p = r.ncols();
    if b.len() != p || r.nrows() < p {
        return Err(MathError::InvalidInput(
            "Triangular system dimensions do not agree".to_string(),
        ));
    }

    let mut x = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let mut sum = b[i];
        for j in (i + 1)..p {
            sum -= r[[i, j]] * x[j];
        }
        if r[[i, i]] == 0.0 {
            return Err(MathError::RankDeficient { column: i, rank: i });
        }
        x[i] = sum / r[[i, i]];
    }

    Ok(x)
}

/// Invert an upper triangular matrix column by column
pub fn upper_triangular_inverse(r: ArrayView2<f64>) -> Result<Array2<f64>> {
    let p = r.ncols();
    let mut inv = Array2::<f64>::zeros((p, p));
    for j in 0..p {
        let mut e = Array1::<f64>::zeros(p);
        e[j] = 1.0;
        let col = back_substitute(r, e.view())?;
        inv.column_mut(j).assign(&col);
    }
    Ok(inv)
}
