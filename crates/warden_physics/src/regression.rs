//! # Trajectory Regression
//!
//! Least-squares fit of `y = a·x² + b·x + c`. Airborne height samples of a
//! legitimate client trace (approximately) a downward parabola whose
//! curvature is fixed by gravity; a fitted curvature far from the model's
//! own is evidence of modified gravity.
//!
//! X values are centered before solving to keep the normal equations well
//! conditioned, then the coefficients are shifted back.

use crate::error::FitError;

/// Result of a quadratic fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadraticFit {
    /// Curvature coefficient.
    pub a: f64,
    /// Linear coefficient.
    pub b: f64,
    /// Constant term.
    pub c: f64,
    /// Mean squared residual.
    pub residual_mse: f64,
}

impl QuadraticFit {
    /// Evaluates the fitted curve.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        (self.a * x + self.b) * x + self.c
    }
}

/// Pivot magnitude below which the system is considered singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Fits a parabola through `(x, y)` by least squares.
///
/// # Errors
///
/// Fewer than three points, mismatched lengths, non-finite input, or x
/// values that do not span three distinct positions.
pub fn quadratic_fit(x: &[f64], y: &[f64]) -> Result<QuadraticFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < 3 {
        return Err(FitError::TooFewPoints {
            needed: 3,
            got: x.len(),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let n = x.len() as f64;
    let shift = x.iter().sum::<f64>() / n;

    let mut s = [0.0_f64; 5];
    let mut t = [0.0_f64; 3];
    for (&xi, &yi) in x.iter().zip(y) {
        let u = xi - shift;
        let u2 = u * u;
        s[0] += 1.0;
        s[1] += u;
        s[2] += u2;
        s[3] += u2 * u;
        s[4] += u2 * u2;
        t[0] += yi;
        t[1] += u * yi;
        t[2] += u2 * yi;
    }

    // Unknowns ordered (c, b, a).
    let mut m = [
        [s[0], s[1], s[2], t[0]],
        [s[1], s[2], s[3], t[1]],
        [s[2], s[3], s[4], t[2]],
    ];
    let [c_u, b_u, a_u] = solve3(&mut m)?;

    // Undo the centering: a(x-h)² + b(x-h) + c.
    let a = a_u;
    let b = b_u - 2.0 * a_u * shift;
    let c = a_u * shift * shift - b_u * shift + c_u;

    let residual_mse = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let u = xi - shift;
            let r = yi - ((a_u * u + b_u) * u + c_u);
            r * r
        })
        .sum::<f64>()
        / n;

    Ok(QuadraticFit { a, b, c, residual_mse })
}

/// Gaussian elimination with partial pivoting on an augmented 3x4 matrix.
fn solve3(m: &mut [[f64; 4]; 3]) -> Result<[f64; 3], FitError> {
    for col in 0..3 {
        let pivot = (col..3)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < SINGULAR_EPSILON {
            return Err(FitError::Singular);
        }
        m.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                let delta = factor * m[col][k];
                m[row][k] -= delta;
            }
        }
    }

    let mut out = [0.0; 3];
    for row in (0..3).rev() {
        let mut acc = m[row][3];
        for k in (row + 1)..3 {
            acc -= m[row][k] * out[k];
        }
        out[row] = acc / m[row][row];
    }
    if out.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Singular);
    }
    Ok(out)
}
