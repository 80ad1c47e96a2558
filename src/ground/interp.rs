//! Bivariate cubic interpolation in the Sommerfeld table.

use crate::math::{CScalar, Scalar, C_ZERO};

use super::somnec::{GroundTable, NodeValue, GRIDS};

/// Cubic coefficients `[a, b, c, d]` in x of one table row.
type RowCubic = [CScalar; 4];

#[derive(Debug, Clone)]
struct Window {
    grid: usize,
    ix0: usize,
    iy0: usize,
    /// `rows[component][row]`.
    rows: [[RowCubic; 4]; 4],
    xz: Scalar,
    yz: Scalar,
}

/// Interpolates the four field components of a [`GroundTable`] at
/// `(R, θ)`, keeping the cubic fit of the last 4×4 node window.
///
/// Each matrix-fill worker owns its own interpolator; the table itself is
/// shared read-only.
#[derive(Debug, Clone)]
pub struct GroundInterpolator<'a> {
    table: &'a GroundTable,
    window: Option<Window>,
    refits: usize,
}

fn fit_row(p: [CScalar; 4]) -> RowCubic {
    let [p1, p2, p3, p4] = p;
    [
        (p4 - p1 + 3.0 * (p2 - p3)) / 6.0,
        (p1 - 2.0 * p2 + p3) * 0.5,
        p3 - (2.0 * p1 + 3.0 * p2 + p4) / 6.0,
        p2,
    ]
}

fn cubic_through(f: [CScalar; 4], t: Scalar) -> CScalar {
    let [f1, f2, f3, f4] = f;
    let p1 = f4 - f1 + 3.0 * (f2 - f3);
    let p2 = 3.0 * (f1 - 2.0 * f2 + f3);
    let p3 = 6.0 * f3 - 2.0 * f1 - 3.0 * f2 - f4;
    ((p1 * t + p2) * t + p3) * t / 6.0 + f2
}

/// Index of the window's first node along one axis.
fn window_start(coord: Scalar, start: Scalar, step: Scalar, nodes: usize) -> usize {
    let cell = ((coord - start) / step).floor().max(0.0) as usize;
    ((cell / 3) * 3).min(nodes - 4)
}

impl<'a> GroundInterpolator<'a> {
    /// Creates an interpolator with an empty window cache.
    #[must_use]
    pub const fn new(table: &'a GroundTable) -> Self {
        Self {
            table,
            window: None,
            refits: 0,
        }
    }

    /// Table being interpolated.
    #[must_use]
    pub const fn table(&self) -> &'a GroundTable {
        self.table
    }

    /// Number of times a new 4×4 window had to be fitted.
    #[must_use]
    pub const fn refits(&self) -> usize {
        self.refits
    }

    /// Returns `[erv, ezv, erh, eph]` at distance `x` (wavelengths) and
    /// elevation `y` (radians).
    pub fn interpolate(&mut self, x: Scalar, y: Scalar) -> NodeValue {
        let grid = if x <= GRIDS[1].xs {
            0
        } else if y > GRIDS[2].ys {
            2
        } else {
            1
        };
        let spec = GRIDS[grid];
        let ix0 = window_start(x, spec.xs, spec.dx, spec.nx);
        let iy0 = window_start(y, spec.ys, spec.dy, spec.ny);

        let stale = !matches!(
            &self.window,
            Some(w) if w.grid == grid && w.ix0 == ix0 && w.iy0 == iy0
        );
        if stale {
            self.window = Some(self.fit(grid, ix0, iy0));
            self.refits += 1;
        }
        let Some(w) = self.window.as_ref() else {
            return [C_ZERO; 4];
        };

        let xx = (x - w.xz) / spec.dx;
        let yy = (y - w.yz) / spec.dy;
        let mut out = [C_ZERO; 4];
        for (value, rows) in out.iter_mut().zip(&w.rows) {
            let along_x = (*rows).map(|[a, b, c, d]| ((a * xx + b) * xx + c) * xx + d);
            *value = cubic_through(along_x, yy);
        }
        out
    }

    fn fit(&self, grid: usize, ix0: usize, iy0: usize) -> Window {
        let spec = GRIDS[grid];
        let mut rows = [[[C_ZERO; 4]; 4]; 4];
        for row in 0..4 {
            let nodes: [NodeValue; 4] =
                std::array::from_fn(|col| self.table.node(grid, ix0 + col, iy0 + row));
            for (component, slot) in rows.iter_mut().enumerate() {
                slot[row] = fit_row(nodes.map(|n| n[component]));
            }
        }
        Window {
            grid,
            ix0,
            iy0,
            rows,
            xz: spec.x(ix0 + 1),
            yz: spec.y(iy0 + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn row_cubic_passes_through_its_nodes() {
        let p = [
            CScalar::new(1.0, 0.0),
            CScalar::new(2.0, 1.0),
            CScalar::new(-1.0, 3.0),
            CScalar::new(0.5, -2.0),
        ];
        let [a, b, c, d] = fit_row(p);
        for (k, expected) in p.iter().enumerate() {
            let t = k as Scalar - 1.0;
            let v = ((a * t + b) * t + c) * t + d;
            assert_relative_eq!((v - expected).norm(), 0.0, epsilon = 1.0e-12);
            assert_relative_eq!((cubic_through(p, t) - expected).norm(), 0.0, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn windows_are_clamped_inside_the_grid() {
        assert_eq!(window_start(0.0, 0.0, 0.02, 11), 0);
        assert_eq!(window_start(0.07, 0.0, 0.02, 11), 3);
        assert_eq!(window_start(0.2, 0.0, 0.02, 11), 7);
        assert_eq!(window_start(-0.01, 0.0, 0.02, 11), 0);
    }
}
