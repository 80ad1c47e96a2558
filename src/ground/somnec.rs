//! Sommerfeld integral table for a source above a lossy half space.
//!
//! The reflected field of a vertical or horizontal current element is
//! tabulated over three overlapping grids in `(R, θ)`, where `R` is the
//! distance from the image and `θ` its elevation. Each node is a contour
//! integral in the complex λ plane, evaluated by adaptive Romberg
//! integration over finite pieces of the path and Shanks extrapolation of
//! the infinite tail.

use crate::constants::{
    CONST1, CONST4, PTP, ROMBERG_GROWTH_STEPS, SHANKS_MAX_TERMS, SOMMERFELD_CRIT,
    SOMMERFELD_MAX_STEPS, TWO_PI,
};
use crate::errors::{Diagnostic, NecError, Result};
use crate::math::{abs1, relative_difference, CScalar, Scalar, C_ZERO};

use super::bessel::BesselSeries;
use super::PERMITTIVITY_TOLERANCE;

/// One rectangular grid of the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Number of nodes along `R`.
    pub nx: usize,
    /// Number of nodes along `θ`.
    pub ny: usize,
    /// Node spacing along `R` in wavelengths.
    pub dx: Scalar,
    /// Node spacing along `θ` in radians.
    pub dy: Scalar,
    /// First `R` node.
    pub xs: Scalar,
    /// First `θ` node.
    pub ys: Scalar,
}

impl GridSpec {
    /// `R` coordinate of column `ix`.
    #[must_use]
    pub fn x(&self, ix: usize) -> Scalar {
        self.xs + ix as Scalar * self.dx
    }

    /// `θ` coordinate of row `iy`.
    #[must_use]
    pub fn y(&self, iy: usize) -> Scalar {
        self.ys + iy as Scalar * self.dy
    }
}

/// The three grids: fine near the source, coarse out to one wavelength,
/// split in elevation at 20°.
pub const GRIDS: [GridSpec; 3] = [
    GridSpec {
        nx: 11,
        ny: 10,
        dx: 0.02,
        dy: 0.174_532_925_2,
        xs: 0.0,
        ys: 0.0,
    },
    GridSpec {
        nx: 17,
        ny: 5,
        dx: 0.05,
        dy: 0.087_266_462_6,
        xs: 0.2,
        ys: 0.0,
    },
    GridSpec {
        nx: 9,
        ny: 8,
        dx: 0.1,
        dy: 0.174_532_925_2,
        xs: 0.2,
        ys: 0.349_065_850_4,
    },
];

/// Four field components of a node: `[erv, ezv, erh, eph]`.
pub type NodeValue = [CScalar; 4];

type Integrals = [CScalar; 6];

/// Tabulated ground response for one complex permittivity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundTable {
    epscf: CScalar,
    grids: [Vec<NodeValue>; 3],
    diagnostics: Vec<Diagnostic>,
}

impl GroundTable {
    /// Evaluates the table for complex relative permittivity `epscf`.
    #[must_use]
    pub fn build(epscf: CScalar) -> Self {
        let _span = tracing::debug_span!("sommerfeld_table", epsr = epscf.re, eps_im = epscf.im)
            .entered();
        let medium = Medium::new(epscf);
        let series = BesselSeries::new();
        let mut contour = Contour::new(&medium, &series);

        let mut grids: [Vec<NodeValue>; 3] = Default::default();
        for (k, grid) in GRIDS.iter().enumerate() {
            let mut nodes = vec![[C_ZERO; 4]; grid.nx * grid.ny];
            let first = usize::from(k == 0);
            for ir in first..grid.nx {
                let r = grid.x(ir);
                for ith in 0..grid.ny {
                    let thet = grid.y(ith);
                    let mut rho = r * thet.cos();
                    let mut zph = r * thet.sin();
                    if rho < 1.0e-7 {
                        rho = 1.0e-8;
                    }
                    if zph < 1.0e-7 {
                        zph = 0.0;
                    }
                    let fields = contour.evaluate(rho, zph);
                    let rk = TWO_PI * r;
                    let con = -CONST1 * r / CScalar::new(rk.cos(), -rk.sin());
                    nodes[ir + ith * grid.nx] = fields.map(|f| f * con);
                }
            }
            grids[k] = nodes;
        }
        fill_origin_column(&mut grids[0], epscf);

        tracing::debug!(warnings = contour.diagnostics.len(), "Sommerfeld table ready");
        Self {
            epscf,
            grids,
            diagnostics: contour.diagnostics,
        }
    }

    /// Permittivity the table was computed for.
    #[must_use]
    pub const fn permittivity(&self) -> CScalar {
        self.epscf
    }

    /// True when `epsc` agrees with the table within the reuse tolerance.
    #[must_use]
    pub fn matches(&self, epsc: CScalar) -> bool {
        ((self.epscf - epsc) / epsc).norm() < PERMITTIVITY_TOLERANCE
    }

    /// Fails when the table was computed for a different permittivity.
    pub fn check(&self, epsc: CScalar) -> Result<()> {
        if self.matches(epsc) {
            Ok(())
        } else {
            Err(NecError::Config(format!(
                "ground table permittivity {:.5e}{:+.5e}j does not match requested {:.5e}{:+.5e}j",
                self.epscf.re, self.epscf.im, epsc.re, epsc.im
            )))
        }
    }

    /// Node value of grid `grid` at column `ix`, row `iy`.
    #[must_use]
    pub fn node(&self, grid: usize, ix: usize, iy: usize) -> NodeValue {
        self.grids[grid][ix + iy * GRIDS[grid].nx]
    }

    /// Warnings raised while integrating.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[cfg(test)]
    pub(crate) fn with_warning(mut self, message: &str) -> Self {
        self.diagnostics.push(Diagnostic::warning(message));
        self
    }
}

/// Closed-form limit of the fields as `R → 0`.
fn fill_origin_column(nodes: &mut [NodeValue], epscf: CScalar) {
    let grid = GRIDS[0];
    let cl2 = -CONST4 * (epscf - 1.0) / (epscf + 1.0);
    let cl1 = cl2 / (epscf + 1.0);
    let ezv = epscf * cl1;
    for ith in 0..grid.ny {
        let thet = grid.y(ith);
        let (erv, erh, eph) = if ith + 1 == grid.ny {
            let erh = cl2 - 0.5 * cl1;
            (C_ZERO, erh, -erh)
        } else {
            let c = thet.cos();
            let tfac1 = (1.0 - thet.sin()) / c;
            let tfac2 = tfac1 / c;
            (epscf * cl1 * tfac1, cl1 * (tfac2 - 1.0) + cl2, cl1 * tfac2 - cl2)
        };
        nodes[ith * grid.nx] = [erv, ezv, erh, eph];
    }
}

/// Wavenumbers of the two media. The integrals use `exp(-jωt)`, so the
/// lower medium takes the conjugate permittivity.
struct Medium {
    ck1: CScalar,
    ck1sq: CScalar,
    ck1r: Scalar,
    ck2: Scalar,
    ck2sq: Scalar,
    tkmag: Scalar,
    tsmag: Scalar,
    cksm: CScalar,
    ct1: CScalar,
    ct2: CScalar,
    ct3: CScalar,
}

impl Medium {
    fn new(epscf: CScalar) -> Self {
        let ck2 = TWO_PI;
        let ck2sq = ck2 * ck2;
        let ck1sq = ck2sq * epscf.conj();
        let ck1 = ck1sq.sqrt();
        let ck1sq2 = ck1sq * ck1sq;
        let ck2sq2 = ck2sq * ck2sq;
        Self {
            ck1,
            ck1sq,
            ck1r: ck1.re,
            ck2,
            ck2sq,
            tkmag: 100.0 * ck1.norm(),
            tsmag: 100.0 * ck1.norm_sqr(),
            cksm: ck2sq / (ck1sq + ck2sq),
            ct1: 0.5 * (ck1sq - ck2sq),
            ct2: 0.125 * (ck1sq2 - ck2sq2),
            ct3: 0.0625 * (ck1sq2 * ck1sq - ck2sq2 * ck2sq),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Bessel,
    Hankel,
}

/// Integration state for one node: the current path piece `[a, b]` and
/// the observer coordinates.
struct Contour<'a> {
    medium: &'a Medium,
    series: &'a BesselSeries,
    form: Form,
    rho: Scalar,
    zph: Scalar,
    a: CScalar,
    b: CScalar,
    diagnostics: Vec<Diagnostic>,
}

fn add(into: &mut Integrals, other: &Integrals) {
    for (x, y) in into.iter_mut().zip(other) {
        *x += *y;
    }
}

/// `sqrt(xl + k)·sqrt(xl - k)` on the branch with a decaying exponential.
fn branch_root(xl: CScalar, k: CScalar) -> CScalar {
    let com = xl - k;
    let root = (xl + k).sqrt() * com.sqrt();
    if com.re < 0.0 && com.im >= 0.0 {
        -root
    } else {
        root
    }
}

impl<'a> Contour<'a> {
    fn new(medium: &'a Medium, series: &'a BesselSeries) -> Self {
        Self {
            medium,
            series,
            form: Form::Bessel,
            rho: 0.0,
            zph: 0.0,
            a: C_ZERO,
            b: C_ZERO,
            diagnostics: Vec::new(),
        }
    }

    /// The six integrands at parameter `t` of the current path piece.
    fn integrand(&self, t: Scalar) -> Integrals {
        let m = self.medium;
        let dxl = self.b - self.a;
        let xl = self.a + dxl * t;

        let (b0, b0p, cgam1, cgam2) = match self.form {
            Form::Bessel => {
                let (b0, b0p) = self.series.bessel(xl * self.rho);
                let decaying = |g: CScalar| {
                    if g.re == 0.0 {
                        CScalar::new(0.0, -g.im.abs())
                    } else {
                        g
                    }
                };
                (
                    2.0 * b0,
                    2.0 * b0p,
                    decaying((xl * xl - m.ck1sq).sqrt()),
                    decaying((xl * xl - m.ck2sq).sqrt()),
                )
            }
            Form::Hankel => {
                // The contour never passes through λ·ρ = 0 and ρ ≥ 1e-8.
                let (h0, h0p) = self
                    .series
                    .hankel(xl * self.rho)
                    .unwrap_or((C_ZERO, C_ZERO));
                (
                    h0,
                    h0p,
                    branch_root(xl, m.ck1),
                    branch_root(xl, m.ck2.into()),
                )
            }
        };

        let asymptotic = |sign: Scalar| {
            let g = 1.0 / (xl * xl);
            sign * ((m.ct3 * g + m.ct2) * g + m.ct1) / xl
        };
        let dgam = if xl.norm_sqr() >= m.tsmag {
            if xl.im >= 0.0 {
                if xl.re >= m.ck2 {
                    if xl.re <= m.ck1r {
                        cgam2 - cgam1
                    } else {
                        asymptotic(1.0)
                    }
                } else {
                    asymptotic(-1.0)
                }
            } else {
                asymptotic(1.0)
            }
        } else {
            cgam2 - cgam1
        };

        let den2 = m.cksm * dgam / (cgam2 * (m.ck1sq * cgam2 + m.ck2sq * cgam1));
        let den1 = 1.0 / (cgam1 + cgam2) - m.cksm / cgam2;
        let mut com = dxl * xl * (-cgam2 * self.zph).exp();
        let mut ans = [C_ZERO; 6];
        ans[5] = com * b0 * den1 / m.ck1;
        com *= den2;

        if self.rho == 0.0 {
            ans[0] = -com * xl * xl * 0.5;
            ans[3] = ans[0];
        } else {
            let b0p = b0p / self.rho;
            ans[0] = -com * xl * (b0p + b0 * xl);
            ans[3] = com * xl * b0p;
        }
        ans[1] = com * cgam2 * cgam2 * b0;
        ans[2] = -ans[3] * cgam2 * self.rho;
        ans[4] = com * b0;
        ans
    }

    fn converged(coarse: &Integrals, fine: &Integrals) -> bool {
        coarse.iter().zip(fine).all(|(c, f)| {
            let (tr, ti) = relative_difference(*c, *f, 0.0);
            tr <= SOMMERFELD_CRIT && ti <= SOMMERFELD_CRIT
        })
    }

    /// Variable-step Romberg integration over `[a, b]`, starting with `nx`
    /// intervals.
    fn romberg(&mut self, nx: usize) -> Integrals {
        let s = 1.0;
        let ze = 1.0;
        let ep = s / (1.0e4 * SOMMERFELD_MAX_STEPS as Scalar);
        let zend = ze - ep;
        let mut sum = [C_ZERO; 6];
        let mut z = 0.0;
        let mut ns = nx;
        let mut nt = 0;
        let mut limited = false;
        let mut g1 = self.integrand(z);
        let mut g3 = g1;
        let mut g5 = g1;
        let mut dz = 0.0;
        let mut dzot = 0.0;
        let mut halved = false;

        loop {
            if !halved {
                dz = s / ns as Scalar;
                if z + dz > ze {
                    dz = ze - z;
                    if dz <= ep {
                        return sum;
                    }
                }
                dzot = dz * 0.5;
                g3 = self.integrand(z + dzot);
                g5 = self.integrand(z + dz);
            }
            halved = false;

            let mut t01 = [C_ZERO; 6];
            let mut t10 = [C_ZERO; 6];
            for i in 0..6 {
                let t00 = (g1[i] + g5[i]) * dzot;
                t01[i] = (t00 + dz * g3[i]) * 0.5;
                t10[i] = (4.0 * t01[i] - t00) / 3.0;
            }
            if Self::converged(&t01, &t10) {
                add(&mut sum, &t10);
                nt += 2;
                z += dz;
                if z > zend {
                    return sum;
                }
                g1 = g5;
                if nt >= ROMBERG_GROWTH_STEPS && ns > nx {
                    ns /= 2;
                    nt = 1;
                }
                continue;
            }

            let g2 = self.integrand(z + dz * 0.25);
            let g4 = self.integrand(z + dz * 0.75);
            let mut t11 = [C_ZERO; 6];
            let mut t20 = [C_ZERO; 6];
            for i in 0..6 {
                let t02 = (t01[i] + dzot * (g2[i] + g4[i])) * 0.5;
                t11[i] = (4.0 * t02 - t01[i]) / 3.0;
                t20[i] = (16.0 * t11[i] - t10[i]) / 15.0;
            }
            let accepted = Self::converged(&t11, &t20);
            if !accepted {
                nt = 0;
                if ns < SOMMERFELD_MAX_STEPS {
                    ns *= 2;
                    dz = s / ns as Scalar;
                    dzot = dz * 0.5;
                    g5 = g3;
                    g3 = g2;
                    halved = true;
                    continue;
                }
                if !limited {
                    limited = true;
                    let lambda = self.a + (self.b - self.a) * z;
                    self.diagnostics.push(Diagnostic::warning(format!(
                        "Sommerfeld integration step size limited at lambda = {:.5e}{:+.5e}j",
                        lambda.re, lambda.im
                    )));
                }
            }

            add(&mut sum, &t20);
            nt += 1;
            z += dz;
            if z > zend {
                return sum;
            }
            g1 = g5;
            if accepted && nt >= ROMBERG_GROWTH_STEPS && ns > nx {
                ns /= 2;
                nt = 1;
            }
        }
    }

    /// Integrates from `start` to infinity in steps `dela`, accelerating
    /// the partial sums with Shanks' transformation. At the optional break
    /// point `(bk, delb)` the step changes to `delb` and the table restarts.
    fn shanks(
        &mut self,
        start: CScalar,
        dela: CScalar,
        seed: Integrals,
        breakpoint: Option<(CScalar, CScalar)>,
    ) -> Integrals {
        let mut q1 = [[C_ZERO; 6]; SHANKS_MAX_TERMS];
        let mut q2 = [[C_ZERO; 6]; SHANKS_MAX_TERMS];
        let mut del = dela;
        let mut pending = breakpoint;
        let mut ans2 = seed;
        let mut estimate = seed;
        self.b = start;

        let mut intx = 1;
        while intx <= SHANKS_MAX_TERMS {
            let inx = intx - 1;
            self.a = self.b;
            self.b += del;
            if let Some((bk, delb)) = pending.filter(|(bk, _)| self.b.re >= bk.re) {
                pending = None;
                self.b = bk;
                del = delb;
                let piece = self.romberg(2);
                add(&mut ans2, &piece);
                intx = 1;
                continue;
            }

            let mut ans1 = ans2;
            add(&mut ans1, &self.romberg(2));
            self.a = self.b;
            self.b += del;
            if let Some((bk, delb)) = pending.filter(|(bk, _)| self.b.re >= bk.re) {
                pending = None;
                self.b = bk;
                del = delb;
                ans2 = ans1;
                add(&mut ans2, &self.romberg(2));
                intx = 1;
                continue;
            }
            ans2 = ans1;
            add(&mut ans2, &self.romberg(2));

            let mut den: Scalar = 0.0;
            for i in 0..6 {
                let mut as1 = ans1[i];
                let mut as2 = ans2[i];
                for jm in 0..inx {
                    let aa = q2[jm][i];
                    let mut a1 = q1[jm][i] + as1 - 2.0 * aa;
                    a1 = if a1 == C_ZERO {
                        q1[jm][i]
                    } else {
                        let a2 = aa - q1[jm][i];
                        q1[jm][i] - a2 * a2 / a1
                    };
                    let mut a2 = aa + as2 - 2.0 * as1;
                    a2 = if a2 == C_ZERO {
                        aa
                    } else {
                        aa - (as1 - aa) * (as1 - aa) / a2
                    };
                    q1[jm][i] = as1;
                    q2[jm][i] = as2;
                    as1 = a1;
                    as2 = a2;
                }
                q1[inx][i] = as1;
                q2[inx][i] = as2;
                den = den.max(abs1(as2));
            }

            for i in 0..6 {
                estimate[i] = 0.5 * (q1[inx][i] + q2[inx][i]);
            }
            let denm = 1.0e-3 * den * SOMMERFELD_CRIT;
            let first = intx.saturating_sub(3).max(1) - 1;
            let settled = (first..intx).all(|j| {
                (0..6).all(|i| {
                    let tol = (abs1(q2[j][i]) * SOMMERFELD_CRIT).max(denm);
                    abs1(q1[j][i] - q2[j][i]) <= tol
                })
            });
            if settled {
                return estimate;
            }
            intx += 1;
        }

        self.diagnostics.push(Diagnostic::warning(format!(
            "Shanks extrapolation did not converge at rho = {:.4e}, z = {:.4e}",
            self.rho, self.zph
        )));
        estimate
    }

    /// Chooses the contour for observer `(rho, zph)` and returns
    /// `[erv, ezv, erh, eph]`.
    fn evaluate(&mut self, rho: Scalar, zph: Scalar) -> NodeValue {
        let m = self.medium;
        self.rho = rho;
        self.zph = zph;
        let mut del = zph.max(rho);

        let mut ans = if zph >= 2.0 * rho {
            self.form = Form::Bessel;
            self.a = C_ZERO;
            del = 1.0 / del;
            let sum = if del > m.tkmag {
                self.b = CScalar::new(0.1 * m.tkmag, -0.1 * m.tkmag);
                let mut sum = self.romberg(2);
                self.a = self.b;
                self.b = CScalar::new(del, -del);
                add(&mut sum, &self.romberg(2));
                sum
            } else {
                self.b = CScalar::new(del, -del);
                self.romberg(2)
            };
            let delta = CScalar::from(PTP * del);
            self.shanks(self.b, delta, sum, None)
        } else {
            self.form = Form::Hankel;
            let ck2 = m.ck2;
            let cp1 = CScalar::new(0.0, 0.4 * ck2);
            let cp2 = CScalar::new(0.6 * ck2, -0.2 * ck2);
            let cp3 = CScalar::new(1.02 * ck2, -0.2 * ck2);
            self.a = cp1;
            self.b = cp2;
            let mut sum = self.romberg(2);
            self.a = cp2;
            self.b = cp3;
            add(&mut sum, &self.romberg(2));
            let sum = sum.map(|v| -v);

            // Path from the imaginary axis to -infinity.
            let slope = if zph > 0.001 * rho { rho / zph } else { 1000.0 };
            del = PTP / del;
            let delta = CScalar::new(-1.0, slope) * del / (1.0 + slope * slope).sqrt();
            let delta2 = -delta.conj();
            let ans = self.shanks(cp1, delta, sum, None);

            let rmis = rho * (m.ck1.re - ck2);
            if rmis >= 2.0 * ck2 && rho >= 1.0e-10 {
                let steep = zph >= 1.0e-10 && {
                    let bk = CScalar::new(-zph, rho) * (m.ck1 - cp3);
                    -bk.re / bk.im.abs() > 4.0 * rho / zph
                };
                if steep {
                    ans
                } else {
                    // Up between the branch cuts, then to +infinity.
                    let cp1 = m.ck1 - CScalar::new(0.1, 0.2);
                    let cp2 = cp1 + 0.2;
                    let bk = CScalar::new(0.0, del);
                    let sum = self.shanks(cp1, bk, ans, None);
                    self.a = cp1;
                    self.b = cp2;
                    let mut between = self.romberg(1);
                    for (x, s) in between.iter_mut().zip(&sum) {
                        *x -= *s;
                    }
                    let sum = self.shanks(cp3, bk, between, None);
                    self.shanks(cp2, delta2, sum, None)
                }
            } else {
                // Below the branch points, then to +infinity.
                let sum = ans.map(|v| -v);
                let rmis = (m.ck1.re * 1.01).max(ck2 + 1.0);
                let bk = CScalar::new(rmis, 0.99 * m.ck1.im);
                let delta = (bk - cp3) * del / (bk - cp3).norm();
                self.shanks(cp3, delta, sum, Some((bk, delta2)))
            }
        };
        ans[5] *= m.ck1;

        // Conjugate back to the exp(+jωt) convention.
        [
            (m.ck1sq * ans[2]).conj(),
            (m.ck1sq * (ans[1] + m.ck2sq * ans[4])).conj(),
            (m.ck2sq * (ans[0] + ans[5])).conj(),
            -(m.ck2sq * (ans[3] + ans[5])).conj(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn grids_cover_one_wavelength_and_right_angle() {
        for grid in &GRIDS[1..] {
            assert_relative_eq!(grid.x(grid.nx - 1), 1.0, epsilon = 1.0e-9);
        }
        assert_relative_eq!(GRIDS[0].y(GRIDS[0].ny - 1), 0.5 * crate::constants::PI, epsilon = 1.0e-8);
        assert_relative_eq!(GRIDS[1].y(GRIDS[1].ny - 1), GRIDS[2].ys, epsilon = 1.0e-9);
    }

    #[test]
    fn origin_column_matches_closed_form() {
        let epscf = CScalar::new(10.0, -5.0);
        let mut nodes = vec![[C_ZERO; 4]; GRIDS[0].nx * GRIDS[0].ny];
        fill_origin_column(&mut nodes, epscf);
        let cl2 = -CONST4 * (epscf - 1.0) / (epscf + 1.0);
        let cl1 = cl2 / (epscf + 1.0);
        let top = nodes[(GRIDS[0].ny - 1) * GRIDS[0].nx];
        assert_eq!(top[0], C_ZERO);
        assert_relative_eq!((top[2] + top[3]).norm(), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!((top[1] - epscf * cl1).norm(), 0.0, epsilon = 1.0e-12);
        // At θ = 0 the horizontal components reduce to cl1·0 ± cl2.
        let base = nodes[0];
        assert_relative_eq!((base[2] - cl2).norm(), 0.0, epsilon = 1.0e-9);
        assert_relative_eq!((base[3] - (cl1 - cl2)).norm(), 0.0, epsilon = 1.0e-9);
    }

    #[test]
    fn branch_root_decays_on_real_axis_beyond_k() {
        let g = branch_root(CScalar::new(8.0, 0.0), CScalar::new(TWO_PI, 0.0));
        assert!(g.re > 0.0);
        assert_relative_eq!(g.re, (64.0 - TWO_PI * TWO_PI).sqrt(), epsilon = 1.0e-9);
    }

    #[test]
    fn romberg_integrates_a_smooth_node_to_finite_values() {
        let medium = Medium::new(CScalar::new(10.0, -2.0));
        let series = BesselSeries::new();
        let mut contour = Contour::new(&medium, &series);
        let values = contour.evaluate(0.3, 0.4);
        for v in values {
            assert!(v.re.is_finite() && v.im.is_finite());
        }
    }

    #[test]
    fn table_check_rejects_other_permittivity() {
        let table = GroundTable {
            epscf: CScalar::new(10.0, -1.0),
            grids: Default::default(),
            diagnostics: Vec::new(),
        };
        assert!(table.check(CScalar::new(10.0, -1.0)).is_ok());
        assert!(table.check(CScalar::new(10.0005, -1.0)).is_ok());
        assert!(matches!(
            table.check(CScalar::new(12.0, -1.0)),
            Err(NecError::Config(_))
        ));
    }
}
