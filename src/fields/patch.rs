//! Fields of the two surface-current components on a patch.

use crate::constants::{CONST2, FOUR_PI, TWO_PI};
use crate::geometry::Patch;
use crate::math::{cdot, scale, CScalar, Scalar, C3, R3};

use super::{fresnel, incidence_normal, FieldEvaluator};

/// Field of unit current along each patch tangent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatchField {
    /// Current along `t1`.
    pub t1: C3,
    /// Current along `t2`.
    pub t2: C3,
}

/// Tangential E field on a wire segment from a patch split into four
/// children at a wire junction.
///
/// The patch is integrated as a grid of small dipoles weighted by the
/// bilinear shape of each child's current.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatchJunctionField {
    /// Contributions of the four children's `t1` currents.
    pub t1: [CScalar; 4],
    /// Contributions of the four children's `t2` currents.
    pub t2: [CScalar; 4],
    /// Contribution of the current spreading radially from the junction.
    pub junction: CScalar,
}

/// Subdivisions per side used by [`FieldEvaluator::patch_junction_e`].
const JUNCTION_GRID: usize = 10;

impl FieldEvaluator<'_> {
    /// E field at `obs` of a current element at the patch centre, or of its
    /// image when `image` is set.
    #[must_use]
    pub fn patch_e(&self, patch: &Patch, obs: &R3, image: bool) -> PatchField {
        self.dipole_e(&patch.center, &patch.t1, &patch.t2, patch.area, obs, image)
    }

    fn dipole_e(&self, center: &R3, t1: &R3, t2: &R3, area: Scalar, obs: &R3, image: bool) -> PatchField {
        let (zr, t1, t2) = if image {
            (-center.z, R3::new(t1.x, t1.y, -t1.z), R3::new(t2.x, t2.y, -t2.z))
        } else {
            (center.z, *t1, *t2)
        };
        let r = R3::new(obs.x - center.x, obs.y - center.y, obs.z - zr);
        let r2 = r.norm_squared();
        if r2 <= 1.0e-20 {
            return PatchField::default();
        }

        let rm = r2.sqrt();
        let tt1 = -TWO_PI * rm;
        let tt2 = tt1 * tt1;
        let rt = r2 * rm;
        let er = CScalar::new(tt1.sin(), -tt1.cos()) * (CONST2 * area);
        let q1 = CScalar::new(tt2 - 1.0, tt1) * er / rt;
        let q2 = CScalar::new(3.0 - tt2, -3.0 * tt1) * er / (rt * r2);
        let along = |t: &R3| scale(t, q1) + scale(&r, q2 * t.dot(&r));
        let mut field = PatchField {
            t1: along(&t1),
            t2: along(&t2),
        };
        if !image {
            return field;
        }

        if self.ground.is_perfect() {
            field.t1 = -field.t1;
            field.t2 = -field.t2;
            return field;
        }
        let (px, py, cth) = match incidence_normal(r.x, r.y) {
            Some((px, py)) => (px, py, r.z / r.x.hypot(r.y).hypot(r.z)),
            None => (0.0, 0.0, 1.0),
        };
        let (rv, rh) = fresnel(self.ground.zrati, cth);
        let rrv = -rv;
        let reflect = |e: C3| {
            let edp = (e.x * px + e.y * py) * (rh - rrv);
            C3::new(e.x * rrv + edp * px, e.y * rrv + edp * py, e.z * rrv)
        };
        field.t1 = reflect(field.t1);
        field.t2 = reflect(field.t2);
        field
    }

    /// H field at `obs` of the patch currents, including the ground image.
    #[must_use]
    pub fn patch_h(&self, patch: &Patch, obs: &R3) -> PatchField {
        let rx = obs.x - patch.center.x;
        let ry = obs.y - patch.center.y;
        let mut total = PatchField::default();

        for pass in 0..self.passes() {
            let image = pass == 1;
            let rfl = if image { -1.0 } else { 1.0 };
            let rz = obs.z - patch.center.z * rfl;
            let rsq = rx * rx + ry * ry + rz * rz;
            if rsq < 1.0e-20 {
                continue;
            }
            let r = rsq.sqrt();
            let rk = TWO_PI * r;
            let (sr, cr) = rk.sin_cos();
            let gam = -(CScalar::new(cr, -sr) + rk * CScalar::new(sr, cr)) / (FOUR_PI * rsq * r) * patch.area;
            let e = C3::new(gam * rx, gam * ry, gam * rz);
            let t1 = R3::new(patch.t1.x, patch.t1.y, patch.t1.z * rfl);
            let t2 = R3::new(patch.t2.x, patch.t2.y, patch.t2.z * rfl);
            let cross = |t: &R3| {
                C3::new(
                    e.y * t.z - e.z * t.y,
                    e.z * t.x - e.x * t.z,
                    e.x * t.y - e.y * t.x,
                )
            };
            let mut f1 = cross(&t1);
            let mut f2 = cross(&t2);

            if image {
                if self.ground.is_perfect() {
                    f1 = -f1;
                    f2 = -f2;
                } else {
                    let (px, py, cth) = match incidence_normal(rx, ry) {
                        Some((px, py)) => (px, py, rz / r),
                        None => (0.0, 0.0, 1.0),
                    };
                    let (rv, rrh) = fresnel(self.ground.zrati, cth);
                    let rrv = -rv;
                    let reflect = |f: C3| {
                        let g = (f.x * px + f.y * py) * (rrv - rrh);
                        C3::new(f.x * rrh + g * px, f.y * rrh + g * py, f.z * rrh)
                    };
                    f1 = reflect(f1);
                    f2 = reflect(f2);
                }
            }
            total.t1 += f1;
            total.t2 += f2;
        }
        total
    }

    /// Tangential field along `dir` at `obs` (a segment centre) from a patch
    /// that has been split into four children around a wire junction.
    /// `patch` is the first child, the one lying along `+t1` and `+t2` from
    /// the junction.
    #[must_use]
    pub fn patch_junction_e(&self, patch: &Patch, obs: &R3, dir: &R3) -> PatchJunctionField {
        let d = 0.5 * patch.area.sqrt();
        let ds = 4.0 * d / JUNCTION_GRID as Scalar;
        let da = ds * ds;
        let gcon = 1.0 / patch.area;
        let fcon = 1.0 / (2.0 * TWO_PI * d);

        let mut out = PatchJunctionField::default();
        let corner = patch.center + (patch.t1 + patch.t2) * (d + 0.5 * ds);
        let mut s1 = 2.0 * d + 0.5 * ds;
        let mut row = corner;
        for _ in 0..JUNCTION_GRID {
            s1 -= ds;
            row -= patch.t1 * ds;
            let mut s2 = 2.0 * d + 0.5 * ds;
            let mut at = row;
            for _ in 0..JUNCTION_GRID {
                s2 -= ds;
                at -= patch.t2 * ds;
                let field = self.dipole_e(&at, &patch.t1, &patch.t2, da, obs, false);
                let ek = cdot(&field.t1, dir);
                let es = cdot(&field.t2, dir);

                let weights = [
                    (d + s1) * (d + s2) * gcon,
                    (d - s1) * (d + s2) * gcon,
                    (d - s1) * (d - s2) * gcon,
                    (d + s1) * (d - s2) * gcon,
                ];
                let [g1, g2, g3, g4] = weights;
                let f = (s1 * s1 + s2 * s2) * TWO_PI;
                let f1 = s1 / f - (g1 - g2 - g3 + g4) * fcon;
                let f2 = s2 / f - (g1 + g2 - g3 - g4) * fcon;
                for (k, g) in weights.iter().enumerate() {
                    out.t1[k] += ek * *g;
                    out.t2[k] += es * *g;
                }
                out.junction += ek * f1 + es * f2;
            }
        }
        out
    }
}
