//! Magnetic field of a wire segment, used for patch observation points and
//! near-field requests.

use crate::math::{complexify, scale, Scalar, C3, R3};

use super::kernel::segment_h;
use super::wire::{SegmentField, SourceSegment};
use super::{fresnel, incidence_normal, FieldEvaluator};

impl FieldEvaluator<'_> {
    /// H field at `obs` due to the source segment with its ground image.
    ///
    /// Any finite ground is treated with reflection coefficients; the
    /// Sommerfeld correction applies only to the electric field.
    pub fn wire_h(&mut self, src: &SourceSegment, obs: &R3, ai: Scalar) -> SegmentField {
        let xij = obs.x - src.center.x;
        let yij = obs.y - src.center.y;
        let mut total = SegmentField::default();

        for pass in 0..self.passes() {
            let image = pass == 1;
            let rfl = if image { -1.0 } else { 1.0 };
            let dir = R3::new(src.direction.x, src.direction.y, src.direction.z * rfl);
            let zij = obs.z - rfl * src.center.z;
            let d = R3::new(xij, yij, zij);
            let zp = d.dot(&dir);
            let rho = d - dir * zp;
            let rh = (rho.norm_squared() + ai * ai).sqrt();
            if rh <= 1.0e-10 {
                continue;
            }
            let phi = dir.cross(&(rho / rh));
            let hp = segment_h(src.length, rh, zp);
            if hp.limited {
                self.limited_steps += 1;
            }

            if !image {
                total = SegmentField {
                    constant: scale(&phi, hp.constant),
                    sine: scale(&phi, hp.sine),
                    cosine: scale(&phi, hp.cosine),
                };
                continue;
            }

            let q = if self.ground.is_perfect() {
                complexify(&phi)
            } else {
                let mut zratx = self.ground.zrati;
                if let Some(screen) = &self.ground.screen {
                    let zsum = obs.z + src.center.z;
                    let xspec = (obs.x * src.center.z + obs.z * src.center.x) / zsum;
                    let yspec = (obs.y * src.center.z + obs.z * src.center.y) / zsum;
                    let rhospc = (xspec * xspec + yspec * yspec + screen.t2 * screen.t2).sqrt();
                    zratx = screen.impedance_ratio(rhospc, self.ground.zrati);
                }
                let rmag = (zp * zp + rh * rh).sqrt();
                let (px, py, cth) = match incidence_normal(xij, yij) {
                    Some((px, py)) => (px, py, zij / rmag),
                    None => (0.0, 0.0, 1.0),
                };
                let (rv, rh_coef) = fresnel(zratx, cth);
                let rrh = -rh_coef;
                let qp = (phi.x * px + phi.y * py) * (rv - rrh);
                C3::new(qp * px + phi.x * rrh, qp * py + phi.y * rrh, phi.z * rrh)
            };
            total.constant -= q * hp.constant;
            total.sine -= q * hp.sine;
            total.cosine -= q * hp.cosine;
        }
        total
    }
}
