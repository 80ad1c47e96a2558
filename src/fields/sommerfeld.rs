//! Ground-wave correction for a Sommerfeld/Norton ground.
//!
//! Near the interface the correction is the interpolated Sommerfeld field
//! integrated along the source segment. Farther away the Norton asymptotic
//! fields of a current element at the segment centre are used.

use std::f64::consts::FRAC_PI_2;

use crate::constants::{CONST1, PI, ROMBERG_MAX_STEPS, TWO_PI};
use crate::ground::{ground_wave, NortonPath};
use crate::math::{relative_difference, CScalar, Scalar, C3, C_ZERO, R3};

use super::romberg::integrate;
use super::wire::{SegmentField, SourceSegment};
use super::FieldEvaluator;

/// Squared distance to the image within which the interpolated table is
/// integrated along the segment.
const TABLE_RANGE_SQ: Scalar = 0.95;

/// Observer geometry shared by the samples along one source segment.
struct ObserverFrame {
    observer: R3,
    /// Horizontal fraction of the segment direction.
    sn: Scalar,
    xsn: Scalar,
    ysn: Scalar,
}

impl FieldEvaluator<'_> {
    /// Ground-wave field at `obs`. `direct` is the constant-current field
    /// already computed, used to scale the integration tolerance.
    pub(super) fn sommerfeld_correction(
        &mut self,
        src: &SourceSegment,
        obs: &R3,
        ai: Scalar,
        direct: &C3,
    ) -> SegmentField {
        let dir = src.direction;
        let (sn, xsn, ysn) = {
            let sn = dir.x.hypot(dir.y);
            if sn >= 1.0e-5 {
                (sn, dir.x / sn, dir.y / sn)
            } else {
                (0.0, 1.0, 0.0)
            }
        };

        // Displace the observer by the wire radius for the thin-wire form.
        let xij = obs.x - src.center.x;
        let yij = obs.y - src.center.y;
        let zij = obs.z + src.center.z;
        let salpr = -dir.z;
        let normal = R3::new(dir.y * zij - salpr * yij, salpr * xij - dir.x * zij, dir.x * yij - dir.y * xij);
        let nsq = normal.norm_squared();
        let observer = if nsq <= 1.0e-10 {
            R3::new(obs.x - ai * ysn, obs.y + ai * xsn, obs.z)
        } else {
            let mut rh = ai / nsq.sqrt();
            if normal.z < 0.0 {
                rh = -rh;
            }
            obs + normal * rh
        };
        let frame = ObserverFrame {
            observer,
            sn,
            xsn,
            ysn,
        };

        let r = xij * xij + yij * yij + zij * zij;
        if r <= TABLE_RANGE_SQ {
            let dmin = 0.01 * direct.iter().map(|c| c.norm_sqr()).sum::<Scalar>().sqrt();
            let shaf = 0.5 * src.length;
            let q = integrate(
                -shaf,
                shaf,
                1.0e4 * ROMBERG_MAX_STEPS as Scalar,
                |t| self.table_sample(src, &frame, t),
                |coarse, fine| {
                    let (tr, _) = relative_difference(
                        CScalar::new(leading_norm(coarse), 0.0),
                        CScalar::new(leading_norm(fine), 0.0),
                        dmin,
                    );
                    tr <= 1.0e-4
                },
            );
            if q.limited {
                self.limited_steps += 1;
            }
            return unpack(&q.value);
        }

        let mut field = unpack(&self.norton_sample(src, &frame));
        let axis = R3::new(dir.x, dir.y, salpr);
        let zp = xij * dir.x + yij * dir.y + zij * salpr;
        let rh = r - zp * zp;
        let dmin = if rh <= 1.0e-10 { 0.0 } else { (rh / (rh + ai * ai)).sqrt() };
        if dmin <= 0.95 {
            let px = 1.0 - dmin;
            field = field.map(|v| {
                let along = (v.x * axis.x + v.y * axis.y + v.z * axis.z) * px;
                v * CScalar::from(dmin) + C3::new(along * axis.x, along * axis.y, along * axis.z)
            });
        }
        field
    }

    /// Interpolated field of the current element at `t` along the segment.
    fn table_sample(&mut self, src: &SourceSegment, frame: &ObserverFrame, t: Scalar) -> [CScalar; 9] {
        let geo = SampleGeometry::new(src, frame, t);
        let thet = if geo.rho >= 1.0e-12 {
            (geo.zph / geo.rho).atan()
        } else {
            FRAC_PI_2
        };
        let Some(interp) = self.interpolator.as_mut() else {
            return [C_ZERO; 9];
        };
        let [erv, ezv, erh, eph] = interp.interpolate(geo.r2, thet);
        let xx2 = geo.xx2 / geo.r2;
        let sfac = frame.sn * geo.cph;
        let salpj = src.direction.z;
        let erh = xx2 * (salpj * erv + sfac * erh);
        let ezh = xx2 * (salpj * ezv - sfac * erv);
        let eph = frame.sn * geo.sph * xx2 * eph;

        let constant = [
            erh * geo.rhx + eph * geo.phx,
            erh * geo.rhy + eph * geo.phy,
            ezh,
        ];
        let (sk, ck) = (TWO_PI * t).sin_cos();
        [
            constant[0],
            constant[1],
            constant[2],
            constant[0] * sk,
            constant[1] * sk,
            constant[2] * sk,
            constant[0] * ck,
            constant[1] * ck,
            constant[2] * ck,
        ]
    }

    /// Norton field of the whole segment lumped at its centre.
    fn norton_sample(&self, src: &SourceSegment, frame: &ObserverFrame) -> [CScalar; 9] {
        let geo = SampleGeometry::new(src, frame, 0.0);
        let path = NortonPath {
            zmh: 1.0,
            r1: 1.0,
            xx1: C_ZERO,
            zph: geo.zph,
            r2: geo.r2,
            xx2: geo.xx2,
        };
        let ground = ground_wave(&path, self.ground.wave_ratio());

        let rhs = geo.rho * geo.rho;
        let zphs = geo.zph * geo.zph;
        let r2s = rhs + zphs;
        let rk = geo.r2 * TWO_PI;
        let et = -CONST1 * self.ground.frati * geo.xx2 / (r2s * geo.r2);
        let er = 2.0 * et * CScalar::new(1.0, rk);
        let et = et * CScalar::new(1.0 - rk * rk, rk);
        let hrv = (er + et) * geo.rho * geo.zph / r2s;
        let hzv = (zphs * er - rhs * et) / r2s;
        let hrh = (rhs * er - zphs * et) / r2s;

        let salpj = src.direction.z;
        let erv = (ground.erv - hrv) * salpj;
        let ezv = (ground.ezv - hzv) * salpj;
        let erh = (ground.erh + hrh) * frame.sn * geo.cph;
        let ezh = (ground.ezh + hrv) * frame.sn * geo.cph;
        let eph = (ground.eph + et) * frame.sn * geo.sph;
        let erh = erv + erh;

        let s = src.length;
        let constant = [
            (erh * geo.rhx + eph * geo.phx) * s,
            (erh * geo.rhy + eph * geo.phy) * s,
            (ezv + ezh) * s,
        ];
        let sinc = (PI * s).sin() / (PI * s);
        [
            constant[0],
            constant[1],
            constant[2],
            C_ZERO,
            C_ZERO,
            C_ZERO,
            constant[0] * sinc,
            constant[1] * sinc,
            constant[2] * sinc,
        ]
    }
}

/// Horizontal frame and image distance for a current element at `t`.
struct SampleGeometry {
    rho: Scalar,
    rhx: Scalar,
    rhy: Scalar,
    phx: Scalar,
    phy: Scalar,
    cph: Scalar,
    sph: Scalar,
    zph: Scalar,
    r2: Scalar,
    xx2: CScalar,
}

impl SampleGeometry {
    fn new(src: &SourceSegment, frame: &ObserverFrame, t: Scalar) -> Self {
        let at = src.center + src.direction * t;
        let dx = frame.observer.x - at.x;
        let dy = frame.observer.y - at.y;
        let rho = dx.hypot(dy);
        let (rhx, rhy, phx, phy) = if rho <= 0.0 {
            (1.0, 0.0, 0.0, 1.0)
        } else {
            let (rhx, rhy) = (dx / rho, dy / rho);
            (rhx, rhy, -rhy, rhx)
        };
        let snap = |v: Scalar| if v.abs() < 1.0e-10 { 0.0 } else { v };
        let cph = snap(rhx * frame.xsn + rhy * frame.ysn);
        let sph = snap(rhy * frame.xsn - rhx * frame.ysn);
        let zph = frame.observer.z + at.z;
        let r2 = (rho * rho + zph * zph).sqrt();
        let rk = r2 * TWO_PI;
        Self {
            rho,
            rhx,
            rhy,
            phx,
            phy,
            cph,
            sph,
            zph,
            r2,
            xx2: CScalar::new(rk.cos(), -rk.sin()),
        }
    }
}

/// Euclidean norm of the constant-current components of a sample.
fn leading_norm(v: &[CScalar; 9]) -> Scalar {
    v[..3].iter().map(|c| c.norm_sqr()).sum::<Scalar>().sqrt()
}

fn unpack(v: &[CScalar; 9]) -> SegmentField {
    SegmentField {
        constant: C3::new(v[0], v[1], v[2]),
        sine: C3::new(v[3], v[4], v[5]),
        cosine: C3::new(v[6], v[7], v[8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::{FiniteGround, GroundMethod, GroundParameters, GroundSpec, GroundTable};

    fn sommerfeld_ground() -> (GroundParameters, GroundTable) {
        let spec = GroundSpec::Finite(FiniteGround {
            epsr: 10.0,
            sig: 0.01,
            method: GroundMethod::Sommerfeld,
            screen: None,
            second_medium: None,
        });
        let params = GroundParameters::new(&spec, 10.0).unwrap();
        let table = GroundTable::build(params.epsc);
        (params, table)
    }

    #[test]
    fn near_and_far_corrections_are_finite() {
        let (params, table) = sommerfeld_ground();
        let mut eval = FieldEvaluator::new(&params, Some(&table), 1.0, false).unwrap();
        let src = SourceSegment {
            center: R3::new(0.0, 0.0, 0.1),
            direction: R3::z(),
            length: 0.05,
            radius: 0.001,
            smooth_ends: [true, true],
        };
        for obs in [R3::new(0.2, 0.0, 0.1), R3::new(3.0, 0.5, 0.2)] {
            let f = eval.wire_e(&src, &obs, 0.001, false);
            for v in [f.constant, f.sine, f.cosine] {
                assert!(v.iter().all(|c| c.re.is_finite() && c.im.is_finite()));
            }
            assert!(f.constant.norm() > 0.0);
        }
    }

    #[test]
    fn norton_branch_has_no_sine_field() {
        let (params, table) = sommerfeld_ground();
        let eval = FieldEvaluator::new(&params, Some(&table), 1.0, false).unwrap();
        let src = SourceSegment {
            center: R3::new(0.0, 0.0, 0.1),
            direction: R3::x(),
            length: 0.05,
            radius: 0.001,
            smooth_ends: [true, true],
        };
        let frame = ObserverFrame {
            observer: R3::new(2.0, 1.0, 0.1),
            sn: 1.0,
            xsn: 1.0,
            ysn: 0.0,
        };
        let v = eval.norton_sample(&src, &frame);
        assert!(v[3..6].iter().all(|c| *c == C_ZERO));
        assert!(leading_norm(&v) > 0.0);
    }
}
