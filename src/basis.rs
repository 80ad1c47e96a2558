//! Current expansion functions at wire junctions.
//!
//! On every segment the current is expanded as `A + B·sin(k·s) + C·cos(k·s)`
//! with `s` measured from the segment centre. The basis function centred on
//! segment `i` spills onto each segment sharing a junction with `i`, vanishing
//! at their far ends. The coefficients come from closed-form solutions of the
//! continuity conditions on current and charge at each junction and from an
//! end-cap condition at open ends.
//!
//! All functions expect a geometry scaled to wavelength units.

use crate::constants::PI;
use crate::errors::{NecError, Result};
use crate::geometry::{Connection, Geometry, SegmentEnd};
use crate::math::Scalar;

/// One segment's share of a basis function.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasisTerm {
    /// Segment index the coefficients refer to.
    pub segment: usize,
    /// Constant coefficient.
    pub a: Scalar,
    /// Sine coefficient.
    pub b: Scalar,
    /// Cosine coefficient.
    pub c: Scalar,
}

/// A segment end that meets a junction of some other segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionMember {
    /// Segment index.
    pub segment: usize,
    /// Which of its ends touches the junction.
    pub end: SegmentEnd,
    /// `+1` when the member continues in the direction of the reference
    /// segment, `-1` when it is reversed.
    pub sign: Scalar,
    /// True for the image of the reference segment in a ground plane or patch.
    pub image: bool,
}

/// Walks the junction at `end` of segment `i` and returns the other segment
/// ends that meet there.
///
/// A ground or patch connection yields the segment's own image. The chain
/// must close on `i`; an open or malformed chain is a connectivity error.
pub fn junction_members(geom: &Geometry, i: usize, end: SegmentEnd) -> Result<Vec<JunctionMember>> {
    let broken = || NecError::Connectivity(format!("segment connection error for segment {}", i + 1));
    let mut next = match geom.segments[i].connection(end) {
        Connection::Free => return Ok(Vec::new()),
        Connection::Ground | Connection::Patch(_) => {
            return Ok(vec![JunctionMember {
                segment: i,
                end: end.opposite(),
                sign: 1.0,
                image: true,
            }])
        }
        Connection::Segment { index, end } => (index, end),
    };

    let mut members = Vec::new();
    for _ in 0..=geom.segments.len() {
        let (k, touched) = next;
        members.push(JunctionMember {
            segment: k,
            end: touched,
            sign: if touched == end { -1.0 } else { 1.0 },
            image: false,
        });
        match geom.segments[k].connection(touched) {
            Connection::Segment { index, .. } if index == i => return Ok(members),
            Connection::Segment { index, end } => next = (index, end),
            _ => return Err(broken()),
        }
    }
    Err(broken())
}

#[derive(Debug, Clone, Copy)]
struct Factors {
    sdh: Scalar,
    cdh: Scalar,
    sd: Scalar,
    omc: Scalar,
    aj: Scalar,
}

impl Factors {
    fn of(geom: &Geometry, k: usize) -> Self {
        let seg = &geom.segments[k];
        let d = PI * seg.length;
        let (sdh, cdh) = d.sin_cos();
        let sd = 2.0 * sdh * cdh;
        let omc = if d <= 0.015 {
            let x = 4.0 * d * d;
            ((1.388_888_9e-3 * x - 4.166_666_666_7e-2) * x + 0.5) * x
        } else {
            1.0 - cdh * cdh + sdh * sdh
        };
        let aj = 1.0 / ((1.0 / (PI * seg.radius)).ln() - 0.577_215_664);
        Self { sdh, cdh, sd, omc, aj }
    }

    fn cd(&self) -> Scalar {
        self.cdh * self.cdh - self.sdh * self.sdh
    }

    /// Unscaled coefficients of a junction member.
    fn member(&self, m: &JunctionMember) -> (Scalar, Scalar, Scalar) {
        let b = self.aj / (2.0 * self.cdh);
        (
            self.aj / self.sd * m.sign,
            if m.image { -b } else { b },
            -self.aj / (2.0 * self.sdh) * m.sign,
        )
    }
}

/// End-cap factor of an open wire end.
fn end_cap(radius: Scalar) -> Scalar {
    let qp = PI * radius;
    let q2 = qp * qp;
    qp * (1.0 - 0.5 * q2) / (1.0 - q2)
}

struct Walk {
    end1: Vec<(JunctionMember, Factors)>,
    end2: Vec<(JunctionMember, Factors)>,
    pm: Scalar,
    pp: Scalar,
}

fn walk(geom: &Geometry, i: usize) -> Result<Walk> {
    let collect = |end| -> Result<(Vec<(JunctionMember, Factors)>, Scalar)> {
        let members = junction_members(geom, i, end)?;
        let mut p = 0.0;
        let out = members
            .into_iter()
            .map(|m| {
                let f = Factors::of(geom, m.segment);
                p -= f.omc / f.sd * f.aj;
                (m, f)
            })
            .collect();
        Ok((out, p))
    };
    let (end1, p1) = collect(SegmentEnd::Start)?;
    let (end2, pp) = collect(SegmentEnd::End)?;
    Ok(Walk {
        end1,
        end2,
        pm: -p1,
        pp,
    })
}

/// Full basis function centred on segment `i`.
///
/// Returns the terms on every junction member followed by the term on `i`
/// itself. With `end_caps` false the open-end condition forces zero current
/// at a free end; with it true the end-cap charge is modelled.
pub fn full_basis(geom: &Geometry, i: usize, end_caps: bool) -> Result<Vec<BasisTerm>> {
    let w = walk(geom, i)?;
    let own = Factors::of(geom, i);
    let (sdh, cdh, sd, omc) = (own.sdh, own.cdh, own.sd, own.omc);
    let cd = own.cd();
    let ap = own.aj;
    let aj = ap;
    let xxi = if end_caps {
        end_cap(geom.segments[i].radius)
    } else {
        0.0
    };

    let mut terms: Vec<BasisTerm> = Vec::with_capacity(w.end1.len() + w.end2.len() + 1);
    let mut push = |list: &[(JunctionMember, Factors)], sa: Scalar, sb: Scalar, sc: Scalar| {
        for (m, f) in list {
            let (a, b, c) = f.member(m);
            terms.push(BasisTerm {
                segment: m.segment,
                a: a * sa,
                b: b * sb,
                c: c * sc,
            });
        }
    };

    let (bx, cx) = match (w.end1.is_empty(), w.end2.is_empty()) {
        (true, true) => (0.0, 1.0 / (cdh - xxi * sdh)),
        (true, false) => {
            let qp = -(omc + xxi * sd) / (sd * (ap + xxi * w.pp) + cd * (xxi * ap - w.pp));
            let d = cd - xxi * sd;
            push(&w.end2, -qp, qp, -qp);
            (
                (sdh + ap * qp * (cdh - xxi * sdh)) / d,
                (cdh + ap * qp * (sdh + xxi * cdh)) / d,
            )
        }
        (false, true) => {
            let qm = (omc + xxi * sd) / (sd * (aj - xxi * w.pm) + cd * (w.pm + xxi * aj));
            let d = cd - xxi * sd;
            push(&w.end1, qm, qm, qm);
            (
                (aj * qm * (cdh - xxi * sdh) - sdh) / d,
                (cdh - aj * qm * (sdh + xxi * cdh)) / d,
            )
        }
        (false, false) => {
            let (pm, pp) = (w.pm, w.pp);
            let den = sd * (pm * pp + aj * ap) + cd * (pm * ap - pp * aj);
            let qm = (ap * omc - pp * sd) / den;
            let qp = -(aj * omc + pm * sd) / den;
            push(&w.end1, qm, qm, qm);
            push(&w.end2, -qp, qp, -qp);
            ((aj * qm + ap * qp) * sdh / sd, (aj * qm - ap * qp) * cdh / sd)
        }
    };
    terms.push(BasisTerm {
        segment: i,
        a: -1.0,
        b: bx,
        c: cx,
    });
    Ok(terms)
}

/// Part of the basis function centred on segment `i` that lies on segment
/// `is`, with end caps modelled. Returns `(a, b, c)`, all zero when the two
/// segments do not share a junction.
pub fn local_basis(geom: &Geometry, i: usize, is: usize) -> Result<(Scalar, Scalar, Scalar)> {
    let w = walk(geom, i)?;
    let (mut aa, mut bb, mut cc) = (0.0, 0.0, 0.0);
    let mut june = 0;
    for (side, list) in [(-1, &w.end1), (1, &w.end2)] {
        for (m, f) in list {
            if m.segment == is {
                (aa, bb, cc) = f.member(m);
                june = side;
            }
        }
    }

    let own = Factors::of(geom, i);
    let (sdh, cdh, sd, omc) = (own.sdh, own.cdh, own.sd, own.omc);
    let cd = own.cd();
    let ap = own.aj;
    let aj = ap;
    let xxi = end_cap(geom.segments[i].radius);

    match (w.end1.is_empty(), w.end2.is_empty()) {
        (true, true) => Ok((-1.0, 0.0, 1.0 / (cdh - xxi * sdh))),
        (true, false) => {
            let qp = -(omc + xxi * sd) / (sd * (ap + xxi * w.pp) + cd * (xxi * ap - w.pp));
            if june == 1 {
                aa = -aa * qp;
                bb *= qp;
                cc = -cc * qp;
                if i != is {
                    return Ok((aa, bb, cc));
                }
            }
            let d = cd - xxi * sd;
            Ok((
                aa - 1.0,
                bb + (sdh + ap * qp * (cdh - xxi * sdh)) / d,
                cc + (cdh + ap * qp * (sdh + xxi * cdh)) / d,
            ))
        }
        (false, true) => {
            let qm = (omc + xxi * sd) / (sd * (aj - xxi * w.pm) + cd * (w.pm + xxi * aj));
            if june == -1 {
                aa *= qm;
                bb *= qm;
                cc *= qm;
                if i != is {
                    return Ok((aa, bb, cc));
                }
            }
            let d = cd - xxi * sd;
            Ok((
                aa - 1.0,
                bb + (aj * qm * (cdh - xxi * sdh) - sdh) / d,
                cc + (cdh - aj * qm * (sdh + xxi * cdh)) / d,
            ))
        }
        (false, false) => {
            let (pm, pp) = (w.pm, w.pp);
            let den = sd * (pm * pp + aj * ap) + cd * (pm * ap - pp * aj);
            let qm = (ap * omc - pp * sd) / den;
            let qp = -(aj * omc + pm * sd) / den;
            if june != 0 {
                if june < 0 {
                    aa *= qm;
                    bb *= qm;
                    cc *= qm;
                } else {
                    aa = -aa * qp;
                    bb *= qp;
                    cc = -cc * qp;
                }
                if i != is {
                    return Ok((aa, bb, cc));
                }
            }
            Ok((
                aa - 1.0,
                bb + (aj * qm + ap * qp) * sdh / sd,
                cc + (aj * qm - ap * qp) * cdh / sd,
            ))
        }
    }
}

/// Every basis function with support on segment `j`: the neighbours' functions
/// first (end 1 chain, then end 2 chain), then `j`'s own.
///
/// The coefficients describe the current each function carries on `j`, so
/// this is what the matrix fill needs when `j` acts as a source.
pub fn segment_trio(geom: &Geometry, j: usize) -> Result<Vec<BasisTerm>> {
    let mut terms = Vec::new();
    for end in SegmentEnd::BOTH {
        if !matches!(geom.segments[j].connection(end), Connection::Segment { .. }) {
            continue;
        }
        for m in junction_members(geom, j, end)? {
            let (a, b, c) = local_basis(geom, m.segment, j)?;
            terms.push(BasisTerm {
                segment: m.segment,
                a,
                b,
                c,
            });
        }
    }
    let (a, b, c) = local_basis(geom, j, j)?;
    terms.push(BasisTerm { segment: j, a, b, c });
    Ok(terms)
}

/// Basis function of a current-discontinuity source on segment `i`: the
/// full basis with the start end treated as open and no end cap.
pub fn discontinuity_basis(geom: &Geometry, i: usize) -> Result<Vec<BasisTerm>> {
    let mut freed = geom.clone();
    freed.segments[i].connections[SegmentEnd::Start.index()] = Connection::Free;
    full_basis(&freed, i, false)
}

/// Basis data of a scaled geometry, computed once per frequency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasisSet {
    /// `segment_trio` of every segment.
    pub trio: Vec<Vec<BasisTerm>>,
    /// `full_basis` (with end caps) of every segment.
    pub full: Vec<Vec<BasisTerm>>,
}

impl BasisSet {
    /// Synthesizes all basis functions of `geom`.
    pub fn new(geom: &Geometry) -> Result<Self> {
        let n = geom.segment_count();
        let trio = (0..n)
            .map(|j| segment_trio(geom, j))
            .collect::<Result<Vec<_>>>()?;
        let full = (0..n)
            .map(|i| full_basis(geom, i, true))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { trio, full })
    }

    /// Largest number of functions overlapping one segment.
    #[must_use]
    pub fn max_overlap(&self) -> usize {
        self.trio.iter().map(Vec::len).max().unwrap_or(0)
    }
}
