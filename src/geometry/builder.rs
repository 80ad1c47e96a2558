use crate::constants::{TO_RAD, TWO_PI};
use crate::errors::{NecError, Result};
use crate::math::{Scalar, R3};

use super::connect;
use super::transform::{reflect_point, Rotation};
use super::{Geometry, Patch, Segment};

/// Accumulates wires and patches in metres, then resolves connectivity.
///
/// Each method appends to (or transforms) the tables built so far, in the
/// order the commands are given.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeometryBuilder {
    segments: Vec<Segment>,
    patches: Vec<Patch>,
}

fn check_tag_and_count(tag: u32, ns: usize) -> Result<()> {
    if tag == 0 {
        return Err(NecError::Geometry("tag number is less than 1".into()));
    }
    if ns == 0 {
        return Err(NecError::Geometry("number of segments is less than 1".into()));
    }
    Ok(())
}

fn lies_in_plane(e1: Scalar, e2: Scalar) -> bool {
    e1.abs() + e2.abs() <= 1.0e-5 || e1 * e2 < -1.0e-6
}

impl GeometryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments generated so far.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Patches generated so far.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Straight wire of `ns` segments from `p1` to `p2`.
    ///
    /// `rdel` is the ratio of successive segment lengths and `rrad` the ratio
    /// of successive radii; both are 1 for a uniform wire. A zero radius
    /// requires [`tapered_wire`](Self::tapered_wire).
    pub fn wire(
        &mut self,
        tag: u32,
        ns: usize,
        p1: R3,
        p2: R3,
        radius: Scalar,
        rdel: Scalar,
        rrad: Scalar,
    ) -> Result<&mut Self> {
        check_tag_and_count(tag, ns)?;
        if radius == 0.0 {
            return Err(NecError::Geometry("no taper data for tapered wire".into()));
        }
        let d = p2 - p1;
        let (step, mut delz, rd) = if (rdel - 1.0).abs() >= 1.0e-6 {
            let len = d.norm();
            let delz = len * (1.0 - rdel) / (1.0 - rdel.powi(ns as i32));
            (d / len, delz, rdel)
        } else {
            (d / ns as Scalar, 1.0, 1.0)
        };

        let mut rad = radius;
        let mut s1 = p1;
        for _ in 0..ns {
            let s2 = s1 + step * delz;
            self.segments.push(Segment::from_ends(tag, s1, s2, rad));
            delz *= rd;
            rad *= rrad;
            s1 = s2;
        }
        if let Some(last) = self.segments.last_mut() {
            last.end = p2;
            last.update_derived();
        }
        Ok(self)
    }

    /// Wire whose radius tapers geometrically from `rad1` to `rad2`.
    pub fn tapered_wire(
        &mut self,
        tag: u32,
        ns: usize,
        p1: R3,
        p2: R3,
        rdel: Scalar,
        rad1: Scalar,
        rad2: Scalar,
    ) -> Result<&mut Self> {
        if rad1 == 0.0 || rad2 == 0.0 {
            return Err(NecError::Geometry("taper radii must not be zero".into()));
        }
        let rrad = if ns > 1 {
            (rad2 / rad1).powf(1.0 / (ns as Scalar - 1.0))
        } else {
            1.0
        };
        self.wire(tag, ns, p1, p2, rad1, rdel, rrad)
    }

    /// Circular arc of `ns` segments in the x-z plane, centred on the origin.
    /// Angles are in degrees measured from the x axis.
    pub fn arc(
        &mut self,
        tag: u32,
        ns: usize,
        arc_radius: Scalar,
        ang1: Scalar,
        ang2: Scalar,
        radius: Scalar,
    ) -> Result<&mut Self> {
        check_tag_and_count(tag, ns)?;
        if (ang2 - ang1).abs() >= 360.000_01 {
            return Err(NecError::Geometry("arc angle exceeds 360 degrees".into()));
        }
        let mut ang = ang1 * TO_RAD;
        let dang = (ang2 - ang1) * TO_RAD / ns as Scalar;
        let mut s1 = R3::new(arc_radius * ang.cos(), 0.0, arc_radius * ang.sin());
        for _ in 0..ns {
            ang += dang;
            let s2 = R3::new(arc_radius * ang.cos(), 0.0, arc_radius * ang.sin());
            self.segments.push(Segment::from_ends(tag, s1, s2, radius));
            s1 = s2;
        }
        Ok(self)
    }

    /// Helix (or flat spiral when `length` is zero) along the z axis.
    ///
    /// `spacing` is the turn spacing, `length` the total length, `(a1, b1)` the
    /// x/y radii at z = 0 and `(a2, b2)` at z = `length`. Zero `b` radii
    /// default to the matching `a` radius.
    #[allow(clippy::too_many_arguments)]
    pub fn helix(
        &mut self,
        tag: u32,
        ns: usize,
        spacing: Scalar,
        length: Scalar,
        a1: Scalar,
        b1: Scalar,
        a2: Scalar,
        b2: Scalar,
        radius: Scalar,
    ) -> Result<&mut Self> {
        check_tag_and_count(tag, ns)?;
        if spacing == 0.0 {
            return Err(NecError::Geometry("helix turn spacing is zero".into()));
        }
        let b1 = if b1 == 0.0 { a1 } else { b1 };
        let b2 = if b2 == 0.0 { a2 } else { b2 };
        let (hl, tsp) = if length < 0.0 {
            (-length, -spacing)
        } else {
            (length, spacing)
        };

        if hl != 0.0 {
            let zinc = hl / ns as Scalar;
            let point = |z: Scalar| {
                let (a, b) = if a2 == a1 {
                    (a1, b1)
                } else {
                    (a1 + (a2 - a1) * z / hl, b1 + (b2 - b1) * z / hl)
                };
                let phase = TWO_PI * z / tsp;
                R3::new(a * phase.cos(), b * phase.sin(), z)
            };
            for i in 0..ns {
                let z1 = i as Scalar * zinc;
                let z2 = z1 + zinc;
                self.segments
                    .push(Segment::from_ends(tag, point(z1), point(z2), radius));
            }
        } else {
            let dphi = TWO_PI / tsp;
            let da = (a1 - a2) / ns as Scalar;
            let db = (b1 - b2) / ns as Scalar;
            let (mut a, mut b, mut phi) = (a1, b1, 0.0_f64);
            for _ in 0..ns {
                let s1 = R3::new(a * phi.cos(), b * phi.sin(), 0.0);
                a -= da;
                b -= db;
                phi += dphi;
                let s2 = R3::new(a * phi.cos(), b * phi.sin(), 0.0);
                self.segments.push(Segment::from_ends(tag, s1, s2, radius));
            }
        }
        Ok(self)
    }

    /// Single patch of arbitrary shape: centre, outward normal given by
    /// elevation and azimuth in degrees, and area.
    pub fn arbitrary_patch(
        &mut self,
        center: R3,
        elevation_deg: Scalar,
        azimuth_deg: Scalar,
        area: Scalar,
    ) -> Result<&mut Self> {
        let (el, az) = (elevation_deg * TO_RAD, azimuth_deg * TO_RAD);
        let normal = R3::new(el.cos() * az.cos(), el.cos() * az.sin(), el.sin());
        let xa = normal.x.hypot(normal.y);
        let t1 = if xa >= 1.0e-6 {
            R3::new(-normal.y / xa, normal.x / xa, 0.0)
        } else {
            R3::x()
        };
        self.patches.push(Patch {
            center,
            t1,
            t2: normal.cross(&t1),
            area,
            handedness: 1.0,
        });
        Ok(self)
    }

    /// Rectangular patch with consecutive corners `c1`, `c2`, `c3`.
    pub fn rectangular_patch(&mut self, c1: R3, c2: R3, c3: R3) -> Result<&mut Self> {
        let patch = flat_patch(c2 - c1, c3 - c2, c1 + 0.5 * ((c2 - c1) + (c3 - c2)), 1.0)?;
        self.patches.push(patch);
        Ok(self)
    }

    /// Triangular patch with corners `c1`, `c2`, `c3`.
    pub fn triangular_patch(&mut self, c1: R3, c2: R3, c3: R3) -> Result<&mut Self> {
        let patch = flat_patch(c2 - c1, c3 - c2, (c1 + c2 + c3) / 3.0, 0.5)?;
        self.patches.push(patch);
        Ok(self)
    }

    /// Planar quadrilateral patch with consecutive corners `c1`..`c4`.
    pub fn quadrilateral_patch(&mut self, c1: R3, c2: R3, c3: R3, c4: R3) -> Result<&mut Self> {
        let s1 = c2 - c1;
        let n1 = s1.cross(&(c3 - c2));
        let xa = n1.norm();
        let n2 = (c3 - c1).cross(&(c4 - c1));
        let xst = n2.norm();
        if xa == 0.0 || xst == 0.0 {
            return Err(NecError::Geometry("degenerate quadrilateral patch".into()));
        }
        let normal = n1 / xa;
        if normal.dot(&n2) / xst <= 0.9998 {
            return Err(NecError::Geometry(
                "corners of quadrilateral patch do not lie in a plane".into(),
            ));
        }
        let center = (xa * (c1 + c2 + c3) + xst * (c1 + c3 + c4)) / (3.0 * (xa + xst));
        let t1 = s1.normalize();
        self.patches.push(Patch {
            center,
            t1,
            t2: normal.cross(&t1),
            area: 0.5 * (xa + xst),
            handedness: 1.0,
        });
        Ok(self)
    }

    /// Parallelogram surface `c1, c2, c3` divided into `nx × ny` patches;
    /// `nx` divisions along `c1→c2`, `ny` along `c2→c3`.
    pub fn multi_patch(&mut self, nx: usize, ny: usize, c1: R3, c2: R3, c3: R3) -> Result<&mut Self> {
        if nx == 0 || ny == 0 {
            return Err(NecError::Geometry("patch card data error".into()));
        }
        let s1 = (c2 - c1) / nx as Scalar;
        let s2 = (c3 - c2) / ny as Scalar;
        let template = flat_patch(s1, s2, c1, 1.0)?;
        for iy in 0..ny {
            for ix in 1..=nx {
                let center = c1 + (ix as Scalar - 0.5) * s1 + (iy as Scalar + 0.5) * s2;
                self.patches.push(Patch {
                    center,
                    ..template.clone()
                });
            }
        }
        Ok(self)
    }

    /// Mirrors the whole structure in the selected coordinate planes.
    ///
    /// Planes are applied in z, y, x order; tags of the copies are offset by
    /// `tag_increment`, which doubles after each plane. A segment or patch
    /// lying in a plane of symmetry is rejected.
    pub fn reflect(&mut self, x: bool, y: bool, z: bool, tag_increment: u32) -> Result<&mut Self> {
        let mut iti = tag_increment;
        for (axis, enabled) in [(2, z), (1, y), (0, x)] {
            if !enabled {
                continue;
            }
            for (i, seg) in self.segments.iter().enumerate() {
                if lies_in_plane(seg.start[axis], seg.end[axis]) {
                    return Err(NecError::Geometry(format!(
                        "segment {} lies in plane of symmetry",
                        i + 1
                    )));
                }
            }
            for (i, patch) in self.patches.iter().enumerate() {
                if patch.center[axis].abs() <= 1.0e-10 {
                    return Err(NecError::Geometry(format!(
                        "patch {} lies in plane of symmetry",
                        i + 1
                    )));
                }
            }

            let copies: Vec<Segment> = self
                .segments
                .iter()
                .map(|s| {
                    let tag = if s.tag == 0 { 0 } else { s.tag + iti };
                    Segment::from_ends(
                        tag,
                        reflect_point(&s.start, axis),
                        reflect_point(&s.end, axis),
                        s.radius,
                    )
                })
                .collect();
            if !copies.is_empty() {
                iti *= 2;
            }
            self.segments.extend(copies);

            let mirrored: Vec<Patch> = self
                .patches
                .iter()
                .map(|p| Patch {
                    center: reflect_point(&p.center, axis),
                    t1: reflect_point(&p.t1, axis),
                    t2: reflect_point(&p.t2, axis),
                    area: p.area,
                    handedness: -p.handedness,
                })
                .collect();
            self.patches.extend(mirrored);
        }
        Ok(self)
    }

    /// Completes an `count`-fold rotationally symmetric structure about z.
    pub fn rotate(&mut self, count: usize, tag_increment: u32) -> Result<&mut Self> {
        if count == 0 {
            return Ok(self);
        }
        let rot = Rotation::about_z(TWO_PI / count as Scalar);
        let np = self.segments.len();
        for k in 0..np * (count - 1) {
            let src = &self.segments[k];
            let tag = if src.tag == 0 { 0 } else { src.tag + tag_increment };
            let seg = Segment::from_ends(tag, rot.point(&src.start), rot.point(&src.end), src.radius);
            self.segments.push(seg);
        }
        let mp = self.patches.len();
        for k in 0..mp * (count - 1) {
            let src = &self.patches[k];
            let patch = Patch {
                center: rot.point(&src.center),
                t1: rot.vector(&src.t1),
                t2: rot.vector(&src.t2),
                area: src.area,
                handedness: src.handedness,
            };
            self.patches.push(patch);
        }
        Ok(self)
    }

    /// Rotates (angles in degrees about x, y, z) and shifts the structure.
    ///
    /// With `copies == 0` the segments from the first one tagged `start_tag`
    /// onward (and every patch) are moved in place. Otherwise `copies` new
    /// instances are appended, each transformed from the previous one, with
    /// tags offset by `tag_increment`. `start_tag == 0` selects everything.
    #[allow(clippy::too_many_arguments)]
    pub fn move_structure(
        &mut self,
        rot_deg: R3,
        shift: R3,
        start_tag: u32,
        copies: usize,
        tag_increment: u32,
    ) -> Result<&mut Self> {
        let rot = Rotation::new(
            rot_deg.x * TO_RAD,
            rot_deg.y * TO_RAD,
            rot_deg.z * TO_RAD,
            shift,
        );
        let move_seg = |s: &Segment| {
            let tag = if s.tag == 0 { 0 } else { s.tag + tag_increment };
            Segment::from_ends(tag, rot.point(&s.start), rot.point(&s.end), s.radius)
        };
        let move_patch = |p: &Patch| Patch {
            center: rot.point(&p.center),
            t1: rot.vector(&p.t1),
            t2: rot.vector(&p.t2),
            area: p.area,
            handedness: p.handedness,
        };

        if !self.segments.is_empty() {
            let first = if start_tag == 0 {
                0
            } else {
                self.segments
                    .iter()
                    .position(|s| s.tag == start_tag)
                    .ok_or_else(|| NecError::Geometry(format!("no segment has a tag of {start_tag}")))?
            };
            if copies == 0 {
                for seg in &mut self.segments[first..] {
                    *seg = move_seg(seg);
                }
            } else {
                let mut range = first..self.segments.len();
                for _ in 0..copies {
                    let start = self.segments.len();
                    for k in range.clone() {
                        let seg = move_seg(&self.segments[k]);
                        self.segments.push(seg);
                    }
                    range = start..self.segments.len();
                }
            }
        }

        if copies == 0 {
            for patch in &mut self.patches {
                *patch = move_patch(patch);
            }
        } else {
            let mut range = 0..self.patches.len();
            for _ in 0..copies {
                let start = self.patches.len();
                for k in range.clone() {
                    let patch = move_patch(&self.patches[k]);
                    self.patches.push(patch);
                }
                range = start..self.patches.len();
            }
        }
        Ok(self)
    }

    /// Multiplies every dimension by `factor`.
    pub fn scale(&mut self, factor: Scalar) -> Result<&mut Self> {
        self.scale_tags(factor, None)
    }

    /// Multiplies dimensions by `factor`, restricted to segments with tags in
    /// `tags` (inclusive) when given. Patches are always scaled.
    pub fn scale_tags(&mut self, factor: Scalar, tags: Option<(u32, u32)>) -> Result<&mut Self> {
        for seg in &mut self.segments {
            let selected = tags.map_or(true, |(lo, hi)| seg.tag >= lo && seg.tag <= hi);
            if selected {
                seg.start *= factor;
                seg.end *= factor;
                seg.radius *= factor;
                seg.update_derived();
            }
        }
        for patch in &mut self.patches {
            patch.center *= factor;
            patch.area *= factor * factor;
        }
        Ok(self)
    }

    /// Resolves connectivity (against an image ground plane when `ground` is
    /// true) and validates the segment table.
    pub fn finish(&self, ground: bool) -> Result<Geometry> {
        if self.segments.is_empty() && self.patches.is_empty() {
            return Err(NecError::Geometry("no geometry data".into()));
        }
        let mut segments = self.segments.clone();
        let mut patches = self.patches.clone();
        let summary = connect::resolve(&mut segments, &mut patches, ground)?;

        for (i, seg) in segments.iter_mut().enumerate() {
            seg.update_derived();
            if seg.length <= 1.0e-20 || seg.radius <= 0.0 {
                return Err(NecError::Geometry(format!("segment data error at segment {}", i + 1)));
            }
        }
        tracing::debug!(
            segments = segments.len(),
            patches = patches.len(),
            max_junction = summary.max_junction,
            "geometry resolved"
        );

        Ok(Geometry {
            segments,
            patches,
            ground_plane: ground,
            max_junction: summary.max_junction,
            multi_junctions: summary.multi_junctions,
        })
    }
}

fn flat_patch(s1: R3, s2: R3, center: R3, area_factor: Scalar) -> Result<Patch> {
    let n = s1.cross(&s2);
    let xa = n.norm();
    if xa == 0.0 {
        return Err(NecError::Geometry("patch corners are collinear".into()));
    }
    let normal = n / xa;
    let t1 = s1.normalize();
    Ok(Patch {
        center,
        t1,
        t2: normal.cross(&t1),
        area: area_factor * xa,
        handedness: 1.0,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn uniform_wire_ends_exactly_at_second_point() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 7, R3::zeros(), R3::new(0.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        let segs = b.segments();
        assert_eq!(segs.len(), 7);
        assert_relative_eq!(segs[6].end, R3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(segs[3].length, 1.0 / 7.0, max_relative = 1.0e-12);
    }

    #[test]
    fn graded_wire_grows_geometrically() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 3, R3::zeros(), R3::new(7.0, 0.0, 0.0), 0.01, 2.0, 1.0)
            .unwrap();
        let lens: Vec<_> = b.segments().iter().map(|s| s.length).collect();
        assert_relative_eq!(lens[0], 1.0, max_relative = 1.0e-12);
        assert_relative_eq!(lens[1], 2.0, max_relative = 1.0e-12);
        assert_relative_eq!(lens[2], 4.0, max_relative = 1.0e-12);
    }

    #[test]
    fn zero_radius_without_taper_is_rejected() {
        let mut b = GeometryBuilder::new();
        let err = b
            .wire(1, 3, R3::zeros(), R3::x(), 0.0, 1.0, 1.0)
            .unwrap_err();
        assert!(err.to_string().contains("tapered"));
        assert!(b.tapered_wire(1, 3, R3::zeros(), R3::x(), 1.0, 0.0, 0.1).is_err());
    }

    #[test]
    fn tapered_wire_reaches_final_radius() {
        let mut b = GeometryBuilder::new();
        b.tapered_wire(1, 5, R3::zeros(), R3::x(), 1.0, 0.01, 0.0001)
            .unwrap();
        assert_relative_eq!(b.segments()[4].radius, 0.0001, max_relative = 1.0e-9);
    }

    #[test]
    fn arc_rejects_more_than_a_full_turn() {
        let mut b = GeometryBuilder::new();
        assert!(b.arc(1, 8, 1.0, 0.0, 400.0, 0.001).is_err());
        b.arc(1, 4, 1.0, 0.0, 90.0, 0.001).unwrap();
        assert_relative_eq!(b.segments()[3].end, R3::new(0.0, 0.0, 1.0), epsilon = 1.0e-12);
    }

    #[test]
    fn helix_climbs_to_its_length() {
        let mut b = GeometryBuilder::new();
        b.helix(1, 16, 0.5, 2.0, 0.1, 0.0, 0.1, 0.0, 0.001).unwrap();
        let last = &b.segments()[15];
        assert_relative_eq!(last.end.z, 2.0, max_relative = 1.0e-12);
        assert_relative_eq!(last.end.x, 0.1, max_relative = 1.0e-9);
    }

    #[test]
    fn reflection_rejects_segment_in_symmetry_plane() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 2, R3::new(0.0, 0.0, -1.0), R3::new(0.0, 0.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        let err = b.reflect(false, false, true, 0).unwrap_err();
        assert!(err.to_string().contains("plane of symmetry"));
    }

    #[test]
    fn reflection_doubles_tag_offsets_and_flips_patches() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 1, R3::new(1.0, 1.0, 1.0), R3::new(2.0, 1.0, 1.0), 0.001, 1.0, 1.0)
            .unwrap();
        b.reflect(false, true, true, 10).unwrap();
        let tags: Vec<_> = b.segments().iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![1, 11, 21, 31]);
        assert_relative_eq!(b.segments()[3].start, R3::new(1.0, -1.0, -1.0));
    }

    #[test]
    fn rotation_completes_symmetric_structure() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 1, R3::new(1.0, 0.0, 0.0), R3::new(2.0, 0.0, 0.0), 0.001, 1.0, 1.0)
            .unwrap();
        b.rotate(4, 1).unwrap();
        assert_eq!(b.segments().len(), 4);
        assert_relative_eq!(b.segments()[2].start, R3::new(-1.0, 0.0, 0.0), epsilon = 1.0e-12);
        assert_eq!(b.segments()[3].tag, 4);
    }

    #[test]
    fn move_with_copies_replicates_cumulatively() {
        let mut b = GeometryBuilder::new();
        b.wire(1, 1, R3::zeros(), R3::z(), 0.001, 1.0, 1.0).unwrap();
        b.move_structure(R3::zeros(), R3::new(1.0, 0.0, 0.0), 0, 2, 1)
            .unwrap();
        let segs = b.segments();
        assert_eq!(segs.len(), 3);
        assert_relative_eq!(segs[2].start.x, 2.0);
        assert_eq!(segs[2].tag, 3);
    }

    #[test]
    fn multi_patch_tiles_the_surface() {
        let mut b = GeometryBuilder::new();
        b.multi_patch(
            2,
            2,
            R3::zeros(),
            R3::new(2.0, 0.0, 0.0),
            R3::new(2.0, 2.0, 0.0),
        )
        .unwrap();
        let p = b.patches();
        assert_eq!(p.len(), 4);
        assert_relative_eq!(p[0].center, R3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(p[3].center, R3::new(1.5, 1.5, 0.0));
        assert_relative_eq!(p[0].area, 1.0);
        assert_relative_eq!(p[0].normal(), R3::z());
    }

    #[test]
    fn non_planar_quadrilateral_is_rejected() {
        let mut b = GeometryBuilder::new();
        let err = b
            .quadrilateral_patch(
                R3::zeros(),
                R3::x(),
                R3::new(1.0, 1.0, 0.0),
                R3::new(0.0, 1.0, 0.5),
            )
            .unwrap_err();
        assert!(err.to_string().contains("plane"));
    }
}
