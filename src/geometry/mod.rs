//! Segment and patch tables with resolved connectivity.
//!
//! A [`Geometry`] is produced once by [`GeometryBuilder::finish`] in metres
//! and never modified afterwards. Each frequency step works on a copy
//! rescaled to wavelength units by [`Geometry::scaled`].

mod builder;
mod connect;
mod transform;

pub use builder::GeometryBuilder;
pub use transform::{reflect_point, Rotation};

use crate::errors::{NecError, Result};
use crate::math::{Scalar, R3};

/// One of the two ends of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentEnd {
    /// First endpoint.
    Start,
    /// Second endpoint.
    End,
}

impl SegmentEnd {
    /// Both ends, start first.
    pub const BOTH: [Self; 2] = [Self::Start, Self::End];

    /// Returns the other end.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Start => Self::End,
            Self::End => Self::Start,
        }
    }

    /// Array slot of this end.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Start => 0,
            Self::End => 1,
        }
    }

    /// `-1` for the start, `+1` for the end.
    #[must_use]
    pub const fn sign(self) -> Scalar {
        match self {
            Self::Start => -1.0,
            Self::End => 1.0,
        }
    }
}

/// What a segment end is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connection {
    /// Open wire end.
    #[default]
    Free,
    /// End touches an image ground plane.
    Ground,
    /// End terminates on the surface patch with this index.
    Patch(usize),
    /// End touches `end` of segment `index`.
    Segment {
        /// Neighbouring segment.
        index: usize,
        /// Which end of the neighbour meets this end.
        end: SegmentEnd,
    },
}

impl Connection {
    /// True for ends that see their own image (ground plane or patch).
    #[must_use]
    pub const fn is_image(self) -> bool {
        matches!(self, Self::Ground | Self::Patch(_))
    }
}

/// A straight wire segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Tag number used to address the segment from loads and sources.
    pub tag: u32,
    /// First endpoint.
    pub start: R3,
    /// Second endpoint.
    pub end: R3,
    /// Wire radius.
    pub radius: Scalar,
    /// Midpoint.
    pub center: R3,
    /// Length.
    pub length: Scalar,
    /// Unit vector from start to end.
    pub direction: R3,
    /// Connections at start and end.
    pub connections: [Connection; 2],
}

impl Segment {
    pub(crate) fn from_ends(tag: u32, start: R3, end: R3, radius: Scalar) -> Self {
        let mut seg = Self {
            tag,
            start,
            end,
            radius,
            center: R3::zeros(),
            length: 0.0,
            direction: R3::zeros(),
            connections: [Connection::Free; 2],
        };
        seg.update_derived();
        seg
    }

    pub(crate) fn update_derived(&mut self) {
        let d = self.end - self.start;
        self.center = 0.5 * (self.start + self.end);
        self.length = d.norm();
        self.direction = if self.length > 0.0 {
            d / self.length
        } else {
            R3::zeros()
        };
        // Guard the z cosine against rounding outside [-1, 1].
        self.direction.z = self.direction.z.clamp(-1.0, 1.0);
    }

    /// Endpoint at `end`.
    #[must_use]
    pub const fn point(&self, end: SegmentEnd) -> R3 {
        match end {
            SegmentEnd::Start => self.start,
            SegmentEnd::End => self.end,
        }
    }

    /// Connection at `end`.
    #[must_use]
    pub const fn connection(&self, end: SegmentEnd) -> Connection {
        self.connections[end.index()]
    }
}

/// A flat surface patch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patch {
    /// Patch centre.
    pub center: R3,
    /// First unit tangent.
    pub t1: R3,
    /// Second unit tangent.
    pub t2: R3,
    /// Patch area.
    pub area: Scalar,
    /// `+1` or `-1`: handedness of `t1 × t2` relative to the outward normal,
    /// flipped by each reflection.
    pub handedness: Scalar,
}

impl Patch {
    /// Outward unit normal.
    #[must_use]
    pub fn normal(&self) -> R3 {
        self.t1.cross(&self.t2) * self.handedness
    }
}

/// Immutable structure description with resolved connectivity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    /// Wire segments.
    pub segments: Vec<Segment>,
    /// Surface patches (after subdivision at wire connections).
    pub patches: Vec<Patch>,
    /// True when connectivity was resolved against an image ground plane.
    pub ground_plane: bool,
    /// Largest number of segment ends found at one junction.
    pub max_junction: usize,
    /// Number of junctions where three or more segments meet.
    pub multi_junctions: usize,
}

impl Geometry {
    /// Number of wire segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of surface patches.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// Order of the interaction matrix: one unknown per segment and two per patch.
    #[must_use]
    pub fn unknowns(&self) -> usize {
        self.segments.len() + 2 * self.patches.len()
    }

    /// Returns the zero-based index of the `m`-th (one-based) segment with tag
    /// `tag`. Tag 0 addresses segment `m` directly.
    pub fn segment_by_tag(&self, tag: u32, m: usize) -> Result<usize> {
        if m == 0 {
            return Err(NecError::Geometry(
                "segment position within a tag must not be zero".into(),
            ));
        }
        if tag == 0 {
            if m > self.segments.len() {
                return Err(NecError::Geometry(format!("segment {m} does not exist")));
            }
            return Ok(m - 1);
        }
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.tag == tag)
            .nth(m - 1)
            .map(|(i, _)| i)
            .ok_or_else(|| NecError::Geometry(format!("no segment has a tag of {tag}")))
    }

    /// Returns a copy with every length multiplied by `factor` and every
    /// area by `factor²`.
    #[must_use]
    pub fn scaled(&self, factor: Scalar) -> Self {
        let mut out = self.clone();
        for seg in &mut out.segments {
            seg.start *= factor;
            seg.end *= factor;
            seg.center *= factor;
            seg.length *= factor;
            seg.radius *= factor;
        }
        let area_factor = factor * factor;
        for patch in &mut out.patches {
            patch.center *= factor;
            patch.area *= area_factor;
        }
        out
    }

    /// Returns a copy in wavelength units for a frequency in MHz.
    #[must_use]
    pub fn at_frequency(&self, freq_mhz: Scalar) -> Self {
        self.scaled(1.0 / crate::constants::wavelength_from_mhz(freq_mhz))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn two_tag_geometry() -> Geometry {
        let mut b = GeometryBuilder::new();
        b.wire(1, 3, R3::new(0.0, 0.0, 1.0), R3::new(0.0, 0.0, 4.0), 0.01, 1.0, 1.0)
            .unwrap();
        b.wire(2, 2, R3::new(1.0, 0.0, 1.0), R3::new(1.0, 0.0, 3.0), 0.01, 1.0, 1.0)
            .unwrap();
        b.finish(false).unwrap()
    }

    #[test]
    fn segments_are_found_by_tag_and_position() {
        let g = two_tag_geometry();
        assert_eq!(g.segment_by_tag(1, 1).unwrap(), 0);
        assert_eq!(g.segment_by_tag(2, 2).unwrap(), 4);
        assert_eq!(g.segment_by_tag(0, 4).unwrap(), 3);
        assert!(matches!(g.segment_by_tag(9, 1), Err(NecError::Geometry(_))));
        assert!(g.segment_by_tag(1, 0).is_err());
    }

    #[test]
    fn scaling_preserves_directions_and_template() {
        let g = two_tag_geometry();
        let s = g.at_frequency(2.0 * crate::constants::CVEL);
        assert_relative_eq!(s.segments[0].length, 2.0, max_relative = 1.0e-12);
        assert_relative_eq!(s.segments[0].radius, 0.02, max_relative = 1.0e-12);
        assert_eq!(s.segments[0].direction, g.segments[0].direction);
        assert_relative_eq!(g.segments[0].length, 1.0, max_relative = 1.0e-12);
    }

    #[test]
    fn ends_have_opposites_and_signs() {
        assert_eq!(SegmentEnd::Start.opposite(), SegmentEnd::End);
        assert_eq!(SegmentEnd::End.sign(), 1.0);
        assert_eq!(SegmentEnd::Start.index(), 0);
    }
}
