//! The parsed structure and control deck consumed by the engine.
//!
//! Geometry commands are replayed onto a [`GeometryBuilder`] in order, so a
//! transform such as [`GeometryCommand::Reflect`] acts on everything given
//! before it. The [`ControlDeck`] holds everything else a run needs.

use crate::circuits::{LoadCard, NetworkSpec};
use crate::constants::DEFAULT_RKH;
use crate::errors::{NecError, Result};
use crate::geometry::{Geometry, GeometryBuilder};
use crate::ground::GroundSpec;
use crate::math::{Scalar, R3};
use crate::moment::Excitation;
use crate::nearfield::NearFieldRequest;
use crate::radiation::FarFieldRequest;
use crate::sweep::FrequencySpec;

/// Shape of a surface patch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatchShape {
    /// Centre, normal direction and area.
    Arbitrary {
        /// Centre.
        center: R3,
        /// Elevation of the normal in degrees.
        elevation_deg: Scalar,
        /// Azimuth of the normal in degrees.
        azimuth_deg: Scalar,
        /// Area.
        area: Scalar,
    },
    /// Rectangle from three corners.
    Rectangular([R3; 3]),
    /// Triangle from three corners.
    Triangular([R3; 3]),
    /// Planar quadrilateral from four corners.
    Quadrilateral([R3; 4]),
}

/// One geometry command. Lengths in metres, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryCommand {
    /// Straight wire, optionally with tapered segment lengths.
    Wire {
        /// Tag.
        tag: u32,
        /// Number of segments.
        segments: usize,
        /// First end.
        start: R3,
        /// Second end.
        end: R3,
        /// Wire radius; zero requires [`GeometryCommand::TaperedWire`].
        radius: Scalar,
        /// Ratio of consecutive segment lengths.
        rdel: Scalar,
        /// Ratio of consecutive segment radii.
        rrad: Scalar,
    },
    /// Straight wire with explicit end radii.
    TaperedWire {
        /// Tag.
        tag: u32,
        /// Number of segments.
        segments: usize,
        /// First end.
        start: R3,
        /// Second end.
        end: R3,
        /// Ratio of consecutive segment lengths.
        rdel: Scalar,
        /// Radius of the first segment.
        radius1: Scalar,
        /// Radius of the last segment.
        radius2: Scalar,
    },
    /// Circular arc in the xz plane.
    Arc {
        /// Tag.
        tag: u32,
        /// Number of segments.
        segments: usize,
        /// Arc radius.
        arc_radius: Scalar,
        /// First angle.
        start_deg: Scalar,
        /// Last angle.
        end_deg: Scalar,
        /// Wire radius.
        radius: Scalar,
    },
    /// Helix or spiral along z.
    Helix {
        /// Tag.
        tag: u32,
        /// Number of segments.
        segments: usize,
        /// Turn spacing.
        spacing: Scalar,
        /// Total length; negative for left-hand winding.
        length: Scalar,
        /// Radii in x and y at the start.
        start_radii: (Scalar, Scalar),
        /// Radii in x and y at the end.
        end_radii: (Scalar, Scalar),
        /// Wire radius.
        radius: Scalar,
    },
    /// One surface patch.
    Patch(PatchShape),
    /// `nx × ny` rectangular patches covering a parallelogram.
    MultiPatch {
        /// Divisions along the first side.
        nx: usize,
        /// Divisions along the second side.
        ny: usize,
        /// Three corners.
        corners: [R3; 3],
    },
    /// Mirror images about coordinate planes.
    Reflect {
        /// About the yz plane.
        x: bool,
        /// About the xz plane.
        y: bool,
        /// About the xy plane.
        z: bool,
        /// Added to the tags of the copies.
        tag_increment: u32,
    },
    /// N-fold rotational symmetry about z.
    Rotate {
        /// Number of sectors.
        count: usize,
        /// Added to the tags of the copies.
        tag_increment: u32,
    },
    /// Rotation and translation, optionally copying.
    Move {
        /// Rotations about x, y and z.
        rotation_deg: R3,
        /// Translation.
        shift: R3,
        /// First tag moved; 0 moves everything.
        start_tag: u32,
        /// Number of copies; 0 moves in place.
        copies: usize,
        /// Added to the tags of the copies.
        tag_increment: u32,
    },
    /// Uniform scale of everything given so far.
    Scale(Scalar),
}

impl GeometryCommand {
    /// Replays the command on `builder`.
    pub fn apply(&self, builder: &mut GeometryBuilder) -> Result<()> {
        match *self {
            Self::Wire {
                tag,
                segments,
                start,
                end,
                radius,
                rdel,
                rrad,
            } => builder.wire(tag, segments, start, end, radius, rdel, rrad)?,
            Self::TaperedWire {
                tag,
                segments,
                start,
                end,
                rdel,
                radius1,
                radius2,
            } => builder.tapered_wire(tag, segments, start, end, rdel, radius1, radius2)?,
            Self::Arc {
                tag,
                segments,
                arc_radius,
                start_deg,
                end_deg,
                radius,
            } => builder.arc(tag, segments, arc_radius, start_deg, end_deg, radius)?,
            Self::Helix {
                tag,
                segments,
                spacing,
                length,
                start_radii,
                end_radii,
                radius,
            } => builder.helix(
                tag,
                segments,
                spacing,
                length,
                start_radii.0,
                start_radii.1,
                end_radii.0,
                end_radii.1,
                radius,
            )?,
            Self::Patch(shape) => match shape {
                PatchShape::Arbitrary {
                    center,
                    elevation_deg,
                    azimuth_deg,
                    area,
                } => builder.arbitrary_patch(center, elevation_deg, azimuth_deg, area)?,
                PatchShape::Rectangular([c1, c2, c3]) => builder.rectangular_patch(c1, c2, c3)?,
                PatchShape::Triangular([c1, c2, c3]) => builder.triangular_patch(c1, c2, c3)?,
                PatchShape::Quadrilateral([c1, c2, c3, c4]) => builder.quadrilateral_patch(c1, c2, c3, c4)?,
            },
            Self::MultiPatch {
                nx,
                ny,
                corners: [c1, c2, c3],
            } => builder.multi_patch(nx, ny, c1, c2, c3)?,
            Self::Reflect { x, y, z, tag_increment } => builder.reflect(x, y, z, tag_increment)?,
            Self::Rotate { count, tag_increment } => builder.rotate(count, tag_increment)?,
            Self::Move {
                rotation_deg,
                shift,
                start_tag,
                copies,
                tag_increment,
            } => builder.move_structure(rotation_deg, shift, start_tag, copies, tag_increment)?,
            Self::Scale(factor) => builder.scale(factor)?,
        };
        Ok(())
    }
}

/// Replays `commands` and resolves connectivity. `ground_plane` connects
/// wire ends lying on z = 0 to the ground.
pub fn build_geometry(commands: &[GeometryCommand], ground_plane: bool) -> Result<Geometry> {
    let mut builder = GeometryBuilder::new();
    for (k, command) in commands.iter().enumerate() {
        command.apply(&mut builder).map_err(|e| match e {
            NecError::Geometry(msg) => NecError::Geometry(format!("command {}: {msg}", k + 1)),
            other => other,
        })?;
    }
    builder.finish(ground_plane)
}

/// Everything but the geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlDeck {
    /// Sources.
    pub excitations: Vec<Excitation>,
    /// Loading cards in input order.
    pub loads: Vec<LoadCard>,
    /// Two-port networks and transmission lines.
    pub networks: Vec<NetworkSpec>,
    /// Ground.
    pub ground: GroundSpec,
    /// Frequency steps.
    pub frequency: FrequencySpec,
    /// Radiation pattern computed at every step.
    pub far_field: Option<FarFieldRequest>,
    /// Near-field grids computed at every step.
    pub near_fields: Vec<NearFieldRequest>,
    /// Use the extended thin-wire kernel.
    pub extended_kernel: bool,
    /// Distance in wavelengths beyond which the lumped kernel is used.
    pub rkh: Scalar,
    /// Report the asymmetry of the network coupling matrix.
    pub report_asymmetry: bool,
}

impl Default for ControlDeck {
    fn default() -> Self {
        Self {
            excitations: Vec::new(),
            loads: Vec::new(),
            networks: Vec::new(),
            ground: GroundSpec::FreeSpace,
            frequency: FrequencySpec::default(),
            far_field: None,
            near_fields: Vec::new(),
            extended_kernel: false,
            rkh: DEFAULT_RKH,
            report_asymmetry: false,
        }
    }
}

impl ControlDeck {
    /// A deck sweeping `frequency` with no sources yet.
    #[must_use]
    pub fn new(frequency: impl Into<FrequencySpec>) -> Self {
        Self {
            frequency: frequency.into(),
            ..Self::default()
        }
    }

    /// Adds a source.
    #[must_use]
    pub fn with_excitation(mut self, excitation: Excitation) -> Self {
        self.excitations.push(excitation);
        self
    }

    /// Adds a loading card.
    #[must_use]
    pub fn with_load(mut self, card: LoadCard) -> Self {
        self.loads.push(card);
        self
    }

    /// Adds a network.
    #[must_use]
    pub fn with_network(mut self, network: NetworkSpec) -> Self {
        self.networks.push(network);
        self
    }

    /// Sets the ground.
    #[must_use]
    pub fn with_ground(mut self, ground: GroundSpec) -> Self {
        self.ground = ground;
        self
    }

    /// Requests a radiation pattern.
    #[must_use]
    pub const fn with_far_field(mut self, request: FarFieldRequest) -> Self {
        self.far_field = Some(request);
        self
    }

    /// Requests a near-field grid.
    #[must_use]
    pub fn with_near_field(mut self, request: NearFieldRequest) -> Self {
        self.near_fields.push(request);
        self
    }

    /// Checks what can be checked before the first frequency step.
    pub fn validate(&self) -> Result<()> {
        if self.excitations.is_empty() {
            return Err(NecError::Excitation("no excitation specified".into()));
        }
        if !(self.rkh.is_finite() && self.rkh > 0.0) {
            return Err(NecError::Config(format!("kernel threshold {} must be positive", self.rkh)));
        }
        self.ground.validate()?;
        self.frequency.frequencies()?;
        Ok(())
    }
}

/// A complete input: geometry commands and control deck.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NecModel {
    /// Geometry commands in input order.
    pub geometry: Vec<GeometryCommand>,
    /// Control deck.
    pub control: ControlDeck,
}

impl NecModel {
    /// Model from its two parts.
    #[must_use]
    pub const fn new(geometry: Vec<GeometryCommand>, control: ControlDeck) -> Self {
        Self { geometry, control }
    }

    /// The unscaled geometry, connected to ground when the deck has one.
    pub fn build_geometry(&self) -> Result<Geometry> {
        build_geometry(&self.geometry, self.control.ground.has_ground())
    }
}
