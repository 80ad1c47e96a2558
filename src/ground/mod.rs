//! Ground models under the structure.
//!
//! A [`GroundSpec`] is the frequency-independent description given by the
//! caller (SI units). Each frequency step derives [`GroundParameters`] in
//! wavelength units, and for the Sommerfeld method a [`GroundTable`] of the
//! field integrals which is reused while the complex permittivity does not
//! change.

mod bessel;
mod interp;
mod norton;
mod somnec;

pub use bessel::BesselSeries;
pub use interp::GroundInterpolator;
pub use norton::{attenuation, ground_wave, NortonField, NortonPath};
pub use somnec::{GridSpec, GroundTable, GRIDS};

use crate::constants::{CONDUCTIVITY_FACTOR, ETA};
use crate::errors::{NecError, Result};
use crate::math::{CScalar, Scalar, C_ONE, C_ZERO, J};

/// Surface impedance scale of a radial wire screen, `j·ETA·2π/…` folded
/// with the number of radials.
const SCREEN_IMPEDANCE: Scalar = 2367.067;
/// Relative permittivity mismatch above which a Sommerfeld table is stale.
pub const PERMITTIVITY_TOLERANCE: Scalar = 1.0e-3;

/// How the field reflected by a finite ground is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroundMethod {
    /// Fresnel reflection coefficients applied to the image.
    ReflectionCoefficient,
    /// Sommerfeld integral table with Norton asymptotics at long range.
    Sommerfeld,
}

/// Radial wire ground screen centred at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadialScreen {
    /// Number of radial wires.
    pub count: u32,
    /// Screen radius in metres.
    pub radius_m: Scalar,
    /// Radius of the screen wires in metres.
    pub wire_radius_m: Scalar,
}

/// A second ground medium beyond a circular or linear cliff; it only
/// affects the far field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecondMedium {
    /// Relative dielectric constant.
    pub epsr: Scalar,
    /// Conductivity in S/m.
    pub sig: Scalar,
    /// Distance from the origin to the join of the media, in metres.
    pub distance_m: Scalar,
    /// Height of the second medium below the first, in metres.
    pub height_m: Scalar,
}

/// Lossy ground description.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FiniteGround {
    /// Relative dielectric constant.
    pub epsr: Scalar,
    /// Conductivity in S/m. A negative value is taken as the imaginary part
    /// of the complex permittivity directly.
    pub sig: Scalar,
    /// Reflection model.
    pub method: GroundMethod,
    /// Optional radial wire screen.
    pub screen: Option<RadialScreen>,
    /// Optional second medium for the far field.
    pub second_medium: Option<SecondMedium>,
}

/// Ground under the structure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroundSpec {
    /// No ground.
    #[default]
    FreeSpace,
    /// Perfectly conducting image plane.
    Perfect,
    /// Lossy dielectric half space.
    Finite(FiniteGround),
}

impl GroundSpec {
    /// Rejects combinations the solver does not support.
    pub fn validate(&self) -> Result<()> {
        if let Self::Finite(g) = self {
            if g.screen.is_some() && g.method == GroundMethod::Sommerfeld {
                return Err(NecError::Config(
                    "radial wire ground screen may not be used with the Sommerfeld ground".into(),
                ));
            }
            if let Some(screen) = g.screen {
                if screen.count == 0 || screen.wire_radius_m <= 0.0 {
                    return Err(NecError::Config(
                        "radial ground screen needs at least one wire of positive radius".into(),
                    ));
                }
            }
            if g.epsr <= 0.0 {
                return Err(NecError::Config(format!(
                    "ground dielectric constant must be positive, got {}",
                    g.epsr
                )));
            }
        }
        Ok(())
    }

    /// True when an image ground plane is in effect.
    #[must_use]
    pub const fn has_ground(&self) -> bool {
        !matches!(self, Self::FreeSpace)
    }

    /// True for the Sommerfeld method.
    #[must_use]
    pub const fn uses_sommerfeld(&self) -> bool {
        matches!(
            self,
            Self::Finite(FiniteGround {
                method: GroundMethod::Sommerfeld,
                ..
            })
        )
    }
}

/// Complex relative permittivity `ε_r - j·59.96·λ·σ`, where a negative
/// conductivity is the imaginary part itself.
#[must_use]
pub fn complex_permittivity(epsr: Scalar, sig: Scalar, wavelength: Scalar) -> CScalar {
    if sig < 0.0 {
        CScalar::new(epsr, sig)
    } else {
        CScalar::new(epsr, -sig * wavelength * CONDUCTIVITY_FACTOR)
    }
}

/// Per-frequency model of a radial screen in wavelength units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenParameters {
    /// Screen radius.
    pub length: Scalar,
    /// Wire radius.
    pub wire_radius: Scalar,
    /// `j·2367.067/N`, the surface impedance scale.
    pub t1: CScalar,
    /// `N·wire_radius`.
    pub t2: Scalar,
}

impl ScreenParameters {
    /// Ratio of the screened surface impedance to `ETA` at radial distance
    /// `rho` from the screen centre, or `zrati` beyond the screen.
    #[must_use]
    pub fn impedance_ratio(&self, rho: Scalar, zrati: CScalar) -> CScalar {
        if rho > self.length {
            return zrati;
        }
        let zscrn = self.t1 * rho * (rho / self.t2).ln();
        (zscrn * zrati) / (ETA * zrati + zscrn)
    }
}

/// Per-frequency model of a second medium in wavelength units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CliffParameters {
    /// Distance to the join of the media.
    pub distance: Scalar,
    /// Depth of the second medium below the first.
    pub height: Scalar,
    /// `1/√ε_c` of the second medium.
    pub zrati: CScalar,
}

/// Which image treatment the field kernels apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroundKind {
    /// No image.
    FreeSpace,
    /// Exact image with unit reflection.
    Perfect,
    /// Image scaled by Fresnel coefficients.
    ReflectionCoefficient,
    /// Image scaled by `(ε_c - 1)/(ε_c + 1)` plus the Sommerfeld correction.
    Sommerfeld,
}

/// Ground constants at one frequency, all lengths in wavelengths.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundParameters {
    /// Image treatment.
    pub kind: GroundKind,
    /// Complex relative permittivity (1 for free space and perfect ground).
    pub epsc: CScalar,
    /// `1/√ε_c`.
    pub zrati: CScalar,
    /// Factor applied to the image field.
    pub frati: CScalar,
    /// Radial screen, when present.
    pub screen: Option<ScreenParameters>,
    /// Second medium, when present.
    pub cliff: Option<CliffParameters>,
}

impl GroundParameters {
    /// Derives the parameters of `spec` at `wavelength` metres.
    pub fn new(spec: &GroundSpec, wavelength: Scalar) -> Result<Self> {
        spec.validate()?;
        let free = Self {
            kind: GroundKind::FreeSpace,
            epsc: C_ONE,
            zrati: C_ONE,
            frati: C_ONE,
            screen: None,
            cliff: None,
        };
        Ok(match spec {
            GroundSpec::FreeSpace => free,
            GroundSpec::Perfect => Self {
                kind: GroundKind::Perfect,
                zrati: C_ZERO,
                ..free
            },
            GroundSpec::Finite(g) => {
                let epsc = complex_permittivity(g.epsr, g.sig, wavelength);
                let zrati = 1.0 / epsc.sqrt();
                let screen = g.screen.map(|s| {
                    let n = Scalar::from(s.count);
                    let wire_radius = s.wire_radius_m / wavelength;
                    ScreenParameters {
                        length: s.radius_m / wavelength,
                        wire_radius,
                        t1: J * SCREEN_IMPEDANCE / n,
                        t2: wire_radius * n,
                    }
                });
                let cliff = g.second_medium.map(|m| CliffParameters {
                    distance: m.distance_m / wavelength,
                    height: m.height_m / wavelength,
                    zrati: 1.0 / complex_permittivity(m.epsr, m.sig, wavelength).sqrt(),
                });
                let (kind, frati) = match g.method {
                    GroundMethod::ReflectionCoefficient => (GroundKind::ReflectionCoefficient, C_ONE),
                    GroundMethod::Sommerfeld => {
                        (GroundKind::Sommerfeld, (epsc - 1.0) / (epsc + 1.0))
                    }
                };
                Self {
                    kind,
                    epsc,
                    zrati,
                    frati,
                    screen,
                    cliff,
                }
            }
        })
    }

    /// True when the kernels add an image contribution.
    #[must_use]
    pub const fn has_image(&self) -> bool {
        !matches!(self.kind, GroundKind::FreeSpace)
    }

    /// True for the perfectly conducting plane.
    #[must_use]
    pub const fn is_perfect(&self) -> bool {
        matches!(self.kind, GroundKind::Perfect)
    }

    /// True when the Sommerfeld correction is required.
    #[must_use]
    pub const fn is_sommerfeld(&self) -> bool {
        matches!(self.kind, GroundKind::Sommerfeld)
    }

    /// Ground wave impedance ratio `u = 1/√ε_c` used by the Norton fields.
    #[must_use]
    pub const fn wave_ratio(&self) -> CScalar {
        self.zrati
    }
}

/// Builds or reuses the Sommerfeld table for one frequency step.
///
/// `cached` is reused when its permittivity matches `params` within
/// [`PERMITTIVITY_TOLERANCE`]; otherwise a new table is computed.
pub fn prepare_table(
    params: &GroundParameters,
    cached: Option<std::sync::Arc<GroundTable>>,
) -> Option<std::sync::Arc<GroundTable>> {
    if !params.is_sommerfeld() {
        return None;
    }
    if let Some(table) = cached {
        if table.matches(params.epsc) {
            tracing::debug!("reusing Sommerfeld table");
            return Some(table);
        }
    }
    Some(std::sync::Arc::new(GroundTable::build(params.epsc)))
}
