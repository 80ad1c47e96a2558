#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(clippy::all, clippy::cargo, clippy::nursery, missing_docs)]
#![doc = include_str!("../README.md")]

/// Physical and numerical constants.
pub mod constants;
/// Scalar, vector and complex helpers.
pub mod math;
/// Error and diagnostic types.
pub mod errors;
/// Wires, patches, transforms and connectivity.
pub mod geometry;
/// Current-expansion coefficients at wire junctions.
pub mod basis;
/// Ground models and the Sommerfeld table.
pub mod ground;
/// Near-field kernels of segments and patches.
pub mod fields;
/// Interaction matrix, factorization, excitation and currents.
pub mod moment;
/// Loads, networks and the power budget.
pub mod circuits;
/// Far-field gain and polarization.
pub mod radiation;
/// Near electric and magnetic field grids.
pub mod nearfield;
/// Structure commands and the control deck.
pub mod model;
/// Frequency specification and the step scheduler.
pub mod sweep;
/// One frequency step and sequential sweeps.
pub mod simulation;
/// Worker pool and its wire protocol.
pub mod worker;

/// Common exports for downstream crates.
pub mod prelude;

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG` (default
/// `info`). Calling it again is harmless.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
