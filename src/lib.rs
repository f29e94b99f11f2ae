//! # pcr-coupler
//!
//! A coupling adapter exposing the PCR-GLOBWB distributed
//! rainfall-runoff/routing model through a uniform model-coupling
//! interface.
//!
//! This crate provides the marshaling glue between a generic
//! init/start/get-var/set-var/finalize contract and the model's own
//! artifacts:
//! - INI-style configuration parsing with targeted partial merges
//! - Model grid geometry derived from the landmask raster
//! - Drainage (LDD) grid loading, one-step downstream routing, and
//!   pre-run routing suppression at coupled cells
//! - Per-timestep coupled flux aggregation from live engine state
//!
//! The model physics and runtime sit behind the [`engine::HydroEngine`]
//! trait; raster numerics sit behind the codecs in [`raster`].
//!
//! # Example
//!
//! ```ignore
//! use chrono::NaiveDate;
//! use pcr_coupler::{CouplingSession, RoutingCells, SessionSetup};
//!
//! let setup = SessionSetup::new(
//!     "pcrglobwb.ini",
//!     "model_data/",
//!     "out/",
//!     NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
//! );
//! let mut session = CouplingSession::new(engine, setup)?;
//! session.set_coupling(coupling_map)?;
//! session.deactivate_routing(RoutingCells::Coupled)?;
//! session.start()?;
//!
//! // every timestep:
//! let flux = session.coupled_flux()?;
//! ```

pub mod config;
pub mod coupling;
pub mod drainage;
pub mod engine;
pub mod grid;
pub mod raster;
pub mod session;

// Re-export main types for convenience
pub use config::{ConfigError, ModelConfig};
pub use coupling::{CouplingError, CouplingMap, ROLE_DISCHARGE, ROLE_NONE, ROLE_RUNOFF};
pub use drainage::{DrainageNetwork, LDD_PIT, RoutingCells};
pub use engine::{EngineError, HydroEngine, VAR_CELL_AREA, VAR_DISCHARGE, VAR_RUNOFF};
pub use grid::{BoundingBox, GridSpec, GridTransform};
pub use raster::{RasterData, RasterError};
pub use session::{CouplingSession, SECONDS_PER_DAY, SessionError, SessionOptions, SessionSetup};
