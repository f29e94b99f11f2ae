//! Native engine seam.
//!
//! The simulation engine itself (model physics, time stepping, state
//! storage) is an external collaborator. This module defines the narrow
//! trait the coupling session drives it through, so the session logic can
//! be exercised against fakes in tests and bound to the real native
//! runtime elsewhere.

use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

/// Engine variable holding per-cell runoff (depth rate).
pub const VAR_RUNOFF: &str = "runoff";
/// Engine variable holding per-cell channel discharge (volume rate).
pub const VAR_DISCHARGE: &str = "discharge";
/// Engine variable holding per-cell area.
pub const VAR_CELL_AREA: &str = "cellArea";

/// Error type for engine calls.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine rejected or failed an operation
    #[error("Engine failure: {0}")]
    Failure(String),

    /// The engine does not expose the requested variable
    #[error("Unknown engine variable {0:?}")]
    UnknownVariable(String),
}

/// Narrow interface of the native hydrological engine.
///
/// The session owns the engine exclusively; calls are synchronous and
/// must not be interleaved from multiple threads.
pub trait HydroEngine {
    /// Human-readable engine name for logging.
    fn name(&self) -> &'static str;

    /// Start the engine from a configuration file on disk.
    fn initialize(&mut self, config_path: &Path) -> Result<(), EngineError>;

    /// Read a live grid-shaped state variable.
    fn get_var(&self, name: &str) -> Result<Array2<f64>, EngineError>;

    /// Overwrite a live grid-shaped state variable.
    fn set_var(&mut self, name: &str, value: &Array2<f64>) -> Result<(), EngineError>;

    /// Shut the engine down and flush its output.
    fn finalize(&mut self) -> Result<(), EngineError>;
}
