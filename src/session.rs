//! Coupling session for the PCR-GLOBWB engine.
//!
//! One [`CouplingSession`] owns the engine handle, the merged run
//! configuration, the model grid snapshot, and the drainage network, in
//! that construction order. It provides the four operations the coupling
//! framework needs:
//!
//! - **initialize**: merge run directories and the simulation window into
//!   the engine configuration, then read grid and drainage eagerly
//! - **deactivate routing**: rewrite a copy of the drainage grid so
//!   coupled cells become outlets before the engine starts
//! - **start / finalize**: serialize the merged configuration and drive
//!   the engine lifecycle
//! - **coupled flux**: per-timestep net flux at coupled cells from live
//!   engine state
//!
//! The session is synchronous and single-threaded by design; callers
//! serialize access.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info};
use ndarray::Array2;
use thiserror::Error;

use crate::config::{ConfigError, ModelConfig};
use crate::coupling::{CouplingError, CouplingMap, ROLE_DISCHARGE, ROLE_RUNOFF};
use crate::drainage::{apply_pits, DrainageNetwork, RoutingCells};
use crate::engine::{EngineError, HydroEngine, VAR_CELL_AREA, VAR_DISCHARGE, VAR_RUNOFF};
use crate::grid::GridSpec;
use crate::raster::{read_ascii_grid, write_ascii_grid, RasterError};

/// Seconds per day; discharge rates are converted to daily volumes with
/// this fixed constant, independent of the configured timestep.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Landmask value of an active model cell.
const LANDMASK_ACTIVE: f64 = 1.0;

const SECTION_GLOBAL: &str = "globalOptions";
const SECTION_ROUTING: &str = "routingOptions";

// =============================================================================
// Errors
// =============================================================================

/// Error type for coupling session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A referenced model file does not exist at its resolved path
    #[error("{what} file not found: {path}")]
    FileNotFound { what: &'static str, path: PathBuf },

    /// Operation requires a coupling map that has not been set
    #[error("The model must be coupled before {operation}")]
    NotCoupled { operation: &'static str },

    /// Operation is only valid before the engine is started
    #[error("{operation} is only possible before the engine is started")]
    AlreadyStarted { operation: &'static str },

    /// A grid read from the engine does not match the model grid
    #[error("Engine variable {name:?} has shape {actual:?}, expected {expected:?}")]
    VariableShape {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The drainage grid does not match the model grid
    #[error("Drainage grid has shape {actual:?}, expected the model grid {expected:?}")]
    DrainageShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A routing edit selects a cell outside the model grid
    #[error("Routing edit cell ({row}, {col}) outside the {rows}x{cols} grid")]
    CellOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Raster decode/encode error
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Coupling map error
    #[error(transparent)]
    Coupling(#[from] CouplingError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Options and setup
// =============================================================================

/// Fixed run parameters of a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Timestep multiplier applied to the aggregated flux
    pub dt: f64,
    /// Seconds per timestep unit; carried for the coupling layer's time
    /// bookkeeping, not read by the flux aggregator (which converts
    /// discharge with the fixed [`SECONDS_PER_DAY`])
    pub tscale: f64,
    /// Sentinel marking missing values in engine state
    pub missing_value: f64,
    /// Nodata code of the landmask and drainage grids
    pub landmask_nodata: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        // One-day timestep expressed as 86400 seconds per unit
        Self {
            dt: 1.0,
            tscale: SECONDS_PER_DAY,
            missing_value: -999.0,
            landmask_nodata: 255,
        }
    }
}

/// Everything needed to construct a [`CouplingSession`].
#[derive(Debug, Clone)]
pub struct SessionSetup {
    config_path: PathBuf,
    model_data_dir: PathBuf,
    forcing_data_dir: Option<PathBuf>,
    out_dir: PathBuf,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: SessionOptions,
}

impl SessionSetup {
    /// Describe a run: engine configuration file, model data directory,
    /// output directory, and the simulation window.
    pub fn new(
        config_path: impl Into<PathBuf>,
        model_data_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            model_data_dir: model_data_dir.into(),
            forcing_data_dir: None,
            out_dir: out_dir.into(),
            start_date,
            end_date,
            options: SessionOptions::default(),
        }
    }

    /// Use a separate forcing data directory.
    ///
    /// Without this, forcing data is assumed colocated with model data.
    pub fn with_forcing_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.forcing_data_dir = Some(dir.into());
        self
    }

    /// Override the default run options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }
}

// =============================================================================
// Session
// =============================================================================

/// A configured (but not necessarily started) coupling session around one
/// exclusively owned engine instance.
pub struct CouplingSession<E: HydroEngine> {
    engine: E,
    config: ModelConfig,
    config_path: PathBuf,
    out_dir: PathBuf,
    options: SessionOptions,
    grid: GridSpec,
    landmask: Array2<f64>,
    drainage: DrainageNetwork,
    /// Original LDD path; routing edits always restart from this file
    ldd_source: PathBuf,
    coupling: Option<CouplingMap>,
    started: bool,
}

impl<E: HydroEngine> CouplingSession<E> {
    /// Build a session: load and patch the configuration, then eagerly
    /// read the model grid and the drainage direction map. Any failure
    /// aborts construction.
    pub fn new(engine: E, setup: SessionSetup) -> Result<Self, SessionError> {
        let SessionSetup {
            config_path,
            model_data_dir,
            forcing_data_dir,
            out_dir,
            start_date,
            end_date,
            options,
        } = setup;

        // Forcing data defaults to the model data directory
        let input_dir = forcing_data_dir.unwrap_or_else(|| model_data_dir.clone());

        let mut config = ModelConfig::from_file(&config_path)?;
        let input = input_dir.to_string_lossy();
        let output = out_dir.to_string_lossy();
        let start = start_date.format("%Y-%m-%d").to_string();
        let end = end_date.format("%Y-%m-%d").to_string();
        config.patch(
            SECTION_GLOBAL,
            [
                ("inputDir", input.as_ref()),
                ("outputDir", output.as_ref()),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
            ],
        );
        std::fs::create_dir_all(&out_dir)?;

        let (grid, landmask) = read_model_grid(&config, &options)?;
        let (drainage, ldd_source) = read_drainage(&config, &options)?;
        if drainage.shape() != grid.shape {
            return Err(SessionError::DrainageShape {
                expected: grid.shape,
                actual: drainage.shape(),
            });
        }

        info!(
            "Configured {} session: {} to {}, grid {}",
            engine.name(),
            start_date,
            end_date,
            grid
        );

        Ok(Self {
            engine,
            config,
            config_path,
            out_dir,
            options,
            grid,
            landmask,
            drainage,
            ldd_source,
            coupling: None,
            started: false,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The model grid snapshot derived from the landmask raster.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// The drainage network read at construction.
    pub fn drainage(&self) -> &DrainageNetwork {
        &self.drainage
    }

    /// The merged run configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The fixed run options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether the engine has been started.
    pub fn started(&self) -> bool {
        self.started
    }

    /// The coupling map, if one has been set.
    pub fn coupling(&self) -> Option<&CouplingMap> {
        self.coupling.as_ref()
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    // -------------------------------------------------------------------------
    // Grid queries
    // -------------------------------------------------------------------------

    /// Map (x, y) coordinates to (row, col) indices with a parallel
    /// validity flag.
    ///
    /// A point is valid when it lies inside the grid extent and the
    /// landmask marks its cell active (value 1).
    pub fn grid_index(&self, points: &[(f64, f64)]) -> (Vec<(isize, isize)>, Vec<bool>) {
        debug!("Mapping {} coordinates to grid indices", points.len());
        let mut indices = Vec::with_capacity(points.len());
        let mut valid = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let (row, col) = self.grid.transform.index(x, y);
            let inside = self.grid.contains_index(row, col);
            let active =
                inside && self.landmask[[row as usize, col as usize]] == LANDMASK_ACTIVE;
            indices.push((row, col));
            valid.push(active);
        }
        (indices, valid)
    }

    // -------------------------------------------------------------------------
    // Coupling
    // -------------------------------------------------------------------------

    /// Install the coupling map. Must happen before routing suppression
    /// with [`RoutingCells::Coupled`] and before any flux aggregation.
    pub fn set_coupling(&mut self, map: CouplingMap) -> Result<(), SessionError> {
        let expected = self.grid.shape;
        let actual = map.mask().dim();
        if actual != expected {
            return Err(CouplingError::MaskShape { expected, actual }.into());
        }
        info!(
            "Coupled {} cells ({} runoff, {} discharge)",
            map.indices().len(),
            map.role_count(ROLE_RUNOFF),
            map.role_count(ROLE_DISCHARGE)
        );
        self.coupling = Some(map);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Routing editor
    // -------------------------------------------------------------------------

    /// Suppress routing at the selected cells by rewriting a copy of the
    /// drainage grid with their flow codes set to the pit value.
    ///
    /// The edited grid is written under the output directory (same file
    /// name as the original) and the configuration is repointed to it;
    /// the original file is never modified. Every call re-reads the
    /// original grid, so repeated edits never compound.
    ///
    /// The in-memory drainage network used by [`coupled_flux`] keeps the
    /// original directions.
    ///
    /// # Errors
    /// - `AlreadyStarted` after the engine was started (no file written)
    /// - `NotCoupled` for [`RoutingCells::Coupled`] without a coupling map
    /// - `CellOutOfBounds` for explicit indices outside the model grid
    ///   (no file written)
    ///
    /// [`coupled_flux`]: CouplingSession::coupled_flux
    pub fn deactivate_routing(&mut self, cells: RoutingCells) -> Result<PathBuf, SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted {
                operation: "Deactivating routing",
            });
        }

        let coupled_cells;
        let selection: Option<&[(usize, usize)]> = match &cells {
            RoutingCells::All => None,
            RoutingCells::Cells(list) => Some(list),
            RoutingCells::Coupled => {
                let map = self.coupling.as_ref().ok_or(SessionError::NotCoupled {
                    operation: "deactivating routing in the coupled cells",
                })?;
                coupled_cells = map.indices().to_vec();
                Some(&coupled_cells)
            }
        };

        if let Some(list) = selection {
            let (rows, cols) = self.grid.shape;
            for &(row, col) in list {
                if row >= rows || col >= cols {
                    return Err(SessionError::CellOutOfBounds {
                        row,
                        col,
                        rows,
                        cols,
                    });
                }
            }
        }

        if !self.ldd_source.is_file() {
            return Err(SessionError::FileNotFound {
                what: "drainage direction map",
                path: self.ldd_source.clone(),
            });
        }
        let nodata = f64::from(self.options.landmask_nodata);
        let mut raster = read_ascii_grid(&self.ldd_source, nodata)?;

        match selection {
            None => info!("Deactivating routing on the whole grid"),
            Some(list) => info!("Deactivating routing at {} cells", list.len()),
        }
        apply_pits(&mut raster.data, selection, raster.nodata);

        let file_name =
            self.ldd_source
                .file_name()
                .ok_or_else(|| SessionError::FileNotFound {
                    what: "drainage direction map",
                    path: self.ldd_source.clone(),
                })?;
        let edited_path = self.out_dir.join(file_name);
        write_ascii_grid(&edited_path, &raster)?;

        self.config.set(
            SECTION_ROUTING,
            "lddMap",
            edited_path.to_string_lossy().as_ref(),
        );
        debug!("Edited drainage map written to {}", edited_path.display());
        Ok(edited_path)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Serialize the merged configuration under the output directory and
    /// start the engine from it.
    ///
    /// Returns the path of the written run configuration.
    pub fn start(&mut self) -> Result<PathBuf, SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted {
                operation: "Starting the engine again",
            });
        }
        let stem = self
            .config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let extension = self
            .config_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("ini");
        let run_config = self.out_dir.join(format!("{}_run.{}", stem, extension));
        self.config.write(&run_config)?;

        info!(
            "Starting {} from {}",
            self.engine.name(),
            run_config.display()
        );
        self.engine.initialize(&run_config)?;
        self.started = true;
        Ok(run_config)
    }

    /// Read a live engine variable.
    pub fn get_var(&self, name: &str) -> Result<Array2<f64>, SessionError> {
        Ok(self.engine.get_var(name)?)
    }

    /// Overwrite a live engine variable.
    pub fn set_var(&mut self, name: &str, value: &Array2<f64>) -> Result<(), SessionError> {
        Ok(self.engine.set_var(name, value)?)
    }

    /// Shut the engine down.
    pub fn finalize(&mut self) -> Result<(), SessionError> {
        info!("Finalizing {}", self.engine.name());
        Ok(self.engine.finalize()?)
    }

    // -------------------------------------------------------------------------
    // Flux aggregation
    // -------------------------------------------------------------------------

    /// Net per-timestep flux at coupled cells from current live state.
    ///
    /// Runoff (role 1) is converted to a volume with the per-cell area;
    /// discharge (role 2) is converted to a daily volume with the fixed
    /// [`SECONDS_PER_DAY`] constant and routed one step downstream, so it
    /// is attributed to the cell below the one where it was measured. The
    /// sum is scaled by the configured timestep multiplier. Missing and
    /// NaN readings count as zero. Recomputed fully on every call.
    pub fn coupled_flux(&self) -> Result<Array2<f64>, SessionError> {
        let map = self.coupling.as_ref().ok_or(SessionError::NotCoupled {
            operation: "the total coupled flux can be calculated",
        })?;
        let mask = map.mask();

        let runoff = self.read_grid_var(VAR_RUNOFF)?;
        let area = self.read_grid_var(VAR_CELL_AREA)?;
        let discharge = self.read_grid_var(VAR_DISCHARGE)?;

        let mv = self.options.missing_value;
        let sanitize = |v: f64| if v.is_nan() || v == mv { 0.0 } else { v };

        let mut runoff_volume = Array2::zeros(mask.dim());
        let mut q_out = Array2::zeros(mask.dim());
        let (rows, cols) = self.grid.shape;
        for row in 0..rows {
            for col in 0..cols {
                match mask[[row, col]] {
                    ROLE_RUNOFF => {
                        runoff_volume[[row, col]] =
                            sanitize(runoff[[row, col]]) * area[[row, col]];
                    }
                    ROLE_DISCHARGE => {
                        q_out[[row, col]] = sanitize(discharge[[row, col]]) * SECONDS_PER_DAY;
                    }
                    _ => {}
                }
            }
        }

        let mut total = runoff_volume + self.drainage.route_downstream(&q_out);
        total.mapv_inplace(|v| v * self.options.dt);
        Ok(total)
    }

    fn read_grid_var(&self, name: &'static str) -> Result<Array2<f64>, SessionError> {
        let values = self.engine.get_var(name)?;
        if values.dim() != self.grid.shape {
            return Err(SessionError::VariableShape {
                name,
                expected: self.grid.shape,
                actual: values.dim(),
            });
        }
        Ok(values)
    }
}

// =============================================================================
// Construction helpers
// =============================================================================

fn resolve(base: &str, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(base).join(path)
    }
}

fn read_model_grid(
    config: &ModelConfig,
    options: &SessionOptions,
) -> Result<(GridSpec, Array2<f64>), SessionError> {
    let input_dir = config.require(SECTION_GLOBAL, "inputDir")?;
    let landmask_file = config.require(SECTION_GLOBAL, "landmask")?;
    let path = resolve(input_dir, landmask_file);
    if !path.is_file() {
        return Err(SessionError::FileNotFound {
            what: "landmask",
            path,
        });
    }
    info!("Reading model grid from {}", path.display());
    let raster = crate::raster::open(&path, f64::from(options.landmask_nodata))?;
    let spec = GridSpec::new(raster.transform, raster.shape());
    debug!("Model grid: {}", spec);
    Ok((spec, raster.data))
}

fn read_drainage(
    config: &ModelConfig,
    options: &SessionOptions,
) -> Result<(DrainageNetwork, PathBuf), SessionError> {
    let ldd_file = config.require(SECTION_ROUTING, "lddMap")?;
    let input_dir = config.require(SECTION_GLOBAL, "inputDir")?;
    let path = resolve(input_dir, ldd_file);
    if !path.is_file() {
        return Err(SessionError::FileNotFound {
            what: "drainage direction map",
            path,
        });
    }
    info!("Reading drainage direction map from {}", path.display());
    let nodata = options.landmask_nodata;
    let raster = read_ascii_grid(&path, f64::from(nodata))?;
    Ok((DrainageNetwork::from_raster(&raster, nodata), path))
}
