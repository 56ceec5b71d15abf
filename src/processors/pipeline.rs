//! Cross-dataset reconciliation of spectra, georeferences and chemistry.
//!
//! The run is split in two phases. [`ReconciliationPipeline::plan`] reads
//! every source and computes all survivors without touching the disk;
//! [`ReconciliationPipeline::apply`] then commits the plan stage by stage:
//!
//! 1. `LoadSpectrumIds` - list spectrum identifiers
//! 2. `FilterGeorefs` - drop georeference rows outside the boundary
//! 3. `PruneSpectraByGeoref` - delete spectra without an inside coordinate
//! 4. `ReconcileChemistry` - prune each chemistry table against the spectra
//! 5. `PruneSpectraByChemistry` - delete spectra without any chemistry row
//!
//! Every chemistry table is checked against the full spectrum set from
//! stage 1, not the set left after stage 3.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::boundary::{BoundaryError, GeoBoundary};
use crate::core::table::{IdSet, Table, TableError};
use crate::processors::georef::filter_inside;
use crate::processors::index::{self, IndexError};
use crate::processors::reconcile::prune_and_collect;

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error("no boundary file configured (set `boundary` in the config or pass --boundary)")]
    MissingBoundary,
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Schema,
    Io,
    Boundary,
    Config,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Index(IndexError::RootNotFound(_))
            | PipelineError::Table(TableError::NotFound(_))
            | PipelineError::Boundary(BoundaryError::NotFound(_)) => ErrorKind::NotFound,
            PipelineError::Table(TableError::MissingColumn { .. }) => ErrorKind::Schema,
            PipelineError::Index(IndexError::InvalidPattern { .. }) | PipelineError::MissingBoundary => {
                ErrorKind::Config
            }
            PipelineError::Index(_) | PipelineError::Table(_) => ErrorKind::Io,
            PipelineError::Boundary(_) => ErrorKind::Boundary,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadSpectrumIds,
    FilterGeorefs,
    PruneSpectraByGeoref,
    ReconcileChemistry,
    PruneSpectraByChemistry,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadSpectrumIds => "load spectrum ids",
            Stage::FilterGeorefs => "filter georeferences",
            Stage::PruneSpectraByGeoref => "prune spectra by georeference",
            Stage::ReconcileChemistry => "reconcile chemistry",
            Stage::PruneSpectraByChemistry => "prune spectra by chemistry",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A table rewrite waiting to be committed.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub path: PathBuf,
    pub rows_before: usize,
    pub table: Table,
}

impl TablePlan {
    fn summary(&self) -> TableSummary {
        TableSummary {
            path: self.path.clone(),
            rows_before: self.rows_before,
            rows_after: self.table.len(),
        }
    }
}

/// Everything a run will do, computed before anything is written.
#[derive(Debug, Clone)]
pub struct ReconciliationPlan {
    /// Identifiers with a spectrum file at the start of the run
    pub spectrum_ids: IdSet,
    /// Georeference table restricted to rows inside the boundary
    pub georeferences: TablePlan,
    /// Spectra without an inside georeference
    pub georef_unpaired: IdSet,
    /// Chemistry tables restricted to rows with a spectrum, in config order
    pub chemistry: Vec<TablePlan>,
    /// Union of identifiers kept across all chemistry tables
    pub valid_chemistry_ids: IdSet,
    /// Spectra without chemistry, excluding those already in `georef_unpaired`
    pub chemistry_unpaired: IdSet,
}

/// Row counts of one rewritten table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub path: PathBuf,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub spectrum_ids: usize,
    pub georeferences: TableSummary,
    pub chemistry: Vec<TableSummary>,
    pub removed_by_georef: IdSet,
    pub removed_by_chemistry: IdSet,
    /// Spectrum files deleted (or that would be, in a dry run)
    pub removed_files: Vec<PathBuf>,
    pub surviving_ids: IdSet,
    pub dry_run: bool,
}

/// Reconciles one dataset tree against a boundary.
pub struct ReconciliationPipeline {
    root: PathBuf,
    config: PipelineConfig,
    boundary: GeoBoundary,
}

impl ReconciliationPipeline {
    pub fn new<P: Into<PathBuf>>(root: P, config: PipelineConfig, boundary: GeoBoundary) -> Self {
        Self {
            root: root.into(),
            config,
            boundary,
        }
    }

    /// Build a pipeline, loading the boundary named in `config`.
    pub fn from_config<P: Into<PathBuf>>(root: P, config: PipelineConfig) -> Result<Self> {
        let path = config.boundary.clone().ok_or(PipelineError::MissingBoundary)?;
        let boundary = GeoBoundary::from_path(&path)?;
        info!(
            "Loaded boundary {} ({} polygons)",
            path.display(),
            boundary.num_polygons()
        );
        Ok(Self::new(root, config, boundary))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn index_root(&self) -> PathBuf {
        self.root.join(&self.config.spectra.index_dir)
    }

    fn prune_root(&self) -> PathBuf {
        self.root.join(self.config.spectra.effective_prune_dir())
    }

    /// Read all sources and compute every stage's outcome. Nothing is written.
    pub fn plan(&self) -> Result<ReconciliationPlan> {
        if !self.root.is_dir() {
            return Err(IndexError::RootNotFound(self.root.clone()).into());
        }
        let id_column = self.config.identifier_column.as_str();
        let pattern = self.config.spectra.directory_pattern.as_str();

        enter(Stage::LoadSpectrumIds);
        let spectrum_ids = index::list_identifiers(&self.index_root(), pattern)?;
        info!("Found {} spectrum identifiers", spectrum_ids.len());

        enter(Stage::FilterGeorefs);
        let geo_cfg = &self.config.georeferences;
        let georef_path = self.root.join(&geo_cfg.path);
        let georefs = Table::read_csv(&georef_path)?;
        let inside = filter_inside(
            &georefs,
            &self.boundary,
            &geo_cfg.latitude_column,
            &geo_cfg.longitude_column,
        )?;
        info!(
            "{}: {} rows before filtering, {} inside boundary",
            georef_path.display(),
            georefs.len(),
            inside.len()
        );

        enter(Stage::PruneSpectraByGeoref);
        let georef_ids = inside.identifiers(inside.require_column(id_column)?);
        let georef_unpaired: IdSet = spectrum_ids.difference(&georef_ids).cloned().collect();
        info!("{} spectra lack a georeference inside the boundary", georef_unpaired.len());

        enter(Stage::ReconcileChemistry);
        let mut chemistry = Vec::with_capacity(self.config.chemistry.len());
        let mut valid_chemistry_ids = IdSet::new();
        for table_cfg in &self.config.chemistry {
            let path = self.root.join(&table_cfg.path);
            let table = Table::read_csv(&path)?;
            let rows_before = table.len();
            let (pruned, kept_ids) = prune_and_collect(table, &spectrum_ids, &table_cfg.renames, id_column)?;
            info!(
                "{}: {} rows before filtering, {} after",
                path.display(),
                rows_before,
                pruned.len()
            );
            valid_chemistry_ids.extend(kept_ids);
            chemistry.push(TablePlan {
                path,
                rows_before,
                table: pruned,
            });
        }

        enter(Stage::PruneSpectraByChemistry);
        let chemistry_unpaired: IdSet = spectrum_ids
            .difference(&valid_chemistry_ids)
            .filter(|id| !georef_unpaired.contains(*id))
            .cloned()
            .collect();
        info!("{} further spectra lack chemistry", chemistry_unpaired.len());

        Ok(ReconciliationPlan {
            spectrum_ids,
            georeferences: TablePlan {
                path: georef_path,
                rows_before: georefs.len(),
                table: inside,
            },
            georef_unpaired,
            chemistry,
            valid_chemistry_ids,
            chemistry_unpaired,
        })
    }

    /// Commit a plan in stage order. With `dry_run` nothing is written and
    /// the report lists what would have been removed.
    ///
    /// A failure aborts immediately; stages already committed stay committed.
    pub fn apply(&self, plan: ReconciliationPlan, dry_run: bool) -> Result<ReconciliationReport> {
        let pattern = self.config.spectra.directory_pattern.as_str();
        let prune_root = self.prune_root();
        let mut removed_files = Vec::new();

        enter(Stage::FilterGeorefs);
        write_table(&plan.georeferences, dry_run)?;

        enter(Stage::PruneSpectraByGeoref);
        let removed = index::remove_unpaired(&prune_root, pattern, &plan.georef_unpaired, dry_run)?;
        info!("Removed {} spectrum files without georeference", removed.len());
        let removed_by_georef = removed_identifiers(&removed);
        removed_files.extend(removed);

        enter(Stage::ReconcileChemistry);
        for table_plan in &plan.chemistry {
            write_table(table_plan, dry_run)?;
        }

        enter(Stage::PruneSpectraByChemistry);
        let removed = index::remove_unpaired(&prune_root, pattern, &plan.chemistry_unpaired, dry_run)?;
        info!("Removed {} spectrum files without chemistry", removed.len());
        let removed_by_chemistry = removed_identifiers(&removed);
        removed_files.extend(removed);

        let unpaired = plan.georef_unpaired.len() + plan.chemistry_unpaired.len();
        let removed_ids = removed_by_georef.len() + removed_by_chemistry.len();
        if removed_ids < unpaired {
            warn!(
                "{} unpaired identifiers have no spectrum file under {}",
                unpaired - removed_ids,
                prune_root.display()
            );
        }

        // Report what was removed on disk, not what the plan asked for
        let surviving_ids = plan
            .spectrum_ids
            .iter()
            .filter(|id| !removed_by_georef.contains(*id) && !removed_by_chemistry.contains(*id))
            .cloned()
            .collect();

        enter(Stage::Done);
        Ok(ReconciliationReport {
            spectrum_ids: plan.spectrum_ids.len(),
            georeferences: plan.georeferences.summary(),
            chemistry: plan.chemistry.iter().map(TablePlan::summary).collect(),
            removed_by_georef,
            removed_by_chemistry,
            removed_files,
            surviving_ids,
            dry_run,
        })
    }

    /// Plan and apply in one go.
    pub fn run(&self, dry_run: bool) -> Result<ReconciliationReport> {
        let plan = self.plan()?;
        self.apply(plan, dry_run)
    }
}

fn removed_identifiers(paths: &[PathBuf]) -> IdSet {
    paths.iter().filter_map(|path| index::file_identifier(path)).collect()
}

fn enter(stage: Stage) {
    debug!("Stage: {}", stage);
}

fn write_table(plan: &TablePlan, dry_run: bool) -> Result<()> {
    if dry_run {
        debug!("Would rewrite {} ({} rows)", plan.path.display(), plan.table.len());
        return Ok(());
    }
    plan.table.write_csv_atomic(&plan.path)?;
    debug!("Rewrote {} ({} rows)", plan.path.display(), plan.table.len());
    Ok(())
}
