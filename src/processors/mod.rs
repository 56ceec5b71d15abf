//! Reconciliation stages.

pub mod georef;
pub mod index;
pub mod pipeline;
pub mod reconcile;

// Re-export key types for convenience
pub use georef::{filter_inside, inside_mask};
pub use index::{delete_files, find_files_by_identifier, find_spectrum_dirs, list_identifiers, remove_unpaired, IndexError};
pub use pipeline::{
    ErrorKind, PipelineError, ReconciliationPipeline, ReconciliationPlan, ReconciliationReport,
    Stage, TablePlan, TableSummary,
};
pub use reconcile::prune_and_collect;
