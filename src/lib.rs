//! Reconciliation of a multi-source soil sample dataset.
//!
//! A sample is kept only if it has an infrared spectrum file, at least one
//! wet-chemistry row, and a georeference inside a reference boundary. This
//! crate provides:
//! - A spectrum file index keyed by file stem
//! - Point-in-polygon filtering of georeference tables
//! - Pruning of chemistry tables against the spectrum identifiers
//! - A staged pipeline that computes every survivor before deleting anything
//!
//! # Example
//!
//! ```no_run
//! use soil_recon::{PipelineConfig, ReconciliationPipeline};
//!
//! let mut config = PipelineConfig::default();
//! config.boundary = Some("Africa.shp".into());
//! let pipeline = ReconciliationPipeline::from_config("/data/AfSIS", config).unwrap();
//! let report = pipeline.run(true).unwrap();
//! println!("{} spectra would be removed", report.removed_files.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{ChemistryTableConfig, GeoreferenceConfig, PipelineConfig, SpectraConfig};
pub use self::core::{GeoBoundary, IdSet, Table};
pub use processors::{PipelineError, ReconciliationPipeline, ReconciliationReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
