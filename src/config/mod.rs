//! Configuration types for the reconciliation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where spectrum files live, relative to the dataset root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectraConfig {
    /// Glob pattern for spectrum directory names (e.g. `Bruker*`)
    #[serde(default = "default_directory_pattern")]
    pub directory_pattern: String,

    /// Directory whose spectrum directories are walked to list identifiers
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Directory whose spectrum directories hold the files that get pruned.
    /// Defaults to `index_dir`, so the files listed are the files deleted.
    #[serde(default)]
    pub prune_dir: Option<PathBuf>,
}

fn default_directory_pattern() -> String {
    "Bruker*".to_string()
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("Dry_Chemistry/ICRAF")
}

impl Default for SpectraConfig {
    fn default() -> Self {
        Self {
            directory_pattern: default_directory_pattern(),
            index_dir: default_index_dir(),
            prune_dir: None,
        }
    }
}

impl SpectraConfig {
    /// Directory pruned by the pipeline, relative to the dataset root.
    pub fn effective_prune_dir(&self) -> &Path {
        self.prune_dir.as_deref().unwrap_or(&self.index_dir)
    }
}

/// Georeference table location and coordinate columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoreferenceConfig {
    #[serde(default = "default_georeference_path")]
    pub path: PathBuf,

    #[serde(default = "default_latitude_column")]
    pub latitude_column: String,

    #[serde(default = "default_longitude_column")]
    pub longitude_column: String,
}

fn default_georeference_path() -> PathBuf {
    PathBuf::from("Georeferences/georeferences.csv")
}

fn default_latitude_column() -> String {
    "Latitude".to_string()
}

fn default_longitude_column() -> String {
    "Longitude".to_string()
}

impl Default for GeoreferenceConfig {
    fn default() -> Self {
        Self {
            path: default_georeference_path(),
            latitude_column: default_latitude_column(),
            longitude_column: default_longitude_column(),
        }
    }
}

/// One wet-chemistry table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemistryTableConfig {
    /// Path relative to the dataset root
    pub path: PathBuf,

    /// Column renames applied before the identifier lookup
    #[serde(default)]
    pub renames: HashMap<String, String>,
}

impl ChemistryTableConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            renames: HashMap::new(),
        }
    }

    pub fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.to_string(), to.to_string());
        self
    }
}

fn default_chemistry_tables() -> Vec<ChemistryTableConfig> {
    vec![
        ChemistryTableConfig::new("Wet_Chemistry/CROPNUTS/Wet_Chemistry_CROPNUTS.csv"),
        ChemistryTableConfig::new("Wet_Chemistry/ICRAF/Wet_Chemistry_ICRAF.csv")
            .with_rename("ICRAF ID", "SSN"),
        ChemistryTableConfig::new("Wet_Chemistry/RRES/Wet_Chemistry_RRES.csv"),
    ]
}

fn default_identifier_column() -> String {
    "SSN".to_string()
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canonical sample identifier column
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,

    /// Boundary geometry file (GeoJSON or shapefile)
    #[serde(default)]
    pub boundary: Option<PathBuf>,

    #[serde(default)]
    pub spectra: SpectraConfig,

    #[serde(default)]
    pub georeferences: GeoreferenceConfig,

    /// Chemistry tables, reconciled in this order
    #[serde(default = "default_chemistry_tables")]
    pub chemistry: Vec<ChemistryTableConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier_column: default_identifier_column(),
            boundary: None,
            spectra: SpectraConfig::default(),
            georeferences: GeoreferenceConfig::default(),
            chemistry: default_chemistry_tables(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, Box<dyn std::error::Error>> {
        Ok(serde_yaml::to_string(self)?)
    }
}
