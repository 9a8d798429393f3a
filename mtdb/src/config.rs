use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{aggregate::EvalPolicy, error::ConfigError, metrics::DEFAULT_HMR_PAGE_SIZE};

pub const DEFAULT_MIN_ITERATIONS: usize = 3;

/// Knobs shared by every stage of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// configurations run fewer times than this are dropped
    pub min_iterations: usize,
    pub eval: EvalPolicy,
    /// page size used for the hit-miss byte ratio
    pub hmr_page_size: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_iterations: DEFAULT_MIN_ITERATIONS,
            eval: EvalPolicy::Mean,
            hmr_page_size: DEFAULT_HMR_PAGE_SIZE,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}

/// Command line flags shared by the binaries; flags win over the file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON file with an analysis config
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub eval: Option<EvalPolicy>,
    #[arg(long)]
    pub min_iterations: Option<usize>,
    #[arg(long)]
    pub hmr_page_size: Option<u64>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<AnalysisConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(eval) = self.eval {
            config.eval = eval;
        }
        if let Some(min_iterations) = self.min_iterations {
            config.min_iterations = min_iterations;
        }
        if let Some(hmr_page_size) = self.hmr_page_size {
            config.hmr_page_size = hmr_page_size;
        }
        config.validate()?;
        Ok(config)
    }
}
