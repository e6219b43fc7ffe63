use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{PipelineError, Result};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";
/// Env var that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "PIPELINE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Relative paths are resolved against `input_dir`.
    pub gdp_csv: PathBuf,
    pub pop_csv: PathBuf,
    pub base_url: String,
    pub preview_rows: usize,
    pub demographics_preview_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            gdp_csv: PathBuf::from(constants::GDP_PER_CAPITA_2021),
            pop_csv: PathBuf::from(constants::POPULATION_2021),
            base_url: constants::WORLDOMETERS_BASE_URL.to_string(),
            preview_rows: 5,
            demographics_preview_rows: 10,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from `path`, then `$PIPELINE_CONFIG`, then `pipeline.toml`.
    /// A missing default file yields the built-in defaults; an explicitly named
    /// file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(p) => p,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        if config.base_url.trim().is_empty() {
            return Err(PipelineError::Config("base_url must not be empty".into()));
        }
        Ok(config)
    }

    pub fn gdp_path(&self) -> PathBuf {
        self.resolve_input(&self.gdp_csv)
    }

    pub fn pop_path(&self) -> PathBuf {
        self.resolve_input(&self.pop_csv)
    }

    fn resolve_input(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.input_dir.join(file)
        }
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::new(&self.output_dir)
    }
}

/// Every file the pipeline writes, derived from a single output directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dir: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn demographics_raw(&self) -> PathBuf {
        self.file(constants::DEMOGRAPHICS_RAW_CSV)
    }

    pub fn feature_matrix(&self) -> PathBuf {
        self.file(constants::FEATURE_MATRIX_NPY)
    }

    pub fn run_summary(&self) -> PathBuf {
        self.file(constants::RUN_SUMMARY_JSON)
    }
}
