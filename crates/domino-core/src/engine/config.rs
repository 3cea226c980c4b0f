use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

fn default_max_assignments() -> usize {
    usize::MAX
}

fn default_num_solutions() -> usize {
    1
}

/// Parameters of one inference run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InferenceConfig {
    /// Upper bound on the assignments enumerated per clique. Enumeration past
    /// the bound is truncated to the first assignments in canonical order.
    #[serde(default = "default_max_assignments")]
    pub max_assignments: usize,
    /// Number of distinct optimal-first solutions to reconstruct.
    #[serde(default = "default_num_solutions")]
    pub num_solutions: usize,
    /// Index of the node message passing is rooted at.
    #[serde(default)]
    pub root: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_assignments: default_max_assignments(),
            num_solutions: default_num_solutions(),
            root: 0,
        }
    }
}

impl InferenceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: InferenceConfig = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_assignments == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_assignments",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.num_solutions == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "num_solutions",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InferenceConfigBuilder {
    max_assignments: Option<usize>,
    num_solutions: Option<usize>,
    root: Option<usize>,
}

impl InferenceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_assignments(mut self, max: usize) -> Self {
        self.max_assignments = Some(max);
        self
    }
    pub fn num_solutions(mut self, n: usize) -> Self {
        self.num_solutions = Some(n);
        self
    }
    pub fn root(mut self, node: usize) -> Self {
        self.root = Some(node);
        self
    }

    pub fn build(self) -> Result<InferenceConfig, ConfigError> {
        let config = InferenceConfig {
            max_assignments: self.max_assignments.unwrap_or_else(default_max_assignments),
            num_solutions: self
                .num_solutions
                .ok_or(ConfigError::MissingParameter("num_solutions"))?,
            root: self.root.unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn builder_applies_defaults_for_optional_parameters() {
        let config = InferenceConfigBuilder::new().num_solutions(3).build().unwrap();

        assert_eq!(config.num_solutions, 3);
        assert_eq!(config.max_assignments, usize::MAX);
        assert_eq!(config.root, 0);
    }

    #[test]
    fn builder_requires_num_solutions() {
        let result = InferenceConfigBuilder::new().max_assignments(10).build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingParameter("num_solutions"))
        ));
    }

    #[test]
    fn builder_rejects_zero_bounds() {
        let result = InferenceConfigBuilder::new()
            .num_solutions(1)
            .max_assignments(0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "max_assignments",
                ..
            })
        ));
    }

    #[test]
    fn load_reads_toml_and_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_assignments = 500").unwrap();

        let config = InferenceConfig::load(file.path()).unwrap();

        assert_eq!(config.max_assignments, 500);
        assert_eq!(config.num_solutions, 1);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "num_solution = 2").unwrap();

        let result = InferenceConfig::load(file.path());

        assert!(matches!(result, Err(ConfigError::Toml { .. })));
    }
}
