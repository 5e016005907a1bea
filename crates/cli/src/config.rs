use std::path::PathBuf;

use anyhow::Context;

/// Prefix of the per-data-source URL variables.
pub const DATA_SOURCE_ENV_PREFIX: &str = "HISTABLE_DS_";

/// CLI configuration loaded from environment variables.
///
/// Data sources are not listed here: the mapping document names them, and
/// each name is looked up as its own variable (see [`data_source_env_var`]).
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Mapping document path (default: `history-mappings.yaml`).
    pub mapping_path: PathBuf,
    /// Pool size per data source (default: `5`).
    pub max_connections: u32,
    /// Actor recorded when none is given on the command line (default: `system`).
    pub actor: String,
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `HISTABLE_MAPPING`         | `history-mappings.yaml`  |
    /// | `HISTABLE_MAX_CONNECTIONS` | `5`                      |
    /// | `HISTABLE_ACTOR`           | `system`                 |
    pub fn from_env() -> anyhow::Result<Self> {
        let mapping_path = std::env::var("HISTABLE_MAPPING")
            .unwrap_or_else(|_| "history-mappings.yaml".into())
            .into();

        let max_connections: u32 = std::env::var("HISTABLE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .context("HISTABLE_MAX_CONNECTIONS must be a positive integer")?;
        anyhow::ensure!(max_connections > 0, "HISTABLE_MAX_CONNECTIONS must be at least 1");

        let actor = std::env::var("HISTABLE_ACTOR").unwrap_or_else(|_| "system".into());

        Ok(Self {
            mapping_path,
            max_connections,
            actor,
        })
    }

    /// Database URL for the data source the mapping document calls `name`.
    pub fn data_source_url(&self, name: &str) -> anyhow::Result<String> {
        let var = data_source_env_var(name);
        std::env::var(&var).with_context(|| format!("{var} must be set for data source {name}"))
    }
}

/// Variable holding the URL of data source `name`: the name upper-cased with
/// every non-alphanumeric character replaced by `_`.
pub fn data_source_env_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{DATA_SOURCE_ENV_PREFIX}{suffix}")
}
