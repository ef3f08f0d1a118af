//! Migration config file loading.
//!
//! The config is YAML: target repository, API credentials (the first entry
//! is the default actor), the legacy-author identity map, per-category
//! label rules, and the path to the Trac SQLite database.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Target repository, `<owner>/<repo>`.
    pub repository: String,

    /// Path to the legacy Trac SQLite database.
    pub trac_db: PathBuf,

    /// API credentials. The first entry acts for every legacy author
    /// without a credential of their own.
    pub credentials: Vec<Credential>,

    /// Legacy author/reporter name -> GitHub login. Authors absent from
    /// the map are treated as external identities.
    #[serde(default)]
    pub users: BTreeMap<String, String>,

    /// Per-category ordered label rules.
    #[serde(default)]
    pub labels: BTreeMap<String, Vec<LabelRuleConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    pub login: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelRuleConfig {
    pub pattern: String,
    pub label: String,
}

impl MigrationConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
            bail!(
                "invalid repository '{}': expected <owner>/<repo>",
                self.repository
            );
        }

        if self.credentials.is_empty() {
            bail!("at least one credential is required (the first is the default actor)");
        }

        Ok(())
    }

    /// Login of the default actor (first credential).
    #[must_use]
    pub fn default_login(&self) -> &str {
        &self.credentials[0].login
    }
}
