//! Configuration loading and management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// How invoice numbers are assigned when the caller does not supply one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberingMode {
    /// Increment the account counter in its own update, ahead of the invoice
    /// transaction. A failed transaction leaves a gap in the sequence.
    #[default]
    BestEffort,

    /// Compare-and-set the counter inside the invoice transaction. No gaps,
    /// but concurrent creators conflict and must retry.
    Strict,
}

impl std::str::FromStr for NumberingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(NumberingMode::BestEffort),
            "strict" => Ok(NumberingMode::Strict),
            other => bail!("Unknown invoice numbering mode: {}", other),
        }
    }
}

fn default_index_name() -> String {
    "GSI1".to_string()
}

/// Store connection and behaviour settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the single billing table
    pub table_name: String,

    /// Endpoint override, e.g. a local DynamoDB
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Name of the secondary index carrying `GSI1PK`/`GSI1SK`
    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default)]
    pub numbering: NumberingMode,
}

impl StoreConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            endpoint: None,
            region: None,
            index_name: default_index_name(),
            numbering: NumberingMode::default(),
        }
    }

    pub fn with_numbering(mut self, numbering: NumberingMode) -> Self {
        self.numbering = numbering;
        self
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment
    ///
    /// `TABLE_NAME` is required. `DYNAMODB_ENDPOINT`, `AWS_REGION` and
    /// `INVOICE_NUMBERING` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let table_name = lookup("TABLE_NAME").context("TABLE_NAME is not set")?;
        let numbering = match lookup("INVOICE_NUMBERING") {
            Some(mode) => mode.parse()?,
            None => NumberingMode::default(),
        };

        let config = Self {
            table_name,
            endpoint: lookup("DYNAMODB_ENDPOINT"),
            region: lookup("AWS_REGION"),
            index_name: lookup("INDEX_NAME").unwrap_or_else(default_index_name),
            numbering,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            bail!("table_name must not be empty");
        }
        if self.index_name.trim().is_empty() {
            bail!("index_name must not be empty");
        }
        Ok(())
    }
}
