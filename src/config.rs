use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::amend::AmendOptions;
use crate::storage::{Atomicity, StoreConfig, Strictness};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecordtreeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Definition workbook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strictness: Option<Strictness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atomicity: Option<Atomicity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<bool>,
    #[serde(default)]
    pub amend: AmendOptions,
}

impl RecordtreeConfig {
    /// Store settings, unset fields taking their defaults
    pub fn store_config(&self) -> StoreConfig {
        let defaults = StoreConfig::default();
        StoreConfig {
            strictness: self.strictness.unwrap_or(defaults.strictness),
            atomicity: self.atomicity.unwrap_or(defaults.atomicity),
            foreign_keys: self.foreign_keys.unwrap_or(defaults.foreign_keys),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("recordtree.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".recordtree").join("records.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RecordtreeConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RecordtreeConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RecordtreeConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".recordtree/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}
