use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_PROJECT;
use crate::search::{ExpenseSort, SortOrder, TaskSort};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Taskly";
const APP_NAME: &str = "taskly";

pub const DEFAULT_PROJECTS: [&str; 4] = ["Personal", "Work", "Shopping", "Health"];
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Food",
    "Transportation",
    "Entertainment",
    "Shopping",
    "Bills",
    "Healthcare",
    "Education",
    "Other",
];

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths);
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("TASKLY_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("TASKLY_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("taskly.db");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageOptions,
    pub persistence: PersistenceOptions,
    pub tasks: TaskOptions,
    pub expenses: ExpenseOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        self.tasks.sanitize();
        self.expenses.sanitize();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
            busy_timeout_ms: 2_000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceOptions {
    /// Hand writes to a background thread instead of writing inline with each intent.
    pub background_writes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    pub default_projects: Vec<String>,
    pub default_project: String,
    pub default_sort: TaskSort,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            default_projects: DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect(),
            default_project: DEFAULT_PROJECT.to_string(),
            default_sort: TaskSort::DueDate,
        }
    }
}

impl TaskOptions {
    fn sanitize(&mut self) {
        let trimmed = self.default_project.trim();
        self.default_project = if trimmed.is_empty() {
            DEFAULT_PROJECT.to_string()
        } else {
            trimmed.to_string()
        };
        let mut projects = dedup_names(&self.default_projects);
        if !projects.contains(&self.default_project) {
            projects.insert(0, self.default_project.clone());
        }
        self.default_projects = projects;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseOptions {
    pub categories: Vec<String>,
    pub default_sort: ExpenseSort,
    pub default_order: SortOrder,
}

impl Default for ExpenseOptions {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            default_sort: ExpenseSort::Date,
            default_order: SortOrder::Desc,
        }
    }
}

impl ExpenseOptions {
    fn sanitize(&mut self) {
        let categories = dedup_names(&self.categories);
        if categories.is_empty() {
            tracing::warn!("no expense categories configured, falling back to defaults");
            self.categories = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        } else {
            self.categories = categories;
        }
    }
}

fn dedup_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::temp_paths;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_a_default_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.tasks.default_projects, DEFAULT_PROJECTS);
        assert_eq!(cfg.expenses.categories.len(), 8);
        assert_eq!(cfg.storage.database_path, loader.paths().database_path);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.expenses.categories, cfg.expenses.categories);
        assert!(!reloaded.persistence.background_writes);
        Ok(())
    }

    #[test]
    fn only_config_and_data_directories_are_created() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        temp_paths(&temp).ensure_directories()?;
        let mut created = fs::read_dir(temp.path())?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<Vec<_>, _>>()?;
        created.sort();
        assert_eq!(created, vec!["config", "data"]);
        Ok(())
    }

    #[test]
    fn partial_config_is_sanitized() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        loader.paths().ensure_directories()?;
        fs::write(
            &loader.paths().config_file,
            r#"
[persistence]
background_writes = true

[tasks]
default_projects = ["Work", " Work ", ""]
default_project = "Inbox"
default_sort = "priority"

[expenses]
categories = []
default_order = "asc"
"#,
        )?;
        let cfg = loader.load()?;
        assert!(cfg.persistence.background_writes);
        assert_eq!(cfg.tasks.default_projects, vec!["Inbox", "Work"]);
        assert_eq!(cfg.tasks.default_sort, TaskSort::Priority);
        assert_eq!(cfg.expenses.categories, DEFAULT_CATEGORIES);
        assert_eq!(cfg.expenses.default_order, SortOrder::Asc);
        assert_eq!(cfg.expenses.default_sort, ExpenseSort::Date);
        Ok(())
    }
}
