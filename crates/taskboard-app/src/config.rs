use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::controller::DEFAULT_PAGE_SIZE;

/// Directory holding project state.
pub const CONFIG_DIR: &str = ".taskboard";
const CONFIG_FILE: &str = "config.toml";
const BOARD_FILE: &str = "board.json";

/// Top-level project configuration loaded from `.taskboard/config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// Board layout and loading.
    #[serde(default)]
    pub board: BoardConfig,
    /// Where the board document lives.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ProjectConfig {
    /// Load configuration from a project directory. A missing file yields the
    /// defaults.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = Self::path_in(workdir.as_ref());
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Location of the configuration file for `workdir`.
    pub fn path_in(workdir: &Path) -> PathBuf {
        workdir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Board document location, resolved against `workdir` when relative.
    pub fn store_path(&self, workdir: &Path) -> PathBuf {
        let path = self
            .store
            .path
            .clone()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join(BOARD_FILE));
        if path.is_absolute() {
            path
        } else {
            workdir.join(path)
        }
    }

    fn validate(&self) -> Result<()> {
        self.board.ensure_titles()?;
        self.board.ensure_page_size()
    }
}

/// Board settings block.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "BoardConfig::builtin_sections")]
    sections: Vec<String>,
    #[serde(default = "BoardConfig::default_page_size")]
    page_size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            sections: Self::builtin_sections(),
            page_size: Self::default_page_size(),
        }
    }
}

impl BoardConfig {
    fn builtin_sections() -> Vec<String> {
        vec!["To Do".into(), "In Progress".into(), "Done".into()]
    }

    const fn default_page_size() -> usize {
        DEFAULT_PAGE_SIZE
    }

    /// Column titles created by `init`.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Page size used when loading tasks.
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    fn ensure_titles(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for title in &self.sections {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                bail!("section titles must not be empty");
            }
            if !seen.insert(trimmed) {
                bail!("duplicate section title detected: {trimmed}");
            }
        }
        Ok(())
    }

    fn ensure_page_size(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be greater than zero");
        }
        Ok(())
    }
}

/// Storage settings block.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> Result<()> {
        let cfg_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&cfg_dir)?;
        let mut file = fs::File::create(cfg_dir.join(CONFIG_FILE))?;
        writeln!(file, "{body}")?;
        Ok(())
    }

    #[test]
    fn missing_config_returns_builtin_board() -> Result<()> {
        let dir = tempdir()?;
        let cfg = ProjectConfig::from_workdir(dir.path())?;
        assert_eq!(cfg.board.sections(), ["To Do", "In Progress", "Done"]);
        assert_eq!(cfg.board.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(
            cfg.store_path(dir.path()),
            dir.path().join(".taskboard").join("board.json")
        );
        Ok(())
    }

    #[test]
    fn load_config_with_sections_and_store() -> Result<()> {
        let dir = tempdir()?;
        write_config(
            dir.path(),
            "[board]\nsections = [\"Backlog\", \"Doing\"]\npage_size = 10\n\n[store]\npath = \"data/tasks.json\"",
        )?;

        let cfg = ProjectConfig::from_workdir(dir.path())?;
        assert_eq!(cfg.board.sections(), ["Backlog", "Doing"]);
        assert_eq!(cfg.board.page_size(), 10);
        assert_eq!(
            cfg.store_path(dir.path()),
            dir.path().join("data").join("tasks.json")
        );
        Ok(())
    }

    #[test]
    fn duplicate_sections_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[board]\nsections = [\"Done\", \" Done \"]")?;

        let Err(err) = ProjectConfig::from_workdir(dir.path()) else {
            panic!("duplicate section should error");
        };
        assert!(err.to_string().contains("duplicate section title"));
        Ok(())
    }

    #[test]
    fn blank_sections_and_zero_page_size_are_rejected() -> Result<()> {
        let dir = tempdir()?;
        write_config(dir.path(), "[board]\nsections = [\"  \"]")?;
        assert!(ProjectConfig::from_workdir(dir.path()).is_err());

        write_config(dir.path(), "[board]\npage_size = 0")?;
        let Err(err) = ProjectConfig::from_workdir(dir.path()) else {
            panic!("zero page size should error");
        };
        assert!(err.to_string().contains("page_size"));
        Ok(())
    }
}
