use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const PROJECTS_FILE: &str = "projects.json";
const CURRENT_PROJECT_FILE: &str = "current_project";

/// One registered project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Root directory of the project's source tree
    pub directory: PathBuf,

    /// Optional custom configuration file
    pub config_path: Option<PathBuf>,

    /// Index name used to namespace this project's persisted artifacts
    pub index_name: String,
}

/// Name → project mapping plus a "current project" pointer, persisted under
/// a per-user directory.
///
/// Constructed explicitly by the entry point and passed to command handlers;
/// its lifetime is owned by `main`, not by a process-wide singleton.
pub struct ProjectRegistry {
    root: PathBuf,
    projects: BTreeMap<String, ProjectEntry>,
    current: Option<String>,
}

impl ProjectRegistry {
    /// Open the registry under `~/.semdex`
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("cannot determine the home directory")?;
        Self::open(home.join(".semdex"))
    }

    /// Open (creating if needed) the registry rooted at `root`
    pub fn open(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("cannot create registry directory {}", root.display()))?;

        let projects_path = root.join(PROJECTS_FILE);
        let projects: BTreeMap<String, ProjectEntry> = if projects_path.exists() {
            match std::fs::read_to_string(&projects_path)
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok())
            {
                Some(projects) => projects,
                None => {
                    log::error!(
                        "Error loading projects file {}, starting empty",
                        projects_path.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let current_path = root.join(CURRENT_PROJECT_FILE);
        let current = std::fs::read_to_string(&current_path)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|name| projects.contains_key(name));

        Ok(Self {
            root,
            projects,
            current,
        })
    }

    /// Add a new project or update an existing one
    pub fn add_project(
        &mut self,
        name: &str,
        directory: &Path,
        config_path: Option<&Path>,
    ) -> Result<()> {
        if !directory.is_dir() {
            bail!("directory does not exist: {}", directory.display());
        }
        if let Some(config) = config_path {
            if !config.is_file() {
                bail!("config file does not exist: {}", config.display());
            }
        }

        self.projects.insert(
            name.to_string(),
            ProjectEntry {
                directory: directory
                    .canonicalize()
                    .unwrap_or_else(|_| directory.to_path_buf()),
                config_path: config_path.map(|config| {
                    config.canonicalize().unwrap_or_else(|_| config.to_path_buf())
                }),
                index_name: name.to_string(),
            },
        );
        self.save_projects()
    }

    /// Remove a project, clearing the current pointer if it pointed there
    pub fn remove_project(&mut self, name: &str) -> Result<()> {
        if self.projects.remove(name).is_some() {
            self.save_projects()?;
            if self.current.as_deref() == Some(name) {
                self.current = None;
                self.save_current()?;
            }
        }
        Ok(())
    }

    /// Set the current project, returning its entry
    pub fn set_current(&mut self, name: &str) -> Result<&ProjectEntry> {
        if !self.projects.contains_key(name) {
            bail!("project not found: {name}");
        }
        self.current = Some(name.to_string());
        self.save_current()?;
        Ok(&self.projects[name])
    }

    /// Look up a project by name, or the current project when `name` is None
    #[must_use]
    pub fn get(&self, name: Option<&str>) -> Option<&ProjectEntry> {
        let name = name.or(self.current.as_deref())?;
        self.projects.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// All projects in name order, with the current one flagged
    #[must_use]
    pub fn list(&self) -> Vec<(&str, &ProjectEntry, bool)> {
        self.projects
            .iter()
            .map(|(name, entry)| {
                (
                    name.as_str(),
                    entry,
                    self.current.as_deref() == Some(name.as_str()),
                )
            })
            .collect()
    }

    fn save_projects(&self) -> Result<()> {
        let path = self.root.join(PROJECTS_FILE);
        let raw = serde_json::to_string_pretty(&self.projects)?;
        std::fs::write(&path, raw)
            .with_context(|| format!("error saving projects file {}", path.display()))
    }

    fn save_current(&self) -> Result<()> {
        let path = self.root.join(CURRENT_PROJECT_FILE);
        match &self.current {
            Some(name) => std::fs::write(&path, name)
                .with_context(|| format!("error saving current project file {}", path.display())),
            None => {
                if path.exists() {
                    std::fs::remove_file(&path).with_context(|| {
                        format!("error removing current project file {}", path.display())
                    })?;
                }
                Ok(())
            }
        }
    }
}
