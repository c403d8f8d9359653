//! JSON file storage for taskboard.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use taskboard_core::{
    NewTask, Page, Section, SectionId, Task, TaskId, TaskPatch, TaskQuery, is_blank,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

mod error;

pub use error::{Result, StoreError};

const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout. Section order is column order; task order is the order
/// tasks are listed within their column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct BoardDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    tasks: Vec<Task>,
}

const fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl BoardDocument {
    fn section_exists(&self, id: &SectionId) -> bool {
        self.sections.iter().any(|section| &section.id == id)
    }

    fn task_index(&self, id: &TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| &task.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))
    }

    fn section_index(&self, id: &SectionId) -> Result<usize> {
        self.sections
            .iter()
            .position(|section| &section.id == id)
            .ok_or_else(|| StoreError::SectionNotFound(id.clone()))
    }
}

/// Board storage in a single JSON document.
///
/// Every operation re-reads the document, so several handles pointing at the
/// same path observe each other's writes. Callers must serialize writers.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`. The file does not need to exist yet; a
    /// missing document reads as an empty board.
    ///
    /// # Errors
    /// Returns an error if an existing document cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.load()?;
        debug!(path = %store.path.display(), "Opened board document");
        Ok(store)
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BoardDocument> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BoardDocument::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a sibling temp file and rename over the target, so a
    /// crash never leaves a half-written document behind.
    fn save(&self, doc: &BoardDocument) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let body = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| StoreError::Io(err.error))?;
        debug!(
            path = %self.path.display(),
            sections = doc.sections.len(),
            tasks = doc.tasks.len(),
            "Saved board document"
        );
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut BoardDocument) -> Result<T>) -> Result<T> {
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        doc.version = DOCUMENT_VERSION;
        self.save(&doc)?;
        Ok(out)
    }

    /// Sections in column order.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read.
    pub fn list_sections(&self) -> Result<Vec<Section>> {
        Ok(self.load()?.sections)
    }

    /// Run a task query against the stored tasks.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read or the page
    /// parameters are invalid.
    pub fn get_tasks(&self, query: &TaskQuery) -> Result<Page<Task>> {
        let doc = self.load()?;
        let page = query.run(&doc.tasks)?;
        debug!(
            page_no = page.page_no,
            items = page.items.len(),
            total = page.total_count,
            "Queried tasks"
        );
        Ok(page)
    }

    /// Persist a new task at the end of its section and return its id.
    ///
    /// # Errors
    /// Fails on a blank title or unknown section.
    pub fn create_task(&self, fields: NewTask) -> Result<TaskId> {
        if is_blank(&fields.title) {
            return Err(StoreError::BlankTitle);
        }
        self.update(|doc| {
            if !doc.section_exists(&fields.section) {
                return Err(StoreError::SectionNotFound(fields.section.clone()));
            }
            let id = TaskId::generate();
            info!(task = %id, section = %fields.section, "Created task");
            doc.tasks.push(Task::from_new(id.clone(), fields));
            Ok(id)
        })
    }

    /// Apply a patch to a stored task. A section change places the task at
    /// the end of its new section.
    ///
    /// # Errors
    /// Fails when the task or the patched-in section is unknown, or the patch
    /// blanks the title.
    pub fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<()> {
        if patch.clears_title() {
            return Err(StoreError::BlankTitle);
        }
        self.update(|doc| {
            let idx = doc.task_index(id)?;
            let moves = match &patch.section {
                Some(section) if !doc.section_exists(section) => {
                    return Err(StoreError::SectionNotFound(section.clone()));
                }
                Some(section) => section != &doc.tasks[idx].section,
                None => false,
            };
            if moves {
                let mut task = doc.tasks.remove(idx);
                patch.apply(&mut task);
                doc.tasks.push(task);
            } else {
                patch.apply(&mut doc.tasks[idx]);
            }
            info!(task = %id, moved = moves, "Updated task");
            Ok(())
        })
    }

    /// Delete a task.
    ///
    /// # Errors
    /// Fails when the task is unknown.
    pub fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.update(|doc| {
            let idx = doc.task_index(id)?;
            doc.tasks.remove(idx);
            info!(task = %id, "Deleted task");
            Ok(())
        })
    }

    /// Append a section and return its id.
    ///
    /// # Errors
    /// Fails on a blank title.
    pub fn create_section(&self, title: &str) -> Result<SectionId> {
        if is_blank(title) {
            return Err(StoreError::BlankTitle);
        }
        self.update(|doc| {
            let id = SectionId::generate();
            doc.sections.push(Section::new(id.clone(), title));
            info!(section = %id, title, "Created section");
            Ok(id)
        })
    }

    /// Rename a section.
    ///
    /// # Errors
    /// Fails on a blank title or unknown section.
    pub fn update_section(&self, id: &SectionId, title: &str) -> Result<()> {
        if is_blank(title) {
            return Err(StoreError::BlankTitle);
        }
        self.update(|doc| {
            let idx = doc.section_index(id)?;
            title.clone_into(&mut doc.sections[idx].title);
            info!(section = %id, title, "Renamed section");
            Ok(())
        })
    }

    /// Delete an empty section.
    ///
    /// # Errors
    /// Fails when the section is unknown or still owns tasks.
    pub fn delete_section(&self, id: &SectionId) -> Result<()> {
        self.update(|doc| {
            let idx = doc.section_index(id)?;
            let count = doc.tasks.iter().filter(|task| &task.section == id).count();
            if count > 0 {
                return Err(StoreError::SectionNotEmpty {
                    id: id.clone(),
                    count,
                });
            }
            doc.sections.remove(idx);
            info!(section = %id, "Deleted section");
            Ok(())
        })
    }

    /// Create the given sections when the board has none yet. Returns the
    /// sections now on the board.
    ///
    /// # Errors
    /// Fails on a blank title or when the document cannot be written.
    pub fn seed_sections<I, S>(&self, titles: I) -> Result<Vec<Section>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let titles: Vec<S> = titles.into_iter().collect();
        if titles.iter().any(|title| is_blank(title.as_ref())) {
            return Err(StoreError::BlankTitle);
        }
        self.update(|doc| {
            if doc.sections.is_empty() {
                doc.sections = titles
                    .iter()
                    .map(|title| Section::new(SectionId::generate(), title.as_ref()))
                    .collect();
                info!(count = doc.sections.len(), "Seeded sections");
            }
            Ok(doc.sections.clone())
        })
    }
}
