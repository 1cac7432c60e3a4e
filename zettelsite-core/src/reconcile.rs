use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::site::{FileKind, GeneratedFile};

/// User-maintained exclusion list at the destination root.
pub const IGNORE_FILE: &str = "ssg-ignore.txt";

#[derive(Debug)]
pub enum ReconcileError {
    /// Writing or deleting in the destination failed. Fatal: the run aborts
    /// rather than leaving anything silently partial.
    WriteFailure(PathBuf, std::io::Error),
    IoError(std::io::Error),
}

impl From<std::io::Error> for ReconcileError {
    fn from(err: std::io::Error) -> Self {
        ReconcileError::IoError(err)
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::WriteFailure(p, e) => {
                write!(f, "destination write failure: {}: {}", p.display(), e)
            }
            ReconcileError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Absolute paths excluded from pending-confirmation deletion, read from
/// `ssg-ignore.txt` (one path per line). A missing file means an empty list.
#[derive(Debug, Default)]
pub struct IgnoreList {
    paths: BTreeSet<PathBuf>,
}

impl IgnoreList {
    pub fn load(dest_dir: &Path) -> Self {
        let mut paths = BTreeSet::new();
        if let Ok(data) = std::fs::read_to_string(dest_dir.join(IGNORE_FILE)) {
            for line in data.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    paths.insert(PathBuf::from(trimmed));
                }
            }
        }

        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub struct PlannedWrite {
    pub path: PathBuf,
    pub content: Vec<u8>,
    /// No prior counterpart existed in the destination.
    pub create: bool,
}

/// Classification of one run's destination changes. Built fresh each run and
/// discarded after execution.
#[derive(Default)]
pub struct ReconciliationPlan {
    pub writes: Vec<PlannedWrite>,
    pub unconditional_deletes: Vec<PathBuf>,
    pub pending_deletes: Vec<PathBuf>,
    pub preserved: Vec<PathBuf>,
}

/// Capability for the interactive confirmation step: given the batch of
/// deletion candidates, return the approved subset. Keeps the reconciler
/// testable without a terminal.
pub trait DeletionPrompt {
    fn confirm(&mut self, candidates: &[PathBuf]) -> Vec<PathBuf>;
}

/// Approves every candidate. Used by `--yes` and in tests.
pub struct ApproveAll;

impl DeletionPrompt for ApproveAll {
    fn confirm(&mut self, candidates: &[PathBuf]) -> Vec<PathBuf> {
        candidates.to_vec()
    }
}

/// Declines every candidate.
pub struct DeclineAll;

impl DeletionPrompt for DeclineAll {
    fn confirm(&mut self, _candidates: &[PathBuf]) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub deleted: usize,
    pub preserved: usize,
    /// How many deletions were surfaced for confirmation.
    pub pending: usize,
}

/// Applies the overwrite/delete/preserve policy to the destination folder.
///
/// Per existing entry: theme files are created only when absent (overwritten
/// only when template refresh is requested); markdown files in the pages
/// subfolder with no generated counterpart are deleted unconditionally;
/// unmatched HTML files go through the confirmation prompt unless listed in
/// the ignore file; everything else is preserved.
pub struct Reconciler {
    dest_dir: PathBuf,
    pages_dir: String,
    refresh_templates: bool,
}

impl Reconciler {
    pub fn new<P: AsRef<Path>>(dest_dir: P, pages_dir: &str) -> Self {
        Self {
            dest_dir: dest_dir.as_ref().to_path_buf(),
            pages_dir: pages_dir.to_string(),
            refresh_templates: false,
        }
    }

    /// Overwrite the theme files with freshly generated content this run.
    pub fn refresh_templates(mut self, refresh: bool) -> Self {
        self.refresh_templates = refresh;
        self
    }

    pub fn plan(
        &self,
        generated: &[GeneratedFile],
        ignore: &IgnoreList,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        let existing = self.existing_files()?;
        let mut plan = ReconciliationPlan::default();

        let mut generated_paths: BTreeMap<PathBuf, &GeneratedFile> = BTreeMap::new();
        for file in generated {
            generated_paths.insert(self.dest_dir.join(&file.rel_path), file);
        }

        for (path, file) in &generated_paths {
            let exists = existing.contains(path);
            let is_theme_file = matches!(file.kind, FileKind::Style | FileKind::Template);
            if exists && is_theme_file && !self.refresh_templates {
                plan.preserved.push(path.clone());
            } else {
                plan.writes.push(PlannedWrite {
                    path: path.clone(),
                    content: file.content.clone(),
                    create: !exists,
                });
            }
        }

        let pages_root = self.dest_dir.join(&self.pages_dir);
        for path in &existing {
            if generated_paths.contains_key(path) {
                continue;
            }

            let extension = path.extension().and_then(|e| e.to_str());
            if path == &self.dest_dir.join(IGNORE_FILE) {
                plan.preserved.push(path.clone());
            } else if path.starts_with(&pages_root) && extension == Some("md") {
                // Stale page: its source note was unpublished or removed.
                plan.unconditional_deletes.push(path.clone());
            } else if extension == Some("html") {
                if ignore.contains(path) {
                    plan.preserved.push(path.clone());
                } else {
                    plan.pending_deletes.push(path.clone());
                }
            } else {
                plan.preserved.push(path.clone());
            }
        }

        Ok(plan)
    }

    /// Execute a plan: writes first, then unconditional deletes, then the
    /// pending-confirmation batch. Declined deletions are preserved and the
    /// run still counts as a success.
    pub fn apply(
        &self,
        plan: ReconciliationPlan,
        prompt: &mut dyn DeletionPrompt,
    ) -> Result<Summary, ReconcileError> {
        let mut summary = Summary {
            preserved: plan.preserved.len(),
            pending: plan.pending_deletes.len(),
            ..Summary::default()
        };

        for write in &plan.writes {
            self.write_atomic(&write.path, &write.content)?;
            summary.written += 1;
        }

        for path in &plan.unconditional_deletes {
            std::fs::remove_file(path)
                .map_err(|e| ReconcileError::WriteFailure(path.clone(), e))?;
            summary.deleted += 1;
        }

        let approved: BTreeSet<PathBuf> =
            prompt.confirm(&plan.pending_deletes).into_iter().collect();
        for path in &plan.pending_deletes {
            if approved.contains(path) {
                std::fs::remove_file(path)
                    .map_err(|e| ReconcileError::WriteFailure(path.clone(), e))?;
                summary.deleted += 1;
            } else {
                summary.preserved += 1;
            }
        }

        Ok(summary)
    }

    fn existing_files(&self) -> Result<BTreeSet<PathBuf>, ReconcileError> {
        let mut files = BTreeSet::new();
        if !self.dest_dir.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.dest_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ReconcileError::IoError(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk error")),
                )
            })?;
            if entry.path().is_file() {
                files.insert(entry.path().to_path_buf());
            }
        }

        Ok(files)
    }

    /// Write to completion or not at all: the content goes to a sibling temp
    /// file first, then replaces the target in one rename.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), ReconcileError> {
        let failure = |e| ReconcileError::WriteFailure(path.to_path_buf(), e);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(failure)?;
        }

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        std::fs::write(&tmp, content).map_err(failure)?;
        std::fs::rename(&tmp, path).map_err(failure)?;

        Ok(())
    }
}
