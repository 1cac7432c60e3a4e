use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::markdown::{attachment_refs, first_header_title, scan_tags};

#[derive(Debug)]
pub enum CatalogError {
    IoError(std::io::Error),
    DuplicateIdentifier {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::IoError(err)
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::IoError(e) => write!(f, "IO error: {}", e),
            CatalogError::DuplicateIdentifier { id, first, second } => write!(
                f,
                "Duplicate note identifier {}: {} and {}",
                id,
                first.display(),
                second.display()
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Non-fatal problems found while scanning the source folder. The offending
/// file is skipped; the rest of the run continues.
#[derive(Debug, Clone)]
pub enum ScanWarning {
    NamingViolation(PathBuf),
    UnreadableFile(PathBuf, String),
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::NamingViolation(p) => write!(
                f,
                "{}: file name must be index.md, about.md, or a 14-digit timestamp",
                p.display()
            ),
            ScanWarning::UnreadableFile(p, e) => {
                write!(f, "{}: could not read file: {}", p.display(), e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// A regular note named by its 14-digit creation timestamp.
    Zettel,
    /// The homepage note, `index.md`.
    Home,
    /// The about page, `about.md`.
    About,
}

/// One source note. Immutable once built; the catalog owns exactly one per
/// source markdown file.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: String,
    pub kind: NoteKind,
    pub title: String,
    pub tags: BTreeSet<String>,
    pub published: bool,
    pub body: String,
    pub attachments: BTreeSet<String>,
    pub path: PathBuf,
}

impl Note {
    /// Destination-relative path of this note's markdown page.
    pub fn page_path(&self, pages_dir: &str) -> PathBuf {
        match self.kind {
            NoteKind::Home => PathBuf::from("index.md"),
            NoteKind::About => PathBuf::from("about.md"),
            NoteKind::Zettel => Path::new(pages_dir).join(format!("{}.md", self.id)),
        }
    }

    /// Destination-relative path of this note's HTML page.
    pub fn html_path(&self, pages_dir: &str) -> PathBuf {
        self.page_path(pages_dir).with_extension("html")
    }

    /// Creation date derived from the timestamp identifier, `YYYY-MM-DD`.
    /// `index` and `about` carry no timestamp.
    pub fn created_date(&self) -> Option<String> {
        if self.kind != NoteKind::Zettel || self.id.len() < 8 {
            return None;
        }

        Some(format!(
            "{}-{}-{}",
            &self.id[0..4],
            &self.id[4..6],
            &self.id[6..8]
        ))
    }
}

/// True for a valid note identifier: a 14-digit timestamp or one of the
/// reserved names.
pub fn is_note_id(s: &str) -> bool {
    s == "index" || s == "about" || (s.len() == 14 && s.chars().all(|c| c.is_ascii_digit()))
}

/// Identifier-to-note mapping, built once per run and read-only afterward.
#[derive(Debug, Default)]
pub struct Catalog {
    notes: BTreeMap<String, Note>,
}

impl Catalog {
    pub fn insert(&mut self, note: Note) -> Result<(), CatalogError> {
        if let Some(existing) = self.notes.get(&note.id) {
            return Err(CatalogError::DuplicateIdentifier {
                id: note.id.clone(),
                first: existing.path.clone(),
                second: note.path,
            });
        }
        self.notes.insert(note.id.clone(), note);

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.get(id)
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    /// Only published notes participate in link resolution and index
    /// generation.
    pub fn published(&self) -> impl Iterator<Item = &Note> {
        self.notes.values().filter(|n| n.published)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Every tag carried by any note, published or not. These are the tags
    /// recognized as homepage placeholders.
    pub fn tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for note in self.notes.values() {
            tags.extend(note.tags.iter().cloned());
        }

        tags
    }
}

pub struct CatalogScanner {
    source_dir: PathBuf,
    publish_tag: String,
}

impl CatalogScanner {
    pub fn new<P: AsRef<Path>>(source_dir: P, publish_tag: &str) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            publish_tag: publish_tag.to_lowercase(),
        }
    }

    /// Scan the source folder into a catalog. Pure scan: the source notes are
    /// never written to.
    ///
    /// Per-file problems come back as warnings; a duplicate identifier is
    /// fatal because it makes link targets ambiguous.
    pub fn scan(&self) -> Result<(Catalog, Vec<ScanWarning>), CatalogError> {
        let mut catalog = Catalog::default();
        let mut warnings = Vec::new();

        for path in markdown_files(&self.source_dir) {
            let Some((id, kind)) = classify_file_name(&path) else {
                warnings.push(ScanWarning::NamingViolation(path));
                continue;
            };

            let body = match std::fs::read_to_string(&path) {
                Ok(body) => body,
                Err(e) => {
                    warnings.push(ScanWarning::UnreadableFile(path, e.to_string()));
                    continue;
                }
            };

            catalog.insert(self.build_note(id, kind, body, path))?;
        }

        Ok((catalog, warnings))
    }

    fn build_note(&self, id: String, kind: NoteKind, body: String, path: PathBuf) -> Note {
        let title = first_header_title(&body).unwrap_or_default();
        let tags = scan_tags(&body);
        let published = tags.contains(&self.publish_tag);
        let attachments = attachment_refs(&body);

        Note {
            id,
            kind,
            title,
            tags,
            published,
            body,
            attachments,
            path,
        }
    }
}

fn classify_file_name(path: &Path) -> Option<(String, NoteKind)> {
    let stem = path.file_stem()?.to_str()?;
    match stem {
        "index" => Some(("index".to_string(), NoteKind::Home)),
        "about" => Some(("about".to_string(), NoteKind::About)),
        _ if is_note_id(stem) => Some((stem.to_string(), NoteKind::Zettel)),
        _ => None,
    }
}

fn markdown_files<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for p in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|p| {
            p.path().is_file() && p.path().extension().map(|ext| ext == "md").unwrap_or(false)
        })
    {
        paths.push(p.path().to_path_buf());
    }

    paths
}
