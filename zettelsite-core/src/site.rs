use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::catalog::{Catalog, Note, NoteKind};
use crate::config::Settings;
use crate::indexes::IndexSynthesizer;
use crate::links::{LinkReport, LinkResolver};
use crate::markdown::{render_markdown, strip_tag_lines};
use crate::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A note page, markdown or HTML.
    Page,
    /// Homepage or one of the generated index pages.
    Index,
    Style,
    Template,
}

/// A virtual output artifact. It has no existence on disk until the
/// reconciler writes it.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// Path relative to the destination folder.
    pub rel_path: PathBuf,
    pub kind: FileKind,
    pub content: Vec<u8>,
}

impl GeneratedFile {
    fn text<P: Into<PathBuf>>(rel_path: P, kind: FileKind, content: String) -> Self {
        Self {
            rel_path: rel_path.into(),
            kind,
            content: content.into_bytes(),
        }
    }
}

/// Produces the complete generated file set for one run: resolved note pages,
/// the homepage, both index pages, and the theme files. Reads only the
/// catalog; writing is the reconciler's job.
pub struct SiteGenerator<'a> {
    catalog: &'a Catalog,
    settings: &'a Settings,
}

impl<'a> SiteGenerator<'a> {
    pub fn new(catalog: &'a Catalog, settings: &'a Settings) -> Self {
        Self { catalog, settings }
    }

    pub fn generate(&self) -> (Vec<GeneratedFile>, LinkReport) {
        let resolver = LinkResolver::new(self.catalog, &self.settings.pages_dir);
        let synthesizer = IndexSynthesizer::new(self.catalog, self.settings);
        let pages_dir = &self.settings.pages_dir;
        let has_about = self.catalog.get("about").is_some_and(|n| n.published);
        let mut files = Vec::new();
        let mut report = LinkReport::default();

        // Note pages
        for note in self.catalog.published() {
            if note.kind != NoteKind::Zettel {
                continue;
            }
            let (resolved, diagnostics) = resolver.resolve(note);
            report.add(note, diagnostics);

            let body = self.cleaned(&resolved);
            files.push(GeneratedFile::text(
                note.page_path(pages_dir),
                FileKind::Page,
                body.clone(),
            ));
            files.push(GeneratedFile::text(
                note.html_path(pages_dir),
                FileKind::Page,
                theme::html_page(
                    &self.page_title(note),
                    &render_markdown(&body),
                    self.settings,
                    has_about,
                ),
            ));
        }

        // Homepage, synthesized from the index note when there is one
        let template = match self.catalog.get("index").filter(|n| n.published) {
            Some(index_note) => {
                let (resolved, diagnostics) = resolver.resolve(index_note);
                report.add(index_note, diagnostics);
                resolved
            }
            None => format!("# {}\n", self.settings.site_title),
        };
        let homepage = self.cleaned(&synthesizer.homepage(&template));
        files.push(GeneratedFile::text(
            "index.md",
            FileKind::Index,
            homepage.clone(),
        ));
        files.push(GeneratedFile::text(
            "index.html",
            FileKind::Index,
            theme::html_page(
                &self.settings.site_title,
                &render_markdown(&homepage),
                self.settings,
                has_about,
            ),
        ));

        // About page
        if let Some(about) = self.catalog.get("about").filter(|n| n.published) {
            let (resolved, diagnostics) = resolver.resolve(about);
            report.add(about, diagnostics);

            let body = self.cleaned(&resolved);
            files.push(GeneratedFile::text("about.md", FileKind::Page, body.clone()));
            files.push(GeneratedFile::text(
                "about.html",
                FileKind::Page,
                theme::html_page(
                    &self.page_title(about),
                    &render_markdown(&body),
                    self.settings,
                    has_about,
                ),
            ));
        }

        // Generated indexes
        let alphabetical = synthesizer.alphabetical();
        files.push(GeneratedFile::text(
            "alphabetical-index.md",
            FileKind::Index,
            alphabetical.clone(),
        ));
        files.push(GeneratedFile::text(
            "alphabetical-index.html",
            FileKind::Index,
            theme::html_page(
                "Alphabetical Index",
                &render_markdown(&alphabetical),
                self.settings,
                has_about,
            ),
        ));

        let chronological = synthesizer.chronological();
        files.push(GeneratedFile::text(
            "chronological-index.md",
            FileKind::Index,
            chronological.clone(),
        ));
        files.push(GeneratedFile::text(
            "chronological-index.html",
            FileKind::Index,
            theme::html_page(
                "Chronological Index",
                &render_markdown(&chronological),
                self.settings,
                has_about,
            ),
        ));

        // Theme files
        files.push(GeneratedFile::text(
            "style.css",
            FileKind::Style,
            theme::stylesheet(self.settings),
        ));
        files.push(GeneratedFile::text(
            "header.html",
            FileKind::Template,
            theme::header_html(self.settings, has_about),
        ));
        files.push(GeneratedFile::text(
            "footer.html",
            FileKind::Template,
            theme::footer_html(self.settings),
        ));

        (files, report)
    }

    fn cleaned(&self, body: &str) -> String {
        if self.settings.hide_tags {
            strip_tag_lines(body)
        } else {
            body.to_string()
        }
    }

    fn page_title(&self, note: &Note) -> String {
        if note.title.is_empty() {
            self.settings.site_title.clone()
        } else {
            note.title.clone()
        }
    }
}

/// A non-fatal attachment problem: the file is skipped and reported.
#[derive(Debug)]
pub struct AttachmentWarning {
    pub name: String,
    pub reason: String,
}

impl fmt::Display for AttachmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attachment {}: {}", self.name, self.reason)
    }
}

/// Copy every attachment referenced by a published note from the source tree
/// into the destination's pages subfolder, keeping the relative path written
/// in the note so the link still resolves next to the generated pages.
/// Failures are reported, never fatal.
pub fn copy_attachments(
    catalog: &Catalog,
    source_dir: &Path,
    dest_dir: &Path,
    pages_dir: &str,
) -> (usize, Vec<AttachmentWarning>) {
    let mut refs: BTreeSet<&str> = BTreeSet::new();
    for note in catalog.published() {
        refs.extend(note.attachments.iter().map(|s| s.as_str()));
    }

    let target_dir = dest_dir.join(pages_dir);
    let mut copied = 0;
    let mut warnings = Vec::new();

    for rel in refs {
        let rel_path = Path::new(rel);
        let direct = source_dir.join(rel_path);
        let source = if direct.is_file() {
            Some(direct)
        } else {
            // The reference may be relative to a note in a subfolder.
            rel_path
                .file_name()
                .and_then(|n| find_in_source(source_dir, &n.to_string_lossy()))
        };
        let Some(source) = source else {
            warnings.push(AttachmentWarning {
                name: rel.to_string(),
                reason: "not found in the source folder".to_string(),
            });
            continue;
        };

        let dest_path = target_dir.join(rel_path);
        let parent = dest_path.parent().unwrap_or(target_dir.as_path());
        let result =
            std::fs::create_dir_all(parent).and_then(|_| std::fs::copy(&source, &dest_path));
        match result {
            Ok(_) => copied += 1,
            Err(e) => warnings.push(AttachmentWarning {
                name: rel.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    (copied, warnings)
}

fn find_in_source(source_dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.path().is_file() && e.file_name().to_string_lossy() == name)
        .map(|e| e.path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn note(id: &str, kind: NoteKind, title: &str, body: &str) -> Note {
        Note {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            tags: crate::markdown::scan_tags(body),
            published: true,
            body: body.to_string(),
            attachments: crate::markdown::attachment_refs(body),
            path: PathBuf::from(format!("{}.md", id)),
        }
    }

    fn catalog_with(notes: Vec<Note>) -> Catalog {
        let mut catalog = Catalog::default();
        for n in notes {
            catalog.insert(n).unwrap();
        }
        catalog
    }

    fn sample_catalog() -> Catalog {
        catalog_with(vec![
            note(
                "20230101000000",
                NoteKind::Zettel,
                "First",
                "#published #topic\n\n# First\n\nSee [[20230102000000]] Second",
            ),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                "#published #topic\n\n# Second\n\nBody.",
            ),
            note(
                "index",
                NoteKind::Home,
                "Home",
                "#published\n\n# Home\n\n#topic\n",
            ),
            note("about", NoteKind::About, "About", "#published\n\n# About"),
        ])
    }

    fn rel_paths(files: &[GeneratedFile]) -> BTreeSet<PathBuf> {
        files.iter().map(|f| f.rel_path.clone()).collect()
    }

    #[test]
    fn generates_reserved_files_and_pages() {
        let catalog = sample_catalog();
        let settings = Settings::default();
        let (files, report) = SiteGenerator::new(&catalog, &settings).generate();
        let paths = rel_paths(&files);

        for name in [
            "index.md",
            "index.html",
            "about.md",
            "about.html",
            "alphabetical-index.md",
            "alphabetical-index.html",
            "chronological-index.md",
            "chronological-index.html",
            "style.css",
            "header.html",
            "footer.html",
            "pages/20230101000000.md",
            "pages/20230101000000.html",
            "pages/20230102000000.md",
            "pages/20230102000000.html",
        ] {
            assert!(paths.contains(&PathBuf::from(name)), "missing {}", name);
        }
        assert!(report.is_empty());
    }

    // Every rewritten internal reference must land on a generated file.
    #[test]
    fn internal_links_resolve_to_generated_files() {
        let catalog = sample_catalog();
        let settings = Settings::default();
        let (files, _) = SiteGenerator::new(&catalog, &settings).generate();
        let paths = rel_paths(&files);

        for file in files
            .iter()
            .filter(|f| f.rel_path.extension().is_some_and(|e| e == "md"))
        {
            let content = String::from_utf8(file.content.clone()).unwrap();
            let base = file.rel_path.parent().unwrap_or(Path::new(""));
            for target in markdown_link_targets(&content) {
                if target.contains("://") || !target.ends_with(".html") {
                    continue;
                }
                let resolved = normalize(&base.join(&target));
                assert!(
                    paths.contains(&resolved),
                    "{} links to missing {}",
                    file.rel_path.display(),
                    target
                );
            }
        }
    }

    #[test]
    fn tag_lines_are_stripped_from_pages_by_default() {
        let catalog = sample_catalog();
        let settings = Settings::default();
        let (files, _) = SiteGenerator::new(&catalog, &settings).generate();

        let page = files
            .iter()
            .find(|f| f.rel_path == PathBuf::from("pages/20230102000000.md"))
            .unwrap();
        let content = String::from_utf8(page.content.clone()).unwrap();
        assert!(!content.contains("#published"));
        assert!(content.contains("# Second"));
    }

    #[test]
    fn missing_index_note_still_yields_a_homepage() {
        let catalog = catalog_with(vec![note(
            "20230101000000",
            NoteKind::Zettel,
            "First",
            "#published\n\n# First",
        )]);
        let settings = Settings::default();
        let (files, _) = SiteGenerator::new(&catalog, &settings).generate();

        let homepage = files
            .iter()
            .find(|f| f.rel_path == PathBuf::from("index.md"))
            .unwrap();
        let content = String::from_utf8(homepage.content.clone()).unwrap();
        assert!(content.contains(&settings.site_title));
    }

    #[test]
    fn nav_skips_about_when_no_about_note_is_published() {
        let catalog = catalog_with(vec![note(
            "20230101000000",
            NoteKind::Zettel,
            "First",
            "#published\n\n# First",
        )]);
        let settings = Settings::default();
        let (files, _) = SiteGenerator::new(&catalog, &settings).generate();

        let header = files
            .iter()
            .find(|f| f.rel_path == PathBuf::from("header.html"))
            .unwrap();
        let content = String::from_utf8(header.content.clone()).unwrap();
        assert!(!content.contains("about.html"));
    }

    #[test]
    fn generation_is_deterministic() {
        let catalog = sample_catalog();
        let settings = Settings::default();
        let (first, _) = SiteGenerator::new(&catalog, &settings).generate();
        let (second, _) = SiteGenerator::new(&catalog, &settings).generate();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.rel_path, b.rel_path);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn copies_referenced_attachments() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("diagram.png"), b"png bytes").unwrap();

        let catalog = catalog_with(vec![note(
            "20230101000000",
            NoteKind::Zettel,
            "First",
            "#published\n\n# First\n\n![d](diagram.png) ![m](missing.png)",
        )]);

        let (copied, warnings) =
            copy_attachments(&catalog, source.path(), dest.path(), "pages");
        assert_eq!(copied, 1);
        assert_eq!(warnings.len(), 1);
        assert!(dest.path().join("pages/diagram.png").exists());
    }

    #[test]
    fn attachments_keep_their_relative_subfolder() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::create_dir(source.path().join("files")).unwrap();
        std::fs::write(source.path().join("files/paper.pdf"), b"pdf bytes").unwrap();

        let catalog = catalog_with(vec![note(
            "20230101000000",
            NoteKind::Zettel,
            "First",
            "#published\n\n# First\n\n[paper](files/paper.pdf)",
        )]);

        let (copied, warnings) =
            copy_attachments(&catalog, source.path(), dest.path(), "pages");
        assert_eq!(copied, 1);
        assert!(warnings.is_empty());
        // The page keeps the `files/paper.pdf` link, so the copy lands there.
        assert!(dest.path().join("pages/files/paper.pdf").exists());
    }

    fn markdown_link_targets(content: &str) -> Vec<String> {
        let mut targets = Vec::new();
        let mut rest = content;
        while let Some(start) = rest.find("](") {
            let after = &rest[start + 2..];
            let Some(end) = after.find(')') else { break };
            targets.push(after[..end].to_string());
            rest = &after[end + 1..];
        }
        targets
    }

    fn normalize(path: &Path) -> PathBuf {
        let mut parts: Vec<std::ffi::OsString> = Vec::new();
        for c in path.components() {
            match c {
                std::path::Component::ParentDir => {
                    parts.pop();
                }
                std::path::Component::Normal(p) => parts.push(p.to_os_string()),
                _ => {}
            }
        }
        parts.iter().collect()
    }
}
