use crate::catalog::{Catalog, Note, NoteKind};
use crate::config::Settings;
use crate::markdown::is_tag_token;

/// Builds the homepage and the two auto-generated index pages from the
/// catalog. Pure: no side effects, deterministic output.
pub struct IndexSynthesizer<'a> {
    catalog: &'a Catalog,
    settings: &'a Settings,
}

impl<'a> IndexSynthesizer<'a> {
    pub fn new(catalog: &'a Catalog, settings: &'a Settings) -> Self {
        Self { catalog, settings }
    }

    /// Expand tag placeholders in the homepage template, line by line.
    ///
    /// A line consisting solely of a recognized tag (other than the publish
    /// tag) becomes a list of links to every published note carrying it; every
    /// other line passes through unchanged. A recognized tag with no published
    /// notes expands to nothing.
    pub fn homepage(&self, template_body: &str) -> String {
        let recognized = self.catalog.tags();
        let mut out = String::new();

        for line in template_body.lines() {
            let trimmed = line.trim();
            if is_tag_token(trimmed) {
                let tag = trimmed[1..].to_lowercase();
                if tag != self.settings.publish_tag && recognized.contains(&tag) {
                    for note in self.notes_with_tag(&tag) {
                        out.push_str(&self.link_line(note, None));
                    }
                    continue;
                }
            }
            out.push_str(line);
            out.push('\n');
        }

        if !self.settings.copyright_text.is_empty() {
            out.push_str("\n---\n\n");
            out.push_str(&self.settings.copyright_text);
            out.push('\n');
        }

        out
    }

    /// One entry per published note, sorted case-insensitively by title,
    /// ties broken by identifier.
    pub fn alphabetical(&self) -> String {
        let mut out = String::from("# Alphabetical Index\n\n");
        for note in self.ordered_published() {
            out.push_str(&self.link_line(note, None));
        }

        out
    }

    /// One entry per published timestamped note, oldest first. `index` and
    /// `about` carry no creation timestamp and are excluded.
    pub fn chronological(&self) -> String {
        let mut notes: Vec<&Note> = self
            .catalog
            .published()
            .filter(|n| n.kind == NoteKind::Zettel)
            .collect();
        notes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut out = String::from("# Chronological Index\n\n");
        for note in notes {
            let date = if self.settings.hide_chrono_dates {
                None
            } else {
                note.created_date()
            };
            out.push_str(&self.link_line(note, date.as_deref()));
        }

        out
    }

    /// Published notes in index order: case-insensitive title, then
    /// identifier. This is also the order used for tag expansion.
    fn ordered_published(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.catalog.published().collect();
        notes.sort_by(|a, b| {
            (a.title.to_lowercase(), &a.id).cmp(&(b.title.to_lowercase(), &b.id))
        });

        notes
    }

    /// Only timestamped notes: the homepage template carries the placeholder
    /// tag itself and must never list itself.
    fn notes_with_tag(&self, tag: &str) -> Vec<&Note> {
        self.ordered_published()
            .into_iter()
            .filter(|n| n.kind == NoteKind::Zettel && n.tags.contains(tag))
            .collect()
    }

    /// Index pages live at the destination root, so link targets are
    /// root-relative.
    fn link_line(&self, note: &Note, date: Option<&str>) -> String {
        let target = match note.kind {
            NoteKind::Home => "index.html".to_string(),
            NoteKind::About => "about.html".to_string(),
            NoteKind::Zettel => format!("{}/{}.html", self.settings.pages_dir, note.id),
        };
        match date {
            Some(date) => format!("- {} [{}]({})\n", date, note.title, target),
            None => format!("- [{}]({})\n", note.title, target),
        }
    }
}
