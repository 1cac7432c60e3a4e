use std::fmt;

use crate::catalog::{is_note_id, Catalog, Note, NoteKind};

/// One problem found while resolving a reference. Diagnostics never abort the
/// run; they are collected and reported together at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDiagnostic {
    /// The target identifier is missing from the catalog, or present but not
    /// published.
    Broken { target: String, written_title: String },
    /// The target exists but the title written in the reference no longer
    /// matches its current title.
    Stale {
        target: String,
        written: String,
        current: String,
    },
}

impl fmt::Display for LinkDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDiagnostic::Broken {
                target,
                written_title,
            } => {
                if written_title.is_empty() {
                    write!(f, "broken link to {}", target)
                } else {
                    write!(f, "broken link to {} (`{}`)", target, written_title)
                }
            }
            LinkDiagnostic::Stale {
                target,
                written,
                current,
            } => write!(
                f,
                "stale title for {}: wrote `{}`, now `{}`",
                target, written, current
            ),
        }
    }
}

/// Per-run link diagnostics, grouped by the source note they were found in.
#[derive(Debug, Default)]
pub struct LinkReport {
    entries: Vec<NoteDiagnostics>,
}

#[derive(Debug)]
pub struct NoteDiagnostics {
    pub note_id: String,
    pub note_title: String,
    pub diagnostics: Vec<LinkDiagnostic>,
}

impl LinkReport {
    pub fn add(&mut self, note: &Note, diagnostics: Vec<LinkDiagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.entries.push(NoteDiagnostics {
            note_id: note.id.clone(),
            note_title: note.title.clone(),
            diagnostics,
        });
    }

    pub fn entries(&self) -> &[NoteDiagnostics] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn broken_count(&self) -> usize {
        self.count(|d| matches!(d, LinkDiagnostic::Broken { .. }))
    }

    pub fn stale_count(&self) -> usize {
        self.count(|d| matches!(d, LinkDiagnostic::Stale { .. }))
    }

    fn count(&self, pred: impl Fn(&LinkDiagnostic) -> bool) -> usize {
        self.entries
            .iter()
            .flat_map(|e| e.diagnostics.iter())
            .filter(|d| pred(d))
            .count()
    }
}

/// A parsed internal reference inside one line.
#[derive(Debug)]
struct ParsedRef {
    start: usize,
    id: String,
    form: RefForm,
}

#[derive(Debug)]
enum RefForm {
    /// `[<title>](<id>.md)`: the span and title are fully delimited.
    Markdown { title: String, end: usize },
    /// `[[<id>]]` followed by free-running title text. The title has no
    /// closing delimiter; the resolver decides where it ends using the
    /// catalog.
    Bracketed { region_start: usize },
}

/// Rewrites internal references in note bodies using the catalog.
///
/// Two reference forms are recognized: the bracketed-identifier form
/// `[[<id>]] <title>` and the markdown form `[<title>](<id>.md)`. Everything
/// outside matched spans is preserved byte for byte; references resolve left
/// to right and never overlap.
pub struct LinkResolver<'a> {
    catalog: &'a Catalog,
    pages_dir: &'a str,
}

impl<'a> LinkResolver<'a> {
    pub fn new(catalog: &'a Catalog, pages_dir: &'a str) -> Self {
        Self { catalog, pages_dir }
    }

    /// Produce the rewritten body for a published note plus the diagnostics
    /// found along the way.
    pub fn resolve(&self, note: &Note) -> (String, Vec<LinkDiagnostic>) {
        let mut out = String::with_capacity(note.body.len());
        let mut diagnostics = Vec::new();

        for chunk in note.body.split_inclusive('\n') {
            let (line, terminator) = split_line_terminator(chunk);
            self.resolve_line(note, line, &mut out, &mut diagnostics);
            out.push_str(terminator);
        }

        (out, diagnostics)
    }

    fn resolve_line(
        &self,
        source: &Note,
        line: &str,
        out: &mut String,
        diagnostics: &mut Vec<LinkDiagnostic>,
    ) {
        let mut cursor = 0;
        while let Some(r) = next_reference(line, cursor) {
            out.push_str(&line[cursor..r.start]);

            let target = self.catalog.get(&r.id).filter(|t| t.published);
            cursor = match r.form {
                RefForm::Markdown { title, end } => {
                    self.emit_markdown(source, target, &r.id, title, &line[r.start..end], out, diagnostics);
                    end
                }
                RefForm::Bracketed { region_start } => self.emit_bracketed(
                    source,
                    target,
                    &r.id,
                    line,
                    r.start,
                    region_start,
                    out,
                    diagnostics,
                ),
            };
        }
        out.push_str(&line[cursor..]);
    }

    fn emit_markdown(
        &self,
        source: &Note,
        target: Option<&Note>,
        id: &str,
        written: String,
        span: &str,
        out: &mut String,
        diagnostics: &mut Vec<LinkDiagnostic>,
    ) {
        match target {
            None => {
                diagnostics.push(LinkDiagnostic::Broken {
                    target: id.to_string(),
                    written_title: written,
                });
                // Never drop a broken reference silently; keep the span and
                // mark it.
                out.push_str(span);
                out.push_str(" *(broken link)*");
            }
            Some(target) => {
                if written != target.title {
                    diagnostics.push(LinkDiagnostic::Stale {
                        target: id.to_string(),
                        written,
                        current: target.title.clone(),
                    });
                }
                self.emit_link(source, target, out);
            }
        }
    }

    /// Resolve a bracketed reference and return the new cursor position.
    ///
    /// When the text after `]]` begins with the target's current title (on a
    /// word boundary), exactly that much is consumed and the reference is
    /// up to date. Otherwise the written title runs to the next `[` or end
    /// of line, so a following reference and its surrounding prose are never
    /// part of the consumed span: stale for a published target, marked in
    /// place for a broken one.
    #[allow(clippy::too_many_arguments)]
    fn emit_bracketed(
        &self,
        source: &Note,
        target: Option<&Note>,
        id: &str,
        line: &str,
        start: usize,
        region_start: usize,
        out: &mut String,
        diagnostics: &mut Vec<LinkDiagnostic>,
    ) -> usize {
        let rest = &line[region_start..];
        let lead = rest.len() - rest.trim_start().len();
        let after_lead = &rest[lead..];

        if let Some(target) = target {
            if !target.title.is_empty() && after_lead.starts_with(&target.title) {
                let tail = &after_lead[target.title.len()..];
                if tail.chars().next().is_none_or(|c| !c.is_alphanumeric()) {
                    self.emit_link(source, target, out);
                    return region_start + lead + target.title.len();
                }
            }

            let written = written_title(after_lead);
            diagnostics.push(LinkDiagnostic::Stale {
                target: id.to_string(),
                written: written.to_string(),
                current: target.title.clone(),
            });
            self.emit_link(source, target, out);
            if written.is_empty() {
                region_start
            } else {
                region_start + lead + written.len()
            }
        } else {
            let written = written_title(after_lead);
            let end = if written.is_empty() {
                region_start
            } else {
                region_start + lead + written.len()
            };
            diagnostics.push(LinkDiagnostic::Broken {
                target: id.to_string(),
                written_title: written.to_string(),
            });
            out.push_str(&line[start..end]);
            out.push_str(" *(broken link)*");
            end
        }
    }

    /// Always render the current title so the page is self-consistent.
    fn emit_link(&self, source: &Note, target: &Note, out: &mut String) {
        out.push('[');
        out.push_str(&target.title);
        out.push_str("](");
        out.push_str(&self.relative_target(source, target));
        out.push(')');
    }

    /// Site-relative path from the source note's page to the target's page.
    /// Zettel pages live under the pages subfolder; everything else sits at
    /// the destination root.
    fn relative_target(&self, source: &Note, target: &Note) -> String {
        let source_in_pages = source.kind == NoteKind::Zettel;
        match (source_in_pages, target.kind) {
            (true, NoteKind::Zettel) => format!("{}.html", target.id),
            (true, NoteKind::Home) => "../index.html".to_string(),
            (true, NoteKind::About) => "../about.html".to_string(),
            (false, NoteKind::Zettel) => format!("{}/{}.html", self.pages_dir, target.id),
            (false, NoteKind::Home) => "index.html".to_string(),
            (false, NoteKind::About) => "about.html".to_string(),
        }
    }
}

fn split_line_terminator(chunk: &str) -> (&str, &str) {
    if let Some(line) = chunk.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = chunk.strip_suffix('\n') {
        (line, "\n")
    } else {
        (chunk, "")
    }
}

/// Earliest reference starting at or after `from`, in either form.
fn next_reference(line: &str, from: usize) -> Option<ParsedRef> {
    let mut i = from;
    while i < line.len() {
        let start = i + line[i..].find('[')?;

        if line[start..].starts_with("[[") {
            if let Some(r) = parse_bracketed(line, start) {
                return Some(r);
            }
        }
        // A markdown-form title may itself begin with a bracket, so try this
        // form either way.
        if let Some(r) = parse_markdown_link(line, start) {
            return Some(r);
        }

        i = start + 1;
    }

    None
}

/// `[[<id>]]`; the title text after the brackets is the resolver's business.
fn parse_bracketed(line: &str, start: usize) -> Option<ParsedRef> {
    let after = &line[start + 2..];
    let close = after.find("]]")?;
    let id = &after[..close];
    if !is_note_id(id) {
        return None;
    }

    Some(ParsedRef {
        start,
        id: id.to_string(),
        form: RefForm::Bracketed {
            region_start: start + 2 + close + 2,
        },
    })
}

/// A written title that did not match the current one runs to the next
/// bracket or end of line. Bounding it at `[` keeps any following reference
/// out of the consumed span.
fn written_title(after_lead: &str) -> &str {
    let end = after_lead.find('[').unwrap_or(after_lead.len());
    after_lead[..end].trim_end()
}

/// `[<title>](<id>.md)` with bracket matching, so the title may itself
/// contain brackets.
fn parse_markdown_link(line: &str, start: usize) -> Option<ParsedRef> {
    let mut depth = 0usize;
    let mut close = None;
    for (j, c) in line[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(start + j);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    if !line[close + 1..].starts_with('(') {
        return None;
    }
    let target_start = close + 2;
    let target_end = target_start + line[target_start..].find(')')?;
    let target = &line[target_start..target_end];

    let id = target.strip_suffix(".md")?;
    if !is_note_id(id) {
        return None;
    }

    Some(ParsedRef {
        start,
        id: id.to_string(),
        form: RefForm::Markdown {
            title: line[start + 1..close].to_string(),
            end: target_end + 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Note, NoteKind};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn note(id: &str, kind: NoteKind, title: &str, published: bool, body: &str) -> Note {
        Note {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            tags: BTreeSet::new(),
            published,
            body: body.to_string(),
            attachments: BTreeSet::new(),
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

    fn resolve(catalog: &Catalog, source_id: &str) -> (String, Vec<LinkDiagnostic>) {
        let resolver = LinkResolver::new(catalog, "pages");
        resolver.resolve(catalog.get(source_id).unwrap())
    }

    #[test]
    fn rewrites_bracketed_reference() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "See [[20230101000000]] First for more.",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "See [First](20230101000000.html) for more.");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn rewrites_markdown_reference() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "See [First](20230101000000.md).",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "See [First](20230101000000.html).");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn stale_title_is_rewritten_and_reported_once() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "New title", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "See [[20230101000000]] Old title",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "See [New title](20230101000000.html)");
        assert_eq!(
            diagnostics,
            vec![LinkDiagnostic::Stale {
                target: "20230101000000".to_string(),
                written: "Old title".to_string(),
                current: "New title".to_string(),
            }]
        );
    }

    #[test]
    fn broken_reference_is_marked_not_dropped() {
        let catalog = catalog_with(vec![note(
            "20230102000000",
            NoteKind::Zettel,
            "Second",
            true,
            "See [[20230101000000]] Gone",
        )]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "See [[20230101000000]] Gone *(broken link)*");
        assert_eq!(
            diagnostics,
            vec![LinkDiagnostic::Broken {
                target: "20230101000000".to_string(),
                written_title: "Gone".to_string(),
            }]
        );
    }

    #[test]
    fn unpublished_target_is_broken() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "Draft", false, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "[Draft](20230101000000.md)",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "[Draft](20230101000000.md) *(broken link)*");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn multiple_references_per_line_resolve_left_to_right() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note("20230103000000", NoteKind::Zettel, "Third", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "[[20230101000000]] First and [[20230103000000]] Third",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(
            body,
            "[First](20230101000000.html) and [Third](20230103000000.html)"
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn surrounding_text_is_preserved() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "pre\r\nmid [First](20230101000000.md) post\r\n\npost-block\n",
            ),
        ]);

        let (body, _) = resolve(&catalog, "20230102000000");
        assert_eq!(
            body,
            "pre\r\nmid [First](20230101000000.html) post\r\n\npost-block\n"
        );
    }

    #[test]
    fn links_from_the_homepage_point_into_the_pages_folder() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "index",
                NoteKind::Home,
                "Home",
                true,
                "[First](20230101000000.md) and [About](about.md)",
            ),
            note("about", NoteKind::About, "About", true, ""),
        ]);

        let (body, _) = resolve(&catalog, "index");
        assert_eq!(
            body,
            "[First](pages/20230101000000.html) and [About](about.html)"
        );
    }

    #[test]
    fn page_links_back_to_the_homepage_climb_out_of_the_pages_folder() {
        let catalog = catalog_with(vec![
            note("index", NoteKind::Home, "Home", true, ""),
            note(
                "20230101000000",
                NoteKind::Zettel,
                "First",
                true,
                "[Home](index.md)",
            ),
        ]);

        let (body, _) = resolve(&catalog, "20230101000000");
        assert_eq!(body, "[Home](../index.html)");
    }

    #[test]
    fn bracketed_title_in_markdown_form_is_matched() {
        // The shape the original zettelkasten convention produces.
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "[[q] First](20230101000000.md)",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "[First](20230101000000.html)");
        // Written title `[q] First` differs from `First`, so it reads stale.
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn bare_bracketed_id_is_rewritten_with_the_current_title() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "See [[20230101000000]], nothing else.",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        // The comma is punctuation, not a title, so the written title is
        // everything up to end of line.
        assert_eq!(body, "See [First](20230101000000.html)");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn stale_bracketed_title_stops_before_a_following_reference() {
        let catalog = catalog_with(vec![
            note("20230101000000", NoteKind::Zettel, "First", true, ""),
            note("20230103000000", NoteKind::Zettel, "Third", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "[[20230101000000]] Wrong and [Third](20230103000000.md) after.",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(
            body,
            "[First](20230101000000.html) [Third](20230103000000.html) after."
        );
        assert_eq!(
            diagnostics,
            vec![LinkDiagnostic::Stale {
                target: "20230101000000".to_string(),
                written: "Wrong and".to_string(),
                current: "First".to_string(),
            }]
        );
    }

    #[test]
    fn broken_bracketed_reference_leaves_a_following_reference_intact() {
        let catalog = catalog_with(vec![
            note("20230103000000", NoteKind::Zettel, "Third", true, ""),
            note(
                "20230102000000",
                NoteKind::Zettel,
                "Second",
                true,
                "[[19990101000000]] [Third](20230103000000.md)",
            ),
        ]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(
            body,
            "[[19990101000000]] *(broken link)* [Third](20230103000000.html)"
        );
        assert_eq!(
            diagnostics,
            vec![LinkDiagnostic::Broken {
                target: "19990101000000".to_string(),
                written_title: String::new(),
            }]
        );
    }

    #[test]
    fn plain_external_links_pass_through() {
        let catalog = catalog_with(vec![note(
            "20230102000000",
            NoteKind::Zettel,
            "Second",
            true,
            "[site](https://example.com) and [doc](readme.md)",
        )]);

        let (body, diagnostics) = resolve(&catalog, "20230102000000");
        assert_eq!(body, "[site](https://example.com) and [doc](readme.md)");
        assert!(diagnostics.is_empty());
    }
}
