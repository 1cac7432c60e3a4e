use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Render a markdown body to an HTML fragment. Fenced code blocks get
/// syntax highlighting; everything else goes through pulldown-cmark as is.
pub fn render_markdown(body: &str) -> String {
    let options = Options::all();
    let parser = Parser::new_ext(body, options);

    let events: Vec<Event> = parser.collect();
    let mut processed_events = Vec::new();
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                // Collect all text events until the end of the code block
                let mut code_content = String::new();
                i += 1; // Skip the start event

                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code_content.push_str(text),
                        _ => {} // Ignore other events inside code blocks
                    }
                    i += 1;
                }

                processed_events.push(Event::Html(highlight_code(lang, &code_content).into()));
            }
            _ => {
                processed_events.push(events[i].clone());
            }
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed_events.into_iter());

    out
}

fn highlight_code(lang: &str, code: &str) -> String {
    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for unsupported languages
        match lang {
            "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            _ => None,
        }
    });

    if let Some(syntax) = syntax {
        let theme = &THEME_SET.themes["base16-ocean.dark"];
        highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| {
            format!("<pre><code>{}</code></pre>", html_escape::encode_text(code))
        })
    } else {
        format!("<pre><code>{}</code></pre>", html_escape::encode_text(code))
    }
}

/// First header line of a note body, with the leading `#` markers stripped.
///
/// A header needs whitespace after the marker run (`# Title`), which is what
/// separates it from a tag token like `#published`.
pub fn first_header_title(body: &str) -> Option<String> {
    for line in body.lines() {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if hashes == 0 {
            continue;
        }
        let rest = &trimmed[hashes..];
        if rest.is_empty() || rest.starts_with(' ') {
            return Some(rest.trim().to_string());
        }
    }

    None
}

/// True for a flat tag token: `#` followed by word characters only.
pub fn is_tag_token(token: &str) -> bool {
    match token.strip_prefix('#') {
        Some(rest) => {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }
        None => false,
    }
}

/// All tags in a body, lowercased, without the `#` prefix.
pub fn scan_tags(body: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for token in body.split_whitespace() {
        if is_tag_token(token) {
            tags.insert(token[1..].to_lowercase());
        }
    }

    tags
}

/// Remove lines that consist solely of tag tokens.
pub fn strip_tag_lines(body: &str) -> String {
    let mut out = String::new();
    for line in body.lines() {
        let mut tokens = line.split_whitespace();
        let tag_line =
            tokens.next().is_some_and(is_tag_token) && line.split_whitespace().all(is_tag_token);
        if !tag_line {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// Relative paths of non-markdown link targets referenced by a body, kept as
/// written so the copied file lands where the link points.
///
/// External URLs and in-page anchors don't count; neither do links to other
/// notes or pages, and nothing outside the source folder qualifies.
pub fn attachment_refs(body: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let mut rest = body;
    while let Some(start) = rest.find("](") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(')') else { break };
        let target = &after[..end];
        if is_attachment_target(target) {
            refs.insert(target.to_string());
        }
        rest = &after[end + 1..];
    }

    refs
}

fn is_attachment_target(target: &str) -> bool {
    if target.is_empty()
        || target.starts_with('#')
        || target.starts_with('/')
        || target.contains("://")
    {
        return false;
    }

    let path = Path::new(target);
    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return false;
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("html") => false,
        Some(_) => true,
        None => false,
    }
}
