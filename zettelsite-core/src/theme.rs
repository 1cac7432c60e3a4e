use crate::config::Settings;

/// Site stylesheet generated from the color settings.
pub fn stylesheet(settings: &Settings) -> String {
    let c = &settings.colors;
    format!(
        "body {{
    background-color: {body_background};
    margin: 0;
    font-family: sans-serif;
    line-height: 1.5;
}}

main {{
    max-width: 42em;
    margin: 0 auto;
    padding: 1em;
}}

header {{
    background-color: {header_background};
    color: {header_text};
    padding: 0.8em 1em;
}}

header a {{
    color: {header_text};
    margin-right: 1em;
    text-decoration: none;
}}

header a:hover {{
    color: {header_hover};
}}

main a {{
    color: {body_link};
}}

main a:hover {{
    color: {body_hover};
}}

footer {{
    text-align: center;
    padding: 1em;
    font-size: 0.85em;
}}

pre {{
    overflow-x: auto;
    padding: 0.8em;
}}
",
        body_background = c.body_background,
        header_background = c.header_background,
        header_text = c.header_text,
        header_hover = c.header_hover,
        body_link = c.body_link,
        body_hover = c.body_hover,
    )
}

/// Shared page header: site title plus navigation to the index pages.
/// Links are rooted so the same header works from the pages subfolder.
/// The about entry only appears when the site has an about page.
pub fn header_html(settings: &Settings, include_about: bool) -> String {
    let about = if include_about {
        "<a href=\"/about.html\">about</a>\n"
    } else {
        ""
    };
    format!(
        "<header>
<strong>{title}</strong>
<nav>
<a href=\"/index.html\">home</a>
{about}<a href=\"/alphabetical-index.html\">index</a>
<a href=\"/chronological-index.html\">timeline</a>
</nav>
</header>
",
        title = html_escape::encode_text(&settings.site_title),
        about = about,
    )
}

pub fn footer_html(settings: &Settings) -> String {
    if settings.copyright_text.is_empty() {
        "<footer></footer>\n".to_string()
    } else {
        format!(
            "<footer>{}</footer>\n",
            html_escape::encode_text(&settings.copyright_text)
        )
    }
}

/// Assemble a complete HTML page around a rendered markdown body. Narrow
/// string assembly; the header and footer snippets are embedded inline.
pub fn html_page(title: &str, body_html: &str, settings: &Settings, include_about: bool) -> String {
    format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>{title}</title>
<link rel=\"stylesheet\" href=\"/style.css\">
</head>
<body>
{header}<main>
{body}</main>
{footer}</body>
</html>
",
        title = html_escape::encode_text(title),
        header = header_html(settings, include_about),
        body = body_html,
        footer = footer_html(settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_uses_configured_colors() {
        let mut settings = Settings::default();
        settings.colors.body_background = "#123456".to_string();
        let css = stylesheet(&settings);
        assert!(css.contains("background-color: #123456;"));
    }

    #[test]
    fn header_contains_escaped_site_title() {
        let settings = Settings {
            site_title: "Notes <3".to_string(),
            ..Settings::default()
        };
        let header = header_html(&settings, true);
        assert!(header.contains("Notes &lt;3"));
    }

    #[test]
    fn nav_omits_about_when_there_is_no_about_page() {
        let settings = Settings::default();
        assert!(!header_html(&settings, false).contains("about.html"));
        assert!(header_html(&settings, true).contains("about.html"));
    }

    #[test]
    fn page_wraps_body_with_header_and_footer() {
        let settings = Settings::default();
        let page = html_page("First", "<p>hello</p>", &settings, true);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>First</title>"));
        assert!(page.contains("<p>hello</p>"));
        assert!(page.contains("<header>"));
        assert!(page.contains("<footer>"));
    }
}
