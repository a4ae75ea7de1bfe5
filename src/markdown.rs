//! Converts Markdown body text into HTML. Instead of
//! [`pulldown_cmark::html::push_html`], a custom renderer drives the event
//! stream so that:
//!
//! * level-2 and level-3 headings receive deterministic, collision-free `id`
//!   attributes and are collected for tables of contents;
//! * links with an absolute URI get `target="_blank"
//!   rel="noopener noreferrer"` while relative links are left alone;
//! * images expand to `<figure>` elements with the alt text as a
//!   `<figcaption>`;
//! * fenced code blocks carry their language as a `language-*` class.
//!
//! Also home to the reading-time estimate, which counts words on the
//! Markdown source after stripping HTML tags, link/image markup, and
//! emphasis markers.

use pulldown_cmark::escape::{escape_href, escape_html};
use pulldown_cmark::{
    Alignment, CodeBlockKind, Event, LinkType, Options, Parser, Tag,
};
use std::io;
use url::Url;

/// A heading anchor extracted during rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct Heading {
    pub id: String,
    pub text: String,
    pub level: u32,
}

/// The result of rendering a Markdown body.
#[derive(Clone, Debug, Default)]
pub struct Rendered {
    pub html: String,
    pub headings: Vec<Heading>,
}

/// Renders Markdown to HTML with GitHub-flavored extensions (tables,
/// strikethrough, task lists) enabled.
pub fn render(body: &str) -> io::Result<Rendered> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let mut renderer = HtmlRenderer::new();
    for event in Parser::new_ext(body, options) {
        renderer.on_event(event)?;
    }
    Ok(Rendered {
        html: renderer.out,
        headings: renderer.headings,
    })
}

/// The reading-time estimate in whole minutes: `ceil(words / wpm)` with a
/// floor of one minute.
pub fn reading_time(body: &str, words_per_minute: usize) -> usize {
    let words = word_count(body);
    std::cmp::max(1, (words + words_per_minute - 1) / words_per_minute)
}

/// Counts words in a Markdown body. HTML tags, link/image URL markup, and
/// single-character emphasis markers are stripped before splitting on
/// whitespace, so `**bold**` and `[text](url)` each count as one word.
pub fn word_count(body: &str) -> usize {
    let mut filtered = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                // Skip an inline HTML tag.
                for tag_char in &mut chars {
                    if tag_char == '>' {
                        break;
                    }
                }
            }
            ']' if chars.peek() == Some(&'(') => {
                // Link/image destination: the text was already kept.
                for url_char in &mut chars {
                    if url_char == ')' {
                        break;
                    }
                }
                filtered.push(' ');
            }
            '*' | '_' | '`' | '#' | '!' | '[' | ']' => {}
            _ => filtered.push(c),
        }
    }
    filtered.split_whitespace().count()
}

enum TableState {
    Head,
    Body,
}

/// Captures the content of an in-flight heading so its `id` can be derived
/// from the text before the opening tag is written.
struct HeadingCapture {
    level: u32,
    html: String,
    text: String,
}

/// Captures the alt text of an in-flight image; markup inside the alt text
/// is discarded.
struct ImageCapture {
    dest: String,
    title: String,
    alt: String,
}

/// Renders markdown [`Event`]s into HTML. Modeled on [`pulldown_cmark`]'s
/// own private HtmlWriter, with the heading/link/image handling this crate
/// needs layered on top.
struct HtmlRenderer {
    out: String,
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,
    heading: Option<HeadingCapture>,
    image: Option<ImageCapture>,
    used_ids: std::collections::HashMap<String, usize>,
    headings: Vec<Heading>,
}

impl HtmlRenderer {
    fn new() -> Self {
        HtmlRenderer {
            out: String::new(),
            table_alignments: Vec::new(),
            table_state: TableState::Head,
            table_cell_index: 0,
            heading: None,
            image: None,
            used_ids: std::collections::HashMap::new(),
            headings: Vec::new(),
        }
    }

    /// The current output target: dropped entirely inside an image capture,
    /// diverted into the heading buffer inside a heading.
    fn sink(&mut self) -> Option<&mut String> {
        if self.image.is_some() {
            return None;
        }
        match &mut self.heading {
            Some(capture) => Some(&mut capture.html),
            None => Some(&mut self.out),
        }
    }

    fn push(&mut self, s: &str) {
        if let Some(sink) = self.sink() {
            sink.push_str(s);
        }
    }

    fn push_escaped(&mut self, s: &str) -> io::Result<()> {
        let mut escaped = String::new();
        escape_html(&mut escaped, s)?;
        self.push(&escaped);
        Ok(())
    }

    fn on_event(&mut self, event: Event) -> io::Result<()> {
        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(tag) => self.on_end(tag),
            Event::Text(text) => self.on_text(&text),
            Event::Code(code) => self.on_code(&code),
            Event::Html(html) => {
                self.push(&html);
                Ok(())
            }
            Event::SoftBreak => {
                self.push("\n");
                Ok(())
            }
            Event::HardBreak => {
                self.push("<br />");
                Ok(())
            }
            Event::Rule => {
                self.push("<hr />");
                Ok(())
            }
            Event::TaskListMarker(checked) => {
                self.push(match checked {
                    true => {
                        r#"<input disabled="" type="checkbox" checked=""/>"#
                    }
                    false => r#"<input disabled="" type="checkbox"/>"#,
                });
                Ok(())
            }
            Event::FootnoteReference(name) => {
                let mut escaped = String::new();
                escape_html(&mut escaped, &name)?;
                self.push(&format!(
                    r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                    escaped, escaped
                ));
                Ok(())
            }
        }
    }

    fn on_start(&mut self, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => self.push("<p>"),
            Tag::Heading(level) if (2..=3).contains(&level) => {
                self.heading = Some(HeadingCapture {
                    level,
                    html: String::new(),
                    text: String::new(),
                });
            }
            Tag::Heading(level) => self.push(&format!("<h{}>", level)),
            Tag::BlockQuote => self.push("<blockquote>"),
            Tag::CodeBlock(kind) => match kind {
                CodeBlockKind::Fenced(info) => {
                    match info.split(' ').next().unwrap_or("") {
                        "" => self.push("<pre><code>"),
                        lang => {
                            let mut escaped = String::new();
                            escape_html(&mut escaped, lang)?;
                            self.push(&format!(
                                r#"<pre><code class="language-{}">"#,
                                escaped
                            ));
                        }
                    }
                }
                CodeBlockKind::Indented => self.push("<pre><code>"),
            },
            Tag::List(None) => self.push("<ul>"),
            Tag::List(Some(1)) => self.push("<ol>"),
            Tag::List(Some(start)) => {
                self.push(&format!(r#"<ol start="{}">"#, start))
            }
            Tag::Item => self.push("<li>"),
            Tag::Emphasis => self.push("<em>"),
            Tag::Strong => self.push("<strong>"),
            Tag::Strikethrough => self.push("<del>"),
            Tag::Link(LinkType::Email, dest, title) => {
                self.push_link("mailto:", &dest, &title, false)?
            }
            Tag::Link(_, dest, title) => {
                let external = Url::parse(&dest).is_ok();
                self.push_link("", &dest, &title, external)?
            }
            Tag::Image(_, dest, title) => {
                self.image = Some(ImageCapture {
                    dest: dest.into_string(),
                    title: title.into_string(),
                    alt: String::new(),
                });
            }
            Tag::FootnoteDefinition(name) => {
                let mut escaped = String::new();
                escape_html(&mut escaped, &name)?;
                self.push(&format!(
                    r#"<div class="footnote-definition" id="{}">{}. "#,
                    escaped, escaped
                ));
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.push("<table>");
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                self.push("<thead><tr>");
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                self.push("<tr>");
            }
            Tag::TableCell => {
                let cell = match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                };
                let align =
                    match self.table_alignments.get(self.table_cell_index) {
                        Some(Alignment::Left) => r#" align="left""#,
                        Some(Alignment::Right) => r#" align="right""#,
                        Some(Alignment::Center) => r#" align="center""#,
                        _ => "",
                    };
                self.push(&format!("<{}{}>", cell, align));
            }
        }
        Ok(())
    }

    fn on_end(&mut self, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::Paragraph => self.push("</p>"),
            Tag::Heading(level) if (2..=3).contains(&level) => {
                if let Some(capture) = self.heading.take() {
                    let id = self.unique_id(&capture.text);
                    self.headings.push(Heading {
                        id: id.clone(),
                        text: capture.text.trim().to_owned(),
                        level: capture.level,
                    });
                    self.push(&format!(
                        r#"<h{} id="{}">{}</h{}>"#,
                        level, id, capture.html, level
                    ));
                }
            }
            Tag::Heading(level) => self.push(&format!("</h{}>", level)),
            Tag::BlockQuote => self.push("</blockquote>"),
            Tag::CodeBlock(_) => self.push("</code></pre>"),
            Tag::List(Some(_)) => self.push("</ol>"),
            Tag::List(None) => self.push("</ul>"),
            Tag::Item => self.push("</li>"),
            Tag::Emphasis => self.push("</em>"),
            Tag::Strong => self.push("</strong>"),
            Tag::Strikethrough => self.push("</del>"),
            Tag::Link(_, _, _) => self.push("</a>"),
            Tag::Image(_, _, _) => {
                if let Some(capture) = self.image.take() {
                    self.push_figure(&capture)?;
                }
            }
            Tag::FootnoteDefinition(_) => self.push("</div>"),
            Tag::Table(_) => self.push("</tbody></table>"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                self.push("</tr></thead><tbody>");
            }
            Tag::TableRow => self.push("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                self.push(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                });
            }
        }
        Ok(())
    }

    fn on_text(&mut self, s: &str) -> io::Result<()> {
        if let Some(capture) = &mut self.image {
            capture.alt.push_str(s);
            return Ok(());
        }
        if let Some(capture) = &mut self.heading {
            capture.text.push_str(s);
        }
        self.push_escaped(s)
    }

    fn on_code(&mut self, s: &str) -> io::Result<()> {
        if let Some(capture) = &mut self.image {
            capture.alt.push_str(s);
            return Ok(());
        }
        if let Some(capture) = &mut self.heading {
            capture.text.push_str(s);
        }
        self.push("<code>");
        self.push_escaped(s)?;
        self.push("</code>");
        Ok(())
    }

    fn push_link(
        &mut self,
        scheme_prefix: &str,
        dest: &str,
        title: &str,
        external: bool,
    ) -> io::Result<()> {
        let mut href = String::new();
        escape_href(&mut href, dest)?;
        let mut attrs = format!(r#"<a href="{}{}""#, scheme_prefix, href);
        if !title.is_empty() {
            let mut escaped = String::new();
            escape_html(&mut escaped, title)?;
            attrs.push_str(&format!(r#" title="{}""#, escaped));
        }
        if external {
            attrs.push_str(r#" target="_blank" rel="noopener noreferrer""#);
        }
        attrs.push('>');
        self.push(&attrs);
        Ok(())
    }

    fn push_figure(&mut self, capture: &ImageCapture) -> io::Result<()> {
        let mut src = String::new();
        escape_href(&mut src, &capture.dest)?;
        let mut alt = String::new();
        escape_html(&mut alt, &capture.alt)?;

        let mut figure = format!(r#"<figure><img src="{}" alt="{}""#, src, alt);
        if !capture.title.is_empty() {
            let mut title = String::new();
            escape_html(&mut title, &capture.title)?;
            figure.push_str(&format!(r#" title="{}""#, title));
        }
        figure.push_str(">");
        if !capture.alt.is_empty() {
            figure.push_str(&format!("<figcaption>{}</figcaption>", alt));
        }
        figure.push_str("</figure>");
        self.push(&figure);
        Ok(())
    }

    /// Derives a deterministic anchor id from heading text, appending a
    /// numeric disambiguator when two headings slugify identically.
    fn unique_id(&mut self, text: &str) -> String {
        let base = match slug::slugify(text) {
            s if s.is_empty() => String::from("section"),
            s => s,
        };
        let seen = self.used_ids.entry(base.clone()).or_insert(0);
        *seen += 1;
        match *seen {
            1 => base,
            n => format!("{}-{}", base, n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(body: &str) -> String {
        render(body).unwrap().html
    }

    #[test]
    fn test_paragraph() {
        assert_eq!(html("World"), "<p>World</p>");
    }

    #[test]
    fn test_heading_ids() {
        let rendered = render("## First\n\n### Second\n").unwrap();
        assert_eq!(
            rendered.html,
            "<h2 id=\"first\">First</h2><h3 id=\"second\">Second</h3>"
        );
        assert_eq!(
            rendered.headings,
            vec![
                Heading {
                    id: "first".to_owned(),
                    text: "First".to_owned(),
                    level: 2
                },
                Heading {
                    id: "second".to_owned(),
                    text: "Second".to_owned(),
                    level: 3
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_heading_ids_disambiguated() {
        let rendered = render("## Setup\n\n## Setup\n").unwrap();
        assert!(rendered.html.contains(r#"id="setup""#));
        assert!(rendered.html.contains(r#"id="setup-2""#));
    }

    #[test]
    fn test_top_level_heading_has_no_id() {
        assert_eq!(html("# Title"), "<h1>Title</h1>");
    }

    #[test]
    fn test_fenced_code_block_language() {
        assert_eq!(
            html("```rust\nfn main() {}\n```"),
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>"
        );
    }

    #[test]
    fn test_external_link_attributes() {
        let out = html("[site](https://example.org)");
        assert!(out.contains(
            r#"<a href="https://example.org" target="_blank" rel="noopener noreferrer">site</a>"#
        ));
    }

    #[test]
    fn test_relative_link_untouched() {
        let out = html("[other](/posts/other/)");
        assert_eq!(out, "<p><a href=\"/posts/other/\">other</a></p>");
    }

    #[test]
    fn test_image_becomes_figure() {
        assert_eq!(
            html("![A sunset](/img/sunset.jpg)"),
            "<p><figure><img src=\"/img/sunset.jpg\" alt=\"A sunset\">\
             <figcaption>A sunset</figcaption></figure></p>"
        );
    }

    #[test]
    fn test_image_without_alt_has_no_figcaption() {
        let out = html("![](/img/sunset.jpg)");
        assert!(out.contains("<figure>"));
        assert!(!out.contains("figcaption"));
    }

    #[test]
    fn test_strikethrough_and_task_list() {
        assert!(html("~~gone~~").contains("<del>gone</del>"));
        let out = html("- [x] done\n- [ ] todo\n");
        assert!(out.contains(r#"checked=""#));
        assert!(out.contains(r#"type="checkbox""#));
    }

    #[test]
    fn test_table() {
        let out = html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(out.contains("<table>"));
        assert!(out.contains("<th>a</th>"));
        assert!(out.contains("<td>1</td>"));
    }

    #[test]
    fn test_word_count_strips_markup() {
        assert_eq!(word_count("plain text here"), 3);
        assert_eq!(word_count("**bold** and *em*"), 3);
        assert_eq!(word_count("[text](https://example.org/a-long-url)"), 1);
        assert_eq!(word_count("<span>tagged</span> word"), 2);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_reading_time_exact_multiple() {
        let body = vec!["word"; 400].join(" ");
        assert_eq!(reading_time(&body, 200), 2);
    }

    #[test]
    fn test_reading_time_floor_is_one() {
        assert_eq!(reading_time("word", 200), 1);
        assert_eq!(reading_time("", 200), 1);
    }
}
