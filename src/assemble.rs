//! Assembles the full output page set: home pages (one per pagination
//! page), post pages, tag pages plus the tag index, the about page, the 404
//! page, the sitemap, and the Atom feed. The result is an in-memory mapping
//! of output path to rendered string; writing is the caller's concern.
//!
//! Output paths must be unique: two logical pages mapping to the same path
//! is a fatal [`Error::Collision`], detected before anything is rendered.
//! Individual page render failures are best-effort: the failed page is
//! skipped and reported in [`Report::failures`] while the remaining pages
//! still render.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::config::Config;
use crate::content::Document;
use crate::feed::{self, FeedConfig};
use crate::paginate::{self, paginate};
use crate::sitemap::{self, absolute_url, UrlEntry};
use crate::tags::TagIndex;
use crate::template::{self, Engine};
use crate::value::{map, Context, Value};

/// What kind of content an output string holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContentKind {
    Html,
    Xml,
}

/// One rendered output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    pub content: String,
    pub kind: ContentKind,
}

/// The assembled site: output path (URL-like, `/posts/my-post/`) to
/// rendered content. A `BTreeMap` keeps write order deterministic.
pub type RenderedOutput = BTreeMap<String, OutputFile>;

/// A page that failed to render, with enough context to diagnose it.
#[derive(Debug)]
pub struct PageFailure {
    pub path: String,
    pub template: String,
    pub err: template::Error,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "rendering `{}` with template `{}`: {}",
            self.path, self.template, self.err
        )
    }
}

/// The result of an assembly run: the rendered pages plus any per-page
/// failures that were skipped.
#[derive(Debug)]
pub struct Report {
    pub output: RenderedOutput,
    pub failures: Vec<PageFailure>,
}

/// Orchestrates documents, collections, configuration, and the template
/// engine into the output page set.
pub struct Assembler<'a> {
    engine: &'a Engine,
    config: &'a Config,
    /// Pre-rendered HTML for the about page, when about content exists.
    about_html: Option<String>,
}

/// A planned output page, before rendering.
struct PlannedPage {
    path: String,
    template: &'static str,
    context: Context,
    /// Post pages carry their date into the sitemap's `<lastmod>`.
    lastmod: Option<NaiveDate>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        engine: &'a Engine,
        config: &'a Config,
        about_html: Option<String>,
    ) -> Assembler<'a> {
        Assembler {
            engine,
            config,
            about_html,
        }
    }

    /// Produces the output paths this site would generate, verifying path
    /// uniqueness without rendering anything. This is the dry-validate
    /// entry point.
    pub fn plan(
        &self,
        documents: &[Document],
        index: &TagIndex,
    ) -> Result<Vec<String>> {
        let pages = self.pages(documents, index)?;
        let mut paths: Vec<String> =
            pages.into_iter().map(|page| page.path).collect();
        paths.push(String::from("/sitemap.xml"));
        paths.push(String::from("/feed.atom"));
        Ok(paths)
    }

    /// Renders the full page set. Path collisions abort before any page is
    /// rendered; per-page template failures are collected and skipped.
    pub fn assemble(
        &self,
        documents: &[Document],
        index: &TagIndex,
    ) -> Result<Report> {
        let pages = self.pages(documents, index)?;

        let mut output = RenderedOutput::new();
        let mut failures = Vec::new();
        let mut entries = Vec::with_capacity(pages.len());

        for page in &pages {
            match self.engine.render(page.template, &page.context) {
                Ok(html) => {
                    output.insert(
                        page.path.clone(),
                        OutputFile {
                            content: html,
                            kind: ContentKind::Html,
                        },
                    );
                    entries.push(UrlEntry {
                        loc: absolute_url(
                            self.config.site.url.as_ref(),
                            &page.path,
                        ),
                        lastmod: page.lastmod,
                    });
                }
                Err(err) => failures.push(PageFailure {
                    path: page.path.clone(),
                    template: page.template.to_owned(),
                    err,
                }),
            }
        }

        output.insert(
            String::from("/sitemap.xml"),
            OutputFile {
                content: sitemap::generate(&entries),
                kind: ContentKind::Xml,
            },
        );

        let feed = feed::generate(
            &FeedConfig {
                title: &self.config.site.title,
                site_url: self.config.site.url.as_ref(),
                author: &self.config.content.default_author,
            },
            documents,
        )?;
        output.insert(
            String::from("/feed.atom"),
            OutputFile {
                content: feed,
                kind: ContentKind::Xml,
            },
        );

        Ok(Report { output, failures })
    }

    /// Plans every page with its template and context, and rejects planned
    /// path collisions.
    fn pages(
        &self,
        documents: &[Document],
        index: &TagIndex,
    ) -> Result<Vec<PlannedPage>> {
        let mut pages = Vec::new();

        // Home pages, one per pagination page.
        for page in paginate(documents, self.config.content.posts_per_page)? {
            let path = match page.number {
                1 => String::from("/"),
                n => format!("/page/{}/", n),
            };
            let mut context = self.base_context();
            context.insert(
                "posts",
                Value::List(page.items.iter().map(document_value).collect()),
            );
            context.insert("page", page_nav_value(&page));
            pages.push(self.page(path, "index", context, None));
        }

        // One page per document.
        for document in documents {
            let mut context = self.base_context();
            context.insert("post", document_value(document));
            pages.push(self.page(
                document.url.clone(),
                "post",
                context,
                Some(document.date),
            ));
        }

        // One page per tag, plus the tag index.
        for (tag, tagged) in index.iter() {
            let mut context = self.base_context();
            context.insert("tag", tag_value(tag));
            context.insert("count", tagged.len());
            context.insert(
                "posts",
                Value::List(
                    tagged.iter().map(|&d| document_value(d)).collect(),
                ),
            );
            pages.push(self.page(tag_path(tag), "tag", context, None));
        }
        let mut context = self.base_context();
        context.insert(
            "tags",
            Value::List(
                index
                    .iter()
                    .map(|(tag, tagged)| {
                        map(vec![
                            ("name", Value::from(tag)),
                            ("url", Value::from(tag_path(tag))),
                            ("count", Value::from(tagged.len())),
                        ])
                    })
                    .collect(),
            ),
        );
        pages.push(self.page(String::from("/tags/"), "tags", context, None));

        if let Some(about_html) = &self.about_html {
            let mut context = self.base_context();
            context
                .insert("about", map(vec![("html", Value::from(about_html.clone()))]));
            pages.push(self.page(String::from("/about/"), "about", context, None));
        }

        let context = self.base_context();
        pages.push(self.page(String::from("/404.html"), "404", context, None));

        // Collision check over the whole plan, before any render.
        let mut seen = std::collections::HashSet::new();
        for page in &pages {
            if !seen.insert(page.path.as_str()) {
                return Err(Error::Collision {
                    path: page.path.clone(),
                });
            }
        }
        Ok(pages)
    }

    fn page(
        &self,
        path: String,
        template: &'static str,
        context: Context,
        lastmod: Option<NaiveDate>,
    ) -> PlannedPage {
        PlannedPage {
            path,
            template,
            context,
            lastmod,
        }
    }

    /// The uniform context every page starts from: site metadata,
    /// navigation items, and social links.
    fn base_context(&self) -> Context {
        let site = &self.config.site;
        let mut context = Context::new();
        context.insert(
            "site",
            map(vec![
                ("title", Value::from(site.title.as_str())),
                ("description", Value::from(site.description.as_str())),
                ("language", Value::from(site.language.as_str())),
                (
                    "url",
                    match &site.url {
                        Some(url) => Value::from(url.to_string()),
                        None => Value::Null,
                    },
                ),
            ]),
        );
        context.insert(
            "navigation",
            Value::List(
                self.config
                    .navigation
                    .items
                    .iter()
                    .map(|item| {
                        map(vec![
                            ("label", Value::from(item.label.as_str())),
                            ("url", Value::from(item.url.as_str())),
                        ])
                    })
                    .collect(),
            ),
        );
        context.insert(
            "social",
            Value::List(
                self.config
                    .social
                    .links
                    .iter()
                    .map(|link| {
                        map(vec![
                            ("name", Value::from(link.name.as_str())),
                            ("url", Value::from(link.url.as_str())),
                        ])
                    })
                    .collect(),
            ),
        );
        context
    }
}

fn tag_path(tag: &str) -> String {
    format!("/tags/{}/", tag)
}

/// Converts a [`Document`] into the template value exposed as `post`.
fn document_value(document: &Document) -> Value {
    map(vec![
        ("slug", Value::from(document.slug.as_str())),
        ("title", Value::from(document.title.as_str())),
        ("date", Value::from(document.date.format("%Y-%m-%d").to_string())),
        ("url", Value::from(document.url.as_str())),
        ("summary", Value::from(document.summary.as_str())),
        ("author", Value::from(document.author.as_str())),
        ("html", Value::from(document.html.as_str())),
        ("reading_time", Value::from(document.reading_time_minutes)),
        (
            "tags",
            Value::List(
                document
                    .tags
                    .iter()
                    .map(|tag| tag_value(tag))
                    .collect(),
            ),
        ),
        (
            "headings",
            Value::List(
                document
                    .headings
                    .iter()
                    .map(|heading| {
                        map(vec![
                            ("id", Value::from(heading.id.as_str())),
                            ("text", Value::from(heading.text.as_str())),
                            ("level", Value::from(heading.level as usize)),
                        ])
                    })
                    .collect(),
            ),
        ),
    ])
}

fn tag_value(tag: &str) -> Value {
    map(vec![
        ("name", Value::from(tag)),
        ("url", Value::from(tag_path(tag))),
    ])
}

fn page_nav_value(page: &paginate::Page<Document>) -> Value {
    let page_url = |number: usize| match number {
        1 => String::from("/"),
        n => format!("/page/{}/", n),
    };
    map(vec![
        ("number", Value::from(page.number)),
        ("total", Value::from(page.total_pages)),
        ("has_previous", Value::from(page.has_previous())),
        ("has_next", Value::from(page.has_next())),
        (
            "previous_url",
            match page.has_previous() {
                true => Value::from(page_url(page.number - 1)),
                false => Value::Null,
            },
        ),
        (
            "next_url",
            match page.has_next() {
                true => Value::from(page_url(page.number + 1)),
                false => Value::Null,
            },
        ),
    ])
}

/// The result of a fallible assembly operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a fatal assembly error. Per-page render failures are not
/// errors at this level; they are collected in [`Report::failures`].
#[derive(Debug)]
pub enum Error {
    /// Returned when two logical pages map to the same output path.
    Collision { path: String },

    /// Returned when pagination parameters are invalid.
    Paginate(paginate::Error),

    /// Returned when the Atom feed cannot be generated.
    Feed(feed::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Collision { path } => write!(
                f,
                "two pages map to the same output path `{}`",
                path
            ),
            Error::Paginate(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Collision { .. } => None,
            Error::Paginate(err) => Some(err),
            Error::Feed(err) => Some(err),
        }
    }
}

impl From<paginate::Error> for Error {
    /// Converts a [`paginate::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when paginating collections.
    fn from(err: paginate::Error) -> Error {
        Error::Paginate(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts a [`feed::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when generating the feed.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}
