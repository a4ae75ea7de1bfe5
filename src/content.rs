//! Defines the [`Document`] type and the logic for loading documents from a
//! content directory. Each Markdown file becomes one [`Document`]: the
//! frontmatter is split off and coerced ([`crate::frontmatter`]), the body
//! is rendered to HTML ([`crate::markdown`]), and the slug, title, date,
//! summary, and reading time are derived.
//!
//! A single malformed file is skipped with a warning; it never aborts the
//! whole load. Documents are immutable once constructed and are rebuilt
//! wholesale on the next build invocation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;

use crate::frontmatter;
use crate::markdown::{self, Heading};

/// One parsed content file. Constructed by [`load_all`]; immutable within a
/// build.
#[derive(Clone, Debug)]
pub struct Document {
    /// URL-safe identifier, derived from the file name or an explicit
    /// `slug:` frontmatter override. Stable across builds unless the source
    /// file's name or declared slug changes.
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    pub tags: Vec<String>,
    pub summary: String,
    pub author: String,
    /// Markdown source without the frontmatter block.
    pub raw_body: String,
    /// Rendered HTML, cached at load time.
    pub html: String,
    pub reading_time_minutes: usize,
    pub headings: Vec<Heading>,
    /// The page path for this document, e.g. `/posts/my-post/`.
    pub url: String,
}

/// Per-file loading parameters, cloned into worker threads during parallel
/// loads.
#[derive(Clone, Debug)]
pub struct LoaderOptions {
    pub default_author: String,
    pub words_per_minute: usize,
}

const MARKDOWN_EXTENSION: &str = ".md";

/// Walks `directory` and returns a vector of documents sorted by date
/// descending, ties broken by slug ascending. `threads` values below 2 use
/// the single-threaded walk.
pub fn load_all(
    directory: &Path,
    options: &LoaderOptions,
    threads: usize,
) -> Result<Vec<Document>> {
    let paths = markdown_files(directory)?;
    let mut documents = if threads < 2 {
        load_sequential(&paths, options)
    } else {
        load_parallel(paths, options, threads)
    };
    documents.sort_by(|a, b| {
        b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug))
    });
    Ok(documents)
}

/// Lists the Markdown files under `directory`, recursively. Failure to list
/// the directory itself is fatal; individual file problems surface later,
/// per file.
fn markdown_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for result in walkdir::WalkDir::new(directory).sort_by_file_name() {
        let entry = result?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(MARKDOWN_EXTENSION)
        {
            paths.push(entry.path().to_owned());
        }
    }
    Ok(paths)
}

fn load_sequential(
    paths: &[PathBuf],
    options: &LoaderOptions,
) -> Vec<Document> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match load_file(path, options) {
            Ok(document) => documents.push(document),
            Err(err) => warn!("skipping `{}`: {}", path.display(), err),
        }
    }
    documents
}

fn load_parallel(
    paths: Vec<PathBuf>,
    options: &LoaderOptions,
    threads: usize,
) -> Vec<Document> {
    use crossbeam_channel::unbounded;
    use std::thread;

    let (tx, rx) = unbounded::<PathBuf>();
    let mut handles = Vec::with_capacity(threads);
    for _ in 0..handles.capacity() {
        let rx = rx.clone();
        let options = options.clone();
        handles.push(thread::spawn(move || -> Vec<Document> {
            let mut documents = Vec::new();
            for path in rx {
                match load_file(&path, &options) {
                    Ok(document) => documents.push(document),
                    Err(err) => {
                        warn!("skipping `{}`: {}", path.display(), err)
                    }
                }
            }
            documents
        }));
    }

    for path in paths {
        // Send only fails if every receiver is gone, which would mean a
        // worker panicked; surfaced by the join below.
        let _ = tx.send(path);
    }
    drop(tx);

    let mut documents = Vec::new();
    for handle in handles {
        documents.extend(handle.join().unwrap());
    }
    documents
}

/// Parses a single content file into a [`Document`].
fn load_file(path: &Path, options: &LoaderOptions) -> Result<Document> {
    let contents = fs::read_to_string(path).map_err(|err| Error::Read {
        path: path.to_owned(),
        err,
    })?;
    let (metadata, body) = frontmatter::parse(&contents);

    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.trim_end_matches(MARKDOWN_EXTENSION);

    let slug = match scalar(&metadata, "slug") {
        Some(declared) => slug::slugify(declared),
        None => slug::slugify(stem),
    };

    let title = match scalar(&metadata, "title") {
        Some(title) => title.to_owned(),
        None => stem.replace('-', " ").replace('_', " "),
    };

    let date = match scalar(&metadata, "date") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(
            |_| Error::DateFormat {
                path: path.to_owned(),
                value: raw.to_owned(),
            },
        )?,
        None => {
            warn!(
                "`{}` has no `date:` field; using file modification time",
                path.display()
            );
            modification_date(path)?
        }
    };

    let tags = match metadata.get("tags") {
        Some(frontmatter::Value::List(tags)) => tags.clone(),
        Some(frontmatter::Value::Scalar(tag)) if !tag.is_empty() => {
            vec![tag.clone()]
        }
        _ => Vec::new(),
    };

    let author = scalar(&metadata, "author")
        .unwrap_or(&options.default_author)
        .to_owned();

    let rendered = markdown::render(body).map_err(|err| Error::Render {
        path: path.to_owned(),
        err,
    })?;

    let summary = match scalar(&metadata, "summary") {
        Some(summary) => summary.to_owned(),
        None => first_paragraph(&rendered.html),
    };

    Ok(Document {
        url: format!("/posts/{}/", slug),
        slug,
        title,
        date,
        tags,
        summary,
        author,
        raw_body: body.to_owned(),
        reading_time_minutes: markdown::reading_time(
            body,
            options.words_per_minute,
        ),
        html: rendered.html,
        headings: rendered.headings,
    })
}

fn scalar<'a>(metadata: &'a frontmatter::Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(|value| value.as_str())
}

fn modification_date(path: &Path) -> Result<NaiveDate> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|err| Error::Read {
            path: path.to_owned(),
            err,
        })?;
    let timestamp: DateTime<Utc> = modified.into();
    Ok(timestamp.date().naive_utc())
}

/// The inner HTML of the first rendered paragraph, used as the default
/// summary.
fn first_paragraph(html: &str) -> String {
    let start = match html.find("<p>") {
        Some(i) => i + "<p>".len(),
        None => return String::new(),
    };
    match html[start..].find("</p>") {
        Some(end) => html[start..start + end].to_owned(),
        None => String::new(),
    }
}

/// The result of a fallible document-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a content file.
#[derive(Debug)]
pub enum Error {
    /// Returned when a content file (or its metadata) cannot be read, which
    /// includes files that aren't valid UTF-8.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when the `date:` frontmatter field isn't a `YYYY-MM-DD`
    /// calendar date.
    DateFormat { path: PathBuf, value: String },

    /// Returned when Markdown rendering fails.
    Render { path: PathBuf, err: std::io::Error },

    /// Returned when the content directory itself cannot be walked.
    Walk(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
            Error::DateFormat { path, value } => write!(
                f,
                "`{}`: `date: {}` is not a YYYY-MM-DD date",
                path.display(),
                value
            ),
            Error::Render { path, err } => {
                write!(f, "rendering `{}`: {}", path.display(), err)
            }
            Error::Walk(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { err, .. } => Some(err),
            Error::DateFormat { .. } => None,
            Error::Render { err, .. } => Some(err),
            Error::Walk(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when walking the content directory.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn options() -> LoaderOptions {
        LoaderOptions {
            default_author: "Site Author".to_owned(),
            words_per_minute: 200,
        }
    }

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::File::create(dir.join(name))
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
    }

    #[test]
    fn test_load_basic_document() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "hello-world.md",
            "---\ntitle: Hello\ndate: 2024-01-01\ntags: [a, b]\n---\n# Hello\n\nWorld\n",
        );

        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents.len(), 1);
        let doc = &documents[0];
        assert_eq!(doc.slug, "hello-world");
        assert_eq!(doc.title, "Hello");
        assert_eq!(doc.date, NaiveDate::from_ymd(2024, 1, 1));
        assert_eq!(doc.tags, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(doc.author, "Site Author");
        assert_eq!(doc.url, "/posts/hello-world/");
        assert!(doc.html.contains("<p>World</p>"));
        assert_eq!(doc.summary, "World");
        assert_eq!(doc.reading_time_minutes, 1);
    }

    #[test]
    fn test_slug_override() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "draft-2024.md",
            "---\ntitle: T\ndate: 2024-01-01\nslug: Final Name\n---\nx\n",
        );
        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents[0].slug, "final-name");
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "my-first_post.md",
            "---\ndate: 2024-01-01\n---\nbody\n",
        );
        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents[0].title, "my first post");
    }

    #[test]
    fn test_missing_date_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "undated.md", "---\ntitle: T\n---\nbody\n");
        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents.len(), 1);
        // The file was just created, so its mtime date is today.
        assert_eq!(documents[0].date, Utc::now().date().naive_utc());
    }

    #[test]
    fn test_sorted_date_desc_then_slug_asc() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.md", "---\ndate: 2024-01-02\n---\nx\n");
        write_file(dir.path(), "c.md", "---\ndate: 2024-01-03\n---\nx\n");
        write_file(dir.path(), "a.md", "---\ndate: 2024-01-02\n---\nx\n");
        let documents = load_all(dir.path(), &options(), 1).unwrap();
        let slugs: Vec<&str> =
            documents.iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "good.md", "---\ndate: 2024-01-01\n---\nx\n");
        // Invalid UTF-8.
        fs::write(dir.path().join("bad.md"), b"\xff\xfe\xfd").unwrap();
        // Unparseable date.
        write_file(dir.path(), "odd.md", "---\ndate: tomorrow\n---\nx\n");

        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].slug, "good");
    }

    #[test]
    fn test_parallel_load_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            write_file(
                dir.path(),
                &format!("post-{}.md", i),
                &format!("---\ndate: 2024-01-0{}\n---\nbody\n", i + 1),
            );
        }
        let sequential = load_all(dir.path(), &options(), 1).unwrap();
        let parallel = load_all(dir.path(), &options(), 4).unwrap();
        let slugs = |docs: &[Document]| -> Vec<String> {
            docs.iter().map(|d| d.slug.clone()).collect()
        };
        assert_eq!(slugs(&sequential), slugs(&parallel));
    }

    #[test]
    fn test_summary_override() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "s.md",
            "---\ndate: 2024-01-01\nsummary: Short form\n---\nLong body\n",
        );
        let documents = load_all(dir.path(), &options(), 1).unwrap();
        assert_eq!(documents[0].summary, "Short form");
    }
}
