//! The top-level build pipeline: load configuration, load and render the
//! content, assemble the page set, and write it to the output directory.
//! Also provides the dry-validate entry point used by `check`, which runs
//! everything up to (but not including) template rendering and writing.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::assemble::{self, Assembler, RenderedOutput};
use crate::config::{self, Config};
use crate::content::{self, load_all, LoaderOptions};
use crate::frontmatter;
use crate::markdown;
use crate::paginate::{self, paginate};
use crate::tags::TagIndex;
use crate::template::Engine;

/// Filesystem layout relative to the configuration file's directory.
const CONTENT_DIR: &str = "content";
const THEME_DIR: &str = "theme";
const ABOUT_FILE: &str = "about.md";

/// Builds the site described by the configuration file at `config_path`
/// into `output_dir`. The output directory is removed and recreated, so
/// stale pages from previous builds never survive.
///
/// Individual page render failures do not abort the build: the failing
/// pages are skipped and logged, and the build returns
/// [`Error::RenderFailures`] after everything else has been written.
pub fn build_site(
    config_path: &Path,
    output_dir: &Path,
    threads: usize,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let base_dir = base_dir(config_path);

    let documents = load_all(
        &base_dir.join(CONTENT_DIR),
        &LoaderOptions {
            default_author: config.content.default_author.clone(),
            words_per_minute: config.content.words_per_minute,
        },
        threads,
    )?;
    info!("loaded {} documents", documents.len());

    let index = TagIndex::build(&documents);
    let engine = Engine::new(base_dir.join(THEME_DIR));
    let about_html = about_html(&base_dir)?;

    let assembler = Assembler::new(&engine, &config, about_html);
    let report = assembler.assemble(&documents, &index)?;
    for failure in &report.failures {
        error!("{}", failure);
    }

    write_output(output_dir, &report.output)?;
    info!(
        "wrote {} pages to `{}`",
        report.output.len(),
        output_dir.display()
    );

    match report.failures.len() {
        0 => Ok(()),
        count => Err(Error::RenderFailures { count }),
    }
}

/// Validates a site without rendering or writing: configuration, content,
/// pagination parameters, and output path uniqueness. Template files are
/// not touched, so `check` passes even with a broken theme.
pub fn check_site(config_path: &Path, threads: usize) -> Result<()> {
    let config = Config::load(config_path)?;
    let base_dir = base_dir(config_path);

    let documents = load_all(
        &base_dir.join(CONTENT_DIR),
        &LoaderOptions {
            default_author: config.content.default_author.clone(),
            words_per_minute: config.content.words_per_minute,
        },
        threads,
    )?;

    let index = TagIndex::build(&documents);
    paginate(&documents, config.content.posts_per_page)?;

    let engine = Engine::new(base_dir.join(THEME_DIR));
    let about_html = about_html(&base_dir)?;
    let assembler = Assembler::new(&engine, &config, about_html);
    let paths = assembler.plan(&documents, &index)?;
    info!(
        "ok: {} documents, {} tags, {} output paths",
        documents.len(),
        index.len(),
        paths.len()
    );
    Ok(())
}

fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if parent != Path::new("") => parent.to_owned(),
        _ => PathBuf::from("."),
    }
}

/// Renders `about.md` next to the configuration file, if it exists. A
/// frontmatter block, when present, is stripped but otherwise ignored.
fn about_html(base_dir: &Path) -> Result<Option<String>> {
    let path = base_dir.join(ABOUT_FILE);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::Io { path, err }),
    };
    let (_, body) = frontmatter::parse(&contents);
    let rendered =
        markdown::render(body).map_err(|err| Error::Io { path, err })?;
    Ok(Some(rendered.html))
}

/// Writes the assembled output to `directory`. Paths ending in `/` become
/// `<path>/index.html`; other paths (like `/404.html` and `/sitemap.xml`)
/// are written verbatim.
fn write_output(directory: &Path, output: &RenderedOutput) -> Result<()> {
    match fs::remove_dir_all(directory) {
        Ok(()) => (),
        Err(err) if err.kind() == ErrorKind::NotFound => (),
        Err(err) => {
            return Err(Error::Io {
                path: directory.to_owned(),
                err,
            })
        }
    }

    for (url_path, file) in output {
        let relative = match url_path.ends_with('/') {
            true => format!("{}index.html", url_path),
            false => url_path.clone(),
        };
        let path = directory.join(relative.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Io {
                path: parent.to_owned(),
                err,
            })?;
        }
        fs::write(&path, &file.content)
            .map_err(|err| Error::Io { path, err })?;
    }
    Ok(())
}

/// The result of a fallible build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents any error raised by the build pipeline.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configuration cannot be loaded.
    Config(config::Error),

    /// Returned when the content directory cannot be loaded.
    Content(content::Error),

    /// Returned when the pagination parameters are invalid.
    Paginate(paginate::Error),

    /// Returned when page assembly fails outright (path collisions, feed
    /// serialization).
    Assemble(assemble::Error),

    /// Returned when reading or writing a file fails.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when one or more pages failed to render. The rest of the
    /// site was still written.
    RenderFailures { count: usize },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Content(err) => err.fmt(f),
            Error::Paginate(err) => err.fmt(f),
            Error::Assemble(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "{}: {}", path.display(), err)
            }
            Error::RenderFailures { count } => {
                write!(f, "{} page(s) failed to render", count)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Content(err) => Some(err),
            Error::Paginate(err) => Some(err),
            Error::Assemble(err) => Some(err),
            Error::Io { err, .. } => Some(err),
            Error::RenderFailures { .. } => None,
        }
    }
}

impl From<config::Error> for Error {
    /// Converts a [`config::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when loading configuration.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<content::Error> for Error {
    /// Converts a [`content::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when loading content.
    fn from(err: content::Error) -> Error {
        Error::Content(err)
    }
}

impl From<paginate::Error> for Error {
    /// Converts a [`paginate::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when validating pagination.
    fn from(err: paginate::Error) -> Error {
        Error::Paginate(err)
    }
}

impl From<assemble::Error> for Error {
    /// Converts an [`assemble::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when assembling the page set.
    fn from(err: assemble::Error) -> Error {
        Error::Assemble(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{ContentKind, OutputFile};

    fn site(dir: &Path) -> PathBuf {
        fs::create_dir_all(dir.join("content")).unwrap();
        fs::create_dir_all(dir.join("theme")).unwrap();
        fs::write(
            dir.join("theme/base.html"),
            "<html lang=\"{{ site.language }}\"><title>{{ site.title }}</title>\
             {% block content %}{% endblock %}</html>",
        )
        .unwrap();
        for name in &["index", "post", "tag", "tags", "404"] {
            fs::write(
                dir.join(format!("theme/{}.html", name)),
                "{% extends \"base\" %}{% block content %}\
                 {% if post %}{{ post.html }}{% endif %}{% endblock %}",
            )
            .unwrap();
        }
        fs::write(
            dir.join("content/hello-world.md"),
            "---\ntitle: Hello World\ndate: 2024-01-01\ntags: [greetings]\n---\n\nHi there.\n",
        )
        .unwrap();
        let config = dir.join("site.json");
        fs::write(&config, r#"{"site": {"title": "T"}}"#).unwrap();
        config
    }

    #[test]
    fn test_build_site_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());
        let output = dir.path().join("public");

        build_site(&config, &output, 1).unwrap();

        assert!(output.join("index.html").exists());
        assert!(output.join("posts/hello-world/index.html").exists());
        assert!(output.join("tags/greetings/index.html").exists());
        assert!(output.join("tags/index.html").exists());
        assert!(output.join("404.html").exists());
        assert!(output.join("sitemap.xml").exists());
        assert!(output.join("feed.atom").exists());

        let post =
            fs::read_to_string(output.join("posts/hello-world/index.html"))
                .unwrap();
        assert!(post.contains("Hi there."));
    }

    #[test]
    fn test_build_clears_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());
        let output = dir.path().join("public");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.html"), "old").unwrap();

        build_site(&config, &output, 1).unwrap();
        assert!(!output.join("stale.html").exists());
    }

    #[test]
    fn test_check_site_passes_without_theme_templates() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());
        fs::remove_dir_all(dir.path().join("theme")).unwrap();

        check_site(&config, 1).unwrap();
    }

    #[test]
    fn test_about_page_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());
        let output = dir.path().join("public");
        build_site(&config, &output, 1).unwrap();
        assert!(!output.join("about").exists());

        fs::write(
            dir.path().join("theme/about.html"),
            "{% extends \"base\" %}{% block content %}{{ about.html }}{% endblock %}",
        )
        .unwrap();
        fs::write(dir.path().join("about.md"), "I write things.\n").unwrap();
        build_site(&config, &output, 1).unwrap();
        let about =
            fs::read_to_string(output.join("about/index.html")).unwrap();
        assert!(about.contains("I write things."));
    }

    #[test]
    fn test_trailing_slash_paths_become_index_html() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = RenderedOutput::new();
        output.insert(
            "/nested/path/".to_owned(),
            OutputFile {
                content: "nested".to_owned(),
                kind: ContentKind::Html,
            },
        );
        output.insert(
            "/flat.xml".to_owned(),
            OutputFile {
                content: "flat".to_owned(),
                kind: ContentKind::Xml,
            },
        );

        let target = dir.path().join("out");
        write_output(&target, &output).unwrap();
        assert_eq!(
            fs::read_to_string(target.join("nested/path/index.html"))
                .unwrap(),
            "nested"
        );
        assert_eq!(
            fs::read_to_string(target.join("flat.xml")).unwrap(),
            "flat"
        );
    }

    #[test]
    fn test_broken_template_reports_render_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = site(dir.path());
        fs::write(
            dir.path().join("theme/post.html"),
            "{% include \"post\" %}",
        )
        .unwrap();
        let output = dir.path().join("public");

        match build_site(&config, &output, 1) {
            Err(Error::RenderFailures { count }) => assert_eq!(count, 1),
            other => panic!("expected render failures, got {:?}", other),
        }
        // The rest of the site was still written.
        assert!(output.join("index.html").exists());
        assert!(!output.join("posts/hello-world/index.html").exists());
    }
}
