//! Support for creating an Atom feed from the document list.

use atom_syndication::{Entry, Error as AtomError, Feed, Link, Person};
use chrono::{
    DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use std::fmt;

use crate::content::Document;
use crate::sitemap::absolute_url;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    /// The canonical site URL, when configured. Used both as the feed id
    /// and to absolutize entry links.
    pub site_url: Option<&'a Url>,
    pub author: &'a str,
}

/// Creates an Atom feed for `documents` and renders it to a string. The
/// document list is expected in the loader's order (newest first), which
/// Atom readers then see as the entry order.
pub fn generate(
    config: &FeedConfig,
    documents: &[Document],
) -> Result<String> {
    use std::collections::HashMap;

    let home = absolute_url(config.site_url, "/");
    let feed = Feed {
        entries: entries(config, documents),
        title: config.title.to_owned().into(),
        id: home.clone(),
        updated: FixedOffset::east(0)
            .from_utc_datetime(&Utc::now().naive_utc()),
        authors: people(config.author),
        categories: Vec::new(),
        contributors: Vec::new(),
        generator: None,
        icon: None,
        logo: None,
        rights: None,
        subtitle: None,
        extensions: HashMap::new(),
        namespaces: HashMap::new(),
        links: vec![link(home)],
    };

    let rendered = feed.write_to(Vec::new())?;
    Ok(String::from_utf8(rendered)
        .map_err(|err| Error::Encoding(err.utf8_error()))?)
}

fn entries(config: &FeedConfig, documents: &[Document]) -> Vec<Entry> {
    use std::collections::HashMap;

    documents
        .iter()
        .map(|document| {
            let url = absolute_url(config.site_url, &document.url);
            Entry {
                id: url.clone(),
                title: document.title.clone().into(),
                updated: publication_time(document),
                authors: people(&document.author),
                links: vec![link(url)],
                rights: None,
                summary: Some(document.summary.clone().into()),
                categories: Vec::new(),
                contributors: Vec::new(),
                published: Some(publication_time(document)),
                source: None,
                content: None,
                extensions: HashMap::new(),
            }
        })
        .collect()
}

/// A document's date carries no time of day; midnight UTC stands in.
fn publication_time(document: &Document) -> DateTime<FixedOffset> {
    let naive =
        NaiveDateTime::new(document.date, NaiveTime::from_hms(0, 0, 0));
    FixedOffset::east(0).from_utc_datetime(&naive)
}

fn link(href: String) -> Link {
    Link {
        href,
        rel: "alternate".to_owned(),
        title: None,
        hreflang: None,
        mime_type: None,
        length: None,
    }
}

fn people(name: &str) -> Vec<Person> {
    match name.is_empty() {
        true => Vec::new(),
        false => vec![Person {
            name: name.to_owned(),
            email: None,
            uri: None,
        }],
    }
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when the serialized feed is not valid UTF-8.
    Encoding(std::str::Utf8Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::Encoding(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::Encoding(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts an [`AtomError`] into an [`Error`]. It allows us to use the
    /// `?` operator for feed serialization.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}
