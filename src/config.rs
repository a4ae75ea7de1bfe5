//! The typed configuration schema. Configuration is a single JSON file;
//! missing fields fall back to documented defaults rather than failing, and
//! validation errors are explicit and fatal before any rendering starts.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

/// The full site configuration. Every field group is optional in the JSON
/// source; absent groups take their defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub content: ContentConfig,
    pub navigation: NavigationConfig,
    pub social: SocialConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub language: String,
    /// The canonical base URL of the deployed site, used for absolute
    /// sitemap and feed locations. Optional: without it, sitemap locations
    /// stay site-relative.
    pub url: Option<Url>,
}

impl Default for SiteConfig {
    fn default() -> SiteConfig {
        SiteConfig {
            title: String::from("Untitled Site"),
            description: String::new(),
            language: String::from("en"),
            url: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentConfig {
    pub posts_per_page: usize,
    pub words_per_minute: usize,
    pub default_author: String,
}

impl Default for ContentConfig {
    fn default() -> ContentConfig {
        ContentConfig {
            posts_per_page: 10,
            words_per_minute: 200,
            default_author: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub items: Vec<NavigationItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NavigationItem {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub links: Vec<SocialLink>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SocialLink {
    #[serde(alias = "platform")]
    pub name: String,
    pub url: String,
}

impl Config {
    /// Loads and validates a configuration file. The returned config is
    /// ready to use: defaults are merged in, and invalid values have been
    /// rejected.
    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_owned(),
            err,
        })?;
        let config: Config =
            serde_json::from_str(&contents).map_err(|err| Error::Json {
                path: path.to_owned(),
                err,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations no build could run with.
    pub fn validate(&self) -> Result<()> {
        if self.content.posts_per_page < 1 {
            return Err(Error::Invalid {
                field: "content.postsPerPage",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.content.words_per_minute < 1 {
            return Err(Error::Invalid {
                field: "content.wordsPerMinute",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// The result of a fallible configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an invalid or unreadable configuration. Always fatal: these
/// errors abort a build before any rendering or writing happens.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configuration file cannot be read.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when the configuration file is not valid JSON (or has
    /// wrongly-typed fields).
    Json {
        path: PathBuf,
        err: serde_json::Error,
    },

    /// Returned when a configuration value is out of range.
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "reading config `{}`: {}", path.display(), err)
            }
            Error::Json { path, err } => {
                write!(f, "parsing config `{}`: {}", path.display(), err)
            }
            Error::Invalid { field, reason } => {
                write!(f, "config field `{}` {}", field, reason)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { err, .. } => Some(err),
            Error::Json { err, .. } => Some(err),
            Error::Invalid { .. } => None,
        }
    }
}
