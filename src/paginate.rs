//! Splits an ordered item list into fixed-size pages with prev/next
//! navigation metadata. Pages are 1-indexed. An empty input yields exactly
//! one empty page (page 1 of 1) rather than zero pages, so "page 1 of the
//! home listing" always exists even for an empty site.

use std::fmt;

/// One pagination unit over a borrowed slice of items.
#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    /// 1-indexed page number.
    pub number: usize,
    pub items: &'a [T],
    pub total_pages: usize,
}

impl<'a, T> Page<'a, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Splits `items` into pages of at most `page_size` items, preserving item
/// order across page boundaries. `page_size` must be at least 1.
pub fn paginate<T>(items: &[T], page_size: usize) -> Result<Vec<Page<T>>> {
    if page_size < 1 {
        return Err(Error::InvalidPageSize(page_size));
    }

    if items.is_empty() {
        return Ok(vec![Page {
            number: 1,
            items: &[],
            total_pages: 1,
        }]);
    }

    let total_pages = (items.len() + page_size - 1) / page_size;
    Ok(items
        .chunks(page_size)
        .enumerate()
        .map(|(i, chunk)| Page {
            number: i + 1,
            items: chunk,
            total_pages,
        })
        .collect())
}

/// The result of a fallible pagination operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an invalid pagination configuration.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when the configured page size is less than 1.
    InvalidPageSize(usize),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidPageSize(size) => {
                write!(f, "page size must be at least 1, got {}", size)
            }
        }
    }
}

impl std::error::Error for Error {}
