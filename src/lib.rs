//! The library code for the `quillpress` static site generator. The
//! architecture can be generally broken down into three distinct steps:
//!
//! 1. Loading documents from Markdown source files on disk
//!    ([`crate::content`], built on [`crate::frontmatter`] and
//!    [`crate::markdown`])
//! 2. Assembling the output page set ([`crate::assemble`], built on
//!    [`crate::tags`], [`crate::paginate`], and the [`crate::template`]
//!    engine)
//! 3. Writing the assembled pages to disk ([`crate::build`])
//!
//! Of the three, the second step is the more involved. Every document
//! becomes a post page, the full document list is paginated into home
//! pages, and each tag gets its own listing page; the sitemap and Atom
//! feed are derived from the same page set. All of it is rendered through
//! one template engine against a uniform context, so a theme sees the same
//! shape of data on every page.
//!
//! The third step is pretty straight-forward: output paths ending in `/`
//! become `index.html` files in the corresponding directory, everything
//! else is written verbatim.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod assemble;
pub mod build;
pub mod config;
pub mod content;
pub mod feed;
pub mod frontmatter;
pub mod markdown;
pub mod paginate;
pub mod sitemap;
pub mod tags;
pub mod template;
pub mod value;
