//! Generates the `sitemap.xml` document enumerating the site's HTML pages.

use chrono::NaiveDate;
use url::Url;

/// XML namespace for sitemaps.
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A single `<url>` entry.
#[derive(Clone, Debug)]
pub struct UrlEntry {
    /// The page location; absolute when the site URL is configured.
    pub loc: String,
    /// Last modification date, present for post pages.
    pub lastmod: Option<NaiveDate>,
}

/// Renders the `<urlset>` document for the given entries.
pub fn generate(entries: &[UrlEntry]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 96);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{}\">\n", SITEMAP_NS));
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                lastmod.format("%Y-%m-%d")
            ));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Joins a site-relative page path onto the configured base URL. Without a
/// base URL the path is returned as-is.
pub fn absolute_url(base: Option<&Url>, path: &str) -> String {
    match base.and_then(|base| base.join(path.trim_start_matches('/')).ok()) {
        Some(absolute) => absolute.to_string(),
        None => path.to_owned(),
    }
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
