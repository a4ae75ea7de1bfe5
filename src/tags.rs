//! Aggregates [`Document`]s by tag. Building the index is a pure function
//! of the document list: no I/O, no side effects.
//!
//! Tags are compared byte-for-byte; there is no case folding or whitespace
//! normalization, so `Rust` and `rust` are distinct index keys. The buckets
//! hold references to the documents, ordered by the same rule as the loader
//! output (date descending, slug ascending).

use std::collections::BTreeMap;

use crate::content::Document;

/// A mapping from tag name to the documents carrying that tag. The
/// underlying `BTreeMap` iterates tags in byte order, keeping tag-page
/// output deterministic.
#[derive(Debug, Default)]
pub struct TagIndex<'a> {
    buckets: BTreeMap<String, Vec<&'a Document>>,
}

impl<'a> TagIndex<'a> {
    /// Builds the index. Every tag appearing in any document's `tags` list
    /// becomes a key, and a document appears under a tag iff the tag is in
    /// its list.
    pub fn build(documents: &'a [Document]) -> TagIndex<'a> {
        let mut buckets: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
        for document in documents {
            for tag in &document.tags {
                buckets.entry(tag.clone()).or_default().push(document);
            }
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by(|a, b| {
                b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug))
            });
        }
        TagIndex { buckets }
    }

    /// The documents tagged `tag`, if any.
    pub fn get(&self, tag: &str) -> Option<&[&'a Document]> {
        self.buckets.get(tag).map(|bucket| bucket.as_slice())
    }

    /// Iterates `(tag, documents)` entries in byte order of the tag names.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&str, &[&'a Document])> {
        self.buckets
            .iter()
            .map(|(tag, bucket)| (tag.as_str(), bucket.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn document(slug: &str, date: (i32, u32, u32), tags: &[&str]) -> Document {
        Document {
            slug: slug.to_owned(),
            title: slug.to_owned(),
            date: NaiveDate::from_ymd(date.0, date.1, date.2),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            summary: String::new(),
            author: String::new(),
            raw_body: String::new(),
            html: String::new(),
            reading_time_minutes: 1,
            headings: Vec::new(),
            url: format!("/posts/{}/", slug),
        }
    }

    #[test]
    fn test_membership() {
        let documents = vec![
            document("one", (2024, 1, 2), &["a", "b"]),
            document("two", (2024, 1, 1), &["b"]),
            document("three", (2024, 1, 3), &[]),
        ];
        let index = TagIndex::build(&documents);

        assert_eq!(index.len(), 2);
        let a: Vec<&str> =
            index.get("a").unwrap().iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(a, vec!["one"]);
        let b: Vec<&str> =
            index.get("b").unwrap().iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(b, vec!["one", "two"]);
        assert!(index.get("c").is_none());
    }

    #[test]
    fn test_bucket_ordering() {
        let documents = vec![
            document("b", (2024, 1, 1), &["t"]),
            document("a", (2024, 1, 1), &["t"]),
            document("newest", (2024, 2, 1), &["t"]),
        ];
        let index = TagIndex::build(&documents);
        let bucket: Vec<&str> =
            index.get("t").unwrap().iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(bucket, vec!["newest", "a", "b"]);
    }

    #[test]
    fn test_tags_are_byte_exact() {
        let documents = vec![
            document("upper", (2024, 1, 1), &["Rust"]),
            document("lower", (2024, 1, 1), &["rust"]),
        ];
        let index = TagIndex::build(&documents);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Rust").unwrap().len(), 1);
        assert_eq!(index.get("rust").unwrap().len(), 1);
    }

    #[test]
    fn test_iteration_order_is_byte_order() {
        let documents = vec![document("d", (2024, 1, 1), &["z", "a", "M"])];
        let index = TagIndex::build(&documents);
        let tags: Vec<&str> = index.iter().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec!["M", "a", "z"]);
    }
}
