use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use store_api::PostImages;

/// Placeholder every post without its own image points at.
pub const DEFAULT_POST_IMAGE: &str = "/images/blog/default-post.jpg";

/// Path segment identifying images uploaded through the content editor.
pub const CONTENT_URL_MARKER: &str = "/uploads/images/blog/content/";

static IMG_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src="([^">]+)""#).unwrap());

/// Image basenames still referenced by posts, split by storage directory.
///
/// The two sets are never merged: a name in `content` says nothing about a
/// file of the same name in the featured directory.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRefs {
    pub featured: BTreeSet<String>,
    pub content: BTreeSet<String>,
}

impl ImageRefs {
    /// Collect references from a snapshot of the posts table.
    pub fn extract<'a, I>(posts: I) -> Self
    where
        I: IntoIterator<Item = &'a PostImages>,
    {
        let mut refs = ImageRefs::default();
        for post in posts {
            if let Some(image) = post.image.as_deref() {
                if let Some(name) = featured_name(image) {
                    refs.featured.insert(name.to_string());
                }
            }
            if let Some(content) = post.content.as_deref() {
                refs.content.extend(content_names(content).map(str::to_string));
            }
        }
        refs
    }
}

/// Basename of a featured image field, unless empty or the placeholder.
pub fn featured_name(image: &str) -> Option<&str> {
    if image.is_empty() || image == DEFAULT_POST_IMAGE {
        return None;
    }
    basename(image)
}

/// Basenames of locally uploaded `<img>` sources in an HTML fragment.
///
/// Sources outside [`CONTENT_URL_MARKER`] (external hosts, theme assets) are
/// skipped. Markup that does not match yields nothing.
pub fn content_names(html: &str) -> impl Iterator<Item = &str> {
    IMG_SRC_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|url| url.contains(CONTENT_URL_MARKER))
        .filter_map(basename)
}

/// Final path segment of a URL or path, without query string or fragment.
pub fn basename(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].rsplit('/').find(|seg| !seg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(image: Option<&str>, content: Option<&str>) -> PostImages {
        PostImages {
            image: image.map(Into::into),
            content: content.map(Into::into),
        }
    }

    #[test]
    fn featured_image_is_reduced_to_basename() {
        let posts = [post(Some("/images/blog/foo.jpg"), None)];
        let refs = ImageRefs::extract(&posts);
        assert!(refs.featured.contains("foo.jpg"));
        assert!(refs.content.is_empty());
    }

    #[test]
    fn placeholder_image_is_not_a_reference() {
        let posts = [post(Some(DEFAULT_POST_IMAGE), None), post(Some(""), None)];
        let refs = ImageRefs::extract(&posts);
        assert!(refs.featured.is_empty());
    }

    #[test]
    fn absolute_upload_urls_keep_their_filename() {
        let posts = [post(
            Some("http://localhost:4000/uploads/images/blog/4f1c.png"),
            None,
        )];
        let refs = ImageRefs::extract(&posts);
        assert_eq!(refs.featured.iter().collect::<Vec<_>>(), ["4f1c.png"]);
    }

    #[test]
    fn content_scan_ignores_external_images() {
        let html = r#"<p>x</p><img src="/uploads/images/blog/content/bar.png"><img src="https://cdn.example.com/baz.png">"#;
        let posts = [post(None, Some(html))];
        let refs = ImageRefs::extract(&posts);
        assert_eq!(refs.content.iter().collect::<Vec<_>>(), ["bar.png"]);
        assert!(refs.featured.is_empty());
    }

    #[test]
    fn tag_match_is_case_insensitive_and_attributes_may_precede_src() {
        let html = r#"<IMG class="wide" alt="a" src="/uploads/images/blog/content/one.webp"/>
            <img data-x="1" src="http://localhost:4000/uploads/images/blog/content/two.jpg?v=3">"#;
        let names: Vec<_> = content_names(html).collect();
        assert_eq!(names, ["one.webp", "two.jpg"]);
    }

    #[test]
    fn duplicates_collapse() {
        let html = r#"<img src="/uploads/images/blog/content/a.png"><img src="/uploads/images/blog/content/a.png">"#;
        let posts = [post(None, Some(html)), post(None, Some(html))];
        let refs = ImageRefs::extract(&posts);
        assert_eq!(refs.content.len(), 1);
    }

    #[test]
    fn malformed_markup_contributes_nothing() {
        let posts = [
            post(None, Some("<img src=")),
            post(None, Some("<img src='/uploads/images/blog/content/q.png'>")),
            post(None, Some("<<img>>")),
            post(None, None),
        ];
        let refs = ImageRefs::extract(&posts);
        assert!(refs.content.is_empty());
    }

    #[test]
    fn basename_handles_trailing_slash_and_fragments() {
        assert_eq!(basename("/a/b/"), Some("b"));
        assert_eq!(basename("/a/c.png#top"), Some("c.png"));
        assert_eq!(basename("/"), None);
    }
}
