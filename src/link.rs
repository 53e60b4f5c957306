//! A directed edge from one [`crate::destination::Destination`] to another,
//! with the anchor text that introduced it.

use reqwest::Url;
use std::hash::{Hash, Hasher};

/// A (source destination, anchor, target destination) triple.
///
/// Equality is by `(origin, anchor, target)`; the anchor text stands in for
/// "anchor position" since this crate does not track byte offsets into the
/// source page, only the text of the `<a>` element (or `url(...)` reference)
/// that produced the link.
#[derive(Debug, Clone)]
pub struct Link {
    pub origin: Url,
    pub anchor: String,
    pub target: Url,
    pub was_skipped: bool,
}

impl Link {
    pub fn new(origin: Url, anchor: impl Into<String>, target: Url) -> Self {
        Self {
            origin,
            anchor: anchor.into(),
            target,
            was_skipped: false,
        }
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.anchor == other.anchor && self.target == other.target
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.anchor.hash(state);
        self.target.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_was_skipped() {
        let origin = Url::parse("https://example.com/").unwrap();
        let target = Url::parse("https://example.com/a").unwrap();
        let mut a = Link::new(origin.clone(), "a", target.clone());
        let b = Link::new(origin, "a", target);
        a.was_skipped = true;
        assert_eq!(a, b);
    }
}
