//! Helpers shared by the scraper variants.

use regex::Regex;

use crate::dom::{By, Dom};
use crate::error::{Error, Result};
use crate::identifiers::NodeId;

/// Fails the harvest if an expected element is absent.
pub(super) fn require<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| Error::dom_structure(what))
}

/// Applies `read` to the first element with `class`, or returns empty.
pub(super) fn first_by_class<F>(dom: &dyn Dom, class: &str, read: F) -> String
where
    F: FnOnce(NodeId) -> String,
{
    dom.find(dom.document(), &By::class(class))
        .map(read)
        .unwrap_or_default()
}

/// Text of the first match under `scope`.
pub(super) fn text_of(dom: &dyn Dom, scope: NodeId, selector: &str) -> Option<String> {
    dom.find(scope, &By::css(selector)).map(|n| dom.text(n))
}

/// First capture of `pattern` in `path`, percent-decoded.
pub(super) fn slug(pattern: &Regex, path: &str) -> String {
    let Some(raw) = pattern.captures(path).and_then(|c| c.get(1)) else {
        return String::new();
    };
    urlencoding::decode(raw.as_str())
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_is_decoded() {
        let pattern = Regex::new(r"problems/([^/]+)").unwrap();
        assert_eq!(slug(&pattern, "/problems/two%20sum/description/"), "two sum");
        assert_eq!(slug(&pattern, "/contest/"), "");
    }

    #[test]
    fn test_require() {
        assert_eq!(require(Some(3), "x").unwrap(), 3);
        let err = require::<u8>(None, "result pane").unwrap_err();
        assert!(err.is_page_error());
        assert!(err.to_string().contains("result pane"));
    }
}
