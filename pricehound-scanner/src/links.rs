use crate::text::make_absolute;
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;
use url::Url;

static LINK_ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:href|src)\s*=\s*["'](?P<u>[^"'>]+)["']"#)
        .expect("hardcoded regex pattern is valid")
});

/// Lazily yield every fetchable link in `html`, resolved against `base`.
///
/// Candidates come from `href`/`src` attributes in document order. Fragment
/// only targets, `javascript:` and `mailto:` are dropped, as is anything
/// that does not resolve to `http` or `https`. Calling this again on the
/// same input yields the same sequence.
pub fn extract_urls<'a>(base: &'a Url, html: &'a str) -> impl Iterator<Item = Url> + 'a {
    LINK_ATTR_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.name("u"))
        .filter_map(move |m| resolve_candidate(base, m.as_str()))
}

fn resolve_candidate(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('#')
        || has_scheme(raw, "javascript:")
        || has_scheme(raw, "mailto:")
    {
        return None;
    }

    let mut url = match make_absolute(raw, Some(base)) {
        Ok(url) => url,
        Err(e) => {
            trace!("Skipping link candidate: {}", e);
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

fn has_scheme(raw: &str, scheme: &str) -> bool {
    raw.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example/catalog/").unwrap()
    }

    fn collect(html: &str) -> Vec<String> {
        let base = base();
        extract_urls(&base, html).map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_extracts_href_and_src_in_order() {
        let html = r#"
            <a href="https://shop.example/a">A</a>
            <img SRC='/img/logo.png'>
            <a Href = "b.html">B</a>
        "#;
        assert_eq!(
            collect(html),
            vec![
                "https://shop.example/a",
                "https://shop.example/img/logo.png",
                "https://shop.example/catalog/b.html",
            ]
        );
    }

    #[test]
    fn test_skips_non_fetchable_targets() {
        let html = r##"
            <a href="#top">top</a>
            <a href="javascript:void(0)">js</a>
            <a href="MAILTO:sales@shop.example">mail</a>
            <a href="ftp://files.shop.example/x">ftp</a>
            <a href="tel:+15550100">call</a>
            <a href="   ">blank</a>
        "##;
        assert!(collect(html).is_empty());
    }

    #[test]
    fn test_strips_fragment_and_trims() {
        let html = r#"<a href="  /deals#summer  ">deals</a>"#;
        assert_eq!(collect(html), vec!["https://shop.example/deals"]);
    }

    #[test]
    fn test_rescanning_is_idempotent() {
        let base = base();
        let html = r#"<a href="/x"></a><a href="/y"></a>"#;
        let first: Vec<Url> = extract_urls(&base, html).collect();
        let second: Vec<Url> = extract_urls(&base, html).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_malformed_candidates_are_skipped() {
        let html = r#"<a href="http://exa mple.com/">bad</a><a href="/ok">ok</a>"#;
        assert_eq!(collect(html), vec!["https://shop.example/ok"]);
    }
}
