//! Parsing of the PEP 503 Simple HTML API (§4.3): an index page of anchor
//! tags, one per distribution file, optionally carrying a
//! `data-requires-python` constraint and a `#<hash_alg>=<hex>` URL
//! fragment.

use crate::types::{ArtifactName, NormalizedPackageName};
use pep440_rs::VersionSpecifiers;
use std::str::FromStr;
use tl::HTMLTag;
use url::Url;

/// A single `<a>` entry recovered from a Simple-API index page.
#[derive(Debug, Clone)]
pub struct SimpleIndexEntry {
    pub filename: ArtifactName,
    pub url: Url,
    /// `(hash_alg, hex)`, taken verbatim from the URL fragment.
    pub hash: Option<(String, String)>,
    pub requires_python: Option<VersionSpecifiers>,
}

fn parse_hash_fragment(fragment: &str) -> Option<(String, String)> {
    fragment
        .split_once('=')
        .map(|(alg, hex)| (alg.to_owned(), hex.to_owned()))
}

fn into_entry(
    base: &Url,
    normalized_package_name: &NormalizedPackageName,
    tag: &HTMLTag,
) -> Option<SimpleIndexEntry> {
    let attributes = tag.attributes();
    let href = attributes.get("href").flatten()?.as_utf8_str();
    let url = base.join(href.as_ref()).ok()?;
    let filename_str = url.path_segments()?.next_back()?;
    let filename = ArtifactName::from_filename(filename_str, normalized_package_name).ok()?;

    let hash = url.fragment().and_then(parse_hash_fragment);

    let requires_python = attributes
        .get("data-requires-python")
        .flatten()
        .filter(|a| !a.as_utf8_str().is_empty())
        .map(|a| {
            VersionSpecifiers::from_str(
                html_escape::decode_html_entities(a.as_utf8_str().as_ref()).as_ref(),
            )
        })
        .transpose()
        .ok()?;

    Some(SimpleIndexEntry {
        filename,
        url,
        hash,
        requires_python,
    })
}

/// Parses a Simple-API project page into its listed files (§4.3). Entries
/// whose filename doesn't parse against `normalized_package_name` (garbage
/// links, directory listings) are silently skipped rather than failing
/// the whole page.
pub fn parse_simple_index_page(
    base: &Url,
    normalized_package_name: &NormalizedPackageName,
    body: &str,
) -> miette::Result<Vec<SimpleIndexEntry>> {
    let dom = tl::parse(body, tl::ParserOptions::default())
        .map_err(|e| miette::miette!("failed to parse simple index page: {e}"))?;

    let base = dom
        .query_selector("base")
        .and_then(|mut v| v.next())
        .and_then(|v| v.get(dom.parser()))
        .and_then(|v| v.as_tag())
        .and_then(|v| v.attributes().get("href"))
        .and_then(|v| v.map(|v| v.as_utf8_str().to_string()))
        .and_then(|v| Url::parse(&v).ok())
        .unwrap_or_else(|| base.clone());

    let mut entries = Vec::new();
    if let Some(anchors) = dom.query_selector("a") {
        for a in anchors.filter_map(|a| a.get(dom.parser())).filter_map(|h| h.as_tag()) {
            if let Some(entry) = into_entry(&base, normalized_package_name, a) {
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

/// Parses a Simple-API root index (the list of all project names on a
/// source) into the raw (unnormalized) names it advertises.
pub fn parse_package_names(body: &str) -> miette::Result<Vec<String>> {
    let dom = tl::parse(body, tl::ParserOptions::default())
        .map_err(|e| miette::miette!("failed to parse package name index: {e}"))?;
    let Some(anchors) = dom.query_selector("a") else {
        return Ok(Vec::new());
    };
    Ok(anchors
        .filter_map(|a| a.get(dom.parser()))
        .map(|node| node.inner_text(dom.parser()).to_string())
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_anchors_with_hash_and_requires_python() {
        let html = r#"<html><body>
            <a href="attrs-18.2.0-py2.py3-none-any.whl#sha256=aaaa">attrs</a>
            <a href="attrs-17.0.0.tar.gz" data-requires-python=">=3.6">attrs</a>
        </body></html>"#;
        let entries = parse_simple_index_page(
            &Url::parse("https://example.com/simple/attrs/").unwrap(),
            &"attrs".parse().unwrap(),
            html,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, Some(("sha256".to_owned(), "aaaa".to_owned())));
        assert!(entries[1].requires_python.is_some());
    }

    #[test]
    fn skips_links_for_a_different_package() {
        let html = r#"<html><body><a href="other-1.0.tar.gz">other</a></body></html>"#;
        let entries = parse_simple_index_page(
            &Url::parse("https://example.com/simple/attrs/").unwrap(),
            &"attrs".parse().unwrap(),
            html,
        )
        .unwrap();
        assert!(entries.is_empty());
    }
}
