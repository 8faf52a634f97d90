//! HTML directory-index source.
//!
//! Every link on the index page that resolves to a file and passes the
//! [`NameFilter`] is one item, named by the last path segment of its URL.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use url::Url;

use crate::error::{MirrorError, Result};
use crate::source::filter::NameFilter;
use crate::source::http::HttpFetcher;
use crate::source::{RemoteCatalog, SourceObject};

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("href pattern is valid")
});

/// A link found on an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub name: String,
    pub url: Url,
}

/// Extract file links from an index page, in page order.
///
/// Parent and root links, query-only links (column sorting) and
/// subdirectories are dropped.
pub fn parse_index(base: &Url, html: &str, filter: &NameFilter) -> Vec<ListingLink> {
    let mut links = Vec::new();

    for caps in HREF.captures_iter(html) {
        let Some(href) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let href = href.as_str().trim();
        if href.is_empty() || href == "../" || href == "/" || href.starts_with('?') || href.starts_with('#') {
            continue;
        }

        let Ok(mut url) = base.join(href) else {
            tracing::debug!(href, "Skipping unparseable link");
            continue;
        };
        url.set_fragment(None);
        if url.path().ends_with('/') {
            continue;
        }

        let Some(name) = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)
        else {
            continue;
        };
        if name.is_empty() || !filter.accepts(&name) {
            continue;
        }

        links.push(ListingLink { name, url });
    }

    links
}

/// Source backed by an HTML directory index.
pub struct DirectoryListing {
    index_url: Url,
    fetcher: HttpFetcher,
    filter: NameFilter,
    links: Mutex<HashMap<String, Url>>,
}

impl DirectoryListing {
    pub fn new(index_url: &str, fetcher: HttpFetcher, filter: NameFilter) -> Result<Self> {
        let index_url = Url::parse(index_url)
            .map_err(|e| MirrorError::Config(format!("invalid source_url {:?}: {}", index_url, e)))?;
        Ok(Self {
            index_url,
            fetcher,
            filter,
            links: Mutex::new(HashMap::new()),
        })
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    fn link_for(&self, name: &str) -> Result<Url> {
        let known = self
            .links
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        match known {
            Some(url) => Ok(url),
            None => self
                .index_url
                .join(name)
                .map_err(|e| MirrorError::NotFound(format!("{}: {}", name, e))),
        }
    }
}

#[async_trait]
impl RemoteCatalog for DirectoryListing {
    async fn list(&self) -> Result<Vec<String>> {
        let body = self.fetcher.get(&self.index_url).await.map_err(|e| match e {
            // A missing or forbidden index is a listing failure, not a missing item
            MirrorError::NotFound(url) | MirrorError::AccessDenied(url) => MirrorError::RemoteUnavailable {
                message: format!("index page unavailable: {}", url),
                retryable: false,
            },
            other => other,
        })?;
        let html = String::from_utf8_lossy(&body.bytes);
        let links = parse_index(&self.index_url, &html, &self.filter);

        tracing::info!(url = %self.index_url, files = links.len(), "Parsed directory index");

        let names = links.iter().map(|l| l.name.clone()).collect();
        let mut known = self.links.lock().unwrap_or_else(|e| e.into_inner());
        known.clear();
        known.extend(links.into_iter().map(|l| (l.name, l.url)));
        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<SourceObject> {
        let url = self.link_for(name)?;
        let body = self.fetcher.get(&url).await?;
        Ok(SourceObject {
            name: name.to_string(),
            bytes: body.bytes,
            content_type: body.content_type,
        })
    }

    fn describe(&self) -> String {
        self.index_url.to_string()
    }
}
