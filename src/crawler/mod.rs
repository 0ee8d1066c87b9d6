//! Crawler
//!
//! Network probing for the post-crawl stage. Three operations, all bounded by
//! the configured request timeout and all cancellation-aware:
//!
//! - **`has_dns_a`**: does the domain resolve to an address at all?
//! - **`can_crawl`**: does the host's `robots.txt` allow our agent?
//! - **`crawl`**: HEAD to validate `Content-Length` against the configured
//!   bounds, then a GET capped at the content read limit, parsed tolerantly
//!   as HTML.
//!
//! The crawler holds only an HTTP client and its options; it is safe to share
//! across any number of concurrent crawl tasks.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, USER_AGENT};
use scraper::Html;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Token matched against robots.txt rules.
const AGENT_TOKEN: &str = "zfse/1.0";
/// Full User-Agent header sent with every request.
const AGENT_HEADER: &str = "Mozilla/5.0 (compatible; zfse/1.0; +https://www.zfse.org)";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Content-Length is missing or outside the configured bounds")]
    UnsuitableLength,

    #[error("request cancelled")]
    Cancelled,

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub timeout: Duration,
    pub min_content_length: u64,
    pub max_content_length: u64,
    pub content_read_limit: u64,
}

pub struct Crawler {
    opts: CrawlerOptions,
    http_client: reqwest::Client,
}

impl Crawler {
    pub fn new(opts: CrawlerOptions) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(AGENT_HEADER));
        default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        let http_client = reqwest::Client::builder()
            .timeout(opts.timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self { opts, http_client })
    }

    /// True iff `domain_name` resolves to at least one address within the
    /// request timeout.
    pub async fn has_dns_a(&self, cancel: &CancellationToken, domain_name: &str) -> bool {
        let lookup = tokio::net::lookup_host((domain_name, 80));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            resolved = tokio::time::timeout(self.opts.timeout, lookup) => {
                match resolved {
                    Ok(Ok(mut addresses)) => addresses.next().is_some(),
                    _ => false,
                }
            }
        }
    }

    /// Fetches `<scheme>://<host>/robots.txt` and matches the rules against
    /// our agent token. Any transport or parse problem counts as "no".
    pub async fn can_crawl(&self, cancel: &CancellationToken, url_str: &str) -> bool {
        let Ok(url) = Url::parse(url_str) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        let robots_url = match url.port() {
            Some(port) => format!("{}://{}:{}/robots.txt", url.scheme(), host, port),
            None => format!("{}://{}/robots.txt", url.scheme(), host),
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = self.http_client.get(&robots_url).send() => match sent {
                Ok(response) => response,
                Err(_) => return false,
            }
        };

        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            body = response.text() => match body {
                Ok(content) => content,
                Err(_) => return false,
            }
        };

        let mut matcher = robotstxt::DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&content, AGENT_TOKEN, url_str)
    }

    /// Fetches `url_str` and parses the body as HTML. The HEAD pass rejects
    /// pages whose `Content-Length` is missing or outside the configured
    /// bounds before any content is transferred; the GET pass never reads more
    /// than the content read limit. Truncated or malformed HTML still parses.
    pub async fn crawl(
        &self,
        cancel: &CancellationToken,
        url_str: &str,
    ) -> Result<(HeaderMap, Html), CrawlError> {
        let head_response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            sent = self.http_client.head(url_str).send() => sent?,
        };

        let content_length = head_response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or(CrawlError::UnsuitableLength)?;

        if content_length < self.opts.min_content_length
            || content_length > self.opts.max_content_length
        {
            return Err(CrawlError::UnsuitableLength);
        }

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
            sent = self.http_client.get(url_str).send() => sent?,
        };
        let headers = response.headers().clone();

        let read_limit = self.opts.content_read_limit as usize;
        let mut body = Vec::with_capacity(read_limit.min(64 * 1024));
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                chunk = response.chunk() => chunk?,
            };
            let Some(bytes) = chunk else {
                break;
            };

            let remaining = read_limit.saturating_sub(body.len());
            body.extend_from_slice(&bytes[..bytes.len().min(remaining)]);
            if body.len() >= read_limit {
                break;
            }
        }

        let document = Html::parse_document(&String::from_utf8_lossy(&body));
        Ok((headers, document))
    }
}
