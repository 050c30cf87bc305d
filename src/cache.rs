use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db;
use crate::dom::Dom;
use crate::settings::Settings;

/// Where extractors get their pages from.
pub trait PageSource {
    /// `encoding` names the charset to decode with when the server does not
    /// declare one. `use_cache = false` always goes to the network.
    fn get_page(&mut self, url: &str, encoding: Option<&str>, use_cache: bool) -> Result<Dom>;
}

/// One network round trip returning the decoded body.
pub trait Fetch {
    fn fetch(&mut self, url: &str, encoding: Option<&str>) -> Result<String>;
}

/// Blocking reqwest client configured from [`Settings`].
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetch {
    fn fetch(&mut self, url: &str, encoding: Option<&str>) -> Result<String> {
        info!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;
        response
            .text_with_charset(encoding.unwrap_or("utf-8"))
            .with_context(|| format!("Failed to decode body of {url}"))
    }
}

/// Fetches once per URL and keeps the decoded body in the `page_cache`
/// table.
pub struct PageCache<'c, F = HttpFetch> {
    conn: &'c Connection,
    fetcher: F,
    refresh: bool,
    fetched: usize,
    hits: usize,
}

impl<'c> PageCache<'c, HttpFetch> {
    pub fn new(conn: &'c Connection, settings: &Settings, refresh: bool) -> Result<Self> {
        Ok(Self::with_fetcher(conn, HttpFetch::new(settings)?, refresh))
    }
}

impl<'c, F: Fetch> PageCache<'c, F> {
    pub fn with_fetcher(conn: &'c Connection, fetcher: F, refresh: bool) -> Self {
        Self {
            conn,
            fetcher,
            refresh,
            fetched: 0,
            hits: 0,
        }
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

impl<F: Fetch> PageSource for PageCache<'_, F> {
    fn get_page(&mut self, url: &str, encoding: Option<&str>, use_cache: bool) -> Result<Dom> {
        if use_cache && !self.refresh {
            if let Some(body) = db::cached_page(self.conn, url)? {
                debug!(url, "cache hit");
                self.hits += 1;
                return Ok(Dom::parse(&body));
            }
        }
        let body = self.fetcher.fetch(url, encoding)?;
        self.fetched += 1;
        db::store_page(self.conn, url, &body)?;
        Ok(Dom::parse(&body))
    }
}
