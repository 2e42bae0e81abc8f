// src/fetch/http.rs

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{blocking::Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{PageSession, SessionFactory};

/// Opens plain HTTP sessions, each with its own client and cookie jar.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    user_agent: Option<String>,
    timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(user_agent: Option<String>, timeout: Duration) -> Self {
        Self {
            user_agent,
            timeout,
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self) -> Result<Box<dyn PageSession>> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .timeout(self.timeout);
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let client = builder.build().context("building HTTP client")?;
        Ok(Box::new(HttpSession {
            client: Some(client),
            current: None,
            status: None,
            body: String::new(),
        }))
    }
}

/// A "page" is the body of the last GET.
///
/// Client errors other than 429 are fatal: the page will not appear on
/// refresh. A 429 or 5xx keeps its body but is reported as not loaded.
pub struct HttpSession {
    client: Option<Client>,
    current: Option<Url>,
    status: Option<StatusCode>,
    body: String,
}

impl HttpSession {
    fn load(&mut self) -> Result<()> {
        let client = self.client.as_ref().ok_or_else(|| anyhow!("session closed"))?;
        let url = self
            .current
            .as_ref()
            .ok_or_else(|| anyhow!("refresh before navigate"))?;

        let resp = client
            .get(url.clone())
            .send()
            .with_context(|| format!("GET {}", url))?;
        let status = resp.status();
        self.status = Some(status);
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            bail!("GET {} returned {}", url, status);
        }
        if !status.is_success() {
            warn!(%url, %status, "non-success status, page not loaded");
        }
        self.body = resp
            .text()
            .with_context(|| format!("reading body from {}", url))?;
        debug!(%url, bytes = self.body.len(), "loaded page");
        Ok(())
    }
}

impl PageSession for HttpSession {
    fn navigate(&mut self, url: &Url) -> Result<()> {
        self.current = Some(url.clone());
        self.load()
    }

    fn refresh(&mut self) -> Result<()> {
        self.load()
    }

    fn markup(&self) -> Result<String> {
        Ok(self.body.clone())
    }

    fn loaded(&self) -> bool {
        self.status.map_or(false, |s| s.is_success())
    }

    fn close(&mut self) {
        self.client = None;
        self.current = None;
        self.status = None;
        self.body.clear();
    }
}
