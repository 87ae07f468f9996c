use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use scraper::Html;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Anything that can turn a URL into a parsed document.
pub trait PageSource {
    fn fetch(&self, url: &str) -> Result<Html, FetchError>;
}

/// Blocking HTTP GET with a bounded timeout and a browser-like User-Agent.
/// No retries here; callers decide whether to try again.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        let client = Client::builder()
            .timeout(cfg.timeout())
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl PageSource for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().map_err(transport)?;
        debug!("fetched {} ({} bytes)", url, body.len());
        Ok(Html::parse_document(&body))
    }
}
