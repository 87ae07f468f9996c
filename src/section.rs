use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SiteConfig;
use crate::error::ScrapeError;
use crate::fetch::PageSource;
use crate::parser::{QuestionParser, QuestionRecord};

static BLOCK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bix-div-container").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static PAGE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d{6}$").unwrap());

/// Output of one `scrape` call.
#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub questions: Vec<QuestionRecord>,
    pub category_label: String,
    pub source_url: String,
}

impl SectionResult {
    pub fn total(&self) -> usize {
        self.questions.len()
    }
}

/// Scrapes one category URL and its numbered pages.
pub struct SectionScraper<'a, S: PageSource> {
    source: &'a S,
    site: &'a SiteConfig,
}

impl<'a, S: PageSource> SectionScraper<'a, S> {
    pub fn new(source: &'a S, site: &'a SiteConfig) -> Self {
        Self { source, site }
    }

    pub fn validate(&self, url: &str) -> Result<Url, ScrapeError> {
        let invalid = || ScrapeError::InvalidSource {
            url: url.to_string(),
            site: self.site.name.clone(),
        };
        let parsed = Url::parse(url).map_err(|_| invalid())?;
        let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
        if host.contains(&self.site.host.to_ascii_lowercase()) {
            Ok(parsed)
        } else {
            Err(invalid())
        }
    }

    /// Fetch up to `max_pages` pages of `url` and parse every question on them.
    ///
    /// Only an off-site URL or a failed first page aborts the call; later
    /// pages and individual blocks fail on their own.
    pub fn scrape(&self, url: &str, max_pages: usize) -> Result<SectionResult, ScrapeError> {
        let start = self.validate(url)?;
        let category_label = category_label(&start, &self.site.name);
        let parser = QuestionParser::new(self.base_url(&start));

        info!("Fetching page 1: {}", url);
        let first = self.source.fetch(url)?;
        let pages = discover_pages(&first, &start, max_pages.max(1));
        info!("Found {} pages to scrape", pages.len());

        let mut questions = Vec::new();
        for (i, page_url) in pages.iter().enumerate() {
            let page_no = i + 1;
            let fetched;
            let doc = if i == 0 {
                &first
            } else {
                info!("Fetching page {}: {}", page_no, page_url);
                match self.source.fetch(page_url) {
                    Ok(d) => {
                        fetched = d;
                        &fetched
                    }
                    Err(e) => {
                        warn!("Skipping page {}: {}", page_no, e);
                        continue;
                    }
                }
            };

            let before = questions.len();
            let mut blocks = 0;
            for block in doc.select(&BLOCK_SEL) {
                blocks += 1;
                match parser.parse(block) {
                    Ok(q) => questions.push(q),
                    Err(skip) => debug!("page {} block {}: {}", page_no, blocks, skip),
                }
            }
            if blocks == 0 {
                warn!("No questions found on page {}", page_no);
                continue;
            }
            info!("Found {} questions on page {}", questions.len() - before, page_no);
        }

        Ok(SectionResult {
            questions,
            category_label,
            source_url: url.to_string(),
        })
    }

    fn base_url(&self, start: &Url) -> Url {
        Url::parse(&self.site.base_url).unwrap_or_else(|e| {
            warn!("bad site.base_url {:?} ({}), using page origin", self.site.base_url, e);
            start.clone()
        })
    }
}

/// `start` followed by same-section links ending in a 6-digit page index,
/// in document order, deduplicated, capped at `max_pages`.
pub fn discover_pages(doc: &Html, start: &Url, max_pages: usize) -> Vec<String> {
    let base_path = start.path().trim_end_matches('/');
    let mut seen = HashSet::new();
    let mut pages = vec![start.to_string()];
    seen.insert(start.to_string());

    for a in doc.select(&LINK_SEL) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Ok(link) = start.join(href) else {
            continue;
        };
        let path = link.path();
        if path.contains(base_path) && PAGE_INDEX_RE.is_match(path) && seen.insert(link.to_string())
        {
            pages.push(link.to_string());
        }
    }

    pages.truncate(max_pages);
    pages
}

/// `/general-knowledge/basic-general-knowledge/` -> `General Knowledge::Basic General Knowledge`
pub fn category_label(url: &Url, fallback: &str) -> String {
    let parts: Vec<&str> = url.path().split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] => fallback.to_string(),
        [only] => title_case(only),
        [first, second, ..] => format!("{}::{}", title_case(first), title_case(second)),
    }
}

fn title_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut prev_alpha = false;
    for c in segment.replace('-', " ").chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
