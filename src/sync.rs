use std::thread;
use std::time::Duration;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{SiteConfig, SyncConfig};
use crate::error::SyncError;
use crate::fetch::PageSource;
use crate::importer::CardImporter;
use crate::parser::QuestionRecord;
use crate::section::SectionScraper;
use crate::state::{key, StateStore, SyncState};

/// One date's freshly scraped questions, not yet imported.
#[derive(Debug, Clone)]
pub struct Batch {
    pub date: NaiveDate,
    pub questions: Vec<QuestionRecord>,
}

/// What an import of one batch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub deck: String,
    pub total: usize,
    pub written: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTally {
    pub synced: usize,
    /// Already synced before this run.
    pub skipped: usize,
    /// Nothing published, nothing written, or the import failed.
    pub failed: usize,
}

/// Date-keyed daily sync. Owns the sync history; a date becomes synced
/// only after at least one of its cards was written.
pub struct SyncScheduler<'a, S: PageSource, T: StateStore, I: CardImporter> {
    source: &'a S,
    importer: &'a I,
    store: T,
    site: SiteConfig,
    cfg: SyncConfig,
    delay: Duration,
}

impl<'a, S: PageSource, T: StateStore, I: CardImporter> SyncScheduler<'a, S, T, I> {
    pub fn new(source: &'a S, importer: &'a I, store: T, site: SiteConfig, cfg: SyncConfig) -> Self {
        Self {
            source,
            importer,
            store,
            site,
            cfg,
            delay: Duration::ZERO,
        }
    }

    /// Pause between successive scrapes in `sync_range`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_synced(&self, date: NaiveDate) -> Result<bool, SyncError> {
        Ok(self.store.load()?.is_synced(date))
    }

    /// Scrape one date's page unless it is already synced.
    ///
    /// `None` covers both "already synced" (no request is made) and "nothing
    /// published yet". A failed scrape is logged and also yields `None`.
    pub fn try_sync(&self, date: NaiveDate) -> Result<Option<Batch>, SyncError> {
        if self.is_synced(date)? {
            info!("Current affairs for {} already synced", key(date));
            return Ok(None);
        }

        let url = self.site.current_affairs_url(date);
        info!("Attempting to sync current affairs from {}", url);
        let result = match SectionScraper::new(self.source, &self.site).scrape(&url, 1) {
            Ok(r) => r,
            Err(e) => {
                warn!("Error syncing {}: {}", key(date), e);
                return Ok(None);
            }
        };

        if result.questions.is_empty() {
            info!("No questions found for {}", key(date));
            return Ok(None);
        }
        Ok(Some(Batch {
            date,
            questions: result.questions,
        }))
    }

    /// Sync today, or yesterday if today has nothing new.
    pub fn auto_sync(&self) -> Result<Option<SyncReport>, SyncError> {
        self.auto_sync_on(Local::now().date_naive())
    }

    pub fn auto_sync_on(&self, today: NaiveDate) -> Result<Option<SyncReport>, SyncError> {
        let mut batch = self.try_sync(today)?;
        if batch.is_none() {
            if let Some(yesterday) = today.pred_opt() {
                batch = self.try_sync(yesterday)?;
            }
        }
        let Some(batch) = batch else {
            info!("No new current affairs to sync");
            return Ok(None);
        };
        self.import(&batch).map(Some)
    }

    /// Import one batch into its week deck and mark the date when anything was written.
    pub fn import(&self, batch: &Batch) -> Result<SyncReport, SyncError> {
        let deck = deck_for_date(&self.cfg.deck, batch.date);
        let written = self.importer.write_cards_batch(
            &deck,
            &batch.questions,
            &self.daily_tags(batch.date),
            self.cfg.include_explanation,
        )?;

        if written > 0 {
            let mut state = self.store.load()?;
            state.mark(batch.date);
            self.store.save(&state)?;
            info!("Synced {} questions for {} into {}", written, key(batch.date), deck);
        } else {
            warn!("No cards written for {}; leaving it unsynced", key(batch.date));
        }

        Ok(SyncReport {
            date: batch.date,
            deck,
            total: batch.questions.len(),
            written,
        })
    }

    /// Sync every date from `start` to `end` inclusive, calling `on_progress`
    /// after each date with the running tally.
    pub fn sync_range<F>(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        mut on_progress: F,
    ) -> Result<SyncTally, SyncError>
    where
        F: FnMut(NaiveDate, &SyncTally),
    {
        self.check_range(start, end)?;

        let mut tally = SyncTally::default();
        let mut scraped_any = false;
        for date in start.iter_days().take_while(|d| *d <= end) {
            if self.is_synced(date)? {
                tally.skipped += 1;
            } else {
                if scraped_any && !self.delay.is_zero() {
                    thread::sleep(self.delay);
                }
                scraped_any = true;

                match self.try_sync(date)? {
                    None => tally.failed += 1,
                    Some(batch) => match self.import(&batch) {
                        Ok(report) if report.written > 0 => tally.synced += 1,
                        Ok(_) => tally.failed += 1,
                        Err(SyncError::Import(e)) => {
                            warn!("Error importing {}: {}", key(date), e);
                            tally.failed += 1;
                        }
                        Err(e) => return Err(e),
                    },
                }
            }
            on_progress(date, &tally);
        }
        Ok(tally)
    }

    pub fn check_range(&self, start: NaiveDate, end: NaiveDate) -> Result<(), SyncError> {
        let span = (end - start).num_days() + 1;
        if start > end {
            return Err(SyncError::Range {
                start,
                end,
                reason: "start date is after end date".into(),
            });
        }
        if span > self.cfg.max_range_days {
            return Err(SyncError::Range {
                start,
                end,
                reason: format!("{} days exceeds the limit of {}", span, self.cfg.max_range_days),
            });
        }
        Ok(())
    }

    fn daily_tags(&self, date: NaiveDate) -> Vec<String> {
        vec![
            self.site.name.clone(),
            "CurrentAffairs".to_string(),
            format!("current-affairs-{}", key(date)),
        ]
    }
}

/// Dates in the `days_back` days ending today that are not synced, newest first.
pub fn unsynced_dates(state: &SyncState, today: NaiveDate, days_back: u32) -> Vec<NaiveDate> {
    (0..u64::from(days_back))
        .filter_map(|i| today.checked_sub_days(Days::new(i)))
        .filter(|d| !state.is_synced(*d))
        .collect()
}

/// Week-of-month bucket, 1 to 5. Days 1-7 are week 1, 29-31 week 5.
pub fn week_of_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// `base::YYYY::Month::WeekN`
pub fn deck_for_date(base: &str, date: NaiveDate) -> String {
    format!(
        "{}::{}::{}::Week{}",
        base,
        date.year(),
        date.format("%B"),
        week_of_month(date)
    )
}
