mod config;
mod db;
mod error;
mod fetch;
mod importer;
mod parser;
mod section;
mod state;
mod sync;
#[cfg(test)]
mod testutil;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Settings, DEFAULT_CONFIG_PATH};
use crate::db::SqliteCardStore;
use crate::fetch::HttpFetcher;
use crate::importer::{category_tag, CardImporter};
use crate::section::SectionScraper;
use crate::state::{JsonStateStore, StateStore};
use crate::sync::{unsynced_dates, SyncScheduler};

#[derive(Parser)]
#[command(name = "mcq_harvest", about = "Scrape IndiaBix MCQs into a local flashcard deck")]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one or more category URLs
    Scrape {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Max pages per URL (default: import.max_pages)
        #[arg(short = 'n', long)]
        pages: Option<usize>,
        /// Target deck (default: import.default_deck)
        #[arg(long)]
        deck: Option<String>,
        /// Write the questions into the card store
        #[arg(long)]
        import: bool,
        #[arg(long)]
        no_explanation: bool,
        /// Print the scraped questions as JSON instead of a listing
        #[arg(long, conflicts_with = "import")]
        json: bool,
    },
    /// Import today's current affairs, or yesterday's if today is not out yet
    Sync {
        /// Run even when sync.auto_sync is off
        #[arg(long)]
        force: bool,
    },
    /// Import current affairs for every date in a range
    SyncRange {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// List recent dates not yet synced
    Missing {
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Sync status for today and yesterday
    Status,
    /// Card counts per deck
    Decks,
    /// Run the text formatter on a string
    Format {
        #[arg(value_enum)]
        kind: FormatKind,
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatKind {
    Question,
    Explanation,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let result = match cli.command {
        Commands::Scrape {
            urls,
            pages,
            deck,
            import,
            no_explanation,
            json,
        } => {
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let scraper = SectionScraper::new(&fetcher, &settings.site);
            let max_pages = pages.unwrap_or(settings.import.max_pages);
            let deck = deck.unwrap_or_else(|| settings.import.default_deck.clone());
            let store = if import {
                Some(open_store(&settings.store.db_path)?)
            } else {
                None
            };

            for (i, url) in urls.iter().enumerate() {
                if i > 0 {
                    thread::sleep(settings.fetch.request_delay());
                }
                let result = scraper
                    .scrape(url, max_pages)
                    .with_context(|| format!("scraping {url}"))?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    continue;
                }
                println!(
                    "{}: {} questions from {}",
                    result.category_label,
                    result.total(),
                    result.source_url
                );

                let Some(store) = &store else {
                    for (n, q) in result.questions.iter().enumerate() {
                        let answer = q.answer.as_ref().map(|a| a.to_string()).unwrap_or_default();
                        println!("{:>3}. {} [{}]", n + 1, truncate(&q.question_text, 80), answer);
                    }
                    continue;
                };
                if result.questions.is_empty() {
                    continue;
                }

                let tags = if settings.import.auto_tag {
                    vec![category_tag(&result.category_label), settings.site.name.clone()]
                } else {
                    Vec::new()
                };
                let written = store.write_cards_batch(&deck, &result.questions, &tags, !no_explanation)?;
                println!("Imported {} of {} questions into {}", written, result.total(), deck);
            }
            Ok(())
        }
        Commands::Sync { force } => {
            if !settings.sync.auto_sync && !force {
                println!("Auto-sync is disabled (sync.auto_sync = false). Use --force to run anyway.");
                return Ok(());
            }
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let store = open_store(&settings.store.db_path)?;
            let sched = scheduler(&settings, &fetcher, &store);
            match sched.auto_sync()? {
                Some(r) if r.written > 0 => println!(
                    "Current affairs synced: {} questions for {} into {}",
                    r.written, r.date, r.deck
                ),
                Some(r) => println!("Found {} questions for {} but none were written", r.total, r.date),
                None => println!("No new current affairs to sync."),
            }
            Ok(())
        }
        Commands::SyncRange { from, to } => {
            let fetcher = HttpFetcher::new(&settings.fetch)?;
            let store = open_store(&settings.store.db_path)?;
            let sched = scheduler(&settings, &fetcher, &store);
            sched.check_range(from, to)?;

            let days = (to - from).num_days() + 1;
            let pb = ProgressBar::new(days as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("#>-"),
            );
            let tally = sched.sync_range(from, to, |date, t| {
                pb.set_message(format!(
                    "{} (synced {}, skipped {}, failed {})",
                    date, t.synced, t.skipped, t.failed
                ));
                pb.inc(1);
            })?;
            pb.finish_and_clear();

            println!("Synced:  {}", tally.synced);
            println!("Skipped: {}", tally.skipped);
            println!("Failed:  {}", tally.failed);
            Ok(())
        }
        Commands::Missing { days } => {
            let days = days.unwrap_or(settings.sync.missing_window_days);
            let state = JsonStateStore::new(&settings.store.state_path).load()?;
            let missing = unsynced_dates(&state, Local::now().date_naive(), days);
            if missing.is_empty() {
                println!("All dates in the last {days} days are synced.");
            } else {
                println!("{} of the last {} days not synced:", missing.len(), days);
                for d in &missing {
                    println!("  {d}");
                }
            }
            Ok(())
        }
        Commands::Status => {
            let store = JsonStateStore::new(&settings.store.state_path);
            let state = store.load()?;
            let today = Local::now().date_naive();
            let yesterday = today.pred_opt().unwrap_or(today);
            println!("Auto-sync: {}", if settings.sync.auto_sync { "on" } else { "off" });
            println!("History:   {} ({} dates)", store.path().display(), state.synced_count());
            println!("Today ({}):     {}", today, mark(state.is_synced(today)));
            println!("Yesterday ({}): {}", yesterday, mark(state.is_synced(yesterday)));
            Ok(())
        }
        Commands::Decks => {
            let store = open_store(&settings.store.db_path)?;
            let stats = store.deck_stats()?;
            if stats.is_empty() {
                println!("No decks yet.");
                return Ok(());
            }
            println!("{:<56} | {:>6} | {:>6}", "Deck", "Own", "Total");
            println!("{}", "-".repeat(74));
            for s in &stats {
                println!("{:<56} | {:>6} | {:>6}", truncate(&s.name, 56), s.own, s.total);
            }
            println!("\n{} notes in {} decks", store.note_count()?, stats.len());
            Ok(())
        }
        Commands::Format { kind, text } => {
            let out = match kind {
                FormatKind::Question => parser::format::format_question(&text),
                FormatKind::Explanation => parser::format::format_explanation(&text),
            };
            println!("{out}");
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_store(path: &Path) -> anyhow::Result<SqliteCardStore> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    SqliteCardStore::open(path).with_context(|| format!("opening card store {}", path.display()))
}

fn scheduler<'a>(
    settings: &Settings,
    fetcher: &'a HttpFetcher,
    store: &'a SqliteCardStore,
) -> SyncScheduler<'a, HttpFetcher, JsonStateStore, SqliteCardStore> {
    SyncScheduler::new(
        fetcher,
        store,
        JsonStateStore::new(&settings.store.state_path),
        settings.site.clone(),
        settings.sync.clone(),
    )
    .with_delay(settings.fetch.request_delay())
}

fn mark(synced: bool) -> &'static str {
    if synced {
        "synced"
    } else {
        "not synced"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
