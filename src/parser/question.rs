use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::Serialize;
use url::Url;

use super::format::{format_explanation, format_question};
use super::markup::{inner_markup, plain_text, spaced_text};
use crate::error::ParseSkip;

static QUESTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bix-td-qtxt").unwrap());
static OPTION_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bix-opt-row").unwrap());
static OPTION_VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".bix-td-option-val").unwrap());
// Hidden input whose value attribute is the answer letter.
static ANSWER_KEY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input.jq-hdnakq[value]").unwrap());
static ANSWER_OPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bix-ans-option").unwrap());
static ANSWER_HIDDEN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.jq-hdnakqb").unwrap());
static EXPLANATION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.bix-ans-description").unwrap());
static EXPLANATION_OLD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.bix-div-answer-description").unwrap());
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

static LETTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-E])\b").unwrap());

/// The correct answer: a resolved option label, or the marker text as found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Letter(char),
    Text(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Letter(c) => write!(f, "{c}"),
            Answer::Text(t) => f.write_str(t),
        }
    }
}

/// One extracted quiz item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    pub question_text: String,
    pub question_markup: Option<String>,
    pub has_images: bool,
    /// Labels run A, B, C.. over the non-empty options in document order.
    pub options: BTreeMap<char, String>,
    pub answer: Option<Answer>,
    pub explanation_text: String,
    pub explanation_markup: String,
}

impl QuestionRecord {
    /// A record needs non-empty question text; everything else is optional.
    pub fn new(question_text: impl Into<String>) -> Result<Self, ParseSkip> {
        let question_text = question_text.into();
        if question_text.trim().is_empty() {
            return Err(ParseSkip::EmptyQuestion);
        }
        Ok(Self {
            question_text,
            question_markup: None,
            has_images: false,
            options: BTreeMap::new(),
            answer: None,
            explanation_text: String::new(),
            explanation_markup: String::new(),
        })
    }

    /// The answer's option, when the answer is a known letter.
    pub fn answer_option(&self) -> Option<(char, &str)> {
        match self.answer {
            Some(Answer::Letter(c)) => self.options.get(&c).map(|t| (c, t.as_str())),
            _ => None,
        }
    }
}

/// Turns one question block into a [`QuestionRecord`].
pub struct QuestionParser {
    base: Url,
}

impl QuestionParser {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(&self, block: ElementRef<'_>) -> Result<QuestionRecord, ParseSkip> {
        let q = block
            .select(&QUESTION_SEL)
            .next()
            .ok_or(ParseSkip::NoQuestionMarker)?;

        let mut record = QuestionRecord::new(format_question(&plain_text(q)))?;
        record.has_images = q.select(&IMG_SEL).next().is_some();
        let markup = inner_markup(q, &self.base);
        record.question_markup = (!markup.is_empty()).then_some(markup);

        record.options = extract_options(block);
        record.answer = resolve_answer(block, &record.options);

        let explanation = block
            .select(&EXPLANATION_SEL)
            .next()
            .or_else(|| block.select(&EXPLANATION_OLD_SEL).next());
        if let Some(e) = explanation {
            record.explanation_text = format_explanation(&plain_text(e));
            if e.select(&IMG_SEL).next().is_some() {
                record.explanation_markup = inner_markup(e, &self.base);
            }
        }

        Ok(record)
    }
}

fn extract_options(block: ElementRef<'_>) -> BTreeMap<char, String> {
    let mut options = BTreeMap::new();
    let mut labels = 'A'..='Z';
    for row in block.select(&OPTION_ROW_SEL) {
        let cell = row.select(&OPTION_VALUE_SEL).next().unwrap_or(row);
        let text = match plain_text(cell) {
            t if t.is_empty() => image_alt(cell),
            t => t,
        };
        // An option with neither text nor alt text gets no label, so later
        // options shift up a letter and may no longer match the page's key.
        if text.is_empty() {
            continue;
        }
        match labels.next() {
            Some(label) => {
                options.insert(label, text);
            }
            None => {
                tracing::warn!("dropping options past Z");
                break;
            }
        }
    }
    options
}

fn image_alt(el: ElementRef<'_>) -> String {
    el.select(&IMG_SEL)
        .filter_map(|img| img.value().attr("alt"))
        .map(str::trim)
        .find(|alt| !alt.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Key attribute first, then the legacy markers: a nested `jq-hdnakqb`
/// span, else a standalone letter in the marker text.
fn resolve_answer(block: ElementRef<'_>, options: &BTreeMap<char, String>) -> Option<Answer> {
    let known = |c: &char| options.is_empty() || options.contains_key(c);

    let keyed = block
        .select(&ANSWER_KEY_SEL)
        .filter_map(|e| e.value().attr("value"))
        .filter_map(bare_letter)
        .find(known);
    if let Some(c) = keyed {
        return Some(Answer::Letter(c));
    }

    let marker = block
        .select(&ANSWER_OPTION_SEL)
        .next()
        .or_else(|| block.select(&ANSWER_HIDDEN_SEL).next())?;
    let raw = spaced_text(marker);
    let letter = marker
        .select(&ANSWER_HIDDEN_SEL)
        .find_map(|span| bare_letter(&plain_text(span)))
        .or_else(|| {
            LETTER_RE
                .captures(&raw)
                .and_then(|c| c[1].chars().next())
        });

    match letter {
        Some(c) if known(&c) => Some(Answer::Letter(c)),
        _ => Some(raw)
            .filter(|r| !r.is_empty() && bare_letter(r).is_none())
            .map(Answer::Text),
    }
}

fn bare_letter(s: &str) -> Option<char> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}
