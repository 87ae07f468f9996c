use tracing::{debug, warn};

use crate::error::ImportError;
use crate::parser::{Answer, QuestionRecord};

pub const NOTE_TYPE_NAME: &str = "IndiaBix MCQ";
pub const NOTE_FIELDS: [&str; 4] = ["Question", "Options", "Answer", "Explanation"];
pub const DECK_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaHandle(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardId(pub i64);

/// The flashcard store the pipeline writes into.
pub trait CardImporter {
    /// Create the 4-field note schema if it is missing. Idempotent.
    fn ensure_note_schema(&self) -> Result<SchemaHandle, ImportError>;

    /// Write one card. Decks named by `deck_path` (`::`-separated) are created on demand.
    fn write_card(
        &self,
        schema: SchemaHandle,
        deck_path: &str,
        record: &QuestionRecord,
        tags: &[String],
        include_explanation: bool,
    ) -> Result<CardId, ImportError>;

    /// Write `records` in order. A failing record is logged and skipped;
    /// the return value is how many were written.
    fn write_cards_batch(
        &self,
        deck_path: &str,
        records: &[QuestionRecord],
        tags: &[String],
        include_explanation: bool,
    ) -> Result<usize, ImportError> {
        let schema = self.ensure_note_schema()?;
        let mut written = 0;
        for (i, record) in records.iter().enumerate() {
            match self.write_card(schema, deck_path, record, tags, include_explanation) {
                Ok(id) => {
                    debug!("added note {} to {}", id.0, deck_path);
                    written += 1;
                }
                Err(e) => warn!("Error adding question {}: {}", i + 1, e),
            }
        }
        if written < records.len() {
            warn!("Wrote {} of {} cards to {}", written, records.len(), deck_path);
        }
        Ok(written)
    }
}

/// The four note fields for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFields {
    pub question: String,
    pub options: String,
    pub answer: String,
    pub explanation: String,
}

impl CardFields {
    pub fn render(record: &QuestionRecord, include_explanation: bool) -> Self {
        let question = match &record.question_markup {
            Some(markup) if record.has_images => markup.clone(),
            _ => record.question_text.clone(),
        };

        let options = record
            .options
            .iter()
            .map(|(label, text)| format!("{label}. {text}"))
            .collect::<Vec<_>>()
            .join("<br>");

        let answer = match (&record.answer, record.answer_option()) {
            (_, Some((label, text))) => format!("{label}. {text}"),
            (Some(Answer::Text(raw)), None) => raw.clone(),
            (Some(Answer::Letter(c)), None) => c.to_string(),
            (None, None) => String::new(),
        };

        let explanation = if !include_explanation {
            String::new()
        } else if !record.explanation_markup.is_empty() {
            record.explanation_markup.clone()
        } else if record.explanation_text.is_empty() {
            String::new()
        } else {
            format!("<p>{}</p>", record.explanation_text.replace("\n\n", "</p><p>"))
        };

        Self {
            question,
            options,
            answer,
            explanation,
        }
    }
}

/// `A::B::C` -> `["A", "A::B", "A::B::C"]`
pub fn deck_ancestry(deck_path: &str) -> Vec<String> {
    let parts: Vec<&str> = deck_path
        .split(DECK_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (1..=parts.len())
        .map(|n| parts[..n].join(DECK_SEPARATOR))
        .collect()
}

/// Tag form of a category label: `General Knowledge::Basics` -> `General_Knowledge_Basics`.
pub fn category_tag(label: &str) -> String {
    label.replace(DECK_SEPARATOR, "_").replace(' ', "_")
}
