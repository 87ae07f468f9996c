use std::cell::RefCell;
use std::collections::HashMap;

use scraper::Html;

use crate::error::{FetchError, ImportError, StateError};
use crate::fetch::PageSource;
use crate::importer::{CardId, CardImporter, SchemaHandle};
use crate::parser::QuestionRecord;
use crate::state::{StateStore, SyncState};

/// Serves canned pages; anything else is a 404.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, String>,
    requested: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.requested.borrow().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl PageSource for FakeSource {
    fn fetch(&self, url: &str) -> Result<Html, FetchError> {
        self.requested.borrow_mut().push(url.to_string());
        match self.pages.get(url) {
            Some(html) => Ok(Html::parse_document(html)),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WrittenCard {
    pub deck: String,
    pub record: QuestionRecord,
    pub tags: Vec<String>,
}

/// Keeps every written card in memory.
#[derive(Default)]
pub struct RecordingImporter {
    cards: RefCell<Vec<WrittenCard>>,
    reject_text: Option<String>,
    broken: bool,
}

impl RecordingImporter {
    /// Refuse records whose question text equals `text`.
    pub fn rejecting(mut self, text: &str) -> Self {
        self.reject_text = Some(text.to_string());
        self
    }

    /// Every call fails, schema included.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn cards(&self) -> Vec<WrittenCard> {
        self.cards.borrow().clone()
    }
}

impl CardImporter for RecordingImporter {
    fn ensure_note_schema(&self) -> Result<SchemaHandle, ImportError> {
        if self.broken {
            return Err(ImportError::Rejected("store unavailable".into()));
        }
        Ok(SchemaHandle(1))
    }

    fn write_card(
        &self,
        _schema: SchemaHandle,
        deck_path: &str,
        record: &QuestionRecord,
        tags: &[String],
        _include_explanation: bool,
    ) -> Result<CardId, ImportError> {
        if self.reject_text.as_deref() == Some(record.question_text.as_str()) {
            return Err(ImportError::Rejected(record.question_text.clone()));
        }
        let mut cards = self.cards.borrow_mut();
        cards.push(WrittenCard {
            deck: deck_path.to_string(),
            record: record.clone(),
            tags: tags.to_vec(),
        });
        Ok(CardId(cards.len() as i64))
    }
}

/// In-memory sync history; counts saves.
#[derive(Default)]
pub struct MemoryStateStore {
    state: RefCell<SyncState>,
    saves: RefCell<usize>,
}

impl MemoryStateStore {
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: RefCell::new(state),
            saves: RefCell::new(0),
        }
    }

    pub fn snapshot(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.borrow()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SyncState, StateError> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &SyncState) -> Result<(), StateError> {
        *self.state.borrow_mut() = state.clone();
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
