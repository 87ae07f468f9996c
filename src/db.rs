use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::ImportError;
use crate::importer::{
    deck_ancestry, CardFields, CardId, CardImporter, SchemaHandle, NOTE_FIELDS, NOTE_TYPE_NAME,
};
use crate::parser::QuestionRecord;

const FRONT_TEMPLATE: &str = r#"<div class="question">
  <h3>Question:</h3>
  {{Question}}
</div>
<div class="options">
  <h4>Options:</h4>
  {{Options}}
</div>"#;

const BACK_TEMPLATE: &str = r#"{{FrontSide}}
<hr id="answer">
<div class="answer">
  <h3>Correct Answer:</h3>
  <strong>{{Answer}}</strong>
</div>
{{#Explanation}}
<div class="explanation">
  <h4>Explanation:</h4>
  {{Explanation}}
</div>
{{/Explanation}}"#;

const CARD_CSS: &str = ".card { font-family: Arial, sans-serif; font-size: 16px; text-align: left; color: #000; background-color: #fff; padding: 20px; }
.question { margin-bottom: 20px; padding: 15px; background-color: #f0f8ff; border-left: 4px solid #2196F3; border-radius: 4px; }
.options { margin-bottom: 20px; padding: 15px; background-color: #f9f9f9; border-radius: 4px; }
.answer { margin-bottom: 20px; padding: 15px; background-color: #e8f5e9; border-left: 4px solid #4CAF50; border-radius: 4px; }
.explanation { margin-top: 20px; padding: 15px; background-color: #fff3e0; border-left: 4px solid #FF9800; border-radius: 4px; }
img { max-width: 100%; height: auto; }";

pub fn connect(path: &Path) -> Result<Connection, ImportError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), ImportError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS decks (
            id         INTEGER PRIMARY KEY,
            name       TEXT UNIQUE NOT NULL,
            parent_id  INTEGER REFERENCES decks(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS note_types (
            id             INTEGER PRIMARY KEY,
            name           TEXT UNIQUE NOT NULL,
            fields         TEXT NOT NULL,
            front_template TEXT NOT NULL,
            back_template  TEXT NOT NULL,
            css            TEXT NOT NULL,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS notes (
            id           INTEGER PRIMARY KEY,
            deck_id      INTEGER NOT NULL REFERENCES decks(id),
            note_type_id INTEGER NOT NULL REFERENCES note_types(id),
            question     TEXT NOT NULL,
            options      TEXT NOT NULL,
            answer       TEXT NOT NULL,
            explanation  TEXT NOT NULL,
            tags         TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_notes_deck ON notes(deck_id);
        ",
    )?;
    Ok(())
}

/// Card counts for one deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckStat {
    pub name: String,
    /// Notes filed directly in this deck.
    pub own: usize,
    /// Notes in this deck and every deck below it.
    pub total: usize,
}

/// Local flashcard collection in SQLite.
pub struct SqliteCardStore {
    conn: Connection,
}

impl SqliteCardStore {
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        Self::from_connection(connect(path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, ImportError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ImportError> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Id of `deck_path`, creating it and any missing ancestors.
    pub fn ensure_deck(&self, deck_path: &str) -> Result<i64, ImportError> {
        let chain = deck_ancestry(deck_path);
        if chain.is_empty() {
            return Err(ImportError::Rejected(format!("empty deck name {deck_path:?}")));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut parent: Option<i64> = None;
        {
            let mut insert =
                tx.prepare("INSERT OR IGNORE INTO decks (name, parent_id) VALUES (?1, ?2)")?;
            let mut lookup = tx.prepare("SELECT id FROM decks WHERE name = ?1")?;
            for name in &chain {
                insert.execute(rusqlite::params![name, parent])?;
                parent = Some(lookup.query_row([name], |r| r.get(0))?);
            }
        }
        tx.commit()?;
        parent.ok_or_else(|| ImportError::Rejected(deck_path.to_string()))
    }

    pub fn deck_stats(&self) -> Result<Vec<DeckStat>, ImportError> {
        let mut stmt = self.conn.prepare(
            "SELECT d.name,
                    (SELECT COUNT(*) FROM notes n WHERE n.deck_id = d.id),
                    (SELECT COUNT(*) FROM notes n JOIN decks c ON c.id = n.deck_id
                      WHERE c.name = d.name
                         OR substr(c.name, 1, length(d.name) + 2) = d.name || '::')
             FROM decks d
             ORDER BY d.name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeckStat {
                    name: row.get(0)?,
                    own: row.get(1)?,
                    total: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn note_count(&self) -> Result<usize, ImportError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM notes", [], |r| r.get(0))?)
    }
}

impl CardImporter for SqliteCardStore {
    fn ensure_note_schema(&self) -> Result<SchemaHandle, ImportError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM note_types WHERE name = ?1",
                [NOTE_TYPE_NAME],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(SchemaHandle(id));
        }

        self.conn.execute(
            "INSERT INTO note_types (name, fields, front_template, back_template, css)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                NOTE_TYPE_NAME,
                NOTE_FIELDS.join("\u{1f}"),
                FRONT_TEMPLATE,
                BACK_TEMPLATE,
                CARD_CSS
            ],
        )?;
        Ok(SchemaHandle(self.conn.last_insert_rowid()))
    }

    fn write_card(
        &self,
        schema: SchemaHandle,
        deck_path: &str,
        record: &QuestionRecord,
        tags: &[String],
        include_explanation: bool,
    ) -> Result<CardId, ImportError> {
        let deck_id = self.ensure_deck(deck_path)?;
        let fields = CardFields::render(record, include_explanation);
        let tags = tags
            .iter()
            .map(|t| t.trim().replace(' ', "_"))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.conn.execute(
            "INSERT INTO notes (deck_id, note_type_id, question, options, answer, explanation, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                deck_id,
                schema.0,
                fields.question,
                fields.options,
                fields.answer,
                fields.explanation,
                tags
            ],
        )?;
        Ok(CardId(self.conn.last_insert_rowid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Answer;

    fn record(text: &str) -> QuestionRecord {
        let mut r = QuestionRecord::new(text).unwrap();
        r.options.insert('A', "Yes".into());
        r.options.insert('B', "No".into());
        r.answer = Some(Answer::Letter('A'));
        r
    }

    #[test]
    fn schema_is_created_once() {
        let store = SqliteCardStore::in_memory().unwrap();
        let first = store.ensure_note_schema().unwrap();
        let second = store.ensure_note_schema().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ancestors_are_created_with_parents() {
        let store = SqliteCardStore::in_memory().unwrap();
        let leaf = store.ensure_deck("IndiaBix::CurrentAffairs::2025").unwrap();
        let again = store.ensure_deck("IndiaBix::CurrentAffairs::2025").unwrap();
        assert_eq!(leaf, again);

        let parent: Option<String> = store
            .conn
            .query_row(
                "SELECT p.name FROM decks d JOIN decks p ON p.id = d.parent_id WHERE d.id = ?1",
                [leaf],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(parent.as_deref(), Some("IndiaBix::CurrentAffairs"));
        assert_eq!(store.deck_stats().unwrap().len(), 3);
    }

    #[test]
    fn written_card_has_rendered_fields_and_tags() {
        let store = SqliteCardStore::in_memory().unwrap();
        let schema = store.ensure_note_schema().unwrap();
        let tags = vec!["IndiaBix".to_string(), "General Knowledge".to_string()];
        store
            .write_card(schema, "IndiaBix::General", &record("Is it?"), &tags, true)
            .unwrap();

        let (options, answer, stored_tags): (String, String, String) = store
            .conn
            .query_row("SELECT options, answer, tags FROM notes", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(options, "A. Yes<br>B. No");
        assert_eq!(answer, "A. Yes");
        assert_eq!(stored_tags, "IndiaBix General_Knowledge");
    }

    #[test]
    fn stats_roll_up_sub_decks() {
        let store = SqliteCardStore::in_memory().unwrap();
        let written = store
            .write_cards_batch("A::B", &[record("1"), record("2")], &[], false)
            .unwrap();
        assert_eq!(written, 2);
        store
            .write_cards_batch("A", &[record("3")], &[], false)
            .unwrap();
        store
            .write_cards_batch("AB", &[record("4")], &[], false)
            .unwrap();

        let stats = store.deck_stats().unwrap();
        let a = stats.iter().find(|s| s.name == "A").unwrap();
        assert_eq!((a.own, a.total), (1, 3));
        let ab = stats.iter().find(|s| s.name == "A::B").unwrap();
        assert_eq!((ab.own, ab.total), (2, 2));
        assert_eq!(store.note_count().unwrap(), 4);
    }

    #[test]
    fn blank_deck_name_is_rejected() {
        let store = SqliteCardStore::in_memory().unwrap();
        assert!(matches!(
            store.ensure_deck(" :: "),
            Err(ImportError::Rejected(_))
        ));
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.sqlite");
        {
            let store = SqliteCardStore::open(&path).unwrap();
            store.write_cards_batch("D", &[record("q")], &[], true).unwrap();
        }
        assert_eq!(SqliteCardStore::open(&path).unwrap().note_count().unwrap(), 1);
    }
}
