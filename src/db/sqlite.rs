use super::models::{Chat, DocumentMatch, Message, Role};
use super::{Store, StoreError};
use crate::embedding::{bytes_to_embedding, embedding_to_bytes, rank_by_similarity};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct Database {
    conn: Mutex<Connection>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_chat(row: &Row) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                title TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_documents_chat ON documents(chat_id);
            ",
        )?;
        Ok(())
    }

    /// Number of document units stored for a chat.
    pub fn count_documents(&self, chat_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl Store for Database {
    // ── Chats ──

    async fn create_chat(&self, title: &str) -> Result<Chat, StoreError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![id, title, now()],
        )?;
        let chat = conn.query_row(
            "SELECT id, title, created_at FROM chats WHERE id = ?1",
            params![id],
            row_to_chat,
        )?;
        Ok(chat)
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at FROM chats ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], row_to_chat)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE chats SET title = ?1 WHERE id = ?2",
            params![title, chat_id],
        )?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM documents WHERE chat_id = ?1", params![chat_id])?;
        tx.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
        tx.execute("DELETE FROM chats WHERE id = ?1", params![chat_id])?;
        tx.commit()?;
        Ok(())
    }

    // ── Messages ──

    async fn add_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, chat_id, role.as_str(), content, now()],
        )?;
        let msg = conn.query_row(
            "SELECT id, chat_id, role, content, created_at FROM messages WHERE id = ?1",
            params![id],
            row_to_message,
        )?;
        Ok(msg)
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Documents ──

    async fn insert_document(
        &self,
        chat_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO documents (id, chat_id, content, embedding) VALUES (?1, ?2, ?3, ?4)",
            params![id, chat_id, content, embedding_to_bytes(embedding)],
        )?;
        Ok(())
    }

    async fn match_documents(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        match_threshold: f32,
        chat_id: &str,
    ) -> Result<Vec<DocumentMatch>, StoreError> {
        let candidates = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT content, embedding FROM documents WHERE chat_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![chat_id], |row| {
                let bytes: Vec<u8> = row.get(1)?;
                Ok((row.get::<_, String>(0)?, bytes_to_embedding(&bytes)))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        Ok(
            rank_by_similarity(query_embedding, candidates, match_threshold, match_count)
                .into_iter()
                .map(|(content, similarity)| DocumentMatch {
                    content,
                    similarity,
                })
                .collect(),
        )
    }
}
