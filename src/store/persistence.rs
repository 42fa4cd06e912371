use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::sync::Mutex;

use crate::data::types::{BetActivity, Comment, NewBetActivity, Side};
use crate::store::{new_record_id, StoreError, ACTIVITY_LIMIT};

/// SQLite-backed store for a local activity history across runs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const ACTIVITY_COLUMNS: &str = "id, market_id, user_address, option, amount, shares, tx_hash, \
     created_at, market_title, option_a, option_b";

impl SqliteStore {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bet_activities (
                id TEXT PRIMARY KEY,
                market_id TEXT NOT NULL,
                user_address TEXT NOT NULL,
                option INTEGER NOT NULL,
                amount REAL NOT NULL,
                shares REAL NOT NULL,
                tx_hash TEXT,
                created_at TEXT NOT NULL,
                market_title TEXT,
                option_a TEXT,
                option_b TEXT
            );

            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                market_id TEXT NOT NULL,
                user_address TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_activities_market_id ON bet_activities(market_id);
            CREATE INDEX IF NOT EXISTS idx_activities_user ON bet_activities(user_address);
            CREATE INDEX IF NOT EXISTS idx_comments_market_id ON comments(market_id);
            "#,
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn get_activities(&self, market_id: Option<&str>) -> Result<Vec<BetActivity>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM bet_activities
             WHERE (?1 IS NULL OR market_id = ?1)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
            ACTIVITY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![market_id, ACTIVITY_LIMIT as i64], activity_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn add_activity(&self, activity: NewBetActivity) -> Result<BetActivity, StoreError> {
        let item = activity.into_activity(new_record_id(), Utc::now());

        self.conn()?.execute(
            "INSERT INTO bet_activities (id, market_id, user_address, option, amount, shares, tx_hash,
                                         created_at, market_title, option_a, option_b)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.id,
                item.market_id,
                item.user_address,
                item.option.index(),
                item.amount,
                item.shares,
                item.tx_hash,
                timestamp(&item.created_at),
                item.market_title,
                item.option_a,
                item.option_b,
            ],
        )?;

        Ok(item)
    }

    pub fn get_user_activities(&self, user_address: &str) -> Result<Vec<BetActivity>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM bet_activities
             WHERE user_address = ?1
             ORDER BY created_at DESC, rowid DESC",
            ACTIVITY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_address], activity_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_comments(&self, market_id: &str) -> Result<Vec<Comment>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, market_id, user_address, content, created_at, updated_at
             FROM comments
             WHERE market_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![market_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                market_id: row.get(1)?,
                user_address: row.get(2)?,
                content: row.get(3)?,
                created_at: parse_timestamp(row, 4)?,
                updated_at: parse_timestamp(row, 5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn add_comment(&self, market_id: &str, content: &str, user_address: &str) -> Result<Comment, StoreError> {
        let now = Utc::now();
        let comment = Comment {
            id: new_record_id(),
            market_id: market_id.to_string(),
            user_address: user_address.to_string(),
            content: content.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.conn()?.execute(
            "INSERT INTO comments (id, market_id, user_address, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.market_id,
                comment.user_address,
                comment.content,
                timestamp(&comment.created_at),
                timestamp(&comment.updated_at),
            ],
        )?;

        Ok(comment)
    }

    pub fn delete_comment(&self, comment_id: &str, user_address: &str) -> Result<bool, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM comments WHERE id = ?1 AND user_address = ?2",
            params![comment_id, user_address],
        )?;
        Ok(deleted > 0)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<BetActivity> {
    let option: u8 = row.get(3)?;
    let option = Side::try_from(option).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Integer,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(BetActivity {
        id: row.get(0)?,
        market_id: row.get(1)?,
        user_address: row.get(2)?,
        option,
        amount: row.get(4)?,
        shares: row.get(5)?,
        tx_hash: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        market_title: row.get(8)?,
        option_a: row.get(9)?,
        option_b: row.get(10)?,
    })
}
