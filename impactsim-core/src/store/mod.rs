//! SQLite persistence layer.
//!
//! RULE: only the `store` module talks to the database. The resolver,
//! materializer, runner, and façade call store methods — they never
//! execute SQL directly.

use crate::error::EngineResult;
use rusqlite::Connection;

mod anchor;
mod asset;
mod dependency;
mod event;
mod instance;
mod rule;
mod template;

pub use asset::AssetRow;
pub use dependency::DependencyRow;
pub use event::EventRow;
pub use instance::InstanceRow;
pub use rule::RuleRow;
pub use template::TemplateRow;

pub struct SimStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SimStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: Some(path.to_string()) })
    }

    /// Open an in-memory database (used in tests and the headless tools).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database. For in-memory
    /// databases this returns a new, isolated in-memory database —
    /// callers that need a shared in-memory store across connections
    /// should open a `file:...?mode=memory&cache=shared` URI via `open`.
    pub fn reopen(&self) -> EngineResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order. Idempotent — every
    /// statement uses `IF NOT EXISTS`.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn.execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn.execute_batch(include_str!("../../../migrations/002_templates.sql"))?;
        self.conn.execute_batch(include_str!("../../../migrations/003_instances.sql"))?;
        Ok(())
    }

    /// Run `f` inside a SQLite transaction, committing only if `f`
    /// succeeds. Used by `prepare()` to write the instance row, its
    /// anchors, and its events as one atomic unit (§5).
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
