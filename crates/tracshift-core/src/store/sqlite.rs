//! SQLite implementation of the ticket store against the Trac schema.
//!
//! Reads the `ticket`, `ticket_change`, and `milestone` tables. Timestamps
//! in a modern Trac database are microsecond epoch integers. The `due`
//! column is carried as raw text because legacy databases hold either an
//! epoch integer or hand-entered text; translation happens in the driver.

use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;
use tracing::debug;

use super::{StoreError, TicketStore};
use crate::model::{ChangeEvent, FieldKind, Milestone, Ticket};

#[derive(Debug)]
pub struct SqliteTicketStore {
    conn: Connection,
}

impl SqliteTicketStore {
    /// Open the Trac database read-only. A missing or unreadable file is
    /// reported immediately rather than at first query.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // Probe the schema so an unreachable store fails up front.
        conn.query_row("SELECT COUNT(*) FROM ticket", [], |row| row.get::<_, i64>(0))
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { conn })
    }

    /// Wrap an already-open connection; used by tests with fixture data.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl TicketStore for SqliteTicketStore {
    fn milestones(&self) -> Result<Vec<Milestone>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name,
                    CAST(due AS TEXT),
                    COALESCE(completed, 0),
                    COALESCE(description, '')
             FROM milestone
             ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            let due_raw: Option<String> = row.get(1)?;
            let completed: i64 = row.get(2)?;
            Ok(Milestone {
                name: row.get(0)?,
                closed: completed != 0,
                due: due_raw.filter(|raw| !raw.is_empty() && raw != "0"),
                description: row.get(3)?,
            })
        })?;

        let milestones = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(count = milestones.len(), "loaded legacy milestones");
        Ok(milestones)
    }

    fn tickets(&self, start_at: i64) -> Result<Vec<Ticket>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id,
                    COALESCE(summary, ''),
                    COALESCE(reporter, ''),
                    COALESCE(time, 0),
                    COALESCE(description, ''),
                    COALESCE(owner, ''),
                    COALESCE(milestone, ''),
                    COALESCE(type, ''),
                    COALESCE(component, ''),
                    COALESCE(priority, ''),
                    COALESCE(version, ''),
                    COALESCE(resolution, '')
             FROM ticket
             WHERE id >= ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![start_at], |row| {
            Ok(Ticket {
                id: row.get(0)?,
                summary: row.get(1)?,
                reporter: row.get(2)?,
                created_at_us: row.get(3)?,
                description: row.get(4)?,
                owner: row.get(5)?,
                milestone: row.get(6)?,
                kind: row.get(7)?,
                component: row.get(8)?,
                priority: row.get(9)?,
                version: row.get(10)?,
                resolution: row.get(11)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn changes(&self, ticket_id: i64) -> Result<Vec<ChangeEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ticket,
                    COALESCE(time, 0),
                    COALESCE(author, ''),
                    field,
                    COALESCE(newvalue, '')
             FROM ticket_change
             WHERE ticket = ?1
             ORDER BY time ASC",
        )?;

        let rows = stmt.query_map(params![ticket_id], |row| {
            let field: String = row.get(3)?;
            Ok(ChangeEvent {
                ticket_id: row.get(0)?,
                ts_us: row.get(1)?,
                author: row.get(2)?,
                field: FieldKind::from_raw(&field),
                value: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
