//! Connection bootstrap for file and in-memory stores.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have every migration applied.
//! - Returned connections define the `fold_case` SQL function used by
//!   case-insensitive queries.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQL name of the Unicode lowercase function; `NULL` stays `NULL`.
const FOLD_CASE_FUNCTION: &str = "fold_case";

/// Opens (or creates) a store file and applies pending migrations.
///
/// # Side effects
/// - Emits `db_open` log events with mode, status and duration.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path))
}

/// Opens a private in-memory store with the full schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = connect().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    if let Err(err) = bootstrap_connection(&mut conn) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    register_functions(conn)?;
    apply_migrations(conn)?;
    Ok(())
}

// Built-in LIKE and lower() only fold ASCII letters.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

#[cfg(test)]
mod tests {
    use super::open_db_in_memory;

    #[test]
    fn fold_case_lowercases_beyond_ascii() {
        let conn = open_db_in_memory().unwrap();
        let folded: String = conn
            .query_row("SELECT fold_case('ÜBER Straße ÅSA');", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "über straße åsa");

        let null: Option<String> = conn
            .query_row("SELECT fold_case(NULL);", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }
}
