use rusqlite::Connection;

use crate::error::{QueueError, Result};

/// Reject table names SQLite reserves for itself, before any SQL is built.
///
/// The `sqlite_` prefix is reserved by the store (case-insensitive);
/// empty names would produce unparseable DDL.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(QueueError::InvalidName(name.to_string()));
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"sqlite_") {
        return Err(QueueError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Double-quote an identifier for safe interpolation into SQL text.
///
/// Identifiers cannot be bound as parameters, so embedded quotes are
/// doubled per SQL quoting rules.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Initialise the queue table and its priority index.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout, so a
/// previously populated queue reopens with its rows intact. `table` and
/// `index` must already be quoted via [`quote_identifier`].
///
/// `AUTOINCREMENT` keeps ids strictly increasing across deletions; the
/// default rowid allocator may reuse the largest id after it is deleted.
pub(crate) fn init_queue_table(conn: &Connection, table: &str, index: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            priority REAL    NOT NULL DEFAULT 0,
            payload  BLOB    NOT NULL
        );

        -- Head selection and ordered scans: ORDER BY priority DESC
        CREATE INDEX IF NOT EXISTS {index} ON {table} (priority DESC);",
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_prefix_rejected() {
        assert!(validate_table_name("sqlite_master").is_err());
        assert!(validate_table_name("SQLite_anything").is_err());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn ordinary_names_accepted() {
        assert!(validate_table_name("crawl_queue").is_ok());
        assert!(validate_table_name("sqlite").is_ok());
        assert!(validate_table_name("queue \"v2\"").is_ok());
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier("plain"), "\"plain\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        let table = quote_identifier("q");
        let index = quote_identifier("idx_q_priority");
        init_queue_table(&conn, &table, &index).expect("first init");
        conn.execute(
            &format!("INSERT INTO {table} (priority, payload) VALUES (1.0, x'7b7d')"),
            [],
        )
        .expect("insert");
        init_queue_table(&conn, &table, &index).expect("second init");
        let n: i64 = conn
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);
    }
}
