// sqlx::Error -> AppError

use gantry_core::error::AppError;

/// SQLite primary result codes: https://www.sqlite.org/rescode.html
const SQLITE_BUSY: i32 = 5;
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_FULL: i32 = 13;
const SQLITE_NOTADB: i32 = 26;

/// Map with structured information; corruption is the only fatal class
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let Some(code) = db_err.code() else {
                return AppError::Store(format!("Database error: {}", db_err.message()));
            };
            let code_str = code.as_ref();

            // Extended codes carry the primary code in the low byte
            let primary = code_str.parse::<i32>().map(|c| c & 0xff).unwrap_or(-1);
            match primary {
                SQLITE_CORRUPT | SQLITE_NOTADB => AppError::StoreCorrupted(format!(
                    "{} ({})",
                    db_err.message(),
                    code_str
                )),
                SQLITE_BUSY => AppError::Store(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                SQLITE_FULL => AppError::Store(format!("Database full: {}", db_err.message())),
                _ if db_err.is_unique_violation() => AppError::Store(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code_str
                )),
                _ => AppError::Store(format!(
                    "Database error [{}]: {}",
                    code_str,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::ColumnNotFound(col) => {
            AppError::StoreCorrupted(format!("Column not found: {}", col))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            AppError::StoreCorrupted(format!("Undecodable column {}: {}", index, source))
        }
        // Connection, pool, protocol errors
        _ => AppError::Store(err.to_string()),
    }
}
