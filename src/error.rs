use crate::schema::TableDefinition;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the records layer.
///
/// The first three variants are the schema's own failures. Everything else is
/// either a caller mistake against the dynamic API or a storage-engine error.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// A field's value exceeds its declared bound.
    #[error("bound violation on {table}.{column}: {reason}")]
    BoundViolation {
        table: String,
        column: String,
        reason: String,
    },

    /// A write would duplicate an existing uniqueness tuple.
    #[error("constraint violation on {table}: duplicate ({})", columns.join(", "))]
    ConstraintViolation { table: String, columns: Vec<String> },

    /// The lookup, update or delete target does not exist.
    #[error("{table}: no row matches {key}")]
    NotFound { table: String, key: String },

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("unknown column `{column}` on table `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("missing required column `{column}` on table `{table}`")]
    MissingColumn { table: String, column: String },

    #[error("type mismatch on {table}.{column}: expected {expected}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
    },

    #[error("records service has not been started")]
    NotStarted,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RecordsError>;

impl RecordsError {
    pub(crate) fn bound(
        table: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BoundViolation {
            table: table.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    pub(crate) fn type_mismatch(table: &str, column: &str, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            table: table.to_string(),
            column: column.to_string(),
            expected: expected.into(),
        }
    }

    /// Translate a failed write on `table` into the schema taxonomy.
    ///
    /// SQLite reports `UNIQUE constraint failed: t.a, t.b` and
    /// `CHECK constraint failed: <expr>`; anything else passes through.
    pub(crate) fn from_write(table: &TableDefinition, err: rusqlite::Error) -> Self {
        let table_name = table.name.as_str();
        let (code, message) = match &err {
            rusqlite::Error::SqliteFailure(e, msg) => (e, msg.clone().unwrap_or_default()),
            _ => return Self::Sqlite(err),
        };
        if code.code != ErrorCode::ConstraintViolation {
            return Self::Sqlite(err);
        }
        if let Some(rest) = message.strip_prefix("UNIQUE constraint failed: ") {
            let columns = rest
                .split(", ")
                .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
                .collect();
            return Self::ConstraintViolation {
                table: table_name.to_string(),
                columns,
            };
        }
        if let Some(expr) = message.strip_prefix("CHECK constraint failed: ") {
            let column = expr
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .find(|token| table.column(token).is_ok())
                .unwrap_or(expr.trim());
            return Self::bound(
                table_name,
                column,
                format!("rejected by storage check `{}`", expr.trim()),
            );
        }
        Self::Sqlite(err)
    }

    pub fn is_bound_violation(&self) -> bool {
        matches!(self, Self::BoundViolation { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDefinition;
    use rusqlite::{params, Connection};

    fn history() -> TableDefinition {
        TableDefinition::new("historico")
            .with_column(ColumnDefinition::id())
            .with_column(ColumnDefinition::text("situacao", 2))
            .with_column(ColumnDefinition::decimal("media", 3, 1))
            .with_column(ColumnDefinition::date("data_fim"))
            .with_unique(&["situacao", "media"])
    }

    fn rejected(conn: &Connection, table: &TableDefinition, sql: &str) -> RecordsError {
        let err = conn.execute(sql, params![]).unwrap_err();
        RecordsError::from_write(table, err)
    }

    #[test]
    fn storage_checks_name_the_failing_column() {
        let table = history();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&table.create_table_sql()).unwrap();

        let cases = [
            ("INSERT INTO historico (situacao, media, data_fim) VALUES ('APR', 75, '2025-06-30')", "situacao"),
            ("INSERT INTO historico (situacao, media, data_fim) VALUES ('AP', 1000, '2025-06-30')", "media"),
            ("INSERT INTO historico (situacao, media, data_fim) VALUES ('AP', 75, '+10000-01-01')", "data_fim"),
        ];
        for (sql, expected) in cases {
            match rejected(&conn, &table, sql) {
                RecordsError::BoundViolation { table, column, .. } => {
                    assert_eq!(table, "historico");
                    assert_eq!(column, expected);
                }
                other => panic!("expected a bound violation, got {other:?}"),
            }
        }
    }

    #[test]
    fn unique_failures_list_the_tuple() {
        let table = history();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&table.create_table_sql()).unwrap();
        for sql in table.create_index_sql() {
            conn.execute_batch(&sql).unwrap();
        }
        let insert = "INSERT INTO historico (situacao, media, data_fim) VALUES ('AP', 75, '2025-06-30')";
        conn.execute(insert, params![]).unwrap();
        match rejected(&conn, &table, insert) {
            RecordsError::ConstraintViolation { columns, .. } => {
                assert_eq!(columns, vec!["situacao", "media"]);
            }
            other => panic!("expected a constraint violation, got {other:?}"),
        }
    }
}
