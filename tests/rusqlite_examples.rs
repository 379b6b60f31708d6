// Raw-SQL checks against the generated DDL.
//
// These bypass the service entirely, the way an external writer would, and
// confirm the storage engine itself enforces bounds and uniqueness.

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result};
use tempfile::NamedTempFile;
use unigrande_records::unigrande_schema;

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

// Helper function to create a temporary file-based database
fn create_temp_db() -> Result<(Connection, NamedTempFile)> {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_str().unwrap();
    let conn = Connection::open(path)?;
    initialize_schema(&conn)?;
    Ok((conn, temp_file))
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(&unigrande_schema().ddl())
}

fn constraint_code(err: &rusqlite::Error) -> Option<ErrorCode> {
    err.sqlite_error_code()
}

#[tokio::test]
async fn test_bounds_enforced_by_storage() {
    test_bounds_enforced_by_storage_impl().unwrap();
}

fn test_bounds_enforced_by_storage_impl() -> Result<()> {
    let conn = create_test_db()?;

    conn.execute(
        "INSERT INTO professor (idt_prof, mat_prof, nom_prof) VALUES (?1, ?2, ?3)",
        params![999999, 123456, "Ana Silva"],
    )?;
    let err = conn
        .execute(
            "INSERT INTO professor (idt_prof, mat_prof, nom_prof) VALUES (?1, ?2, ?3)",
            params![1000000, 123456, "Ana Silva"],
        )
        .unwrap_err();
    assert_eq!(constraint_code(&err), Some(ErrorCode::ConstraintViolation));

    let err = conn
        .execute(
            "INSERT INTO historico (ano, semestre, mat_alu, cod_disc, situacao, media, faltas)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![2025, 1, 20250001, 101, "APR", 75, 2],
        )
        .unwrap_err();
    assert_eq!(constraint_code(&err), Some(ErrorCode::ConstraintViolation));

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM historico", [], |row| row.get(0))?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn test_dates_must_be_iso() {
    test_dates_must_be_iso_impl().unwrap();
}

fn test_dates_must_be_iso_impl() -> Result<()> {
    let conn = create_test_db()?;

    let err = conn
        .execute(
            "INSERT INTO periodos_letivos (ano, semestre, data_inicio, data_fim)
             VALUES (?1, ?2, ?3, ?4)",
            params![2025, 1, "01/02/2025", "2025-06-30"],
        )
        .unwrap_err();
    assert_eq!(constraint_code(&err), Some(ErrorCode::ConstraintViolation));

    conn.execute(
        "INSERT INTO periodos_letivos (ano, semestre, data_inicio, data_fim)
         VALUES (?1, ?2, ?3, ?4)",
        params![2025, 1, "2025-02-01", "2025-06-30"],
    )?;
    Ok(())
}

#[tokio::test]
async fn test_unique_tuple_enforced_by_storage() {
    test_unique_tuple_enforced_by_storage_impl().unwrap();
}

fn test_unique_tuple_enforced_by_storage_impl() -> Result<()> {
    let (conn, _file) = create_temp_db()?;

    let insert = "INSERT INTO matriz (cod_disc, cod_curso, periodo) VALUES (?1, ?2, ?3)";
    conn.execute(insert, params![101, 10, 1])?;
    conn.execute(insert, params![101, 10, 2])?;
    let err = conn.execute(insert, params![101, 10, 1]).unwrap_err();
    assert_eq!(constraint_code(&err), Some(ErrorCode::ConstraintViolation));

    // the unique tuple is also the lookup index
    let index: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?",
            ["idx_matriz_unique"],
            |row| row.get(0),
        )
        .optional()?;
    let index = index.expect("unique index should exist");
    assert!(index.contains("UNIQUE"));
    assert!(index.contains("(cod_disc, cod_curso, periodo)"));
    Ok(())
}

#[tokio::test]
async fn test_no_foreign_keys_declared() {
    test_no_foreign_keys_declared_impl().unwrap();
}

fn test_no_foreign_keys_declared_impl() -> Result<()> {
    let conn = create_test_db()?;

    for table in unigrande_schema().table_names() {
        let fks: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM pragma_foreign_key_list('{table}')"),
            [],
            |row| row.get(0),
        )?;
        assert_eq!(fks, 0, "{table} declares a foreign key");
    }

    // a section may name a subject that does not exist
    conn.execute(
        "INSERT INTO turma (ano, semestre, cod_disc, vagas, idt_prof) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![2025, 1, 424242, 40, 999999],
    )?;
    Ok(())
}

#[tokio::test]
async fn test_schema_initialization_is_idempotent() {
    test_schema_initialization_is_idempotent_impl().unwrap();
}

fn test_schema_initialization_is_idempotent_impl() -> Result<()> {
    let (conn, _file) = create_temp_db()?;
    initialize_schema(&conn)?;

    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name <> 'sqlite_sequence'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(tables, 9);
    Ok(())
}
