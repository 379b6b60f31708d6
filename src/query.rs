use crate::error::{RecordsError, Result};
use crate::schema::{Schema, TableDefinition, WriteMode};
use crate::value::{Row, Value};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;

/// Query operators for building lookup conditions
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    In(Vec<Value>),
}

/// Conjunction of per-column conditions
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query {
    pub conditions: HashMap<String, QueryOperator>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, field: &str, op: QueryOperator) -> Self {
        self.conditions.insert(field.to_string(), op);
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(field, QueryOperator::Equal(value.into()))
    }

    /// Render as a WHERE clause over `table`, with positional parameters
    /// appended to `params`. Columns are visited in declared order.
    fn where_clause(&self, table: &TableDefinition, params: &mut Vec<SqlValue>) -> Result<String> {
        for field in self.conditions.keys() {
            table.column(field)?;
        }
        let mut clauses = Vec::new();
        for column in &table.columns {
            let Some(op) = self.conditions.get(&column.name) else {
                continue;
            };
            let name = &column.name;
            let (sql_op, value) = match op {
                QueryOperator::Equal(v) => ("=", v),
                QueryOperator::NotEqual(v) => ("<>", v),
                QueryOperator::GreaterThan(v) => (">", v),
                QueryOperator::GreaterThanOrEqual(v) => (">=", v),
                QueryOperator::LessThan(v) => ("<", v),
                QueryOperator::LessThanOrEqual(v) => ("<=", v),
                QueryOperator::In(values) => {
                    if values.is_empty() {
                        clauses.push("0".to_string());
                        continue;
                    }
                    for v in values {
                        params.push(column.encode(&table.name, v)?);
                    }
                    let holes = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{name} IN ({holes})"));
                    continue;
                }
            };
            if *value == Value::Null && matches!(sql_op, "=" | "<>") {
                let negate = if sql_op == "=" { "" } else { "NOT " };
                clauses.push(format!("{name} IS {negate}NULL"));
                continue;
            }
            params.push(column.encode(&table.name, value)?);
            clauses.push(format!("{name} {sql_op} ?"));
        }
        if clauses.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }

    fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, op)| match op {
                QueryOperator::Equal(v) => format!("{field} = {v}"),
                other => format!("{field} {other:?}"),
            })
            .collect();
        parts.sort();
        if parts.is_empty() {
            return "(any)".to_string();
        }
        parts.join(", ")
    }
}

/// CRUD operation types
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOperation {
    pub table: String,
    pub data: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOperation {
    pub table: String,
    pub query: Query,
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<Vec<(String, bool)>>, // (field, is_ascending)
}

impl ReadOperation {
    pub fn new(table: &str, query: Query) -> Self {
        Self {
            table: table.to_string(),
            query,
            fields: None,
            limit: None,
            offset: None,
            order_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperation {
    pub table: String,
    pub query: Query,
    pub updates: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperation {
    pub table: String,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrudOperation {
    Create(CreateOperation),
    Read(ReadOperation),
    Update(UpdateOperation),
    Delete(DeleteOperation),
}

/// Outcome of a [`CrudOperation`]
#[derive(Debug, Clone, PartialEq)]
pub enum CrudResult {
    /// The inserted row, including its assigned surrogate id.
    Created(Row),
    Rows(Vec<Row>),
    /// Number of rows updated or deleted.
    Affected(usize),
}

impl CrudResult {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            CrudResult::Created(row) => vec![row],
            CrudResult::Rows(rows) => rows,
            CrudResult::Affected(_) => Vec::new(),
        }
    }
}

/// Execute one operation against `conn`, validated by `schema`.
pub fn execute(conn: &Connection, schema: &Schema, op: CrudOperation) -> Result<CrudResult> {
    match op {
        CrudOperation::Create(op) => create(conn, schema.table(&op.table)?, &op.data),
        CrudOperation::Read(op) => read(conn, schema.table(&op.table)?, &op).map(CrudResult::Rows),
        CrudOperation::Update(op) => update(conn, schema.table(&op.table)?, &op),
        CrudOperation::Delete(op) => delete(conn, schema.table(&op.table)?, &op.query),
    }
}

fn create(conn: &Connection, table: &TableDefinition, data: &Row) -> Result<CrudResult> {
    let encoded = table
        .encode_write(data, WriteMode::Insert)
        .inspect_err(|e| warn!("rejected insert into {}: {e}", table.name))?;
    let columns: Vec<&str> = encoded.iter().map(|&(c, _)| c.name.as_str()).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    );
    debug!("{sql}");
    conn.execute(&sql, params_from_iter(encoded.into_iter().map(|(_, v)| v)))
        .map_err(|e| RecordsError::from_write(table, e))
        .inspect_err(|e| warn!("rejected insert into {}: {e}", table.name))?;

    let mut row = data.clone();
    if let Some(pk) = table.primary_key() {
        row.insert(pk.name.clone(), Value::Integer(conn.last_insert_rowid()));
    }
    Ok(CrudResult::Created(row))
}

fn read(conn: &Connection, table: &TableDefinition, op: &ReadOperation) -> Result<Vec<Row>> {
    let columns = match &op.fields {
        Some(fields) => fields
            .iter()
            .map(|f| table.column(f))
            .collect::<Result<Vec<_>>>()?,
        None => table.columns.iter().collect(),
    };
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}{}",
        columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        table.name,
        op.query.where_clause(table, &mut params)?
    );
    if let Some(order_by) = &op.order_by {
        let mut terms = Vec::with_capacity(order_by.len());
        for (field, ascending) in order_by {
            table.column(field)?;
            terms.push(format!("{field} {}", if *ascending { "ASC" } else { "DESC" }));
        }
        if !terms.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
    }
    match (op.limit, op.offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {}
    }
    debug!("{sql}");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut result = Vec::new();
    while let Some(raw) = rows.next()? {
        let mut row = Row::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            row.insert(column.name.clone(), column.decode(&table.name, raw.get_ref(i)?)?);
        }
        result.push(row);
    }
    Ok(result)
}

fn update(conn: &Connection, table: &TableDefinition, op: &UpdateOperation) -> Result<CrudResult> {
    let encoded = table
        .encode_write(&op.updates, WriteMode::Update)
        .inspect_err(|e| warn!("rejected update on {}: {e}", table.name))?;
    if encoded.is_empty() {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            table.name,
            op.query.where_clause(table, &mut params)?
        );
        let matching: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        if matching == 0 {
            return Err(RecordsError::not_found(&table.name, op.query.describe()));
        }
        return Ok(CrudResult::Affected(0));
    }
    let assignments: Vec<String> = encoded
        .iter()
        .map(|(c, _)| format!("{} = ?", c.name))
        .collect();
    let mut params: Vec<SqlValue> = encoded.into_iter().map(|(_, v)| v).collect();
    let sql = format!(
        "UPDATE {} SET {}{}",
        table.name,
        assignments.join(", "),
        op.query.where_clause(table, &mut params)?
    );
    debug!("{sql}");
    let affected = conn
        .execute(&sql, params_from_iter(params))
        .map_err(|e| RecordsError::from_write(table, e))
        .inspect_err(|e| warn!("rejected update on {}: {e}", table.name))?;
    if affected == 0 {
        return Err(RecordsError::not_found(&table.name, op.query.describe()));
    }
    Ok(CrudResult::Affected(affected))
}

fn delete(conn: &Connection, table: &TableDefinition, query: &Query) -> Result<CrudResult> {
    let mut params = Vec::new();
    let sql = format!(
        "DELETE FROM {}{}",
        table.name,
        query.where_clause(table, &mut params)?
    );
    debug!("{sql}");
    let affected = conn.execute(&sql, params_from_iter(params))?;
    if affected == 0 {
        return Err(RecordsError::not_found(&table.name, query.describe()));
    }
    Ok(CrudResult::Affected(affected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDefinition;

    fn schema() -> Schema {
        Schema::new().add_table(
            TableDefinition::new("matriz")
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::integer("cod_curso"))
                .with_column(ColumnDefinition::digits("periodo", 2))
                .with_unique(&["cod_disc", "cod_curso", "periodo"]),
        )
    }

    fn entry(disc: i64, periodo: i64) -> CrudOperation {
        let mut data = Row::new();
        data.insert("cod_disc".into(), disc.into());
        data.insert("cod_curso".into(), 10.into());
        data.insert("periodo".into(), periodo.into());
        CrudOperation::Create(CreateOperation {
            table: "matriz".into(),
            data,
        })
    }

    fn setup() -> (Connection, Schema) {
        let conn = Connection::open_in_memory().unwrap();
        let schema = schema();
        conn.execute_batch(&schema.ddl()).unwrap();
        (conn, schema)
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let (conn, schema) = setup();
        for (i, disc) in [101, 102, 103].into_iter().enumerate() {
            let CrudResult::Created(row) = execute(&conn, &schema, entry(disc, 1)).unwrap() else {
                panic!("expected a created row");
            };
            assert_eq!(row["id"], Value::Integer(i as i64 + 1));
        }
    }

    #[test]
    fn read_supports_ranges_order_and_paging() {
        let (conn, schema) = setup();
        for periodo in 1..=5 {
            execute(&conn, &schema, entry(200 + periodo, periodo)).unwrap();
        }
        let mut op = ReadOperation::new(
            "matriz",
            Query::new()
                .with_condition("periodo", QueryOperator::GreaterThanOrEqual(2.into()))
                .with_condition("cod_disc", QueryOperator::NotEqual(205.into())),
        );
        op.fields = Some(vec!["periodo".into()]);
        op.order_by = Some(vec![("periodo".into(), false)]);
        op.limit = Some(2);
        op.offset = Some(1);
        let rows = execute(&conn, &schema, CrudOperation::Read(op)).unwrap().into_rows();
        let periods: Vec<_> = rows.iter().map(|r| r["periodo"].clone()).collect();
        assert_eq!(periods, vec![Value::Integer(3), Value::Integer(2)]);
        assert!(!rows[0].contains_key("cod_disc"));
    }

    #[test]
    fn in_operator_with_no_values_matches_nothing() {
        let (conn, schema) = setup();
        execute(&conn, &schema, entry(300, 1)).unwrap();
        let op = ReadOperation::new(
            "matriz",
            Query::new().with_condition("cod_disc", QueryOperator::In(Vec::new())),
        );
        assert!(execute(&conn, &schema, CrudOperation::Read(op))
            .unwrap()
            .into_rows()
            .is_empty());
    }

    #[test]
    fn update_and_delete_report_missing_targets() {
        let (conn, schema) = setup();
        let mut updates = Row::new();
        updates.insert("periodo".into(), 4.into());
        let err = execute(
            &conn,
            &schema,
            CrudOperation::Update(UpdateOperation {
                table: "matriz".into(),
                query: Query::new().eq("id", 42),
                updates,
            }),
        )
        .unwrap_err();
        assert!(err.is_not_found());

        let err = execute(
            &conn,
            &schema,
            CrudOperation::Delete(DeleteOperation {
                table: "matriz".into(),
                query: Query::new().eq("id", 42),
            }),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_update_still_requires_a_target() {
        let (conn, schema) = setup();
        execute(&conn, &schema, entry(400, 1)).unwrap();
        let empty = |id: i64| {
            CrudOperation::Update(UpdateOperation {
                table: "matriz".into(),
                query: Query::new().eq("id", id),
                updates: Row::new(),
            })
        };
        assert!(execute(&conn, &schema, empty(999)).unwrap_err().is_not_found());
        assert_eq!(
            execute(&conn, &schema, empty(1)).unwrap(),
            CrudResult::Affected(0)
        );
    }

    #[test]
    fn unknown_table_is_rejected() {
        let (conn, schema) = setup();
        let op = ReadOperation::new("alunos", Query::new());
        assert!(matches!(
            execute(&conn, &schema, CrudOperation::Read(op)),
            Err(RecordsError::UnknownTable(_))
        ));
    }
}
