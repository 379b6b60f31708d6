//! Explicit schema definitions.
//!
//! A [`Schema`] is plain data: built once at startup and handed to the
//! service that needs it. It renders its own DDL and owns the per-column
//! encoding and bound checks applied before any write reaches SQLite.

use crate::error::{RecordsError, Result};
use crate::value::{Row, Value};
use chrono::{Datelike, NaiveDate};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rust_decimal::Decimal;

/// Schema definition for the records database
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RecordsError::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Every index must name columns that exist on its table.
    pub fn check(&self) -> Result<()> {
        for table in &self.tables {
            for index in &table.indexes {
                for column in &index.columns {
                    table.column(column)?;
                }
            }
        }
        Ok(())
    }

    /// DDL for every table followed by its indexes.
    pub fn ddl(&self) -> String {
        let mut statements = Vec::new();
        for table in &self.tables {
            statements.push(table.create_table_sql());
            statements.extend(table.create_index_sql());
        }
        statements.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare a uniqueness tuple. Its index also serves lookups by that tuple.
    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        let name = format!("idx_{}_unique", self.name);
        self.indexes.push(IndexDefinition {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: true,
        });
        self
    }

    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| RecordsError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    pub fn unique_tuples(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.iter().filter(|i| i.unique)
    }

    pub fn create_table_sql(&self) -> String {
        let parts: Vec<String> = self.columns.iter().map(ColumnDefinition::ddl).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                format!(
                    "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
                    if index.unique { "UNIQUE " } else { "" },
                    index.name,
                    self.name,
                    index.columns.join(", ")
                )
            })
            .collect()
    }

    /// Validate and encode `row` for a write, in declared column order.
    ///
    /// On insert every required column must be present; on update only the
    /// supplied columns are checked. Unknown columns are always rejected.
    pub(crate) fn encode_write(
        &self,
        row: &Row,
        mode: WriteMode,
    ) -> Result<Vec<(&ColumnDefinition, SqlValue)>> {
        for name in row.keys() {
            self.column(name)?;
        }
        let mut encoded = Vec::with_capacity(row.len());
        for column in &self.columns {
            match row.get(&column.name) {
                Some(value) => {
                    column.check_bounds(&self.name, value)?;
                    encoded.push((column, column.encode(&self.name, value)?));
                }
                None if mode == WriteMode::Insert && column.is_required() => {
                    return Err(RecordsError::MissingColumn {
                        table: self.name.clone(),
                        column: column.name.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(encoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    /// Fixed-point decimal stored as `value * 10^scale` in an INTEGER column.
    Decimal { precision: u32, scale: u32 },
    /// ISO-8601 calendar date stored as TEXT.
    Date,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    MaxValue(i64),
    MaxLength(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Surrogate `id` column.
    pub fn id() -> Self {
        Self::new("id", DataType::Integer).with_constraint(ColumnConstraint::PrimaryKey)
    }

    /// Required integer with no declared bound.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer).with_constraint(ColumnConstraint::NotNull)
    }

    /// Required integer of at most `digits` decimal digits.
    pub fn digits(name: impl Into<String>, digits: u32) -> Self {
        Self::integer(name).with_constraint(ColumnConstraint::MaxValue(10i64.pow(digits) - 1))
    }

    pub fn text(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, DataType::Text)
            .with_constraint(ColumnConstraint::NotNull)
            .with_constraint(ColumnConstraint::MaxLength(max_length))
    }

    pub fn decimal(name: impl Into<String>, precision: u32, scale: u32) -> Self {
        Self::new(name, DataType::Decimal { precision, scale })
            .with_constraint(ColumnConstraint::NotNull)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Date).with_constraint(ColumnConstraint::NotNull)
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&ColumnConstraint::PrimaryKey)
    }

    fn is_required(&self) -> bool {
        !self.is_primary_key() && self.constraints.contains(&ColumnConstraint::NotNull)
    }

    fn ddl(&self) -> String {
        if self.is_primary_key() {
            return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.name);
        }
        let name = &self.name;
        let (sql_type, mut checks) = match self.data_type {
            DataType::Integer => ("INTEGER", Vec::new()),
            DataType::Text => ("TEXT", Vec::new()),
            DataType::Decimal { precision, .. } => (
                "INTEGER",
                vec![format!("abs({name}) < {}", 10i64.pow(precision))],
            ),
            DataType::Date => ("TEXT", vec![format!("{name} IS date({name})")]),
        };
        let mut sql = format!("{name} {sql_type}");
        for constraint in &self.constraints {
            match constraint {
                ColumnConstraint::NotNull => sql.push_str(" NOT NULL"),
                ColumnConstraint::MaxValue(max) => checks.push(format!("{name} <= {max}")),
                ColumnConstraint::MaxLength(len) => checks.push(format!("length({name}) <= {len}")),
                ColumnConstraint::PrimaryKey => {}
            }
        }
        if !checks.is_empty() {
            sql.push_str(&format!(" CHECK ({})", checks.join(" AND ")));
        }
        sql
    }

    /// Reject values that exceed the column's declared maxima.
    pub(crate) fn check_bounds(&self, table: &str, value: &Value) -> Result<()> {
        for constraint in &self.constraints {
            match (constraint, value) {
                (ColumnConstraint::MaxValue(max), Value::Integer(v)) if v > max => {
                    return Err(RecordsError::bound(
                        table,
                        &self.name,
                        format!("{v} exceeds maximum {max}"),
                    ));
                }
                (ColumnConstraint::MaxLength(len), Value::Text(s)) if s.chars().count() > *len => {
                    return Err(RecordsError::bound(
                        table,
                        &self.name,
                        format!("length {} exceeds {len} characters", s.chars().count()),
                    ));
                }
                _ => {}
            }
        }
        if let (DataType::Decimal { precision, scale }, Some(d)) =
            (self.data_type, value.as_decimal())
        {
            let scaled = self.scaled(table, d, scale)?;
            if scaled.unsigned_abs() >= 10u64.pow(precision) {
                return Err(RecordsError::bound(
                    table,
                    &self.name,
                    format!("{d} exceeds {precision} digits with {scale} decimal places"),
                ));
            }
        }
        Ok(())
    }

    fn scaled(&self, table: &str, d: Decimal, scale: u32) -> Result<i64> {
        if d.normalize().scale() > scale {
            return Err(RecordsError::bound(
                table,
                &self.name,
                format!("{d} has more than {scale} decimal places"),
            ));
        }
        let mut scaled = d;
        scaled.rescale(scale);
        i64::try_from(scaled.mantissa())
            .map_err(|_| RecordsError::bound(table, &self.name, format!("{d} is out of range")))
    }

    /// Convert a field value to its stored SQLite representation.
    pub(crate) fn encode(&self, table: &str, value: &Value) -> Result<SqlValue> {
        let expected = || RecordsError::type_mismatch(table, &self.name, self.expected());
        if *value == Value::Null {
            if self.constraints.contains(&ColumnConstraint::NotNull) {
                return Err(expected());
            }
            return Ok(SqlValue::Null);
        }
        match self.data_type {
            DataType::Integer => value.as_integer().map(SqlValue::Integer).ok_or_else(expected),
            DataType::Text => value
                .as_text()
                .map(|s| SqlValue::Text(s.to_string()))
                .ok_or_else(expected),
            DataType::Decimal { scale, .. } => {
                let d = value.as_decimal().ok_or_else(expected)?;
                Ok(SqlValue::Integer(self.scaled(table, d, scale)?))
            }
            DataType::Date => {
                let d = value.as_date().ok_or_else(expected)?;
                // SQLite's date() only understands four-digit years
                if !(0..=9999).contains(&d.year()) {
                    return Err(RecordsError::type_mismatch(
                        table,
                        &self.name,
                        "date between 0000-01-01 and 9999-12-31",
                    ));
                }
                Ok(SqlValue::Text(d.format("%Y-%m-%d").to_string()))
            }
        }
    }

    /// Convert a stored SQLite value back to a field value.
    pub(crate) fn decode(&self, table: &str, raw: ValueRef<'_>) -> Result<Value> {
        let expected = || RecordsError::type_mismatch(table, &self.name, self.expected());
        match (self.data_type, raw) {
            (_, ValueRef::Null) => Ok(Value::Null),
            (DataType::Integer, ValueRef::Integer(i)) => Ok(Value::Integer(i)),
            (DataType::Text, ValueRef::Text(t)) => {
                Ok(Value::Text(String::from_utf8_lossy(t).into_owned()))
            }
            (DataType::Decimal { scale, .. }, ValueRef::Integer(i)) => {
                Ok(Value::Decimal(Decimal::new(i, scale)))
            }
            (DataType::Date, ValueRef::Text(t)) => {
                let text = std::str::from_utf8(t).map_err(|_| expected())?;
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| expected())
            }
            _ => Err(expected()),
        }
    }

    fn expected(&self) -> String {
        match self.data_type {
            DataType::Integer => "integer".to_string(),
            DataType::Text => "text".to_string(),
            DataType::Decimal { precision, scale } => format!("decimal({precision}, {scale})"),
            DataType::Date => "date".to_string(),
        }
    }
}
