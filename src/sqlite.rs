use crate::config::RecordsConfig;
use crate::error::{RecordsError, Result};
use crate::query::{
    self, CreateOperation, CrudOperation, CrudResult, DeleteOperation, Query, ReadOperation,
    UpdateOperation,
};
use crate::schema::Schema;
use crate::unigrande::{self, Entity, Record};
use crate::value::{Row, Value};
use async_trait::async_trait;
use futures::lock::Mutex;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::Arc;

/// Start/stop hooks for a long-lived service.
#[async_trait]
pub trait Lifecycle {
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

/// Records service: one SQLite connection plus the schema it enforces.
///
/// Every operation runs under the connection lock, so writes are serialized
/// and the unique indexes decide races between identical inserts.
pub struct RecordsService {
    config: RecordsConfig,
    connection: Option<Arc<Mutex<Connection>>>,
}

impl RecordsService {
    /// Create a new records service with the given config
    pub fn new(config: RecordsConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn is_started(&self) -> bool {
        self.connection.is_some()
    }

    fn connection(&self) -> Result<Arc<Mutex<Connection>>> {
        self.connection.clone().ok_or(RecordsError::NotStarted)
    }

    /// Perform a CRUD operation against any table of the schema
    pub async fn execute_crud(&self, op: CrudOperation) -> Result<CrudResult> {
        let connection = self.connection()?;
        let conn = connection.lock().await;
        query::execute(&conn, &self.config.schema, op)
    }

    /// Insert a new row and return it with its assigned id.
    pub async fn insert<E: Entity>(&self, record: &E) -> Result<Record<E>> {
        let created = self
            .execute_crud(CrudOperation::Create(CreateOperation {
                table: E::TABLE.to_string(),
                data: record.to_row(),
            }))
            .await?;
        let row = created
            .into_rows()
            .pop()
            .ok_or_else(|| RecordsError::not_found(E::TABLE, "inserted row"))?;
        Ok(Record {
            id: unigrande::int(&row, E::TABLE, "id")?,
            data: record.clone(),
        })
    }

    pub async fn get<E: Entity>(&self, id: i64) -> Result<Record<E>> {
        self.lookup(Query::new().eq("id", id))
            .await?
            .pop()
            .ok_or_else(|| RecordsError::not_found(E::TABLE, format!("id = {id}")))
    }

    /// All rows matching `query`, in id order.
    pub async fn lookup<E: Entity>(&self, query: Query) -> Result<Vec<Record<E>>> {
        let mut op = ReadOperation::new(E::TABLE, query);
        op.order_by = Some(vec![("id".to_string(), true)]);
        self.execute_crud(CrudOperation::Read(op))
            .await?
            .into_rows()
            .iter()
            .map(record_from_row::<E>)
            .collect()
    }

    /// Rows sharing `record`'s full uniqueness tuple: zero or one.
    pub async fn lookup_by_key<E: Entity>(&self, record: &E) -> Result<Vec<Record<E>>> {
        let table = self.config.schema.table(E::TABLE)?;
        let row = record.to_row();
        let columns: Vec<&String> = match table.unique_tuples().next() {
            Some(index) => index.columns.iter().collect(),
            None => row.keys().collect(),
        };
        let mut query = Query::new();
        for column in columns {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            query = query.eq(column, value);
        }
        self.lookup(query).await
    }

    /// Replace every field of row `id`, re-checking bounds and uniqueness.
    pub async fn update<E: Entity>(&self, id: i64, record: &E) -> Result<Record<E>> {
        self.execute_crud(CrudOperation::Update(UpdateOperation {
            table: E::TABLE.to_string(),
            query: Query::new().eq("id", id),
            updates: record.to_row(),
        }))
        .await?;
        Ok(Record {
            id,
            data: record.clone(),
        })
    }

    /// Remove row `id`. Nothing referring to it by value is touched.
    pub async fn delete<E: Entity>(&self, id: i64) -> Result<()> {
        self.execute_crud(CrudOperation::Delete(DeleteOperation {
            table: E::TABLE.to_string(),
            query: Query::new().eq("id", id),
        }))
        .await?;
        Ok(())
    }
}

fn record_from_row<E: Entity>(row: &Row) -> Result<Record<E>> {
    Ok(Record {
        id: unigrande::int(row, E::TABLE, "id")?,
        data: E::from_row(row)?,
    })
}

fn initialize_schema(conn: &Connection, schema: &Schema) -> Result<()> {
    schema.check()?;
    conn.execute_batch(&schema.ddl())?;
    Ok(())
}

#[async_trait]
impl Lifecycle for RecordsService {
    fn name(&self) -> &str {
        "records"
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_started() {
            warn!("{} service already started", self.name());
            return Ok(());
        }
        let settings = &self.config.settings;
        info!("starting {} service at path: {}", self.name(), settings.db_path);
        let connection = Connection::open(&settings.db_path)?;
        if let Some(timeout) = settings.busy_timeout() {
            connection.busy_timeout(timeout)?;
        }
        initialize_schema(&connection, &self.config.schema)?;
        info!(
            "records schema ready: {}",
            self.config.schema.table_names().collect::<Vec<_>>().join(", ")
        );
        self.connection = Some(Arc::new(Mutex::new(connection)));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.connection.take().is_some() {
            info!("records service stopped");
        }
        Ok(())
    }
}
