//! Persistent data model for the Unigrande academic records system.
//!
//! # Intention
//!
//! - Declare the academic catalog (terms, professors, courses, subjects,
//!   curricula, sections, students, enrollments, history) as explicit schema
//!   data, materialized in SQLite.
//! - Enforce field bounds and uniqueness tuples on every write, and report
//!   violations to the caller unchanged.
//!
//! # Architectural Boundaries
//!
//! - Only storage-level structure and single-row CRUD belong here.
//! - No enrollment workflows, grade computation or referential integrity:
//!   entities relate to each other by shared values only.

pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod unigrande;
pub mod value;

pub use config::{RecordsConfig, StorageSettings};
pub use error::{RecordsError, Result};
pub use query::{
    CreateOperation, CrudOperation, CrudResult, DeleteOperation, Query, QueryOperator,
    ReadOperation, UpdateOperation,
};
pub use schema::{ColumnConstraint, ColumnDefinition, DataType, IndexDefinition, Schema, TableDefinition};
pub use sqlite::{Lifecycle, RecordsService};
pub use unigrande::{
    unigrande_schema, AcademicTerm, Course, CurriculumEntry, Enrollment, Entity, HistoryRecord,
    Professor, Record, Section, Student, Subject,
};
pub use value::{Row, Value};
