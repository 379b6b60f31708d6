//! The Unigrande academic catalog.
//!
//! Nine independent tables. Relations between them (a section's subject
//! code, a course's professor identifier, ...) are plain shared values and
//! are never enforced by the store: deleting a subject leaves sections that
//! mention its code untouched.

use crate::error::{RecordsError, Result};
use crate::schema::{ColumnDefinition, IndexDefinition, Schema, TableDefinition};
use crate::value::{Row, Value};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const ACADEMIC_TERMS: &str = "periodos_letivos";
pub const PROFESSORS: &str = "professor";
pub const COURSES: &str = "curso";
pub const SUBJECTS: &str = "disciplina";
pub const CURRICULUM: &str = "matriz";
pub const SECTIONS: &str = "turma";
pub const STUDENTS: &str = "aluno";
pub const ENROLLMENTS: &str = "matricula";
pub const HISTORY: &str = "historico";

/// Build the full catalog schema.
pub fn unigrande_schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new(ACADEMIC_TERMS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::integer("ano"))
                .with_column(ColumnDefinition::integer("semestre"))
                .with_column(ColumnDefinition::date("data_inicio"))
                .with_column(ColumnDefinition::date("data_fim"))
                .with_unique(&["ano", "semestre"]),
        )
        .add_table(
            TableDefinition::new(PROFESSORS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("idt_prof", 6))
                .with_column(ColumnDefinition::digits("mat_prof", 6))
                .with_column(ColumnDefinition::text("nom_prof", 50))
                .with_unique(&["idt_prof", "mat_prof", "nom_prof"]),
        )
        .add_table(
            TableDefinition::new(COURSES)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::integer("cod_curso"))
                .with_column(ColumnDefinition::text("nom_curso", 40))
                .with_column(ColumnDefinition::digits("tot_cred", 2))
                .with_column(ColumnDefinition::digits("idt_prof", 6))
                .with_unique(&["cod_curso", "nom_curso", "tot_cred", "idt_prof"]),
        )
        .add_table(
            TableDefinition::new(SUBJECTS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::text("nom_disc", 50))
                .with_column(ColumnDefinition::digits("creditos", 2))
                .with_column(ColumnDefinition::text("top_disc", 9))
                .with_column(ColumnDefinition::digits("horas_obrig", 2))
                .with_column(ColumnDefinition::digits("limite_faltas", 2))
                .with_unique(&[
                    "cod_disc",
                    "nom_disc",
                    "creditos",
                    "top_disc",
                    "horas_obrig",
                    "limite_faltas",
                ]),
        )
        .add_table(
            TableDefinition::new(CURRICULUM)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::integer("cod_curso"))
                .with_column(ColumnDefinition::digits("periodo", 2))
                .with_unique(&["cod_disc", "cod_curso", "periodo"]),
        )
        .add_table(
            TableDefinition::new(SECTIONS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("ano", 4))
                .with_column(ColumnDefinition::digits("semestre", 2))
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::digits("vagas", 3))
                .with_column(ColumnDefinition::digits("idt_prof", 6))
                .with_unique(&["ano", "semestre", "cod_disc", "vagas", "idt_prof"]),
        )
        .add_table(
            TableDefinition::new(STUDENTS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::integer("mat_alu"))
                .with_column(ColumnDefinition::text("nom_alu", 50))
                .with_column(ColumnDefinition::digits("tot_cred_alu", 3))
                .with_column(ColumnDefinition::date("data_nasc"))
                .with_column(ColumnDefinition::decimal("mgp", 4, 2))
                .with_column(ColumnDefinition::integer("cod_curso"))
                .with_unique(&[
                    "mat_alu",
                    "nom_alu",
                    "tot_cred_alu",
                    "data_nasc",
                    "mgp",
                    "cod_curso",
                ]),
        )
        .add_table(
            TableDefinition::new(ENROLLMENTS)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("ano", 4))
                .with_column(ColumnDefinition::digits("semestre", 2))
                .with_column(ColumnDefinition::integer("mat_alu"))
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::decimal("nota_01", 3, 1))
                .with_column(ColumnDefinition::decimal("nota_02", 3, 1))
                .with_column(ColumnDefinition::decimal("nota_03", 3, 1))
                .with_column(ColumnDefinition::digits("faltas_01", 3))
                .with_column(ColumnDefinition::digits("faltas_02", 3))
                .with_column(ColumnDefinition::digits("faltas_03", 3))
                .with_unique(&[
                    "ano",
                    "semestre",
                    "mat_alu",
                    "cod_disc",
                    "nota_01",
                    "nota_02",
                    "nota_03",
                    "faltas_01",
                    "faltas_02",
                    "faltas_03",
                ])
                .with_index(student_index(ENROLLMENTS)),
        )
        .add_table(
            TableDefinition::new(HISTORY)
                .with_column(ColumnDefinition::id())
                .with_column(ColumnDefinition::digits("ano", 4))
                .with_column(ColumnDefinition::digits("semestre", 2))
                .with_column(ColumnDefinition::integer("mat_alu"))
                .with_column(ColumnDefinition::digits("cod_disc", 6))
                .with_column(ColumnDefinition::text("situacao", 2))
                .with_column(ColumnDefinition::decimal("media", 3, 1))
                .with_column(ColumnDefinition::digits("faltas", 3))
                .with_unique(&[
                    "ano",
                    "semestre",
                    "mat_alu",
                    "cod_disc",
                    "situacao",
                    "media",
                    "faltas",
                ])
                .with_index(student_index(HISTORY)),
        )
}

// Per-student listings don't lead with the student column in the unique tuple.
fn student_index(table: &str) -> IndexDefinition {
    IndexDefinition {
        name: format!("idx_{table}_mat_alu"),
        columns: vec!["mat_alu".to_string()],
        unique: false,
    }
}

/// A typed row of one catalog table.
///
/// `to_row` never includes the surrogate id; the store assigns it.
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    const TABLE: &'static str;

    fn to_row(&self) -> Row;

    fn from_row(row: &Row) -> Result<Self>;
}

/// A persisted entity together with its surrogate id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<E> {
    pub id: i64,
    #[serde(flatten)]
    pub data: E,
}

fn field<'a>(row: &'a Row, table: &str, column: &str) -> Result<&'a Value> {
    row.get(column).ok_or_else(|| RecordsError::MissingColumn {
        table: table.to_string(),
        column: column.to_string(),
    })
}

pub(crate) fn int(row: &Row, table: &str, column: &str) -> Result<i64> {
    field(row, table, column)?
        .as_integer()
        .ok_or_else(|| RecordsError::type_mismatch(table, column, "integer"))
}

fn text(row: &Row, table: &str, column: &str) -> Result<String> {
    field(row, table, column)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| RecordsError::type_mismatch(table, column, "text"))
}

fn decimal(row: &Row, table: &str, column: &str) -> Result<Decimal> {
    field(row, table, column)?
        .as_decimal()
        .ok_or_else(|| RecordsError::type_mismatch(table, column, "decimal"))
}

fn date(row: &Row, table: &str, column: &str) -> Result<NaiveDate> {
    field(row, table, column)?
        .as_date()
        .ok_or_else(|| RecordsError::type_mismatch(table, column, "date"))
}

fn row<const N: usize>(fields: [(&str, Value); N]) -> Row {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// One academic semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicTerm {
    pub year: i64,
    /// 1 or 2 by convention; not enforced.
    pub term: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Entity for AcademicTerm {
    const TABLE: &'static str = ACADEMIC_TERMS;

    fn to_row(&self) -> Row {
        row([
            ("ano", self.year.into()),
            ("semestre", self.term.into()),
            ("data_inicio", self.start_date.into()),
            ("data_fim", self.end_date.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            year: int(r, t, "ano")?,
            term: int(r, t, "semestre")?,
            start_date: date(r, t, "data_inicio")?,
            end_date: date(r, t, "data_fim")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professor {
    pub professor_id: i64,
    pub registration: i64,
    pub name: String,
}

impl Entity for Professor {
    const TABLE: &'static str = PROFESSORS;

    fn to_row(&self) -> Row {
        row([
            ("idt_prof", self.professor_id.into()),
            ("mat_prof", self.registration.into()),
            ("nom_prof", self.name.clone().into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            professor_id: int(r, t, "idt_prof")?,
            registration: int(r, t, "mat_prof")?,
            name: text(r, t, "nom_prof")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: i64,
    pub name: String,
    pub total_credits: i64,
    /// Matches `Professor::professor_id` by value only.
    pub professor_id: i64,
}

impl Entity for Course {
    const TABLE: &'static str = COURSES;

    fn to_row(&self) -> Row {
        row([
            ("cod_curso", self.code.into()),
            ("nom_curso", self.name.clone().into()),
            ("tot_cred", self.total_credits.into()),
            ("idt_prof", self.professor_id.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            code: int(r, t, "cod_curso")?,
            name: text(r, t, "nom_curso")?,
            total_credits: int(r, t, "tot_cred")?,
            professor_id: int(r, t, "idt_prof")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub code: i64,
    pub name: String,
    pub credits: i64,
    pub kind: String,
    pub required_hours: i64,
    pub absence_limit: i64,
}

impl Entity for Subject {
    const TABLE: &'static str = SUBJECTS;

    fn to_row(&self) -> Row {
        row([
            ("cod_disc", self.code.into()),
            ("nom_disc", self.name.clone().into()),
            ("creditos", self.credits.into()),
            ("top_disc", self.kind.clone().into()),
            ("horas_obrig", self.required_hours.into()),
            ("limite_faltas", self.absence_limit.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            code: int(r, t, "cod_disc")?,
            name: text(r, t, "nom_disc")?,
            credits: int(r, t, "creditos")?,
            kind: text(r, t, "top_disc")?,
            required_hours: int(r, t, "horas_obrig")?,
            absence_limit: int(r, t, "limite_faltas")?,
        })
    }
}

/// Places a subject at a term position within a course's curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumEntry {
    pub subject_code: i64,
    pub course_code: i64,
    pub term_position: i64,
}

impl Entity for CurriculumEntry {
    const TABLE: &'static str = CURRICULUM;

    fn to_row(&self) -> Row {
        row([
            ("cod_disc", self.subject_code.into()),
            ("cod_curso", self.course_code.into()),
            ("periodo", self.term_position.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            subject_code: int(r, t, "cod_disc")?,
            course_code: int(r, t, "cod_curso")?,
            term_position: int(r, t, "periodo")?,
        })
    }
}

/// One offering of a subject in a given term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub year: i64,
    pub term: i64,
    pub subject_code: i64,
    pub capacity: i64,
    pub professor_id: i64,
}

impl Entity for Section {
    const TABLE: &'static str = SECTIONS;

    fn to_row(&self) -> Row {
        row([
            ("ano", self.year.into()),
            ("semestre", self.term.into()),
            ("cod_disc", self.subject_code.into()),
            ("vagas", self.capacity.into()),
            ("idt_prof", self.professor_id.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            year: int(r, t, "ano")?,
            term: int(r, t, "semestre")?,
            subject_code: int(r, t, "cod_disc")?,
            capacity: int(r, t, "vagas")?,
            professor_id: int(r, t, "idt_prof")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub registration: i64,
    pub name: String,
    pub accumulated_credits: i64,
    pub birth_date: NaiveDate,
    /// Weighted grade average, `decimal(4, 2)`.
    pub weighted_average: Decimal,
    pub course_code: i64,
}

impl Entity for Student {
    const TABLE: &'static str = STUDENTS;

    fn to_row(&self) -> Row {
        row([
            ("mat_alu", self.registration.into()),
            ("nom_alu", self.name.clone().into()),
            ("tot_cred_alu", self.accumulated_credits.into()),
            ("data_nasc", self.birth_date.into()),
            ("mgp", self.weighted_average.into()),
            ("cod_curso", self.course_code.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            registration: int(r, t, "mat_alu")?,
            name: text(r, t, "nom_alu")?,
            accumulated_credits: int(r, t, "tot_cred_alu")?,
            birth_date: date(r, t, "data_nasc")?,
            weighted_average: decimal(r, t, "mgp")?,
            course_code: int(r, t, "cod_curso")?,
        })
    }
}

/// A student's in-progress enrollment in one subject for one term.
///
/// Grades are `decimal(3, 1)`; absences are counted per evaluation period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub year: i64,
    pub term: i64,
    pub student_registration: i64,
    pub subject_code: i64,
    pub grades: [Decimal; 3],
    pub absences: [i64; 3],
}

const GRADE_COLUMNS: [&str; 3] = ["nota_01", "nota_02", "nota_03"];
const ABSENCE_COLUMNS: [&str; 3] = ["faltas_01", "faltas_02", "faltas_03"];

impl Entity for Enrollment {
    const TABLE: &'static str = ENROLLMENTS;

    fn to_row(&self) -> Row {
        let mut r = row([
            ("ano", self.year.into()),
            ("semestre", self.term.into()),
            ("mat_alu", self.student_registration.into()),
            ("cod_disc", self.subject_code.into()),
        ]);
        for (column, grade) in GRADE_COLUMNS.iter().zip(self.grades) {
            r.insert(column.to_string(), grade.into());
        }
        for (column, absences) in ABSENCE_COLUMNS.iter().zip(self.absences) {
            r.insert(column.to_string(), absences.into());
        }
        r
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        let mut grades = [Decimal::ZERO; 3];
        let mut absences = [0; 3];
        for (grade, column) in grades.iter_mut().zip(GRADE_COLUMNS) {
            *grade = decimal(r, t, column)?;
        }
        for (count, column) in absences.iter_mut().zip(ABSENCE_COLUMNS) {
            *count = int(r, t, column)?;
        }
        Ok(Self {
            year: int(r, t, "ano")?,
            term: int(r, t, "semestre")?,
            student_registration: int(r, t, "mat_alu")?,
            subject_code: int(r, t, "cod_disc")?,
            grades,
            absences,
        })
    }
}

/// Closed-term outcome of an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub year: i64,
    pub term: i64,
    pub student_registration: i64,
    pub subject_code: i64,
    /// Opaque two-character status code.
    pub status: String,
    pub final_average: Decimal,
    pub total_absences: i64,
}

impl Entity for HistoryRecord {
    const TABLE: &'static str = HISTORY;

    fn to_row(&self) -> Row {
        row([
            ("ano", self.year.into()),
            ("semestre", self.term.into()),
            ("mat_alu", self.student_registration.into()),
            ("cod_disc", self.subject_code.into()),
            ("situacao", self.status.clone().into()),
            ("media", self.final_average.into()),
            ("faltas", self.total_absences.into()),
        ])
    }

    fn from_row(r: &Row) -> Result<Self> {
        let t = Self::TABLE;
        Ok(Self {
            year: int(r, t, "ano")?,
            term: int(r, t, "semestre")?,
            student_registration: int(r, t, "mat_alu")?,
            subject_code: int(r, t, "cod_disc")?,
            status: text(r, t, "situacao")?,
            final_average: decimal(r, t, "media")?,
            total_absences: int(r, t, "faltas")?,
        })
    }
}
