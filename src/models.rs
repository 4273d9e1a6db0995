use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::fixed::from_hundredths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrType {
    MaxWeight,
    MaxReps,
    MaxVolume,
}

impl PrType {
    pub const ALL: [PrType; 3] = [PrType::MaxWeight, PrType::MaxReps, PrType::MaxVolume];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrType::MaxWeight => "max_weight",
            PrType::MaxReps => "max_reps",
            PrType::MaxVolume => "max_volume",
        }
    }
}

impl fmt::Display for PrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_weight" => Ok(PrType::MaxWeight),
            "max_reps" => Ok(PrType::MaxReps),
            "max_volume" => Ok(PrType::MaxVolume),
            other => Err(AppError::Internal(format!(
                "Unknown personal record type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    #[default]
    Completed,
    Skipped,
    Failed,
}

impl SetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetStatus::Completed => "completed",
            SetStatus::Skipped => "skipped",
            SetStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SetStatus::Completed),
            "skipped" => Ok(SetStatus::Skipped),
            "failed" => Ok(SetStatus::Failed),
            other => Err(AppError::Validation(format!(
                "status '{}' must be one of completed, skipped, failed",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub gender: Option<String>,
    pub birth_year: Option<i64>,
    pub join_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BodyPart {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub body_part: String, // Denormalized from body_parts
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkoutSession {
    pub id: i64,
    pub user_id: i64,
    pub template_id: Option<i64>,
    pub day_number: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetLog {
    pub id: i64,
    pub session_id: i64,
    pub exercise_id: i64,
    pub set_number: i64,
    pub reps_actual: Option<i64>,
    pub weight_kg: Option<Decimal>,
    pub rpe: Option<f64>,
    pub status: SetStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSetLog {
    pub id: i64,
    pub session_id: i64,
    pub exercise_id: i64,
    pub set_number: i64,
    pub reps_actual: Option<i64>,
    pub weight_kg: Option<i64>,
    pub rpe: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbSetLog> for SetLog {
    type Error = AppError;

    fn try_from(db: DbSetLog) -> Result<Self, Self::Error> {
        let status = SetStatus::from_str(&db.status)
            .map_err(|_| AppError::Internal(format!("Stored set has status '{}'", db.status)))?;

        Ok(Self {
            id: db.id,
            session_id: db.session_id,
            exercise_id: db.exercise_id,
            set_number: db.set_number,
            reps_actual: db.reps_actual,
            weight_kg: db.weight_kg.map(from_hundredths),
            rpe: db.rpe,
            status,
            created_at: db.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalRecord {
    pub id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub pr_type: PrType,
    pub value: Decimal,
    pub updated_date: DateTime<Utc>,
    pub set_log_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPersonalRecord {
    pub id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub pr_type: String,
    pub value: i64,
    pub updated_date: DateTime<Utc>,
    pub set_log_id: Option<i64>,
}

impl TryFrom<DbPersonalRecord> for PersonalRecord {
    type Error = AppError;

    fn try_from(db: DbPersonalRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            exercise_id: db.exercise_id,
            exercise_name: db.exercise_name,
            pr_type: PrType::from_str(&db.pr_type)?,
            value: from_hundredths(db.value),
            updated_date: db.updated_date,
            set_log_id: db.set_log_id,
        })
    }
}

/// The stored best for one (user, exercise, pr_type), as seen inside a write transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub session_id: i64,
    pub start_time: DateTime<Utc>,
    pub total_sets: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<i64>,
    pub days: Vec<TemplateDay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateDay {
    pub day_number: i64,
    pub name: Option<String>,
    pub exercises: Vec<TemplateExercise>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateExercise {
    pub exercise_id: i64,
    pub exercise_name: String,
    pub order_index: i64,
    pub sets: i64,
    pub reps: i64,
    pub rest_seconds: Option<i64>,
    pub suggested_weight_kg: Option<Decimal>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTemplateExercise {
    pub day_number: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub order_index: i64,
    pub sets: i64,
    pub reps: i64,
    pub rest_seconds: Option<i64>,
    pub suggested_weight: Option<i64>,
}

impl From<DbTemplateExercise> for TemplateExercise {
    fn from(db: DbTemplateExercise) -> Self {
        Self {
            exercise_id: db.exercise_id,
            exercise_name: db.exercise_name,
            order_index: db.order_index,
            sets: db.sets,
            reps: db.reps,
            rest_seconds: db.rest_seconds,
            suggested_weight_kg: db.suggested_weight.map(from_hundredths),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BodyMeasurement {
    pub id: i64,
    pub user_id: i64,
    pub measured_at: DateTime<Utc>,
    pub weight_kg: Option<Decimal>,
    pub body_fat_percent: Option<Decimal>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbBodyMeasurement {
    pub id: i64,
    pub user_id: i64,
    pub measured_at: DateTime<Utc>,
    pub weight_kg: Option<i64>,
    pub body_fat_percent: Option<i64>,
}

impl From<DbBodyMeasurement> for BodyMeasurement {
    fn from(db: DbBodyMeasurement) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            measured_at: db.measured_at,
            weight_kg: db.weight_kg.map(from_hundredths),
            body_fat_percent: db.body_fat_percent.map(from_hundredths),
        }
    }
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub birth_year: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub name: String,
    pub body_part_id: i64,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub user_id: i64,
    pub template_id: Option<i64>,
    pub day_number: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewSetLog {
    pub session_id: i64,
    pub exercise_id: i64,
    pub set_number: i64,
    pub weight_kg: Option<Decimal>,
    pub reps_actual: Option<i64>,
    pub rpe: Option<f64>,
    pub status: SetStatus,
}

#[cfg(test)]
impl NewSetLog {
    pub fn new(session_id: i64, exercise_id: i64, set_number: i64) -> Self {
        Self {
            session_id,
            exercise_id,
            set_number,
            weight_kg: None,
            reps_actual: None,
            rpe: None,
            status: SetStatus::default(),
        }
    }

    pub fn weight(mut self, weight_kg: Decimal) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn reps(mut self, reps_actual: i64) -> Self {
        self.reps_actual = Some(reps_actual);
        self
    }

    pub fn rpe(mut self, rpe: f64) -> Self {
        self.rpe = Some(rpe);
        self
    }

    pub fn status(mut self, status: SetStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<i64>,
    pub days: Vec<NewTemplateDay>,
}

#[derive(Debug, Clone)]
pub struct NewTemplateDay {
    pub day_number: i64,
    pub name: Option<String>,
    pub exercises: Vec<NewTemplateExercise>,
}

#[derive(Debug, Clone)]
pub struct NewTemplateExercise {
    pub exercise_id: i64,
    pub sets: i64,
    pub reps: i64,
    pub rest_seconds: Option<i64>,
    pub suggested_weight_kg: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewMeasurement {
    pub user_id: i64,
    pub weight_kg: Option<Decimal>,
    pub body_fat_percent: Option<Decimal>,
}
