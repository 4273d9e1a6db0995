use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::fixed::normalize;
use crate::models::{NewSetLog, SetLog};
use crate::records::{self, PrUpdate};

#[derive(Debug, Clone)]
pub struct LoggedSet {
    pub set_log: SetLog,
    pub records: PrUpdate,
}

pub fn validate_set(set: &NewSetLog) -> Result<(), AppError> {
    if set.set_number < 1 {
        return Err(AppError::Validation("set_number must be at least 1".to_string()));
    }

    if let Some(rpe) = set.rpe {
        if !(1.0..=10.0).contains(&rpe) {
            return Err(AppError::Validation(format!(
                "rpe must be between 1 and 10, got {}",
                rpe
            )));
        }
    }

    if matches!(set.reps_actual, Some(reps) if reps < 0) {
        return Err(AppError::Validation("reps_actual cannot be negative".to_string()));
    }

    if matches!(set.weight_kg, Some(weight) if weight < Decimal::ZERO) {
        return Err(AppError::Validation("weight_kg cannot be negative".to_string()));
    }

    Ok(())
}

/// Persists one performed set and folds it into the user's personal records
/// as a single transaction.
#[instrument(skip(pool))]
pub async fn log_set(pool: &Pool<Sqlite>, set: NewSetLog) -> Result<LoggedSet, AppError> {
    validate_set(&set)?;

    // Sessions and exercises are never deleted.
    db::get_session(pool, set.session_id).await?;
    db::get_exercise(pool, set.exercise_id).await?;

    let set = NewSetLog {
        weight_kg: set.weight_kg.map(normalize),
        ..set
    };

    let mut tx = pool.begin().await?;

    // The insert must be the first statement so it takes the write lock
    // before any personal record is read.
    let set_log = db::insert_set_log(&mut *tx, &set, Utc::now()).await?;
    let records = records::apply_to_pr(&mut *tx, &set_log).await?;

    tx.commit().await?;

    info!(
        set_log_id = set_log.id,
        new_records = records.new_records().count(),
        "Logged set"
    );

    Ok(LoggedSet { set_log, records })
}
