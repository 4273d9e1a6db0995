use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::NewSession;

#[instrument(skip(pool))]
pub async fn start_session(pool: &Pool<Sqlite>, session: NewSession) -> Result<i64, AppError> {
    db::get_user(pool, session.user_id).await?;

    match (session.template_id, session.day_number) {
        (None, Some(_)) => {
            return Err(AppError::Validation(
                "day_number requires template_id".to_string(),
            ));
        }
        (Some(template_id), Some(day_number)) => {
            if !db::template_day_exists(pool, template_id, day_number).await? {
                return Err(AppError::NotFound(format!(
                    "Template {} has no day {}",
                    template_id, day_number
                )));
            }
        }
        (Some(template_id), None) => {
            db::get_template(pool, template_id).await?;
        }
        (None, None) => {}
    }

    let session_id = db::create_session(pool, &session, Utc::now()).await?;
    info!(session_id, "Started workout session");

    Ok(session_id)
}

#[instrument(skip(pool))]
pub async fn end_session(pool: &Pool<Sqlite>, session_id: i64) -> Result<DateTime<Utc>, AppError> {
    let ended_at = Utc::now();

    if db::finish_session(pool, session_id, ended_at).await? {
        info!(session_id, "Ended workout session");
        return Ok(ended_at);
    }

    // Either missing or already finished
    let session = db::get_session(pool, session_id).await?;
    Err(AppError::Conflict(format!(
        "Workout session {} already ended at {}",
        session.id,
        session
            .end_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    )))
}
