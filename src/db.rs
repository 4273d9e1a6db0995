use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::fixed::{from_hundredths, to_hundredths};
use crate::models::{
    BodyMeasurement, BodyPart, DbBodyMeasurement, DbPersonalRecord, DbSetLog, DbTemplateExercise,
    Exercise, HistoryEntry, NewExercise, NewMeasurement, NewSession, NewSetLog, NewTemplate,
    NewUser, PersonalRecord, PrType, SetLog, StoredRecord, Template, TemplateDay,
    TemplateExercise, User, WorkoutSession,
};

const PASSWORD_HASH_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

#[instrument(skip(config))]
pub async fn connect(config: &AppConfig) -> Result<Pool<Sqlite>, AppError> {
    info!(max_connections = config.max_connections, "Connecting to SQLite database");
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all, fields(username = %user.username))]
pub async fn create_user(pool: &Pool<Sqlite>, user: &NewUser) -> Result<i64, AppError> {
    info!("Creating new user");
    let password_hash = bcrypt::hash(&user.password, PASSWORD_HASH_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, email, password_hash, gender, birth_year, join_date)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(password_hash)
    .bind(&user.gender)
    .bind(user.birth_year)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Username or email already exists".to_string()),
        other => other,
    })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, User>(
        "SELECT id, username, email, gender, birth_year, join_date FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("User with id {} not found in database", id)))
}

#[instrument(skip(pool))]
pub async fn list_body_parts(pool: &Pool<Sqlite>) -> Result<Vec<BodyPart>, AppError> {
    info!("Getting all body parts");
    let rows = sqlx::query_as::<_, BodyPart>("SELECT id, name FROM body_parts ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn list_exercises(pool: &Pool<Sqlite>) -> Result<Vec<Exercise>, AppError> {
    info!("Getting all exercises");
    let rows = sqlx::query_as::<_, Exercise>(
        "SELECT e.id, e.name, bp.name AS body_part, e.created_by
         FROM exercises e
         JOIN body_parts bp ON bp.id = e.body_part_id
         ORDER BY e.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_exercise(pool: &Pool<Sqlite>, id: i64) -> Result<Exercise, AppError> {
    let row = sqlx::query_as::<_, Exercise>(
        "SELECT e.id, e.name, bp.name AS body_part, e.created_by
         FROM exercises e
         JOIN body_parts bp ON bp.id = e.body_part_id
         WHERE e.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Exercise with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn create_exercise(pool: &Pool<Sqlite>, exercise: &NewExercise) -> Result<i64, AppError> {
    info!("Creating exercise");
    let res = sqlx::query("INSERT INTO exercises (name, body_part_id, created_by) VALUES (?, ?, ?)")
        .bind(&exercise.name)
        .bind(exercise.body_part_id)
        .bind(exercise.created_by)
        .execute(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "Exercise '{}' already exists for this creator",
                exercise.name
            )),
            AppError::NotFound(_) => {
                AppError::NotFound("Body part or creator does not exist".to_string())
            }
            other => other,
        })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    session: &NewSession,
    started_at: DateTime<Utc>,
) -> Result<i64, AppError> {
    info!("Creating workout session");
    let res = sqlx::query(
        "INSERT INTO workout_sessions (user_id, template_id, day_number, start_time)
         VALUES (?, ?, ?, ?)",
    )
    .bind(session.user_id)
    .bind(session.template_id)
    .bind(session.day_number)
    .bind(started_at)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_session(pool: &Pool<Sqlite>, id: i64) -> Result<WorkoutSession, AppError> {
    let row = sqlx::query_as::<_, WorkoutSession>(
        "SELECT id, user_id, template_id, day_number, start_time, end_time
         FROM workout_sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Workout session with id {} not found", id)))
}

/// Returns false when the session does not exist or has already ended.
#[instrument(skip(pool))]
pub async fn finish_session(
    pool: &Pool<Sqlite>,
    id: i64,
    ended_at: DateTime<Utc>,
) -> Result<bool, AppError> {
    info!("Finishing workout session");
    let res = sqlx::query(
        "UPDATE workout_sessions SET end_time = ? WHERE id = ? AND end_time IS NULL",
    )
    .bind(ended_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(res.rows_affected() == 1)
}

#[instrument(skip(conn))]
pub async fn session_owner(conn: &mut SqliteConnection, session_id: i64) -> Result<i64, AppError> {
    let owner: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM workout_sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;

    owner
        .map(|(user_id,)| user_id)
        .ok_or_else(|| AppError::NotFound(format!("Workout session with id {} not found", session_id)))
}

#[instrument(skip(conn))]
pub async fn insert_set_log(
    conn: &mut SqliteConnection,
    set: &NewSetLog,
    created_at: DateTime<Utc>,
) -> Result<SetLog, AppError> {
    info!("Inserting set log");
    let weight = set.weight_kg.map(to_hundredths).transpose()?;

    let row = sqlx::query_as::<_, DbSetLog>(
        "INSERT INTO set_logs
         (session_id, exercise_id, set_number, reps_actual, weight_kg, rpe, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id, session_id, exercise_id, set_number, reps_actual, weight_kg, rpe, status, created_at",
    )
    .bind(set.session_id)
    .bind(set.exercise_id)
    .bind(set.set_number)
    .bind(set.reps_actual)
    .bind(weight)
    .bind(set.rpe)
    .bind(set.status.as_str())
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;

    SetLog::try_from(row)
}

#[instrument(skip(conn))]
pub async fn find_personal_record(
    conn: &mut SqliteConnection,
    user_id: i64,
    exercise_id: i64,
    pr_type: PrType,
) -> Result<Option<StoredRecord>, AppError> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT id, value FROM personal_records
         WHERE user_id = ? AND exercise_id = ? AND pr_type = ?",
    )
    .bind(user_id)
    .bind(exercise_id)
    .bind(pr_type.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(id, value)| StoredRecord {
        id,
        value: from_hundredths(value),
    }))
}

#[instrument(skip(conn))]
pub async fn insert_personal_record(
    conn: &mut SqliteConnection,
    user_id: i64,
    exercise_id: i64,
    pr_type: PrType,
    value: Decimal,
    set_log_id: i64,
    at: DateTime<Utc>,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO personal_records (user_id, exercise_id, pr_type, value, updated_date, set_log_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(exercise_id)
    .bind(pr_type.as_str())
    .bind(to_hundredths(value)?)
    .bind(at)
    .bind(set_log_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Only ever raises the stored value; returns whether a row changed.
#[instrument(skip(conn))]
pub async fn raise_personal_record(
    conn: &mut SqliteConnection,
    record_id: i64,
    value: Decimal,
    set_log_id: i64,
    at: DateTime<Utc>,
) -> Result<bool, AppError> {
    let value = to_hundredths(value)?;
    let res = sqlx::query(
        "UPDATE personal_records
         SET value = ?, updated_date = ?, set_log_id = ?
         WHERE id = ? AND value < ?",
    )
    .bind(value)
    .bind(at)
    .bind(set_log_id)
    .bind(record_id)
    .bind(value)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected() == 1)
}

#[instrument(skip(pool))]
pub async fn list_personal_records(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<PersonalRecord>, AppError> {
    info!("Getting personal records");
    let rows = sqlx::query_as::<_, DbPersonalRecord>(
        "SELECT pr.id, pr.exercise_id, e.name AS exercise_name, pr.pr_type, pr.value,
                pr.updated_date, pr.set_log_id
         FROM personal_records pr
         JOIN exercises e ON e.id = pr.exercise_id
         WHERE pr.user_id = ?
         ORDER BY pr.updated_date DESC, pr.id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    // No error thrown if the user has no records
    rows.into_iter().map(PersonalRecord::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn list_history(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<HistoryEntry>, AppError> {
    info!("Getting session history");
    let rows = sqlx::query_as::<_, HistoryEntry>(
        "SELECT s.id AS session_id, s.start_time, COUNT(sl.id) AS total_sets
         FROM workout_sessions s
         LEFT JOIN set_logs sl ON sl.session_id = s.id
         WHERE s.user_id = ?
         GROUP BY s.id, s.start_time
         ORDER BY s.start_time DESC, s.id DESC
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn template_day_exists(
    pool: &Pool<Sqlite>,
    template_id: i64,
    day_number: i64,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT template_id FROM template_days WHERE template_id = ? AND day_number = ?",
    )
    .bind(template_id)
    .bind(day_number)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

#[instrument(skip(pool), fields(name = %template.name, days = template.days.len()))]
pub async fn create_template(pool: &Pool<Sqlite>, template: &NewTemplate) -> Result<i64, AppError> {
    info!("Creating workout template");
    let mut tx = pool.begin().await?;

    let template_id = sqlx::query(
        "INSERT INTO workout_templates (name, description, created_by) VALUES (?, ?, ?)",
    )
    .bind(&template.name)
    .bind(&template.description)
    .bind(template.created_by)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for day in &template.days {
        sqlx::query("INSERT INTO template_days (template_id, day_number, name) VALUES (?, ?, ?)")
            .bind(template_id)
            .bind(day.day_number)
            .bind(&day.name)
            .execute(&mut *tx)
            .await?;

        for (position, exercise) in day.exercises.iter().enumerate() {
            let suggested_weight = exercise.suggested_weight_kg.map(to_hundredths).transpose()?;

            sqlx::query(
                "INSERT INTO template_exercises
                 (template_id, day_number, exercise_id, order_index, sets, reps, rest_seconds, suggested_weight)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(template_id)
            .bind(day.day_number)
            .bind(exercise.exercise_id)
            .bind(position as i64 + 1)
            .bind(exercise.sets)
            .bind(exercise.reps)
            .bind(exercise.rest_seconds)
            .bind(suggested_weight)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(template_id)
}

#[instrument(skip(pool))]
pub async fn get_template(pool: &Pool<Sqlite>, id: i64) -> Result<Template, AppError> {
    info!("Getting workout template");
    let header: Option<(i64, String, Option<String>, Option<i64>)> = sqlx::query_as(
        "SELECT id, name, description, created_by FROM workout_templates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let (id, name, description, created_by) =
        header.ok_or_else(|| AppError::NotFound(format!("Template with id {} not found", id)))?;

    let day_rows: Vec<(i64, Option<String>)> = sqlx::query_as(
        "SELECT day_number, name FROM template_days WHERE template_id = ? ORDER BY day_number",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let exercise_rows = sqlx::query_as::<_, DbTemplateExercise>(
        "SELECT te.day_number, te.exercise_id, e.name AS exercise_name, te.order_index,
                te.sets, te.reps, te.rest_seconds, te.suggested_weight
         FROM template_exercises te
         JOIN exercises e ON e.id = te.exercise_id
         WHERE te.template_id = ?
         ORDER BY te.day_number, te.order_index",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let days = day_rows
        .into_iter()
        .map(|(day_number, day_name)| TemplateDay {
            day_number,
            name: day_name,
            exercises: exercise_rows
                .iter()
                .filter(|row| row.day_number == day_number)
                .cloned()
                .map(TemplateExercise::from)
                .collect(),
        })
        .collect();

    Ok(Template {
        id,
        name,
        description,
        created_by,
        days,
    })
}

#[instrument(skip(pool))]
pub async fn add_measurement(
    pool: &Pool<Sqlite>,
    measurement: &NewMeasurement,
    measured_at: DateTime<Utc>,
) -> Result<i64, AppError> {
    info!("Adding body measurement");
    let weight = measurement.weight_kg.map(to_hundredths).transpose()?;
    let body_fat = measurement.body_fat_percent.map(to_hundredths).transpose()?;

    let res = sqlx::query(
        "INSERT INTO body_measurements (user_id, measured_at, weight_kg, body_fat_percent)
         VALUES (?, ?, ?, ?)",
    )
    .bind(measurement.user_id)
    .bind(measured_at)
    .bind(weight)
    .bind(body_fat)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_measurements(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<BodyMeasurement>, AppError> {
    info!("Getting body measurements");
    let rows = sqlx::query_as::<_, DbBodyMeasurement>(
        "SELECT id, user_id, measured_at, weight_kg, body_fat_percent
         FROM body_measurements
         WHERE user_id = ?
         ORDER BY measured_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(BodyMeasurement::from).collect())
}
