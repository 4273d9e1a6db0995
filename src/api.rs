use once_cell::sync::Lazy;
use regex::Regex;
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::{
    add_measurement, create_exercise, create_template, create_user, get_template, get_user,
    list_body_parts, list_exercises, list_history, list_measurements, list_personal_records,
};
use crate::error::AppError;
use crate::models::{
    BodyMeasurement, BodyPart, Exercise, HistoryEntry, NewExercise, NewMeasurement, NewSession,
    NewSetLog, NewTemplate, NewTemplateDay, NewTemplateExercise, NewUser, PersonalRecord,
    SetStatus, Template,
};
use crate::sessions::{end_session, start_session};
use crate::sets::log_set;
use crate::validation::{ApiError, ApiResult, JsonValidateExt, ToValidationResponse};

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").expect("username pattern compiles"));

type JsonBody<'r, T> = Result<Json<T>, json::Error<'r>>;

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

fn non_negative(value: Option<Decimal>, field: &str) -> Result<Option<Decimal>, AppError> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(AppError::Validation(format!(
            "{} cannot be negative",
            field
        ))),
        other => Ok(other),
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ExerciseResponse {
    pub id: i64,
    pub name: String,
    pub body_part: String,
}

impl From<Exercise> for ExerciseResponse {
    fn from(exercise: Exercise) -> Self {
        Self {
            id: exercise.id,
            name: exercise.name,
            body_part: exercise.body_part,
        }
    }
}

#[get("/exercises")]
pub async fn api_list_exercises(db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<ExerciseResponse>>> {
    let exercises = list_exercises(db).await?;

    Ok(Json(exercises.into_iter().map(ExerciseResponse::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(
        required(message = "name is required"),
        length(min = 1, max = 100, message = "name must be 1 to 100 characters")
    )]
    name: Option<String>,
    #[validate(required(message = "body_part_id is required"))]
    body_part_id: Option<i64>,
    created_by: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ExerciseCreatedResponse {
    pub exercise_id: i64,
    pub message: String,
}

#[post("/exercises", data = "<request>")]
pub async fn api_create_exercise(
    request: JsonBody<'_, CreateExerciseRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<ExerciseCreatedResponse>>> {
    let validated = request.validate_custom()?;

    let exercise = NewExercise {
        name: required(validated.name, "name")?.trim().to_string(),
        body_part_id: required(validated.body_part_id, "body_part_id")?,
        created_by: validated.created_by,
    };

    let exercise_id = create_exercise(db, &exercise).await?;

    Ok(Custom(
        Status::Created,
        Json(ExerciseCreatedResponse {
            exercise_id,
            message: format!("Exercise '{}' created", exercise.name),
        }),
    ))
}

#[get("/body-parts")]
pub async fn api_list_body_parts(db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<BodyPart>>> {
    Ok(Json(list_body_parts(db).await?))
}

#[derive(Deserialize, Validate)]
pub struct UserRegistrationRequest {
    #[validate(
        required(message = "username is required"),
        regex(
            path = *USERNAME_REGEX,
            message = "username must be 3 to 50 letters, digits, '.', '_' or '-'"
        )
    )]
    username: Option<String>,
    #[validate(
        required(message = "email is required"),
        email(message = "email must be a valid address")
    )]
    email: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 8, message = "password must be at least 8 characters")
    )]
    password: Option<String>,
    #[validate(length(max = 10, message = "gender must be at most 10 characters"))]
    gender: Option<String>,
    #[validate(range(min = 1900, max = 2100, message = "birth_year must be between 1900 and 2100"))]
    birth_year: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserCreatedResponse {
    pub user_id: i64,
    pub message: String,
}

#[post("/users", data = "<registration>")]
pub async fn api_register_user(
    registration: JsonBody<'_, UserRegistrationRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<UserCreatedResponse>>> {
    let validated = registration.validate_custom()?;

    let user = NewUser {
        username: required(validated.username, "username")?,
        email: required(validated.email, "email")?,
        password: required(validated.password, "password")?,
        gender: validated.gender,
        birth_year: validated.birth_year,
    };

    let user_id = create_user(db, &user).await?;

    Ok(Custom(
        Status::Created,
        Json(UserCreatedResponse {
            user_id,
            message: format!("User '{}' registered", user.username),
        }),
    ))
}

#[derive(Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(required(message = "user_id is required"))]
    user_id: Option<i64>,
    template_id: Option<i64>,
    #[validate(range(min = 1, message = "day_number must be at least 1"))]
    day_number: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionStartedResponse {
    pub session_id: i64,
    pub message: String,
}

#[post("/start-session", data = "<request>")]
pub async fn api_start_session(
    request: JsonBody<'_, StartSessionRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<SessionStartedResponse>> {
    let validated = request.validate_custom()?;

    let session = NewSession {
        user_id: required(validated.user_id, "user_id")?,
        template_id: validated.template_id,
        day_number: validated.day_number,
    };

    let session_id = start_session(db, session).await?;

    Ok(Json(SessionStartedResponse {
        session_id,
        message: "Workout session started".to_string(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct EndSessionRequest {
    #[validate(required(message = "session_id is required"))]
    session_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionEndedResponse {
    pub session_id: i64,
    pub end_time: String,
    pub message: String,
}

#[post("/end-session", data = "<request>")]
pub async fn api_end_session(
    request: JsonBody<'_, EndSessionRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<SessionEndedResponse>> {
    let session_id = required(request.validate_custom()?.session_id, "session_id")?;

    let ended_at = end_session(db, session_id).await?;

    Ok(Json(SessionEndedResponse {
        session_id,
        end_time: ended_at.to_rfc3339(),
        message: "Workout session ended".to_string(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct AddSetRequest {
    #[validate(required(message = "session_id is required"))]
    session_id: Option<i64>,
    #[validate(required(message = "exercise_id is required"))]
    exercise_id: Option<i64>,
    #[validate(
        required(message = "set_number is required"),
        range(min = 1, message = "set_number must be at least 1")
    )]
    set_number: Option<i64>,
    weight_kg: Option<Decimal>,
    #[validate(range(min = 0, message = "reps_actual cannot be negative"))]
    reps_actual: Option<i64>,
    #[validate(range(min = 1.0, max = 10.0, message = "rpe must be between 1 and 10"))]
    rpe: Option<f64>,
    status: Option<String>,
}

impl AddSetRequest {
    fn into_new_set(self) -> Result<NewSetLog, AppError> {
        let status = match self.status.as_deref() {
            Some(status) => SetStatus::from_str(status)?,
            None => SetStatus::default(),
        };

        Ok(NewSetLog {
            session_id: required(self.session_id, "session_id")?,
            exercise_id: required(self.exercise_id, "exercise_id")?,
            set_number: required(self.set_number, "set_number")?,
            weight_kg: non_negative(self.weight_kg, "weight_kg")?,
            reps_actual: self.reps_actual,
            rpe: self.rpe,
            status,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SetLoggedResponse {
    pub message: String,
    pub set_id: i64,
    pub new_records: Vec<String>,
}

#[post("/add-set", data = "<request>")]
pub async fn api_add_set(
    request: JsonBody<'_, AddSetRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<SetLoggedResponse>> {
    let new_set = request.validate_custom()?.into_new_set()?;

    let logged = log_set(db, new_set).await?;

    Ok(Json(SetLoggedResponse {
        message: "Set logged".to_string(),
        set_id: logged.set_log.id,
        new_records: logged
            .records
            .new_records()
            .map(|pr_type| pr_type.to_string())
            .collect(),
    }))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PersonalRecordResponse {
    pub exercise: String,
    #[serde(rename = "type")]
    pub pr_type: String,
    pub value: Decimal,
    pub date: String,
}

impl From<PersonalRecord> for PersonalRecordResponse {
    fn from(record: PersonalRecord) -> Self {
        Self {
            exercise: record.exercise_name,
            pr_type: record.pr_type.to_string(),
            value: record.value,
            date: record.updated_date.to_rfc3339(),
        }
    }
}

#[get("/pr/<user_id>")]
pub async fn api_personal_records(
    user_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<PersonalRecordResponse>>> {
    let records = list_personal_records(db, user_id).await?;

    Ok(Json(
        records
            .into_iter()
            .map(PersonalRecordResponse::from)
            .collect(),
    ))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub session_id: i64,
    pub date: String,
    pub total_sets: i64,
}

impl From<HistoryEntry> for HistoryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            session_id: entry.session_id,
            date: entry.start_time.to_rfc3339(),
            total_sets: entry.total_sets,
        }
    }
}

#[get("/history/<user_id>?<limit>")]
pub async fn api_history(
    user_id: i64,
    limit: Option<i64>,
    config: &State<AppConfig>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<HistoryResponse>>> {
    let entries = list_history(db, user_id, config.history_limit_for(limit)).await?;

    Ok(Json(entries.into_iter().map(HistoryResponse::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(
        required(message = "name is required"),
        length(min = 1, max = 100, message = "name must be 1 to 100 characters")
    )]
    name: Option<String>,
    description: Option<String>,
    created_by: Option<i64>,
    #[serde(default)]
    #[validate(length(min = 1, message = "a template needs at least one day"), nested)]
    days: Vec<TemplateDayRequest>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct TemplateDayRequest {
    #[validate(range(min = 1, message = "day_number must be at least 1"))]
    day_number: i64,
    name: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    exercises: Vec<TemplateExerciseRequest>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct TemplateExerciseRequest {
    exercise_id: i64,
    #[validate(range(min = 1, message = "sets must be at least 1"))]
    sets: i64,
    #[validate(range(min = 1, message = "reps must be at least 1"))]
    reps: i64,
    #[validate(range(min = 0, message = "rest_seconds cannot be negative"))]
    rest_seconds: Option<i64>,
    suggested_weight_kg: Option<Decimal>,
}

impl CreateTemplateRequest {
    fn into_new_template(self) -> Result<NewTemplate, AppError> {
        let days = self
            .days
            .into_iter()
            .map(|day| {
                let exercises = day
                    .exercises
                    .into_iter()
                    .map(|exercise| {
                        Ok(NewTemplateExercise {
                            exercise_id: exercise.exercise_id,
                            sets: exercise.sets,
                            reps: exercise.reps,
                            rest_seconds: exercise.rest_seconds,
                            suggested_weight_kg: non_negative(
                                exercise.suggested_weight_kg,
                                "suggested_weight_kg",
                            )?,
                        })
                    })
                    .collect::<Result<Vec<_>, AppError>>()?;

                Ok(NewTemplateDay {
                    day_number: day.day_number,
                    name: day.name,
                    exercises,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(NewTemplate {
            name: required(self.name, "name")?,
            description: self.description,
            created_by: self.created_by,
            days,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TemplateCreatedResponse {
    pub template_id: i64,
    pub message: String,
}

#[post("/templates", data = "<request>")]
pub async fn api_create_template(
    request: JsonBody<'_, CreateTemplateRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<TemplateCreatedResponse>>> {
    let template = request.validate_custom()?.into_new_template()?;

    let template_id = create_template(db, &template).await?;

    Ok(Custom(
        Status::Created,
        Json(TemplateCreatedResponse {
            template_id,
            message: format!("Template '{}' created", template.name),
        }),
    ))
}

#[get("/templates/<id>")]
pub async fn api_get_template(id: i64, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Template>> {
    Ok(Json(get_template(db, id).await?))
}

#[derive(Deserialize, Validate)]
pub struct MeasurementRequest {
    #[validate(required(message = "user_id is required"))]
    user_id: Option<i64>,
    weight_kg: Option<Decimal>,
    body_fat_percent: Option<Decimal>,
}

impl MeasurementRequest {
    fn into_new_measurement(self) -> Result<NewMeasurement, AppError> {
        if self.weight_kg.is_none() && self.body_fat_percent.is_none() {
            return Err(AppError::Validation(
                "weight_kg or body_fat_percent is required".to_string(),
            ));
        }

        let body_fat_percent = non_negative(self.body_fat_percent, "body_fat_percent")?;
        if matches!(body_fat_percent, Some(fat) if fat > Decimal::ONE_HUNDRED) {
            return Err(AppError::Validation(
                "body_fat_percent cannot exceed 100".to_string(),
            ));
        }

        Ok(NewMeasurement {
            user_id: required(self.user_id, "user_id")?,
            weight_kg: non_negative(self.weight_kg, "weight_kg")?,
            body_fat_percent,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MeasurementCreatedResponse {
    pub measurement_id: i64,
    pub message: String,
}

#[post("/measurements", data = "<request>")]
pub async fn api_add_measurement(
    request: JsonBody<'_, MeasurementRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<MeasurementCreatedResponse>>> {
    let measurement = request.validate_custom()?.into_new_measurement()?;

    get_user(db, measurement.user_id).await?;
    let measurement_id = add_measurement(db, &measurement, chrono::Utc::now()).await?;

    Ok(Custom(
        Status::Created,
        Json(MeasurementCreatedResponse {
            measurement_id,
            message: "Measurement recorded".to_string(),
        }),
    ))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MeasurementResponse {
    pub id: i64,
    pub date: String,
    pub weight_kg: Option<Decimal>,
    pub body_fat_percent: Option<Decimal>,
}

impl From<BodyMeasurement> for MeasurementResponse {
    fn from(measurement: BodyMeasurement) -> Self {
        Self {
            id: measurement.id,
            date: measurement.measured_at.to_rfc3339(),
            weight_kg: measurement.weight_kg,
            body_fat_percent: measurement.body_fat_percent,
        }
    }
}

#[get("/measurements/<user_id>")]
pub async fn api_list_measurements(
    user_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<MeasurementResponse>>> {
    let measurements = list_measurements(db, user_id).await?;

    Ok(Json(
        measurements
            .into_iter()
            .map(MeasurementResponse::from)
            .collect(),
    ))
}

#[get("/")]
pub fn index() -> &'static str {
    "後端成功運行"
}

#[get("/test")]
pub fn api_test() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "後端活著。 API正常!".to_string(),
    })
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(400)]
pub fn bad_request() -> ApiError {
    Status::BadRequest.to_validation_response()
}

#[catch(404)]
pub fn not_found() -> ApiError {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable() -> ApiError {
    Status::UnprocessableEntity.to_validation_response()
}

#[catch(500)]
pub fn internal_error() -> ApiError {
    Status::InternalServerError.to_validation_response()
}
