use crate::error::AppError;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{instrument, warn};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

pub type ApiError = Custom<Json<ValidationResponse>>;
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> ApiError;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        self.log_and_record("API request");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database unavailable".to_string()),
            AppError::NotFound(msg) => ("resource", msg.clone()),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::Conflict(msg) => ("resource", msg.clone()),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        let (field, message) = match self.code {
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            400 => ("request", "Bad request"),
            422 => ("request", "Request could not be processed"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        err.to_validation_response()
    }
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub ValidationErrors);

impl From<ValidationErrorWrapper> for ApiError {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let mut error_map = HashMap::new();
        collect_errors(&wrapper.0, "", &mut error_map);

        warn!(fields = ?error_map.keys().collect::<Vec<_>>(), "Request validation failed");

        Custom(Status::BadRequest, Json(ValidationResponse::new(error_map)))
    }
}

/// Flattens nested validator errors into `days[0].exercises[1].sets` style keys.
fn collect_errors(
    errors: &ValidationErrors,
    prefix: &str,
    out: &mut HashMap<String, Vec<String>>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = field_errors.iter().map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                });
                out.entry(path).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(inner, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

/// Turns a JSON data guard result into a validated payload, answering 400 for
/// both malformed bodies and failed field rules.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<'r, T: Validate> JsonValidateExt<T> for Result<Json<T>, json::Error<'r>> {
    fn validate_custom(self) -> ApiResult<T> {
        let payload = match self {
            Ok(payload) => payload.into_inner(),
            Err(json::Error::Parse(_, err)) => {
                warn!(error = %err, "Malformed JSON body");
                return Err(Custom(
                    Status::BadRequest,
                    Json(ValidationResponse::with_error("body", &err.to_string())),
                ));
            }
            Err(json::Error::Io(err)) => {
                warn!(error = %err, "Failed to read request body");
                return Err(Custom(
                    Status::BadRequest,
                    Json(ValidationResponse::with_error(
                        "body",
                        "Request body could not be read",
                    )),
                ));
            }
        };

        payload
            .validate()
            .map_err(|errors| ApiError::from(ValidationErrorWrapper(errors)))?;

        Ok(payload)
    }
}
