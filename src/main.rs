#[macro_use]
extern crate rocket;

mod api;
mod config;
mod db;
mod env;
mod error;
mod fixed;
mod models;
mod records;
mod sessions;
mod sets;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use api::{
    api_add_measurement, api_add_set, api_create_exercise, api_create_template, api_end_session,
    api_get_template, api_history, api_list_body_parts, api_list_exercises,
    api_list_measurements, api_personal_records, api_register_user, api_start_session, api_test,
    bad_request, health, index, internal_error, not_found, unprocessable,
};
use config::AppConfig;
use env::load_environment;
use rocket::{Build, Rocket};
use sqlx::{Pool, Sqlite};
use telemetry::{TelemetryFairing, init_tracing};
use tracing::info;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let loaded_env_files = load_environment()?;
    let _otel_guard = init_tracing();

    for env_file in &loaded_env_files {
        info!("Loaded environment file: {}", env_file);
    }

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;
    db::run_migrations(&pool).await?;
    info!("Migrations completed successfully");

    init_rocket(pool, config)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed to launch: {}", e))?;

    Ok(())
}

pub fn init_rocket(pool: Pool<Sqlite>, config: AppConfig) -> Rocket<Build> {
    info!("Starting flexifit");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/",
            routes![
                index,
                api_test,
                health,
                api_list_exercises,
                api_create_exercise,
                api_list_body_parts,
                api_register_user,
                api_start_session,
                api_end_session,
                api_add_set,
                api_personal_records,
                api_history,
                api_create_template,
                api_get_template,
                api_add_measurement,
                api_list_measurements,
            ],
        )
        .register(
            "/",
            catchers![bad_request, not_found, unprocessable, internal_error],
        )
        .attach(TelemetryFairing)
}
