#[cfg(test)]
pub mod test_utils {
    use crate::config::AppConfig;
    use crate::db::{connect, create_exercise, create_user, list_personal_records, run_migrations};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{NewExercise, NewSession, NewUser, PersonalRecord, PrType};
    use crate::sessions::start_session;
    use rocket::local::asynchronous::Client;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tempfile::TempDir;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<String>,
        exercises: Vec<TestExercise>,
    }

    pub struct TestExercise {
        pub name: String,
        pub body_part: String,
        pub creator: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(username.to_string());
            self
        }

        pub fn exercise(mut self, name: &str, body_part: &str, creator: Option<&str>) -> Self {
            self.exercises.push(TestExercise {
                name: name.to_string(),
                body_part: body_part.to_string(),
                creator: creator.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            // File backed so every pooled connection sees the same database
            let dir = TempDir::new().map_err(|e| AppError::Internal(e.to_string()))?;
            let config = AppConfig {
                database_url: format!("sqlite://{}", dir.path().join("test.db").display()),
                ..AppConfig::default()
            };

            let pool = connect(&config).await?;
            run_migrations(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut exercise_id_map: HashMap<String, i64> = HashMap::new();

            for username in &self.users {
                let user = NewUser {
                    username: username.clone(),
                    email: format!("{}@example.com", username),
                    password: STANDARD_PASSWORD.to_string(),
                    gender: None,
                    birth_year: None,
                };

                let user_id = create_user(&pool, &user).await?;
                user_id_map.insert(username.clone(), user_id);
            }

            for exercise in &self.exercises {
                let (body_part_id,): (i64,) =
                    sqlx::query_as("SELECT id FROM body_parts WHERE name = ?")
                        .bind(&exercise.body_part)
                        .fetch_one(&pool)
                        .await?;

                let created_by = exercise
                    .creator
                    .as_ref()
                    .and_then(|name| user_id_map.get(name).copied());

                let exercise_id = create_exercise(
                    &pool,
                    &NewExercise {
                        name: exercise.name.clone(),
                        body_part_id,
                        created_by,
                    },
                )
                .await?;

                exercise_id_map.insert(exercise.name.clone(), exercise_id);
            }

            Ok(TestDb {
                pool,
                config,
                user_id_map,
                exercise_id_map,
                _dir: dir,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub config: AppConfig,
        pub user_id_map: HashMap<String, i64>,
        pub exercise_id_map: HashMap<String, i64>,
        _dir: TempDir,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        /// Looks up builder exercises first, then the system catalog.
        pub async fn exercise_id(&self, name: &str) -> i64 {
            if let Some(id) = self.exercise_id_map.get(name) {
                return *id;
            }

            let (id,): (i64,) =
                sqlx::query_as("SELECT id FROM exercises WHERE name = ? AND created_by IS NULL")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await
                    .expect("Exercise not seeded");
            id
        }

        pub async fn start_session(&self, username: &str) -> i64 {
            start_session(
                &self.pool,
                NewSession {
                    user_id: self.user_id(username),
                    ..NewSession::default()
                },
            )
            .await
            .expect("Failed to start session")
        }

        pub async fn set_log_count(&self) -> i64 {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM set_logs")
                .fetch_one(&self.pool)
                .await
                .expect("Failed to count set logs");
            count
        }

        pub async fn records(&self, username: &str) -> Vec<PersonalRecord> {
            list_personal_records(&self.pool, self.user_id(username))
                .await
                .expect("Failed to list personal records")
        }

        pub async fn record(
            &self,
            username: &str,
            exercise_name: &str,
            pr_type: PrType,
        ) -> Option<PersonalRecord> {
            self.records(username)
                .await
                .into_iter()
                .find(|r| r.exercise_name == exercise_name && r.pr_type == pr_type)
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), test_db.config.clone());
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }
}
