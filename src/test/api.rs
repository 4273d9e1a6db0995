#[cfg(test)]
mod tests {
    use crate::api::{
        ExerciseResponse, HistoryResponse, MeasurementResponse, PersonalRecordResponse,
        SessionStartedResponse, SetLoggedResponse, TemplateCreatedResponse, UserCreatedResponse,
    };
    use crate::test::test_utils::{create_standard_test_db, setup_test_client};
    use crate::validation::ValidationResponse;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    async fn post_json(client: &Client, uri: &str, body: Value) -> (Status, String) {
        let response = client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;

        let status = response.status();
        (status, response.into_string().await.unwrap_or_default())
    }

    async fn get_body(client: &Client, uri: &str) -> (Status, String) {
        let response = client.get(uri.to_string()).dispatch().await;
        let status = response.status();
        (status, response.into_string().await.unwrap_or_default())
    }

    async fn start(client: &Client, user_id: i64) -> i64 {
        let (status, body) = post_json(client, "/start-session", json!({ "user_id": user_id })).await;
        assert_eq!(status, Status::Ok, "start-session failed: {}", body);

        let started: SessionStartedResponse = serde_json::from_str(&body).unwrap();
        started.session_id
    }

    #[rocket::async_test]
    async fn test_liveness_routes() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let (status, body) = get_body(&client, "/").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body, "後端成功運行");

        let (status, body) = get_body(&client, "/test").await;
        assert_eq!(status, Status::Ok);
        // Non-ASCII text is written as-is, not \u-escaped
        assert!(body.contains("後端活著。 API正常!"));

        let (status, body) = get_body(&client, "/health").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body, "OK");
    }

    #[rocket::async_test]
    async fn test_list_exercises_includes_body_part() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        let (status, body) = get_body(&client, "/exercises").await;
        assert_eq!(status, Status::Ok);

        let exercises: Vec<ExerciseResponse> = serde_json::from_str(&body).unwrap();
        assert!(!exercises.is_empty());
        assert!(exercises.windows(2).all(|pair| pair[0].id < pair[1].id));

        let bench_id = test_db.exercise_id("Bench Press").await;
        let bench = exercises.iter().find(|e| e.id == bench_id).unwrap();
        assert_eq!(bench.name, "Bench Press");
        assert_eq!(bench.body_part, "chest");

        let (status, body) = get_body(&client, "/body-parts").await;
        assert_eq!(status, Status::Ok);
        let parts: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parts.len(), 6);
    }

    #[rocket::async_test]
    async fn test_add_set_flow_reports_records() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let user_id = test_db.user_id("alice");
        let bench_id = test_db.exercise_id("Bench Press").await;

        let session_id = start(&client, user_id).await;

        let (status, body) = post_json(
            &client,
            "/add-set",
            json!({
                "session_id": session_id,
                "exercise_id": bench_id,
                "set_number": 1,
                "weight_kg": 100,
                "reps_actual": 5,
                "rpe": 8.5
            }),
        )
        .await;
        assert_eq!(status, Status::Ok, "add-set failed: {}", body);

        let logged: SetLoggedResponse = serde_json::from_str(&body).unwrap();
        assert!(logged.set_id > 0);
        assert_eq!(logged.new_records, vec!["max_weight", "max_reps", "max_volume"]);

        let (status, body) = get_body(&client, &format!("/pr/{}", user_id)).await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("\"value\":\"500.00\""));

        let records: Vec<PersonalRecordResponse> = serde_json::from_str(&body).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.exercise == "Bench Press"));

        let value_of = |pr_type: &str| {
            records
                .iter()
                .find(|r| r.pr_type == pr_type)
                .map(|r| r.value.to_string())
                .unwrap()
        };
        assert_eq!(value_of("max_weight"), "100.00");
        assert_eq!(value_of("max_reps"), "5.00");
        assert_eq!(value_of("max_volume"), "500.00");
    }

    #[rocket::async_test]
    async fn test_add_set_without_session_is_rejected() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let bench_id = test_db.exercise_id("Bench Press").await;

        let (status, body) = post_json(
            &client,
            "/add-set",
            json!({ "exercise_id": bench_id, "set_number": 1, "reps_actual": 5 }),
        )
        .await;

        assert_eq!(status, Status::BadRequest);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(error.status, "error");
        assert!(error.errors.contains_key("session_id"));
        assert_eq!(test_db.set_log_count().await, 0);
    }

    #[rocket::async_test]
    async fn test_add_set_rejects_bad_input() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let bench_id = test_db.exercise_id("Bench Press").await;
        let session_id = start(&client, test_db.user_id("alice")).await;

        let (status, body) = post_json(
            &client,
            "/add-set",
            json!({
                "session_id": session_id,
                "exercise_id": bench_id,
                "set_number": 1,
                "weight_kg": 100,
                "reps_actual": 5,
                "rpe": 10.5
            }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert!(error.errors.contains_key("rpe"));

        let (status, _) = post_json(
            &client,
            "/add-set",
            json!({
                "session_id": session_id,
                "exercise_id": bench_id,
                "set_number": 1,
                "status": "abandoned"
            }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let response = client
            .post("/add-set")
            .header(ContentType::JSON)
            .body("{\"session_id\": ")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let error: ValidationResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(error.errors.contains_key("body"));

        let (status, _) = post_json(
            &client,
            "/add-set",
            json!({ "session_id": 9999, "exercise_id": bench_id, "set_number": 1 }),
        )
        .await;
        assert_eq!(status, Status::NotFound);

        assert_eq!(test_db.set_log_count().await, 0);
    }

    #[rocket::async_test]
    async fn test_empty_records_for_unknown_user() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let (status, body) = get_body(&client, "/pr/9999").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body, "[]");

        let (status, body) = get_body(&client, "/history/9999").await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body, "[]");
    }

    #[rocket::async_test]
    async fn test_history_is_newest_first_and_limited() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let user_id = test_db.user_id("alice");
        let bench_id = test_db.exercise_id("Bench Press").await;

        let first = start(&client, user_id).await;
        let second = start(&client, user_id).await;
        let third = start(&client, user_id).await;

        for set_number in 1..=2 {
            let (status, _) = post_json(
                &client,
                "/add-set",
                json!({ "session_id": second, "exercise_id": bench_id, "set_number": set_number }),
            )
            .await;
            assert_eq!(status, Status::Ok);
        }

        let (status, body) = get_body(&client, &format!("/history/{}", user_id)).await;
        assert_eq!(status, Status::Ok);
        let history: Vec<HistoryResponse> = serde_json::from_str(&body).unwrap();
        let ids: Vec<i64> = history.iter().map(|h| h.session_id).collect();
        assert_eq!(ids, vec![third, second, first]);
        assert_eq!(history[1].total_sets, 2);

        let (_, body) = get_body(&client, &format!("/history/{}?limit=2", user_id)).await;
        let limited: Vec<HistoryResponse> = serde_json::from_str(&body).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].session_id, third);
    }

    #[rocket::async_test]
    async fn test_start_and_end_session_errors() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        let (status, body) = post_json(&client, "/start-session", json!({ "user_id": 9999 })).await;
        assert_eq!(status, Status::NotFound);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(error.status, "error");

        let (status, body) = post_json(&client, "/start-session", json!({})).await;
        assert_eq!(status, Status::BadRequest);
        assert!(body.contains("user_id"));

        let session_id = start(&client, test_db.user_id("bob")).await;
        let (status, _) =
            post_json(&client, "/end-session", json!({ "session_id": session_id })).await;
        assert_eq!(status, Status::Ok);

        let (status, _) =
            post_json(&client, "/end-session", json!({ "session_id": session_id })).await;
        assert_eq!(status, Status::Conflict);
    }

    #[rocket::async_test]
    async fn test_create_exercise_conflicts_and_unicode() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let user_id = test_db.user_id("alice");

        let (status, body) = post_json(
            &client,
            "/exercises",
            json!({ "name": "臥推", "body_part_id": 1, "created_by": user_id }),
        )
        .await;
        assert_eq!(status, Status::Created, "create failed: {}", body);

        let (status, _) = post_json(
            &client,
            "/exercises",
            json!({ "name": "臥推", "body_part_id": 1, "created_by": user_id }),
        )
        .await;
        assert_eq!(status, Status::Conflict);

        let (status, _) = post_json(
            &client,
            "/exercises",
            json!({ "name": "Bench Press", "body_part_id": 1 }),
        )
        .await;
        assert_eq!(status, Status::Conflict);

        let (status, _) = post_json(
            &client,
            "/exercises",
            json!({ "name": "Hip Thrust", "body_part_id": 99 }),
        )
        .await;
        assert_eq!(status, Status::NotFound);

        let (_, body) = get_body(&client, "/exercises").await;
        assert!(body.contains("臥推"));
    }

    #[rocket::async_test]
    async fn test_register_user() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let (status, body) = post_json(
            &client,
            "/users",
            json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": "longenough",
                "birth_year": 1990
            }),
        )
        .await;
        assert_eq!(status, Status::Created, "register failed: {}", body);
        let created: UserCreatedResponse = serde_json::from_str(&body).unwrap();
        assert!(created.user_id > 0);

        let (status, _) = post_json(
            &client,
            "/users",
            json!({ "username": "carol", "email": "other@example.com", "password": "longenough" }),
        )
        .await;
        assert_eq!(status, Status::Conflict);

        let (status, body) = post_json(
            &client,
            "/users",
            json!({ "username": "x", "email": "not-an-email", "password": "short" }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert!(error.errors.contains_key("username"));
        assert!(error.errors.contains_key("email"));
        assert!(error.errors.contains_key("password"));
    }

    #[rocket::async_test]
    async fn test_templates_over_http() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let squat_id = test_db.exercise_id("Back Squat").await;

        let (status, body) = post_json(
            &client,
            "/templates",
            json!({
                "name": "Leg Day",
                "days": [{
                    "day_number": 1,
                    "exercises": [{ "exercise_id": squat_id, "sets": 0, "reps": 5 }]
                }]
            }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert!(error.errors.contains_key("days[0].exercises[0].sets"));

        let (status, body) = post_json(&client, "/templates", json!({ "name": "Empty" })).await;
        assert_eq!(status, Status::BadRequest);
        assert!(body.contains("days"));

        let (status, body) = post_json(
            &client,
            "/templates",
            json!({
                "name": "Leg Day",
                "days": [{
                    "day_number": 1,
                    "name": "Squat",
                    "exercises": [{
                        "exercise_id": squat_id,
                        "sets": 5,
                        "reps": 5,
                        "suggested_weight_kg": "80"
                    }]
                }]
            }),
        )
        .await;
        assert_eq!(status, Status::Created, "template failed: {}", body);
        let created: TemplateCreatedResponse = serde_json::from_str(&body).unwrap();

        let (status, body) =
            get_body(&client, &format!("/templates/{}", created.template_id)).await;
        assert_eq!(status, Status::Ok);
        let template: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(template["days"][0]["exercises"][0]["exercise_name"], "Back Squat");
        assert_eq!(template["days"][0]["exercises"][0]["suggested_weight_kg"], "80.00");

        let (status, _) = post_json(
            &client,
            "/start-session",
            json!({
                "user_id": test_db.user_id("alice"),
                "template_id": created.template_id,
                "day_number": 1
            }),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let (status, _) = get_body(&client, "/templates/9999").await;
        assert_eq!(status, Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_measurements_over_http() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let user_id = test_db.user_id("alice");

        let (status, _) = post_json(&client, "/measurements", json!({ "user_id": user_id })).await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_json(
            &client,
            "/measurements",
            json!({ "user_id": user_id, "body_fat_percent": 120 }),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = post_json(
            &client,
            "/measurements",
            json!({ "user_id": 9999, "weight_kg": 70 }),
        )
        .await;
        assert_eq!(status, Status::NotFound);

        let (status, body) = post_json(
            &client,
            "/measurements",
            json!({ "user_id": user_id, "weight_kg": 72.456, "body_fat_percent": 18.5 }),
        )
        .await;
        assert_eq!(status, Status::Created, "measurement failed: {}", body);

        let (status, body) = get_body(&client, &format!("/measurements/{}", user_id)).await;
        assert_eq!(status, Status::Ok);
        let measurements: Vec<MeasurementResponse> = serde_json::from_str(&body).unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(
            measurements[0].weight_kg.map(|w| w.to_string()),
            Some("72.46".to_string())
        );
        assert_eq!(
            measurements[0].body_fat_percent.map(|f| f.to_string()),
            Some("18.50".to_string())
        );
    }

    #[rocket::async_test]
    async fn test_unknown_route_returns_json_error() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let (status, body) = get_body(&client, "/does-not-exist").await;
        assert_eq!(status, Status::NotFound);
        let error: ValidationResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(error.status, "error");
    }
}
