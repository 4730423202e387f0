use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use schoold::{api, auth, db};
use serde_json::{json, Value};

fn test_state() -> web::Data<api::AppState> {
    let conn = db::open_in_memory().expect("open in-memory db");
    web::Data::new(api::AppState::new(conn, "test-secret"))
}

fn admin_token(state: &api::AppState) -> String {
    auth::issue_token(&state.jwt_secret, 1, "admin", "admin").expect("admin token")
}

async fn enroll_student(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    token: &str,
    name: &str,
) -> i64 {
    let req = test::TestRequest::post()
        .uri("/api/students")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "name": name, "age": 10, "gender": "Female", "class_id": 1 }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    body["id"].as_i64().expect("student id")
}

async fn summary_for(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    token: &str,
    student_id: i64,
) -> Value {
    let req = test::TestRequest::get()
        .uri("/api/payments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rows: Value = test::read_body_json(resp).await;
    rows.as_array()
        .and_then(|r| {
            r.iter()
                .find(|row| row["id"].as_i64() == Some(student_id))
                .cloned()
        })
        .expect("student in summary")
}

#[actix_web::test]
async fn balance_is_derived_from_the_ledger() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    let student_id = enroll_student(&app, &token, "Ruth Kabwe").await;

    // Nothing paid yet: full term fee outstanding.
    let row = summary_for(&app, &token, student_id).await;
    assert_eq!(row["total_fees"].as_f64(), Some(3000.0));
    assert_eq!(row["paid"].as_f64(), Some(0.0));
    assert_eq!(row["balance"].as_f64(), Some(3000.0));
    assert_eq!(row["status"].as_str(), Some("Unpaid"));

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "student_id": student_id,
            "amount": 1000.0,
            "date": "2026-03-10",
            "term": "Term 1",
            "year": 2026,
            "method": "Mobile Money",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let row = summary_for(&app, &token, student_id).await;
    assert_eq!(row["paid"].as_f64(), Some(1000.0));
    assert_eq!(row["balance"].as_f64(), Some(2000.0));
    assert_eq!(row["status"].as_str(), Some("Partial"));

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "student_id": student_id,
            "amount": 2000.0,
            "date": "2026-04-02",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let second_payment_id = body["id"].as_i64().expect("payment id");

    let row = summary_for(&app, &token, student_id).await;
    assert_eq!(row["balance"].as_f64(), Some(0.0));
    assert_eq!(row["status"].as_str(), Some("Paid"));

    // History comes back newest first, stamped with the recording user.
    let req = test::TestRequest::get()
        .uri(&format!("/api/payments/{student_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let history: Value = test::read_body_json(resp).await;
    assert_eq!(history.as_array().map(Vec::len), Some(2));
    assert_eq!(history[0]["date"].as_str(), Some("2026-04-02"));
    assert_eq!(history[0]["method"].as_str(), Some("Cash"));
    assert_eq!(history[1]["method"].as_str(), Some("Mobile Money"));
    assert_eq!(history[0]["received_by"].as_str(), Some("admin"));

    // Deleting a transaction recomputes the balance on the next read.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/payments/{second_payment_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let row = summary_for(&app, &token, student_id).await;
    assert_eq!(row["balance"].as_f64(), Some(2000.0));
    assert_eq!(row["status"].as_str(), Some("Partial"));
}

#[actix_web::test]
async fn monthly_stats_bucket_by_english_month_name() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    let student_id = enroll_student(&app, &token, "Agnes Musonda").await;

    for (amount, date) in [(500.0, "2026-03-05"), (250.0, "2026-03-28"), (100.0, "2026-04-01")] {
        let req = test::TestRequest::post()
            .uri("/api/payments")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({ "student_id": student_id, "amount": amount, "date": date }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/payments/stats/monthly?month=March&year=2026")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"].as_f64(), Some(750.0));

    // Unknown month names fall back to zero rather than erroring.
    let req = test::TestRequest::get()
        .uri("/api/payments/stats/monthly?month=Marzo&year=2026")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"].as_f64(), Some(0.0));
}

#[actix_web::test]
async fn edits_and_validation() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;
    let student_id = enroll_student(&app, &token, "Moses Banda").await;

    // Zero and negative amounts never hit the ledger.
    for amount in [0.0, -50.0] {
        let req = test::TestRequest::post()
            .uri("/api/payments")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({ "student_id": student_id, "amount": amount, "date": "2026-01-01" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "student_id": 9999, "amount": 100.0, "date": "2026-01-01" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "student_id": student_id, "amount": 400.0, "date": "2026-02-10" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let payment_id = body["id"].as_i64().expect("payment id");

    let req = test::TestRequest::put()
        .uri(&format!("/api/payments/{payment_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "amount": 450.0, "date": "2026-02-11", "method": "Bank" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let row = summary_for(&app, &token, student_id).await;
    assert_eq!(row["paid"].as_f64(), Some(450.0));

    let req = test::TestRequest::put()
        .uri("/api/payments/9999")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "amount": 1.0, "date": "2026-01-01" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri("/api/payments/9999")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
