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

#[actix_web::test]
async fn notice_board_is_append_and_delete() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    // Posting requires a token.
    let req = test::TestRequest::post()
        .uri("/api/announcements")
        .set_json(json!({ "title": "Sports day", "content": "Friday 10:00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/announcements")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "title": "Sports day", "content": "Friday 10:00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["id"].as_i64().expect("announcement id");

    let req = test::TestRequest::post()
        .uri("/api/announcements")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "title": "  ", "content": "empty title" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Reading is public and the audience defaults to All.
    let req = test::TestRequest::get().uri("/api/announcements").to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["title"].as_str(), Some("Sports day"));
    assert_eq!(list[0]["audience"].as_str(), Some("All"));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/announcements/{id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/announcements/{id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn teacher_roster_and_assignment_edit() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "name": "Mrs. Chanda",
            "email": "chanda@school.com",
            "password": "redpen",
            "phone": "0966-111222",
            "class_id": 2,
            "subject_id": 3,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let teacher_id = body["id"].as_i64().expect("teacher id");

    // Missing password is the one hard requirement.
    let req = test::TestRequest::post()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "name": "Mr. Nobody", "email": "nobody@school.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let roster: Value = test::read_body_json(resp).await;
    assert_eq!(roster.as_array().map(Vec::len), Some(1));
    assert_eq!(roster[0]["class_name"].as_str(), Some("Grade 2"));
    assert_eq!(roster[0]["subject_name"].as_str(), Some("Science"));

    // Re-assignment replaces, not accumulates.
    let req = test::TestRequest::put()
        .uri(&format!("/api/teachers/{teacher_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "name": "Mrs. Chanda",
            "email": "chanda@school.com",
            "phone": "0966-111222",
            "class_id": 5,
            "subject_id": 1,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let roster: Value = test::read_body_json(resp).await;
    assert_eq!(roster.as_array().map(Vec::len), Some(1));
    assert_eq!(roster[0]["class_name"].as_str(), Some("Grade 5"));
    assert_eq!(roster[0]["subject_name"].as_str(), Some("Mathematics"));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/teachers/{teacher_id}"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let roster: Value = test::read_body_json(resp).await;
    assert_eq!(roster.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn teacher_stats_count_pupils_in_assigned_classes() {
    let state = test_state();
    let token = admin_token(&state);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/teachers")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "name": "Mr. Zimba",
            "email": "zimba@school.com",
            "password": "duster",
            "class_id": 1,
            "subject_id": 1,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let user_id = body["user_id"].as_i64().expect("teacher user id");
    let teacher =
        auth::issue_token(&state.jwt_secret, user_id, "zimba@school.com", "teacher")
            .expect("teacher token");

    // Two pupils in the assigned class, one elsewhere.
    for (name, class_id) in [("A One", 1), ("B Two", 1), ("C Three", 2)] {
        let req = test::TestRequest::post()
            .uri("/api/students")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({ "name": name, "class_id": class_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/teacher/stats")
        .insert_header(("Authorization", format!("Bearer {teacher}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats: Value = test::read_body_json(resp).await;
    assert_eq!(stats["students"].as_i64(), Some(2));

    let req = test::TestRequest::get()
        .uri("/api/teacher/pupils")
        .insert_header(("Authorization", format!("Bearer {teacher}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let pupils: Value = test::read_body_json(resp).await;
    assert_eq!(pupils.as_array().map(Vec::len), Some(2));
    assert_eq!(pupils[0]["class_name"].as_str(), Some("Grade 1"));
}
