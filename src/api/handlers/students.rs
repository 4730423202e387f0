use crate::api::error::ApiError;
use crate::api::helpers;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{Datelike, Utc};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct StudentInput {
    name: String,
    age: Option<i64>,
    gender: Option<String>,
    class_id: Option<i64>,
    status: Option<String>,
    password: Option<String>,
}

#[get("/api/students")]
async fn list_students(
    state: web::Data<AppState>,
    _user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT s.id, u.name, s.age, s.gender, s.class_id, c.name AS class_name,
                s.roll_number, s.status
         FROM students s
         JOIN users u ON u.id = s.user_id
         LEFT JOIN classes c ON c.id = s.class_id
         ORDER BY s.id",
    )?;
    let rows = stmt
        .query_map([], student_row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/students/{id}")]
async fn get_student(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    let row = conn
        .query_row(
            "SELECT s.id, u.name, s.age, s.gender, s.class_id, c.name AS class_name,
                    s.roll_number, s.status
             FROM students s
             JOIN users u ON u.id = s.user_id
             LEFT JOIN classes c ON c.id = s.class_id
             WHERE s.id = ?",
            [id],
            student_row_json,
        )
        .optional()?;

    match row {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => Err(ApiError::not_found("student not found")),
    }
}

#[post("/api/students")]
async fn create_student(
    state: web::Data<AppState>,
    _user: AuthUser,
    body: web::Json<StudentInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_params("name must not be empty"));
    }

    let mut conn = state.conn()?;
    let tx = conn
        .transaction()
        .map_err(|e| ApiError::db("db_tx_failed", e))?;

    let created = helpers::insert_student_with_user(
        &tx,
        &name,
        input.age,
        input.gender.as_deref(),
        input.class_id,
        input.status.as_deref().unwrap_or("Enrolled"),
        input.password.as_deref().unwrap_or("password"),
        Utc::now().year(),
    )?;

    tx.commit().map_err(|e| ApiError::db("db_tx_failed", e))?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Student added successfully",
        "id": created.student_id,
        "user_id": created.user_id,
        "roll_number": created.roll_number,
        "email": created.email,
    })))
}

#[put("/api/students/{id}")]
async fn update_student(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<StudentInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let input = body.into_inner();

    let mut conn = state.conn()?;
    let tx = conn
        .transaction()
        .map_err(|e| ApiError::db("db_tx_failed", e))?;

    let user_id: Option<i64> = tx
        .query_row("SELECT user_id FROM students WHERE id = ?", [id], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(user_id) = user_id else {
        return Err(ApiError::not_found("student not found"));
    };

    tx.execute(
        "UPDATE users SET name = ? WHERE id = ?",
        (input.name.trim(), user_id),
    )?;
    tx.execute(
        "UPDATE students SET age = ?, gender = ?, class_id = ?, status = ? WHERE id = ?",
        (
            input.age,
            input.gender.as_deref(),
            input.class_id,
            input.status.as_deref().unwrap_or("Enrolled"),
            id,
        ),
    )?;

    tx.commit().map_err(|e| ApiError::db("db_tx_failed", e))?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Student updated successfully" })))
}

/// Removes the profile together with everything hanging off it: results,
/// payments, and the owning user row.
#[delete("/api/students/{id}")]
async fn delete_student(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let mut conn = state.conn()?;
    let tx = conn
        .transaction()
        .map_err(|e| ApiError::db("db_tx_failed", e))?;

    let user_id: Option<i64> = tx
        .query_row("SELECT user_id FROM students WHERE id = ?", [id], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(user_id) = user_id else {
        return Err(ApiError::not_found("student not found"));
    };

    // Delete in dependency order; no ON DELETE CASCADE in the schema.
    tx.execute("DELETE FROM results WHERE student_id = ?", [id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;
    tx.execute("DELETE FROM payments WHERE student_id = ?", [id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;
    tx.execute("DELETE FROM students WHERE id = ?", [id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;

    tx.commit().map_err(|e| ApiError::db("db_tx_failed", e))?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Student deleted successfully" })))
}

fn student_row_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let age: Option<i64> = row.get(2)?;
    let gender: Option<String> = row.get(3)?;
    let class_id: Option<i64> = row.get(4)?;
    let class_name: Option<String> = row.get(5)?;
    let roll_number: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(json!({
        "id": id,
        "name": name,
        "age": age,
        "gender": gender,
        "class_id": class_id,
        "class_name": class_name,
        "roll_number": roll_number,
        "status": status,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_students)
        .service(get_student)
        .service(create_student)
        .service(update_student)
        .service(delete_student);
}
