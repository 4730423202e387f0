use crate::api::error::ApiError;
use crate::api::helpers;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{get, patch, post, web, HttpResponse};
use chrono::{Datelike, Utc};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct AdmissionInput {
    student_name: String,
    age: Option<i64>,
    gender: Option<String>,
    class_applied_id: Option<i64>,
    parent_name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusInput {
    status: String,
}

/// Public intake form; no token required.
#[post("/api/admissions")]
async fn submit_admission(
    state: web::Data<AppState>,
    body: web::Json<AdmissionInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    let name = input.student_name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_params("student_name must not be empty"));
    }

    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO admissions(student_name, age, gender, class_applied_id, parent_name, phone, status)
         VALUES(?, ?, ?, ?, ?, ?, 'Pending')",
        (
            &name,
            input.age,
            input.gender.as_deref(),
            input.class_applied_id,
            input.parent_name.as_deref(),
            input.phone.as_deref(),
        ),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Application submitted",
        "id": conn.last_insert_rowid(),
    })))
}

#[get("/api/admissions")]
async fn list_admissions(
    state: web::Data<AppState>,
    _user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT a.id, a.student_name, a.age, a.gender, a.class_applied_id,
                c.name AS class_name, a.parent_name, a.phone, a.status, a.created_at
         FROM admissions a
         LEFT JOIN classes c ON c.id = a.class_applied_id
         ORDER BY a.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let student_name: String = row.get(1)?;
            let age: Option<i64> = row.get(2)?;
            let gender: Option<String> = row.get(3)?;
            let class_applied_id: Option<i64> = row.get(4)?;
            let class_name: Option<String> = row.get(5)?;
            let parent_name: Option<String> = row.get(6)?;
            let phone: Option<String> = row.get(7)?;
            let status: String = row.get(8)?;
            let created_at: String = row.get(9)?;
            Ok(json!({
                "id": id,
                "student_name": student_name,
                "age": age,
                "gender": gender,
                "class_applied_id": class_applied_id,
                "class_name": class_name,
                "parent_name": parent_name,
                "phone": phone,
                "status": status,
                "created_at": created_at,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Pending -> Approved | Rejected, exactly once. Approval also materializes
/// the user + student pair; the whole step is one transaction, so a failure
/// partway through (say, a roll-number collision) leaves no orphan user.
#[patch("/api/admissions/{id}")]
async fn decide_admission(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<StatusInput>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let status = body.into_inner().status;
    if status != "Approved" && status != "Rejected" {
        return Err(
            ApiError::bad_params("status must be Approved or Rejected")
                .with_details(json!({ "status": status })),
        );
    }

    let mut conn = state.conn()?;
    let tx = conn
        .transaction()
        .map_err(|e| ApiError::db("db_tx_failed", e))?;

    let admission: Option<(String, Option<i64>, Option<String>, Option<i64>, String)> = tx
        .query_row(
            "SELECT student_name, age, gender, class_applied_id, status
             FROM admissions WHERE id = ?",
            [id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                ))
            },
        )
        .optional()?;
    let Some((student_name, age, gender, class_applied_id, current)) = admission else {
        return Err(ApiError::not_found("admission not found"));
    };
    if current != "Pending" {
        return Err(
            ApiError::conflict(format!("admission already {}", current.to_lowercase()))
                .with_details(json!({ "status": current })),
        );
    }

    tx.execute("UPDATE admissions SET status = ? WHERE id = ?", (&status, id))?;

    if status == "Approved" {
        let created = helpers::insert_student_with_user(
            &tx,
            &student_name,
            age,
            gender.as_deref(),
            class_applied_id,
            "Enrolled",
            "password",
            Utc::now().year(),
        )?;
        tx.commit().map_err(|e| ApiError::db("db_tx_failed", e))?;
        log::info!(
            "admission {} approved: student {} roll {}",
            id,
            created.student_id,
            created.roll_number
        );
        return Ok(HttpResponse::Ok().json(json!({
            "message": "Admission approved and student enrolled",
            "student_id": created.student_id,
            "roll_number": created.roll_number,
        })));
    }

    tx.commit().map_err(|e| ApiError::db("db_tx_failed", e))?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Admission rejected" })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(submit_admission)
        .service(list_admissions)
        .service(decide_admission);
}
