use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth;
use actix_web::{post, web, HttpResponse};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
    role: String,
}

/// Unified login for every role. Students may present a roll number or their
/// name; everyone else logs in with the email/username on the users row.
#[post("/api/login")]
async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let conn = state.conn()?;

    let row: Option<(i64, String, Option<String>)> = if req.role == "student" {
        conn.query_row(
            "SELECT u.id, u.name, u.password
             FROM users u
             JOIN students s ON s.user_id = u.id
             WHERE u.role = 'student'
               AND (s.roll_number = ?1 OR LOWER(TRIM(u.name)) = LOWER(TRIM(?1)))",
            [&req.username],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?
    } else {
        conn.query_row(
            "SELECT id, name, password
             FROM users
             WHERE role = ?1
               AND (LOWER(email) = LOWER(TRIM(?2)) OR LOWER(name) = LOWER(TRIM(?2)))",
            [&req.role, &req.username],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?
    };

    let Some((id, name, stored)) = row else {
        return Err(ApiError::unauthorized("invalid credentials"));
    };
    let Some(stored) = stored else {
        return Err(ApiError::unauthorized("account not set up"));
    };
    if !auth::password_matches(&stored, &req.password) {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let token = auth::issue_token(&state.jwt_secret, id, &name, &req.role)?;
    log::info!("login: {} ({})", name, req.role);
    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "user": {
            "id": id,
            "name": name,
            "username": name,
            "role": req.role,
        }
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login);
}
