use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct AnnouncementInput {
    title: String,
    content: String,
    audience: Option<String>,
}

/// Public: the notice board shows on every dashboard, logged in or not.
#[get("/api/announcements")]
async fn list_announcements(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, title, content, audience, created_at
         FROM announcements
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let title: String = row.get(1)?;
            let content: String = row.get(2)?;
            let audience: String = row.get(3)?;
            let created_at: String = row.get(4)?;
            Ok(json!({
                "id": id,
                "title": title,
                "content": content,
                "audience": audience,
                "created_at": created_at,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/api/announcements")]
async fn post_announcement(
    state: web::Data<AppState>,
    _user: AuthUser,
    body: web::Json<AnnouncementInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    if input.title.trim().is_empty() {
        return Err(ApiError::bad_params("title must not be empty"));
    }

    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO announcements(title, content, audience) VALUES(?, ?, ?)",
        (
            input.title.trim(),
            &input.content,
            input.audience.as_deref().unwrap_or("All"),
        ),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Announcement posted",
        "id": conn.last_insert_rowid(),
    })))
}

// No edit path; announcements are append + delete only.
#[delete("/api/announcements/{id}")]
async fn delete_announcement(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    let changed = conn
        .execute("DELETE FROM announcements WHERE id = ?", [id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("announcement not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Announcement deleted" })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_announcements)
        .service(post_announcement)
        .service(delete_announcement);
}
