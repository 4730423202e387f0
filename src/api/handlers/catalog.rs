use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{get, web, HttpResponse};
use rusqlite::Connection;
use serde_json::json;

#[get("/api/classes")]
async fn list_classes(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare("SELECT id, name, term_fee FROM classes ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let term_fee: f64 = row.get(2)?;
            Ok(json!({ "id": id, "name": name, "term_fee": term_fee }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/subjects")]
async fn list_subjects(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare("SELECT id, name FROM subjects ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            Ok(json!({ "id": id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/stats")]
async fn admin_stats(
    state: web::Data<AppState>,
    _user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    Ok(HttpResponse::Ok().json(json!({
        "totalStudents": count(&conn, "SELECT COUNT(*) FROM students")?,
        "totalTeachers": count(&conn, "SELECT COUNT(*) FROM teachers")?,
        "newAdmissions": count(
            &conn,
            "SELECT COUNT(*) FROM admissions WHERE status = 'Pending'"
        )?,
        "totalClasses": count(&conn, "SELECT COUNT(*) FROM classes")?,
    })))
}

/// Headline numbers for the public landing page; no pending-admission count
/// leaks here.
#[get("/api/public/stats")]
async fn public_stats(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    Ok(HttpResponse::Ok().json(json!({
        "totalStudents": count(&conn, "SELECT COUNT(*) FROM students")?,
        "totalTeachers": count(&conn, "SELECT COUNT(*) FROM teachers")?,
        "totalClasses": count(&conn, "SELECT COUNT(*) FROM classes")?,
        "totalSubjects": count(&conn, "SELECT COUNT(*) FROM subjects")?,
    })))
}

#[get("/api/health")]
async fn health(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // A trivial query proves the connection is usable.
    let conn = state.conn()?;
    let ok: i64 = conn.query_row("SELECT 1", [], |r| r.get(0))?;
    Ok(HttpResponse::Ok().json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "database": ok == 1,
    })))
}

fn count(conn: &Connection, sql: &str) -> Result<i64, ApiError> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_classes)
        .service(list_subjects)
        .service(admin_stats)
        .service(public_stats)
        .service(health);
}
