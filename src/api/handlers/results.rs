use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{get, post, web, HttpResponse};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const RESULTS_BULK_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Deserialize)]
struct ResultEntry {
    student_id: i64,
    subject_id: i64,
    marks: i64,
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultsSubmission {
    term: String,
    year: i64,
    entries: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct PublishQuery {
    year: i64,
    term: String,
}

#[derive(Debug, Deserialize)]
struct PublishInput {
    year: i64,
    term: String,
    is_published: bool,
}

#[derive(Debug, Deserialize)]
struct PublicResultsQuery {
    student_id: Option<String>,
    name: Option<String>,
    term: Option<String>,
}

/// Batch mark entry. Each (student, subject, term, year) tuple upserts
/// independently; failures are reported per entry rather than aborting the
/// batch, and the last writer wins on re-submission.
#[post("/api/results")]
async fn submit_results(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<ResultsSubmission>,
) -> Result<HttpResponse, ApiError> {
    user.require_role("teacher")?;
    let submission = body.into_inner();

    if submission.term.trim().is_empty() {
        return Err(ApiError::bad_params("term must not be empty"));
    }
    if submission.entries.len() > RESULTS_BULK_MAX_ENTRIES {
        return Err(ApiError::bad_params("too many entries").with_details(json!({
            "entries": submission.entries.len(),
            "max": RESULTS_BULK_MAX_ENTRIES,
        })));
    }

    let conn = state.conn()?;
    let mut updated: usize = 0;
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, entry) in submission.entries.iter().enumerate() {
        if entry.marks < 0 {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": "negative marks are not allowed",
            }));
            continue;
        }
        if !row_exists(&conn, "students", entry.student_id)? {
            errors.push(json!({
                "index": i,
                "code": "not_found",
                "message": format!("student {} not found", entry.student_id),
            }));
            continue;
        }
        if !row_exists(&conn, "subjects", entry.subject_id)? {
            errors.push(json!({
                "index": i,
                "code": "not_found",
                "message": format!("subject {} not found", entry.subject_id),
            }));
            continue;
        }

        let res = conn.execute(
            "INSERT INTO results(student_id, subject_id, marks, comments, term, year)
             VALUES(?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_id, term, year) DO UPDATE SET
               marks = excluded.marks,
               comments = excluded.comments",
            (
                entry.student_id,
                entry.subject_id,
                entry.marks,
                entry.comments.as_deref(),
                &submission.term,
                submission.year,
            ),
        );
        match res {
            Ok(_) => updated += 1,
            Err(e) => errors.push(json!({
                "index": i,
                "code": "db_insert_failed",
                "message": e.to_string(),
            })),
        }
    }

    let mut result = serde_json::Map::new();
    result.insert("updated".into(), json!(updated));
    if !errors.is_empty() {
        result.insert("rejected".into(), json!(errors.len()));
        result.insert("errors".into(), json!(errors));
    }
    Ok(HttpResponse::Ok().json(result))
}

/// Marks for the students in the caller's assigned classes.
#[get("/api/results")]
async fn list_results(
    state: web::Data<AppState>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    user.require_role("teacher")?;
    let conn = state.conn()?;
    let teacher_id = super::teachers::teacher_id_for_user(&conn, user.0.id)?;

    let mut stmt = conn.prepare(
        "SELECT DISTINCT r.id, r.student_id, u.name AS student_name,
                r.subject_id, sub.name AS subject_name,
                r.marks, r.comments, r.term, r.year
         FROM results r
         JOIN students s ON s.id = r.student_id
         JOIN users u ON u.id = s.user_id
         JOIN subjects sub ON sub.id = r.subject_id
         JOIN teacher_assignments ta ON ta.class_id = s.class_id
         WHERE ta.teacher_id = ?
         ORDER BY r.id",
    )?;
    let rows = stmt
        .query_map([teacher_id], result_row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/results/publish")]
async fn publish_status(
    state: web::Data<AppState>,
    _user: AuthUser,
    query: web::Query<PublishQuery>,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let is_published: Option<bool> = conn
        .query_row(
            "SELECT is_published FROM published_results WHERE year = ? AND term = ?",
            (query.year, &query.term),
            |r| r.get(0),
        )
        .optional()?;

    // No gate row yet means the period was never published.
    Ok(HttpResponse::Ok().json(json!({
        "year": query.year,
        "term": query.term,
        "isPublished": is_published.unwrap_or(false),
    })))
}

#[post("/api/results/publish")]
async fn set_publish(
    state: web::Data<AppState>,
    _user: AuthUser,
    body: web::Json<PublishInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO published_results(year, term, is_published)
         VALUES(?, ?, ?)
         ON CONFLICT(year, term) DO UPDATE SET is_published = excluded.is_published",
        (input.year, &input.term, input.is_published),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;

    log::info!(
        "results for {} {} {}",
        input.term,
        input.year,
        if input.is_published {
            "published"
        } else {
            "unpublished"
        }
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": "Publish status updated",
        "year": input.year,
        "term": input.term,
        "isPublished": input.is_published,
    })))
}

/// Unauthenticated result lookup. The caller supplies a roll number (or raw
/// id) plus the student's name as a weak shared secret; only rows whose
/// (year, term) gate is published come back, de-duplicated per subject with
/// the most recent year winning.
#[get("/api/public/results")]
async fn public_results(
    state: web::Data<AppState>,
    query: web::Query<PublicResultsQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let (Some(student_id), Some(name), Some(term)) = (q.student_id, q.name, q.term) else {
        return Err(ApiError::bad_params("student_id, name and term are required"));
    };
    let numeric_id: i64 = student_id.trim().parse().unwrap_or(-1);

    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.student_id, u.name AS student_name,
                r.subject_id, sub.name AS subject_name,
                r.marks, r.comments, r.term, r.year
         FROM results r
         JOIN students s ON s.id = r.student_id
         JOIN users u ON u.id = s.user_id
         JOIN subjects sub ON sub.id = r.subject_id
         WHERE (s.roll_number = ?1 OR s.id = ?2)
           AND LOWER(TRIM(u.name)) = LOWER(TRIM(?3))
           AND r.term = ?4
           AND EXISTS (
             SELECT 1 FROM published_results pr
             WHERE pr.year = r.year AND pr.term = r.term AND pr.is_published = 1
           )
         ORDER BY r.year, r.id",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![student_id.trim(), numeric_id, name, term],
            result_row_json,
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    // One row per subject; iteration order makes the latest row win.
    let mut by_subject: BTreeMap<i64, serde_json::Value> = BTreeMap::new();
    for row in rows {
        let subject_id = row["subject_id"].as_i64().unwrap_or(0);
        by_subject.insert(subject_id, row);
    }

    Ok(HttpResponse::Ok().json(by_subject.into_values().collect::<Vec<_>>()))
}

fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool, ApiError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

fn result_row_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: i64 = row.get(0)?;
    let student_id: i64 = row.get(1)?;
    let student_name: String = row.get(2)?;
    let subject_id: i64 = row.get(3)?;
    let subject_name: String = row.get(4)?;
    let marks: i64 = row.get(5)?;
    let comments: Option<String> = row.get(6)?;
    let term: String = row.get(7)?;
    let year: i64 = row.get(8)?;
    Ok(json!({
        "id": id,
        "student_id": student_id,
        "student_name": student_name,
        "subject_id": subject_id,
        "subject_name": subject_name,
        "marks": marks,
        "comments": comments,
        "term": term,
        "year": year,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(publish_status)
        .service(set_publish)
        .service(submit_results)
        .service(list_results)
        .service(public_results);
}
