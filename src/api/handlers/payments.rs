use crate::api::error::ApiError;
use crate::api::AppState;
use crate::auth::AuthUser;
use actix_web::{delete, get, post, put, web, HttpResponse};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Deserialize)]
struct PaymentInput {
    student_id: i64,
    amount: f64,
    date: String,
    term: Option<String>,
    year: Option<i64>,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentEdit {
    amount: f64,
    date: String,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MonthlyQuery {
    month: String,
    year: i64,
}

/// Per-student fee position. The balance is derived on every read from the
/// class fee figure minus the transaction sum; it is never stored.
#[get("/api/payments")]
async fn payment_summary(
    state: web::Data<AppState>,
    _user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT s.id, u.name, s.roll_number, c.name AS class_name, c.term_fee,
                COALESCE(SUM(p.amount), 0) AS total_paid
         FROM students s
         JOIN users u ON u.id = s.user_id
         JOIN classes c ON c.id = s.class_id
         LEFT JOIN payments p ON p.student_id = s.id
         GROUP BY s.id
         ORDER BY s.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let roll_number: Option<String> = row.get(2)?;
            let class_name: String = row.get(3)?;
            let term_fee: f64 = row.get(4)?;
            let total_paid: f64 = row.get(5)?;
            let balance = term_fee - total_paid;
            let status = if balance <= 0.0 {
                "Paid"
            } else if total_paid > 0.0 {
                "Partial"
            } else {
                "Unpaid"
            };
            Ok(json!({
                "id": id,
                "name": name,
                "roll_no": roll_number,
                "class_name": class_name,
                "total_fees": term_fee,
                "paid": total_paid,
                "balance": balance,
                "status": status,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/payments/transactions")]
async fn payment_transactions(
    state: web::Data<AppState>,
    _user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.student_id, u.name AS student_name, c.name AS class_name,
                p.amount, p.date, p.method, p.term, p.year, p.received_by
         FROM payments p
         JOIN students s ON s.id = p.student_id
         JOIN users u ON u.id = s.user_id
         LEFT JOIN classes c ON c.id = s.class_id
         ORDER BY p.date DESC, p.id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let student_id: i64 = row.get(1)?;
            let student_name: String = row.get(2)?;
            let class_name: Option<String> = row.get(3)?;
            let amount: f64 = row.get(4)?;
            let date: String = row.get(5)?;
            let method: String = row.get(6)?;
            let term: Option<String> = row.get(7)?;
            let year: Option<i64> = row.get(8)?;
            let received_by: String = row.get(9)?;
            Ok(json!({
                "id": id,
                "student_id": student_id,
                "student_name": student_name,
                "class_name": class_name,
                "amount": amount,
                "date": date,
                "method": method,
                "term": term,
                "year": year,
                "received_by": received_by,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Collected total for an English month name, e.g. `?month=March&year=2026`.
#[get("/api/payments/stats/monthly")]
async fn monthly_stats(
    state: web::Data<AppState>,
    _user: AuthUser,
    query: web::Query<MonthlyQuery>,
) -> Result<HttpResponse, ApiError> {
    let Some(index) = MONTH_NAMES.iter().position(|m| *m == query.month) else {
        return Ok(HttpResponse::Ok().json(json!({ "total": 0 })));
    };
    let month = format!("{:02}", index + 1);
    let year = query.year.to_string();

    let conn = state.conn()?;
    let total: Option<f64> = conn.query_row(
        "SELECT SUM(amount) FROM payments
         WHERE strftime('%m', date) = ? AND strftime('%Y', date) = ?",
        [&month, &year],
        |r| r.get(0),
    )?;
    Ok(HttpResponse::Ok().json(json!({ "total": total.unwrap_or(0.0) })))
}

#[get("/api/payments/{student_id}")]
async fn student_history(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let student_id = path.into_inner();
    let conn = state.conn()?;
    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount, date, method, term, year, received_by
         FROM payments WHERE student_id = ?
         ORDER BY date DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([student_id], |row| {
            let id: i64 = row.get(0)?;
            let student_id: i64 = row.get(1)?;
            let amount: f64 = row.get(2)?;
            let date: String = row.get(3)?;
            let method: String = row.get(4)?;
            let term: Option<String> = row.get(5)?;
            let year: Option<i64> = row.get(6)?;
            let received_by: String = row.get(7)?;
            Ok(json!({
                "id": id,
                "student_id": student_id,
                "amount": amount,
                "date": date,
                "method": method,
                "term": term,
                "year": year,
                "received_by": received_by,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Pure append. No fee-schedule validation and no idempotency key; a retried
/// submission records a second transaction.
#[post("/api/payments")]
async fn record_payment(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<PaymentInput>,
) -> Result<HttpResponse, ApiError> {
    let input = body.into_inner();
    if input.amount <= 0.0 {
        return Err(ApiError::bad_params("amount must be positive"));
    }

    let conn = state.conn()?;
    let student: Option<i64> = conn
        .query_row(
            "SELECT id FROM students WHERE id = ?",
            [input.student_id],
            |r| r.get(0),
        )
        .optional()?;
    if student.is_none() {
        return Err(ApiError::not_found("student not found"));
    }

    conn.execute(
        "INSERT INTO payments(student_id, amount, date, method, term, year, received_by)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            input.student_id,
            input.amount,
            &input.date,
            input.method.as_deref().unwrap_or("Cash"),
            input.term.as_deref(),
            input.year,
            &user.0.username,
        ),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Payment recorded successfully",
        "id": conn.last_insert_rowid(),
    })))
}

#[put("/api/payments/{id}")]
async fn edit_payment(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
    body: web::Json<PaymentEdit>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let input = body.into_inner();
    let conn = state.conn()?;

    let changed = conn.execute(
        "UPDATE payments SET amount = ?, date = ?, method = ? WHERE id = ?",
        (
            input.amount,
            &input.date,
            input.method.as_deref().unwrap_or("Cash"),
            id,
        ),
    )?;
    if changed == 0 {
        return Err(ApiError::not_found("payment not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Payment updated successfully" })))
}

/// Hard delete; the balance simply recomputes on the next read.
#[delete("/api/payments/{id}")]
async fn delete_payment(
    state: web::Data<AppState>,
    _user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    let changed = conn
        .execute("DELETE FROM payments WHERE id = ?", [id])
        .map_err(|e| ApiError::db("db_delete_failed", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("payment not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Payment deleted successfully" })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Literal routes must land before the {student_id} catch-all.
    cfg.service(payment_summary)
        .service(payment_transactions)
        .service(monthly_stats)
        .service(student_history)
        .service(record_payment)
        .service(edit_payment)
        .service(delete_payment);
}
