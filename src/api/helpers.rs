//! Shared identity plumbing for the two paths that materialize students:
//! direct admin creation and admission approval.

use crate::api::error::ApiError;
use crate::auth;
use rusqlite::{Connection, OptionalExtension};

pub struct NewStudent {
    pub user_id: i64,
    pub student_id: i64,
    pub roll_number: String,
    pub email: String,
}

/// Next roll number for the given calendar year: two-digit year prefix plus a
/// zero-padded four-digit sequence (`260001`, `260002`, ...). Scans the
/// current maximum and increments; callers run this inside the transaction
/// that inserts the student. Two racing approvals could still compute the
/// same value and the second insert then fails on the UNIQUE constraint.
pub fn next_roll_number(conn: &Connection, year: i32) -> Result<String, ApiError> {
    let prefix = format!("{:02}", year.rem_euclid(100));
    let max: Option<String> = conn.query_row(
        "SELECT MAX(roll_number) FROM students
         WHERE roll_number LIKE ?1 || '%' AND LENGTH(roll_number) = 6",
        [&prefix],
        |r| r.get(0),
    )?;

    let seq = max
        .as_deref()
        .and_then(|m| m.get(2..))
        .and_then(|suffix| suffix.parse::<u32>().ok())
        .map(|n| n + 1)
        .unwrap_or(1);

    Ok(format!("{prefix}{seq:04}"))
}

/// Login email derived from the student's name, de-duplicated against
/// existing users by appending a counter ahead of the domain.
pub fn unique_login_email(conn: &Connection, name: &str) -> Result<String, ApiError> {
    let slug: String = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    let slug = if slug.is_empty() {
        "student".to_string()
    } else {
        slug
    };

    let mut candidate = format!("{slug}@school.com");
    let mut n = 2u32;
    loop {
        let taken: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE email = ?", [&candidate], |r| {
                r.get(0)
            })
            .optional()?;
        if taken.is_none() {
            return Ok(candidate);
        }
        candidate = format!("{slug}{n}@school.com");
        n += 1;
    }
}

/// Creates the owning user row (role `student`) and the profile row in one
/// go. Callers supply the surrounding transaction; nothing here commits.
#[allow(clippy::too_many_arguments)]
pub fn insert_student_with_user(
    conn: &Connection,
    name: &str,
    age: Option<i64>,
    gender: Option<&str>,
    class_id: Option<i64>,
    status: &str,
    password: &str,
    year: i32,
) -> Result<NewStudent, ApiError> {
    let email = unique_login_email(conn, name)?;
    let password_hash = auth::hash_password(password)?;

    conn.execute(
        "INSERT INTO users(name, email, password, role, status)
         VALUES(?, ?, ?, 'student', 'Active')",
        (name, &email, &password_hash),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;
    let user_id = conn.last_insert_rowid();

    let roll_number = next_roll_number(conn, year)?;
    conn.execute(
        "INSERT INTO students(user_id, class_id, age, gender, roll_number, status)
         VALUES(?, ?, ?, ?, ?, ?)",
        (user_id, class_id, age, gender, &roll_number, status),
    )
    .map_err(|e| ApiError::db("db_insert_failed", e))?;
    let student_id = conn.last_insert_rowid();

    Ok(NewStudent {
        user_id,
        student_id,
        roll_number,
        email,
    })
}
