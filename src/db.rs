use rusqlite::Connection;
use std::path::Path;

pub fn open_db(db_path: &Path) -> anyhow::Result<Connection> {
    if let Some(dir) = db_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    seed_defaults(&conn)?;
    Ok(conn)
}

/// Fresh database for tests; same schema and seed rows as a file-backed one.
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    seed_defaults(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT,
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            term_fee REAL NOT NULL DEFAULT 3000.0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            class_id INTEGER,
            age INTEGER,
            gender TEXT,
            roll_number TEXT UNIQUE,
            status TEXT NOT NULL DEFAULT 'Enrolled',
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_user ON students(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'Active',
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_user ON teachers(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            teacher_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            UNIQUE(teacher_id, class_id, subject_id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_assignments_teacher
         ON teacher_assignments(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_assignments_class
         ON teacher_assignments(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admissions(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_name TEXT NOT NULL,
            age INTEGER,
            gender TEXT,
            class_applied_id INTEGER,
            parent_name TEXT,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'Pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY(class_applied_id) REFERENCES classes(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            marks INTEGER NOT NULL,
            comments TEXT,
            term TEXT NOT NULL,
            year INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(student_id, subject_id, term, year),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_student ON results(student_id)",
        [],
    )?;

    // Visibility gate for a (year, term) period; independent of the rows themselves.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS published_results(
            year INTEGER NOT NULL,
            term TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(year, term)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            method TEXT NOT NULL DEFAULT 'Cash',
            term TEXT,
            year INTEGER,
            received_by TEXT NOT NULL DEFAULT 'Admin',
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS announcements(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            audience TEXT NOT NULL DEFAULT 'All',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Databases created before the fee schedule landed lack classes.term_fee.
    ensure_classes_term_fee(conn)?;
    // Early admission intakes captured neither gender nor a parent phone.
    ensure_admissions_gender(conn)?;
    ensure_admissions_phone(conn)?;

    Ok(())
}

/// Seed rows the dashboards expect on a fresh install. Each block only runs
/// against an empty table, so re-opening an existing database is a no-op.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if users == 0 {
        // Plain-text dev password; login falls back to equality for non-bcrypt rows.
        conn.execute(
            "INSERT INTO users(name, email, password, role, status)
             VALUES('admin', 'admin@school.com', 'password', 'admin', 'Active')",
            [],
        )?;
    }

    let classes: i64 = conn.query_row("SELECT COUNT(*) FROM classes", [], |r| r.get(0))?;
    if classes == 0 {
        let mut stmt = conn.prepare("INSERT INTO classes(name, term_fee) VALUES(?, ?)")?;
        for grade in 1..=7 {
            stmt.execute((format!("Grade {grade}"), 3000.0))?;
        }
    }

    let subjects: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))?;
    if subjects == 0 {
        let mut stmt = conn.prepare("INSERT INTO subjects(name) VALUES(?)")?;
        for name in ["Mathematics", "English", "Science", "Social Studies"] {
            stmt.execute([name])?;
        }
    }

    Ok(())
}

fn ensure_classes_term_fee(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "classes", "term_fee")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE classes ADD COLUMN term_fee REAL NOT NULL DEFAULT 3000.0",
        [],
    )?;
    Ok(())
}

fn ensure_admissions_gender(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "admissions", "gender")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE admissions ADD COLUMN gender TEXT", [])?;
    Ok(())
}

fn ensure_admissions_phone(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "admissions", "phone")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE admissions ADD COLUMN phone TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
