use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result, Row};

use crate::models::{
    Category, Debt, DebtInput, DebtStatus, Expense, ExpenseInput, Income, IncomeInput, IncomeKind,
};

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_db(path: &Path) -> DbPool {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::new(manager).expect("db pool");
    {
        let conn = pool.get().expect("db connection");
        run_migrations(&conn).expect("db migrations");
    }
    pool
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS income (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL,
            source TEXT NOT NULL,
            kind TEXT NOT NULL,
            date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            category_id TEXT NOT NULL,
            category_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS debts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            total_amount REAL NOT NULL,
            paid_amount REAL NOT NULL,
            status TEXT NOT NULL,
            due_date TEXT
        );
        ",
    )
}

// Dates live in the store as RFC 3339 text; parsing back to a structured
// timestamp happens on every read path.
fn read_date(idx: usize, raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn read_kind(idx: usize, raw: String) -> Result<IncomeKind> {
    IncomeKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown income kind: {raw}").into(),
        )
    })
}

fn read_status(idx: usize, raw: String) -> Result<DebtStatus> {
    DebtStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown debt status: {raw}").into(),
        )
    })
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories")?;
    let rows = stmt.query_map([], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Per-request lookup table for resolving expense category references.
pub fn category_names(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for category in list_categories(conn)? {
        out.insert(category.id, category.name);
    }
    Ok(out)
}

pub fn insert_category(conn: &Connection, category: &Category) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (id, name) VALUES (?1, ?2)",
        params![category.id, category.name],
    )?;
    Ok(())
}

pub fn find_category(conn: &Connection, id: &str) -> Result<Option<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(Category {
            id: row.get(0)?,
            name: row.get(1)?,
        }))
    } else {
        Ok(None)
    }
}

pub fn update_category_name(conn: &Connection, id: &str, name: &str) -> Result<usize> {
    conn.execute(
        "UPDATE categories SET name = ?1 WHERE id = ?2",
        params![name, id],
    )
}

pub fn delete_category(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM categories WHERE id = ?1", params![id])
}

fn income_from_row(row: &Row<'_>) -> Result<Income> {
    Ok(Income {
        id: row.get(0)?,
        amount: row.get(1)?,
        source: row.get(2)?,
        kind: read_kind(3, row.get(3)?)?,
        date: read_date(4, row.get(4)?)?,
    })
}

pub fn list_income(conn: &Connection) -> Result<Vec<Income>> {
    let mut stmt = conn.prepare("SELECT id, amount, source, kind, date FROM income")?;
    let rows = stmt.query_map([], income_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn recent_income(conn: &Connection, limit: i64) -> Result<Vec<Income>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, amount, source, kind, date
        FROM income
        ORDER BY date DESC
        LIMIT ?1
        ",
    )?;
    let rows = stmt.query_map(params![limit], income_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_income(conn: &Connection, income: &Income) -> Result<()> {
    conn.execute(
        "INSERT INTO income (id, amount, source, kind, date) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            income.id,
            income.amount,
            income.source,
            income.kind.as_str(),
            income.date.to_rfc3339()
        ],
    )?;
    Ok(())
}

pub fn find_income(conn: &Connection, id: &str) -> Result<Option<Income>> {
    let mut stmt = conn.prepare("SELECT id, amount, source, kind, date FROM income WHERE id = ?1")?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        income_from_row(row).map(Some)
    } else {
        Ok(None)
    }
}

pub fn update_income(conn: &Connection, id: &str, input: &IncomeInput) -> Result<usize> {
    conn.execute(
        "UPDATE income SET amount = ?1, source = ?2, kind = ?3, date = ?4 WHERE id = ?5",
        params![
            input.amount,
            input.source,
            input.kind.as_str(),
            input.date.to_rfc3339(),
            id
        ],
    )
}

pub fn delete_income(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM income WHERE id = ?1", params![id])
}

fn expense_from_row(row: &Row<'_>) -> Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        date: read_date(3, row.get(3)?)?,
        category_id: row.get(4)?,
        category_name: row.get(5)?,
    })
}

pub fn list_expenses(conn: &Connection) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, description, date, category_id, category_name FROM expenses",
    )?;
    let rows = stmt.query_map([], expense_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn recent_expenses(conn: &Connection, limit: i64) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, amount, description, date, category_id, category_name
        FROM expenses
        ORDER BY date DESC
        LIMIT ?1
        ",
    )?;
    let rows = stmt.query_map(params![limit], expense_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_expense(conn: &Connection, expense: &Expense) -> Result<()> {
    conn.execute(
        "
        INSERT INTO expenses (id, amount, description, date, category_id, category_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            expense.id,
            expense.amount,
            expense.description,
            expense.date.to_rfc3339(),
            expense.category_id,
            expense.category_name
        ],
    )?;
    Ok(())
}

pub fn find_expense(conn: &Connection, id: &str) -> Result<Option<Expense>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, amount, description, date, category_id, category_name
        FROM expenses
        WHERE id = ?1
        ",
    )?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        expense_from_row(row).map(Some)
    } else {
        Ok(None)
    }
}

pub fn update_expense(
    conn: &Connection,
    id: &str,
    input: &ExpenseInput,
    category_name: &str,
) -> Result<usize> {
    conn.execute(
        "
        UPDATE expenses
        SET amount = ?1, description = ?2, date = ?3, category_id = ?4, category_name = ?5
        WHERE id = ?6
        ",
        params![
            input.amount,
            input.description,
            input.date.to_rfc3339(),
            input.category_id,
            category_name,
            id
        ],
    )
}

pub fn delete_expense(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])
}

fn debt_from_row(row: &Row<'_>) -> Result<Debt> {
    let due: Option<String> = row.get(5)?;
    let due_date = match due {
        Some(raw) => Some(read_date(5, raw)?),
        None => None,
    };
    Ok(Debt {
        id: row.get(0)?,
        name: row.get(1)?,
        total_amount: row.get(2)?,
        paid_amount: row.get(3)?,
        status: read_status(4, row.get(4)?)?,
        due_date,
    })
}

pub fn list_debts(conn: &Connection) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, total_amount, paid_amount, status, due_date FROM debts",
    )?;
    let rows = stmt.query_map([], debt_from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_debt(conn: &Connection, debt: &Debt) -> Result<()> {
    conn.execute(
        "
        INSERT INTO debts (id, name, total_amount, paid_amount, status, due_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            debt.id,
            debt.name,
            debt.total_amount,
            debt.paid_amount,
            debt.status.as_str(),
            debt.due_date.map(|date| date.to_rfc3339())
        ],
    )?;
    Ok(())
}

pub fn find_debt(conn: &Connection, id: &str) -> Result<Option<Debt>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, total_amount, paid_amount, status, due_date FROM debts WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        debt_from_row(row).map(Some)
    } else {
        Ok(None)
    }
}

pub fn apply_payment(
    conn: &Connection,
    id: &str,
    paid_amount: f64,
    status: DebtStatus,
) -> Result<usize> {
    conn.execute(
        "UPDATE debts SET paid_amount = ?1, status = ?2 WHERE id = ?3",
        params![paid_amount, status.as_str(), id],
    )
}

/// Replaces name, total amount, and due date only; payments and status are
/// untouched.
pub fn update_debt(conn: &Connection, id: &str, input: &DebtInput) -> Result<usize> {
    conn.execute(
        "UPDATE debts SET name = ?1, total_amount = ?2, due_date = ?3 WHERE id = ?4",
        params![
            input.name,
            input.total_amount,
            input.due_date.map(|date| date.to_rfc3339()),
            id
        ],
    )
}

pub fn delete_debt(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM debts WHERE id = ?1", params![id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        run_migrations(&conn).expect("migrations");
        conn
    }

    fn sample_income(id: &str, date: DateTime<Utc>) -> Income {
        Income {
            id: id.to_string(),
            amount: 1200.0,
            source: "salary".to_string(),
            kind: IncomeKind::FixedMonthly,
            date,
        }
    }

    #[test]
    fn category_round_trip() {
        let conn = conn();
        let category = Category {
            id: "c1".to_string(),
            name: "Food".to_string(),
        };
        insert_category(&conn, &category).unwrap();

        assert_eq!(find_category(&conn, "c1").unwrap(), Some(category.clone()));
        assert_eq!(list_categories(&conn).unwrap(), vec![category]);
        assert_eq!(category_names(&conn).unwrap().get("c1").map(String::as_str), Some("Food"));
    }

    #[test]
    fn updates_and_deletes_report_affected_rows() {
        let conn = conn();
        assert_eq!(update_category_name(&conn, "missing", "x").unwrap(), 0);
        assert_eq!(delete_category(&conn, "missing").unwrap(), 0);

        let category = Category {
            id: "c1".to_string(),
            name: "Food".to_string(),
        };
        insert_category(&conn, &category).unwrap();
        assert_eq!(update_category_name(&conn, "c1", "Groceries").unwrap(), 1);
        assert_eq!(find_category(&conn, "c1").unwrap().unwrap().name, "Groceries");
        assert_eq!(delete_category(&conn, "c1").unwrap(), 1);
        assert_eq!(find_category(&conn, "c1").unwrap(), None);
    }

    #[test]
    fn income_dates_survive_the_text_round_trip() {
        let conn = conn();
        let date = Utc.with_ymd_and_hms(2026, 8, 27, 14, 30, 5).unwrap();
        let income = sample_income("i1", date);
        insert_income(&conn, &income).unwrap();

        let loaded = find_income(&conn, "i1").unwrap().unwrap();
        assert_eq!(loaded, income);
        assert_eq!(loaded.date, date);
    }

    #[test]
    fn recent_income_sorts_descending_and_limits() {
        let conn = conn();
        for day in 1..=7 {
            let date = Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap();
            insert_income(&conn, &sample_income(&format!("i{day}"), date)).unwrap();
        }

        let recent = recent_income(&conn, 5).unwrap();
        assert_eq!(recent.len(), 5);
        let days: Vec<u32> = recent
            .iter()
            .map(|income| chrono::Datelike::day(&income.date))
            .collect();
        assert_eq!(days, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn debt_payment_leaves_other_fields_untouched() {
        let conn = conn();
        let debt = Debt {
            id: "d1".to_string(),
            name: "Car loan".to_string(),
            total_amount: 500.0,
            paid_amount: 0.0,
            status: DebtStatus::Active,
            due_date: Some(Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap()),
        };
        insert_debt(&conn, &debt).unwrap();

        assert_eq!(apply_payment(&conn, "d1", 500.0, DebtStatus::Paid).unwrap(), 1);
        let loaded = find_debt(&conn, "d1").unwrap().unwrap();
        assert_eq!(loaded.name, "Car loan");
        assert_eq!(loaded.paid_amount, 500.0);
        assert_eq!(loaded.status, DebtStatus::Paid);
        assert_eq!(loaded.due_date, debt.due_date);
    }

    #[test]
    fn debt_update_does_not_touch_payment_state() {
        let conn = conn();
        let debt = Debt {
            id: "d1".to_string(),
            name: "Loan".to_string(),
            total_amount: 500.0,
            paid_amount: 200.0,
            status: DebtStatus::Active,
            due_date: None,
        };
        insert_debt(&conn, &debt).unwrap();

        let input = DebtInput {
            name: "Renamed loan".to_string(),
            total_amount: 800.0,
            due_date: None,
        };
        assert_eq!(update_debt(&conn, "d1", &input).unwrap(), 1);
        let loaded = find_debt(&conn, "d1").unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed loan");
        assert_eq!(loaded.total_amount, 800.0);
        assert_eq!(loaded.paid_amount, 200.0);
        assert_eq!(loaded.status, DebtStatus::Active);
    }

    #[test]
    fn expense_snapshot_is_stored_verbatim() {
        let conn = conn();
        let expense = Expense {
            id: "e1".to_string(),
            amount: 42.5,
            description: "groceries".to_string(),
            date: Utc.with_ymd_and_hms(2026, 8, 27, 9, 0, 0).unwrap(),
            category_id: "c1".to_string(),
            category_name: "Food".to_string(),
        };
        insert_expense(&conn, &expense).unwrap();
        assert_eq!(find_expense(&conn, "e1").unwrap(), Some(expense));
        assert_eq!(delete_expense(&conn, "e1").unwrap(), 1);
        assert_eq!(find_expense(&conn, "e1").unwrap(), None);
    }
}
