#[macro_use]
extern crate rocket;

mod dashboard;
mod db;
mod error;
mod models;

use std::path::{Path, PathBuf};

use chrono::Utc;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Request, Response, Rocket, State};
use uuid::Uuid;

use dashboard::{ExpenseAnalysis, Period, Summary, Transaction};
use db::DbPool;
use error::ApiError;
use models::{
    Category, CategoryInput, Debt, DebtInput, DebtPayment, DebtStatus, Expense, ExpenseInput,
    Income, IncomeInput, UNKNOWN_CATEGORY,
};

// Store-level fetch cap for the recent-transactions merge; the merged list
// is re-sorted and truncated to 10 afterwards.
const RECENT_FETCH_LIMIT: i64 = 5;

struct Cors {
    origins: Vec<String>,
}

impl Cors {
    fn from_env() -> Self {
        let origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        Cors { origins }
    }

    fn allowed(&self, origin: &str) -> Option<String> {
        if self.origins.iter().any(|allowed| allowed == "*") {
            return Some("*".to_string());
        }
        self.origins.iter().find(|allowed| *allowed == origin).cloned()
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let origin = request.headers().get_one("Origin").unwrap_or("*");
        if let Some(allow) = self.allowed(origin) {
            response.set_header(Header::new("Access-Control-Allow-Origin", allow));
            response.set_header(Header::new(
                "Access-Control-Allow-Methods",
                "GET, POST, PUT, PATCH, DELETE, OPTIONS",
            ));
            response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        }
    }
}

#[options("/<_..>")]
fn cors_preflight() {}

#[get("/categories")]
fn list_categories(pool: &State<DbPool>) -> Result<Json<Vec<Category>>, ApiError> {
    let conn = pool.get()?;
    Ok(Json(db::list_categories(&conn)?))
}

#[post("/categories", data = "<input>")]
fn create_category(
    pool: &State<DbPool>,
    input: Json<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: input.name.trim().to_string(),
    };
    let conn = pool.get()?;
    db::insert_category(&conn, &category)?;
    Ok(Json(category))
}

#[put("/categories/<id>", data = "<input>")]
fn update_category(
    pool: &State<DbPool>,
    id: &str,
    input: Json<CategoryInput>,
) -> Result<Json<Category>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let conn = pool.get()?;
    if db::update_category_name(&conn, id, input.name.trim())? == 0 {
        return Err(ApiError::NotFound("Category"));
    }
    db::find_category(&conn, id)?
        .map(Json)
        .ok_or(ApiError::NotFound("Category"))
}

#[delete("/categories/<id>")]
fn delete_category(pool: &State<DbPool>, id: &str) -> Result<Json<Value>, ApiError> {
    let conn = pool.get()?;
    if db::delete_category(&conn, id)? == 0 {
        return Err(ApiError::NotFound("Category"));
    }
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

#[get("/income")]
fn list_income(pool: &State<DbPool>) -> Result<Json<Vec<Income>>, ApiError> {
    let conn = pool.get()?;
    Ok(Json(db::list_income(&conn)?))
}

#[post("/income", data = "<input>")]
fn create_income(pool: &State<DbPool>, input: Json<IncomeInput>) -> Result<Json<Income>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let income = Income {
        id: Uuid::new_v4().to_string(),
        amount: input.amount,
        source: input.source,
        kind: input.kind,
        date: input.date,
    };
    let conn = pool.get()?;
    db::insert_income(&conn, &income)?;
    Ok(Json(income))
}

#[put("/income/<id>", data = "<input>")]
fn update_income(
    pool: &State<DbPool>,
    id: &str,
    input: Json<IncomeInput>,
) -> Result<Json<Income>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let conn = pool.get()?;
    if db::update_income(&conn, id, &input)? == 0 {
        return Err(ApiError::NotFound("Income"));
    }
    db::find_income(&conn, id)?
        .map(Json)
        .ok_or(ApiError::NotFound("Income"))
}

#[delete("/income/<id>")]
fn delete_income(pool: &State<DbPool>, id: &str) -> Result<Json<Value>, ApiError> {
    let conn = pool.get()?;
    if db::delete_income(&conn, id)? == 0 {
        return Err(ApiError::NotFound("Income"));
    }
    Ok(Json(json!({ "message": "Income deleted successfully" })))
}

#[get("/expenses")]
fn list_expenses(pool: &State<DbPool>) -> Result<Json<Vec<Expense>>, ApiError> {
    let conn = pool.get()?;
    let names = db::category_names(&conn)?;
    let mut expenses = db::list_expenses(&conn)?;
    for expense in &mut expenses {
        expense.category_name = names
            .get(&expense.category_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
    }
    Ok(Json(expenses))
}

#[post("/expenses", data = "<input>")]
fn create_expense(
    pool: &State<DbPool>,
    input: Json<ExpenseInput>,
) -> Result<Json<Expense>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let conn = pool.get()?;
    // Existence check and insert are two store calls; a category deleted in
    // between leaves a dangling reference that reads resolve to Unknown.
    let category = db::find_category(&conn, &input.category_id)?
        .ok_or(ApiError::NotFound("Category"))?;
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        amount: input.amount,
        description: input.description,
        date: input.date,
        category_id: input.category_id,
        category_name: category.name,
    };
    db::insert_expense(&conn, &expense)?;
    Ok(Json(expense))
}

#[put("/expenses/<id>", data = "<input>")]
fn update_expense(
    pool: &State<DbPool>,
    id: &str,
    input: Json<ExpenseInput>,
) -> Result<Json<Expense>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let conn = pool.get()?;
    if db::find_expense(&conn, id)?.is_none() {
        return Err(ApiError::NotFound("Expense"));
    }
    let category = db::find_category(&conn, &input.category_id)?
        .ok_or(ApiError::NotFound("Category"))?;
    db::update_expense(&conn, id, &input, &category.name)?;
    db::find_expense(&conn, id)?
        .map(Json)
        .ok_or(ApiError::NotFound("Expense"))
}

#[delete("/expenses/<id>")]
fn delete_expense(pool: &State<DbPool>, id: &str) -> Result<Json<Value>, ApiError> {
    let conn = pool.get()?;
    if db::delete_expense(&conn, id)? == 0 {
        return Err(ApiError::NotFound("Expense"));
    }
    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}

#[get("/debts")]
fn list_debts(pool: &State<DbPool>) -> Result<Json<Vec<Debt>>, ApiError> {
    let conn = pool.get()?;
    Ok(Json(db::list_debts(&conn)?))
}

#[post("/debts", data = "<input>")]
fn create_debt(pool: &State<DbPool>, input: Json<DebtInput>) -> Result<Json<Debt>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let debt = Debt {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        total_amount: input.total_amount,
        paid_amount: 0.0,
        status: DebtStatus::for_amounts(0.0, input.total_amount),
        due_date: input.due_date,
    };
    let conn = pool.get()?;
    db::insert_debt(&conn, &debt)?;
    Ok(Json(debt))
}

#[patch("/debts/<id>/pay", data = "<payment>")]
fn pay_debt(
    pool: &State<DbPool>,
    id: &str,
    payment: Json<DebtPayment>,
) -> Result<Json<Debt>, ApiError> {
    let conn = pool.get()?;
    let debt = db::find_debt(&conn, id)?.ok_or(ApiError::NotFound("Debt"))?;
    let paid_amount = debt.paid_amount + payment.amount;
    let status = DebtStatus::for_amounts(paid_amount, debt.total_amount);
    db::apply_payment(&conn, id, paid_amount, status)?;
    db::find_debt(&conn, id)?
        .map(Json)
        .ok_or(ApiError::NotFound("Debt"))
}

#[put("/debts/<id>", data = "<input>")]
fn update_debt(
    pool: &State<DbPool>,
    id: &str,
    input: Json<DebtInput>,
) -> Result<Json<Debt>, ApiError> {
    let input = input.into_inner();
    input.validate()?;
    let conn = pool.get()?;
    if db::update_debt(&conn, id, &input)? == 0 {
        return Err(ApiError::NotFound("Debt"));
    }
    db::find_debt(&conn, id)?
        .map(Json)
        .ok_or(ApiError::NotFound("Debt"))
}

#[delete("/debts/<id>")]
fn delete_debt(pool: &State<DbPool>, id: &str) -> Result<Json<Value>, ApiError> {
    let conn = pool.get()?;
    if db::delete_debt(&conn, id)? == 0 {
        return Err(ApiError::NotFound("Debt"));
    }
    Ok(Json(json!({ "message": "Debt deleted successfully" })))
}

#[get("/dashboard/summary")]
fn dashboard_summary(pool: &State<DbPool>) -> Result<Json<Summary>, ApiError> {
    let conn = pool.get()?;
    let income = db::list_income(&conn)?;
    let expenses = db::list_expenses(&conn)?;
    let debts = db::list_debts(&conn)?;
    Ok(Json(dashboard::summary(&income, &expenses, &debts, Utc::now())))
}

#[get("/dashboard/expenses-analysis?<period>")]
fn expenses_analysis(
    pool: &State<DbPool>,
    period: Option<String>,
) -> Result<Json<ExpenseAnalysis>, ApiError> {
    let conn = pool.get()?;
    let expenses = db::list_expenses(&conn)?;
    let names = db::category_names(&conn)?;
    Ok(Json(dashboard::expense_analysis(
        &expenses,
        &names,
        Period::parse(period.as_deref()),
        Utc::now(),
    )))
}

#[get("/dashboard/recent-transactions")]
fn recent_transactions(pool: &State<DbPool>) -> Result<Json<Vec<Transaction>>, ApiError> {
    let conn = pool.get()?;
    let income = db::recent_income(&conn, RECENT_FETCH_LIMIT)?;
    let expenses = db::recent_expenses(&conn, RECENT_FETCH_LIMIT)?;
    let names = db::category_names(&conn)?;
    Ok(Json(dashboard::recent_transactions(income, expenses, &names)))
}

fn database_path() -> PathBuf {
    std::env::var("FINANCE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new("data").join("finance.sqlite"))
}

fn build_rocket(pool: DbPool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .attach(Cors::from_env())
        .mount("/", routes![cors_preflight])
        .mount(
            "/api",
            routes![
                list_categories,
                create_category,
                update_category,
                delete_category,
                list_income,
                create_income,
                update_income,
                delete_income,
                list_expenses,
                create_expense,
                update_expense,
                delete_expense,
                list_debts,
                create_debt,
                pay_debt,
                update_debt,
                delete_debt,
                dashboard_summary,
                expenses_analysis,
                recent_transactions
            ],
        )
}

#[launch]
fn rocket() -> _ {
    let path = database_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).expect("create data directory");
    }
    let pool = db::init_db(&path);
    build_rocket(pool)
}
