use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Label an expense resolves to when its category no longer exists.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("category name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeKind {
    FixedMonthly,
    Extra,
}

impl IncomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IncomeKind::FixedMonthly => "fixed-monthly",
            IncomeKind::Extra => "extra",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fixed-monthly" => Some(IncomeKind::FixedMonthly),
            "extra" => Some(IncomeKind::Extra),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: String,
    pub amount: f64,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: IncomeKind,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct IncomeInput {
    pub amount: f64,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: IncomeKind,
    pub date: DateTime<Utc>,
}

impl IncomeInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.amount < 0.0 {
            return Err(ApiError::Validation("income amount must not be negative".into()));
        }
        if self.source.trim().is_empty() {
            return Err(ApiError::Validation("income source must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_id: String,
    pub category_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    pub amount: f64,
    pub description: String,
    pub date: DateTime<Utc>,
    pub category_id: String,
}

impl ExpenseInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.amount < 0.0 {
            return Err(ApiError::Validation("expense amount must not be negative".into()));
        }
        if self.description.trim().is_empty() {
            return Err(ApiError::Validation("expense description must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Active,
    Paid,
}

impl DebtStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DebtStatus::Active => "active",
            DebtStatus::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(DebtStatus::Active),
            "paid" => Some(DebtStatus::Paid),
            _ => None,
        }
    }

    /// Derived on every write that touches the amounts: paid iff the debt
    /// is covered in full.
    pub fn for_amounts(paid: f64, total: f64) -> Self {
        if paid >= total {
            DebtStatus::Paid
        } else {
            DebtStatus::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: String,
    pub name: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub status: DebtStatus,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtInput {
    pub name: String,
    pub total_amount: f64,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl DebtInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("debt name must not be empty".into()));
        }
        if self.total_amount < 0.0 {
            return Err(ApiError::Validation("debt total amount must not be negative".into()));
        }
        Ok(())
    }
}

/// Payment amounts are deliberately unchecked: a negative amount acts as a
/// refund and can flip a settled debt back to active.
#[derive(Debug, Deserialize)]
pub struct DebtPayment {
    pub amount: f64,
}
