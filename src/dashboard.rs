use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Debt, DebtStatus, Expense, Income, UNKNOWN_CATEGORY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Missing or unrecognized values fall back to monthly rather than
    /// being rejected.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("daily") => Period::Daily,
            Some("weekly") => Period::Weekly,
            _ => Period::Monthly,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: f64,
    pub total_expense: f64,
    pub net_balance: f64,
    pub total_active_debt: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub amount: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct CategorySlice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseAnalysis {
    pub period: Period,
    pub bar_data: Vec<SeriesPoint>,
    pub pie_data: Vec<CategorySlice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

#[derive(Debug, Serialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub date: String,
    pub category: String,
}

/// [first instant of the current month, first instant of the next month)
/// in UTC.
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    let end = if now.month() == 12 {
        Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0)
    } else {
        Utc.with_ymd_and_hms(now.year(), now.month() + 1, 1, 0, 0, 0)
    }
    .unwrap();
    (start, end)
}

pub fn summary(
    income: &[Income],
    expenses: &[Expense],
    debts: &[Debt],
    now: DateTime<Utc>,
) -> Summary {
    let (start, end) = month_window(now);
    let total_income: f64 = income
        .iter()
        .filter(|item| item.date >= start && item.date < end)
        .map(|item| item.amount)
        .sum();
    let total_expense: f64 = expenses
        .iter()
        .filter(|item| item.date >= start && item.date < end)
        .map(|item| item.amount)
        .sum();
    let total_active_debt: f64 = debts
        .iter()
        .filter(|debt| debt.status == DebtStatus::Active)
        .map(|debt| debt.total_amount - debt.paid_amount)
        .sum();

    Summary {
        total_income,
        total_expense,
        net_balance: total_income - total_expense,
        total_active_debt,
    }
}

fn in_window(date: DateTime<Utc>, period: Period, now: DateTime<Utc>) -> bool {
    match period {
        Period::Daily => date.date_naive() == now.date_naive(),
        Period::Weekly => date >= now - Duration::days(7),
        Period::Monthly => date >= month_window(now).0,
    }
}

// Bucket label shown on the chart plus a sort key that orders buckets by the
// underlying time, not the label text.
fn bucket(date: DateTime<Utc>, period: Period) -> (String, String) {
    match period {
        Period::Daily => (date.format("%H:00").to_string(), date.format("%H").to_string()),
        Period::Weekly => (date.format("%a").to_string(), date.format("%Y%m%d").to_string()),
        Period::Monthly => (date.day().to_string(), format!("{:02}", date.day())),
    }
}

pub fn expense_analysis(
    expenses: &[Expense],
    categories: &HashMap<String, String>,
    period: Period,
    now: DateTime<Utc>,
) -> ExpenseAnalysis {
    let filtered: Vec<&Expense> = expenses
        .iter()
        .filter(|expense| in_window(expense.date, period, now))
        .collect();

    let mut totals: HashMap<String, f64> = HashMap::new();
    // First-seen sort key per label. Distinct weeks sharing a weekday label
    // collapse into one bucket; a known coarsening of the weekly view.
    let mut order: HashMap<String, String> = HashMap::new();
    for expense in &filtered {
        let (label, sort_key) = bucket(expense.date, period);
        *totals.entry(label.clone()).or_insert(0.0) += expense.amount;
        order.entry(label).or_insert(sort_key);
    }

    let mut labels: Vec<String> = totals.keys().cloned().collect();
    labels.sort_by(|a, b| order[a].cmp(&order[b]));
    let bar_data = labels
        .into_iter()
        .map(|label| SeriesPoint {
            amount: totals[&label],
            date: label,
        })
        .collect();

    let mut by_category: HashMap<String, f64> = HashMap::new();
    for expense in &filtered {
        let name = categories
            .get(&expense.category_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        *by_category.entry(name).or_insert(0.0) += expense.amount;
    }
    let pie_data = by_category
        .into_iter()
        .map(|(name, value)| CategorySlice { name, value })
        .collect();

    ExpenseAnalysis {
        period,
        bar_data,
        pie_data,
    }
}

pub fn recent_transactions(
    income: Vec<Income>,
    expenses: Vec<Expense>,
    categories: &HashMap<String, String>,
) -> Vec<Transaction> {
    let mut out: Vec<Transaction> = Vec::with_capacity(income.len() + expenses.len());
    for item in income {
        out.push(Transaction {
            kind: TransactionKind::Income,
            amount: item.amount,
            description: item.source,
            date: item.date.to_rfc3339(),
            category: item.kind.as_str().to_string(),
        });
    }
    for item in expenses {
        let category = categories
            .get(&item.category_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        out.push(Transaction {
            kind: TransactionKind::Expense,
            amount: item.amount,
            description: item.description,
            date: item.date.to_rfc3339(),
            category,
        });
    }

    // Lexicographic order on uniform RFC 3339 strings matches chronological
    // order.
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out.truncate(10);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncomeKind;

    fn income(amount: f64, date: DateTime<Utc>) -> Income {
        Income {
            id: format!("i-{amount}"),
            amount,
            source: "salary".to_string(),
            kind: IncomeKind::FixedMonthly,
            date,
        }
    }

    fn expense(amount: f64, date: DateTime<Utc>, category_id: &str) -> Expense {
        Expense {
            id: format!("e-{amount}"),
            amount,
            description: "stuff".to_string(),
            date,
            category_id: category_id.to_string(),
            category_name: String::new(),
        }
    }

    fn debt(total: f64, paid: f64) -> Debt {
        Debt {
            id: format!("d-{total}"),
            name: "loan".to_string(),
            total_amount: total,
            paid_amount: paid,
            status: DebtStatus::for_amounts(paid, total),
            due_date: None,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn month_window_rolls_over_december() {
        let (start, end) = month_window(at(2026, 12, 15, 10));
        assert_eq!(start, at(2026, 12, 1, 0));
        assert_eq!(end, at(2027, 1, 1, 0));
    }

    #[test]
    fn summary_counts_only_the_current_month() {
        let now = at(2026, 8, 27, 12);
        let income_rows = vec![
            income(1000.0, at(2026, 8, 1, 0)),  // inclusive lower bound
            income(500.0, at(2026, 8, 20, 9)),
            income(999.0, at(2026, 7, 31, 23)), // previous month
            income(999.0, at(2026, 9, 1, 0)),   // exclusive upper bound
        ];
        let expense_rows = vec![
            expense(300.0, at(2026, 8, 10, 8), "c1"),
            expense(77.0, at(2026, 6, 2, 8), "c1"),
        ];
        let debts = vec![debt(500.0, 200.0), debt(100.0, 100.0)];

        let got = summary(&income_rows, &expense_rows, &debts, now);
        assert_eq!(got.total_income, 1500.0);
        assert_eq!(got.total_expense, 300.0);
        assert_eq!(got.net_balance, 1200.0);
        // The settled debt contributes nothing.
        assert_eq!(got.total_active_debt, 300.0);
    }

    #[test]
    fn daily_buckets_by_hour_sorted() {
        let now = at(2026, 8, 27, 20);
        let rows = vec![
            expense(5.0, at(2026, 8, 27, 14), "c1"),
            expense(3.0, at(2026, 8, 27, 9), "c1"),
            expense(2.0, at(2026, 8, 27, 14), "c1"),
            expense(9.0, at(2026, 8, 26, 14), "c1"), // yesterday
        ];
        let got = expense_analysis(&rows, &HashMap::new(), Period::Daily, now);
        assert_eq!(
            got.bar_data,
            vec![
                SeriesPoint { date: "09:00".to_string(), amount: 3.0 },
                SeriesPoint { date: "14:00".to_string(), amount: 7.0 },
            ]
        );
    }

    #[test]
    fn weekly_merges_same_weekday_across_weeks() {
        let now = at(2026, 8, 27, 12);
        // Aug 20 and Aug 27 2026 are both Thursdays and both inside the
        // seven-day lookback.
        let rows = vec![
            expense(10.0, at(2026, 8, 20, 12), "c1"),
            expense(4.0, at(2026, 8, 27, 8), "c1"),
            expense(6.0, at(2026, 8, 24, 8), "c1"),
        ];
        let got = expense_analysis(&rows, &HashMap::new(), Period::Weekly, now);
        assert_eq!(
            got.bar_data,
            vec![
                SeriesPoint { date: "Thu".to_string(), amount: 14.0 },
                SeriesPoint { date: "Mon".to_string(), amount: 6.0 },
            ]
        );
    }

    #[test]
    fn monthly_bars_sort_numerically_not_lexically() {
        let now = at(2026, 8, 27, 12);
        let rows = vec![
            expense(1.0, at(2026, 8, 10, 8), "c1"),
            expense(2.0, at(2026, 8, 2, 8), "c1"),
            expense(3.0, at(2026, 8, 15, 8), "c1"),
        ];
        let got = expense_analysis(&rows, &HashMap::new(), Period::Monthly, now);
        let labels: Vec<&str> = got.bar_data.iter().map(|point| point.date.as_str()).collect();
        assert_eq!(labels, vec!["2", "10", "15"]);
    }

    #[test]
    fn analysis_example_from_three_expenses() {
        let now = at(2026, 8, 27, 12);
        let mut categories = HashMap::new();
        categories.insert("a".to_string(), "categoryA".to_string());
        categories.insert("b".to_string(), "categoryB".to_string());
        let rows = vec![
            expense(10.0, at(2026, 8, 1, 9), "a"),
            expense(5.0, at(2026, 8, 1, 10), "b"),
            expense(20.0, at(2026, 8, 15, 9), "a"),
        ];

        let got = expense_analysis(&rows, &categories, Period::Monthly, now);
        assert_eq!(
            got.bar_data,
            vec![
                SeriesPoint { date: "1".to_string(), amount: 15.0 },
                SeriesPoint { date: "15".to_string(), amount: 20.0 },
            ]
        );
        let mut pie = got.pie_data;
        pie.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            pie,
            vec![
                CategorySlice { name: "categoryA".to_string(), value: 30.0 },
                CategorySlice { name: "categoryB".to_string(), value: 5.0 },
            ]
        );

        let bar_total: f64 = got.bar_data.iter().map(|point| point.amount).sum();
        let pie_total: f64 = pie.iter().map(|slice| slice.value).sum();
        assert_eq!(bar_total, 35.0);
        assert_eq!(pie_total, 35.0);
    }

    #[test]
    fn dangling_category_falls_back_to_unknown() {
        let now = at(2026, 8, 27, 12);
        let rows = vec![expense(12.0, at(2026, 8, 5, 9), "gone")];
        let got = expense_analysis(&rows, &HashMap::new(), Period::Monthly, now);
        assert_eq!(
            got.pie_data,
            vec![CategorySlice { name: UNKNOWN_CATEGORY.to_string(), value: 12.0 }]
        );
    }

    #[test]
    fn period_parse_falls_back_to_monthly() {
        assert_eq!(Period::parse(Some("daily")), Period::Daily);
        assert_eq!(Period::parse(Some("weekly")), Period::Weekly);
        assert_eq!(Period::parse(Some("monthly")), Period::Monthly);
        assert_eq!(Period::parse(Some("yearly")), Period::Monthly);
        assert_eq!(Period::parse(None), Period::Monthly);
    }

    #[test]
    fn recent_transactions_merge_sort_and_truncate() {
        let categories = HashMap::new();
        let income_rows: Vec<Income> =
            (1..=6).map(|day| income(day as f64, at(2026, 8, day, 10))).collect();
        let expense_rows: Vec<Expense> =
            (7..=12).map(|day| expense(day as f64, at(2026, 8, day, 10), "c1")).collect();

        let got = recent_transactions(income_rows, expense_rows, &categories);
        assert_eq!(got.len(), 10);
        for pair in got.windows(2) {
            assert!(pair[0].date >= pair[1].date);
        }
        assert_eq!(got[0].kind, TransactionKind::Expense);
        assert_eq!(got[0].amount, 12.0);
    }

    #[test]
    fn transactions_carry_source_and_kind_labels() {
        let mut categories = HashMap::new();
        categories.insert("c1".to_string(), "Food".to_string());
        let income_rows = vec![income(100.0, at(2026, 8, 27, 10))];
        let expense_rows = vec![expense(30.0, at(2026, 8, 26, 10), "c1")];

        let got = recent_transactions(income_rows, expense_rows, &categories);
        assert_eq!(got[0].description, "salary");
        assert_eq!(got[0].category, "fixed-monthly");
        assert_eq!(got[1].description, "stuff");
        assert_eq!(got[1].category, "Food");
    }
}
