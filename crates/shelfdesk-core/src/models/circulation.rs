use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Loan {
    pub loan_id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub book: i64,
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub book_isbn: Option<String>,
    #[serde(default)]
    pub loan_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_overdue: bool,
}

impl Loan {
    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }

    /// Days past the due date as of `today`; zero once returned or not yet due.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_returned() {
            return 0;
        }
        (today - self.due_date).num_days().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanInput {
    pub user: i64,
    pub book: i64,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Ready,
    PickedUp,
    Active,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ReservationStatus {
    /// Whether the reservation still holds a place in the queue.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Ready | ReservationStatus::Active
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Reservation {
    pub reservation_id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub book: i64,
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub book_isbn: Option<String>,
    #[serde(default)]
    pub book_available_copies: Option<i64>,
    #[serde(default)]
    pub reservation_date: Option<String>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Fine {
    pub fine_id: i64,
    pub user: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub loan: Option<i64>,
    #[serde(default)]
    pub book_title: Option<String>,
    /// Decimal amount as sent by the server, e.g. `"2.50"`.
    pub amount: String,
    #[serde(default, deserialize_with = "flag")]
    pub paid: bool,
    #[serde(default)]
    pub date_issued: Option<String>,
}

/// Accept `true`/`false` as well as the `0`/`1` integer column.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_loan_and_overdue_days() {
        let json = r#"{"loan_id": 8, "user": 5, "user_name": "John Doe", "book": 12,
            "book_title": "Dune", "book_isbn": "9780441013593", "loan_date": "2026-09-01",
            "due_date": "2026-09-15", "return_date": null, "is_overdue": true}"#;
        let loan: Loan = serde_json::from_str(json).unwrap();
        assert!(!loan.is_returned());
        assert_eq!(loan.days_overdue(date(2026, 9, 20)), 5);
        assert_eq!(loan.days_overdue(date(2026, 9, 10)), 0);
    }

    #[test]
    fn test_returned_loan_is_never_overdue() {
        let json = r#"{"loan_id": 8, "user": 5, "book": 12, "due_date": "2026-09-15",
            "return_date": "2026-09-30"}"#;
        let loan: Loan = serde_json::from_str(json).unwrap();
        assert_eq!(loan.days_overdue(date(2026, 12, 1)), 0);
    }

    #[test]
    fn test_reservation_statuses() {
        let json = r#"{"reservation_id": 1, "user": 5, "book": 12, "status": "picked_up"}"#;
        let reservation: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(reservation.status, ReservationStatus::PickedUp);
        assert!(!reservation.status.is_open());

        let json = r#"{"reservation_id": 2, "user": 5, "book": 12, "status": "on_hold"}"#;
        let reservation: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(reservation.status, ReservationStatus::Unknown);
        assert!(ReservationStatus::Pending.is_open());
    }

    #[test]
    fn test_fine_paid_flag_accepts_int_or_bool() {
        let json = r#"{"fine_id": 1, "user": 5, "amount": "2.50", "paid": 0}"#;
        let fine: Fine = serde_json::from_str(json).unwrap();
        assert!(!fine.paid);

        let json = r#"{"fine_id": 2, "user": 5, "amount": "1.00", "paid": true}"#;
        let fine: Fine = serde_json::from_str(json).unwrap();
        assert!(fine.paid);
        assert_eq!(fine.amount, "1.00");
    }
}
