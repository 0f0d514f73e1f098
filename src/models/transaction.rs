use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PeriodKey;

/// One normalized card transaction from the statement export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction date; time of day is discarded.
    pub date: NaiveDate,
    /// Merchant name as exported.
    pub business: String,
    /// English merchant name, or `business` when no translation is known.
    pub business_translated: String,
    /// Category as exported.
    pub category: String,
    /// English category, or `category` when no translation is known.
    pub category_translated: String,
    /// Last four digits of the card, if the export row carried them.
    pub card: Option<String>,
    /// Charged amount; refunds are negative.
    pub amount: Decimal,
}

impl TransactionRecord {
    /// Year-month bucket used for grouping.
    pub fn period(&self) -> PeriodKey {
        PeriodKey::from_date(self.date)
    }
}
