mod period;
mod transaction;

pub use period::PeriodKey;
pub use transaction::TransactionRecord;
