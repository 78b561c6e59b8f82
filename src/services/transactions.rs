use crate::entities::transaction_record::{self, Entity as TransactionRecord, ProcessFlag, TransactionFlag};
use crate::errors::ServiceError;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::{debug, instrument};

/// Prefix of receipt numbers given to manual in/out slips.
pub const SLIP_PREFIX: &str = "io";

/// Persistence for `transaction_records`. Every method runs on whatever
/// connection or transaction the caller passes in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionStore;

impl TransactionStore {
    pub fn new() -> Self {
        Self
    }

    /// Inserts rows in order and returns them with their ids. A row with a
    /// receipt number replaces any stored row sharing its
    /// (date, receipt, line) key.
    #[instrument(skip(self, conn, records), fields(records = records.len()))]
    pub async fn insert_all<C: ConnectionTrait>(
        &self,
        conn: &C,
        records: &[transaction_record::Model],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let mut saved = Vec::with_capacity(records.len());
        let mut replaced = 0u64;
        for record in records {
            if !record.receipt_number.is_empty() {
                let res = TransactionRecord::delete_many()
                    .filter(transaction_record::Column::TransactionDate.eq(record.transaction_date))
                    .filter(transaction_record::Column::ReceiptNumber.eq(record.receipt_number.as_str()))
                    .filter(transaction_record::Column::LineNumber.eq(record.line_number.as_str()))
                    .exec(conn)
                    .await
                    .map_err(ServiceError::db_error)?;
                replaced += res.rows_affected;
            }
            let model = record
                .to_insert_model()
                .insert(conn)
                .await
                .map_err(ServiceError::db_error)?;
            saved.push(model);
        }
        debug!(inserted = saved.len(), replaced, "Persisted transaction records");
        Ok(saved)
    }

    /// Rewrites every column of an existing row.
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        record: &transaction_record::Model,
    ) -> Result<transaction_record::Model, ServiceError> {
        record
            .to_update_model()
            .update(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, conn))]
    pub async fn delete_by_receipt<C: ConnectionTrait>(
        &self,
        conn: &C,
        receipt_number: &str,
    ) -> Result<u64, ServiceError> {
        let res = TransactionRecord::delete_many()
            .filter(transaction_record::Column::ReceiptNumber.eq(receipt_number))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(res.rows_affected)
    }

    #[instrument(skip(self, conn))]
    pub async fn delete_by_flag_and_date<C: ConnectionTrait>(
        &self,
        conn: &C,
        flag: TransactionFlag,
        date: NaiveDate,
    ) -> Result<u64, ServiceError> {
        self.delete_by_flag_in_range(conn, flag, date, date).await
    }

    /// Deletes rows of one type dated within `from..=to`.
    #[instrument(skip(self, conn))]
    pub async fn delete_by_flag_in_range<C: ConnectionTrait>(
        &self,
        conn: &C,
        flag: TransactionFlag,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, ServiceError> {
        let res = TransactionRecord::delete_many()
            .filter(transaction_record::Column::Flag.eq(flag))
            .filter(transaction_record::Column::TransactionDate.gte(from))
            .filter(transaction_record::Column::TransactionDate.lte(to))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(res.rows_affected)
    }

    pub async fn list_provisional<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        TransactionRecord::find()
            .filter(transaction_record::Column::ProcessFlag.eq(ProcessFlag::Provisional))
            .order_by_asc(transaction_record::Column::Id)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_by_receipt<C: ConnectionTrait>(
        &self,
        conn: &C,
        receipt_number: &str,
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        TransactionRecord::find()
            .filter(transaction_record::Column::ReceiptNumber.eq(receipt_number))
            .order_by_asc(transaction_record::Column::Id)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Distinct receipt numbers recorded on a date, sorted.
    pub async fn receipts_for_date<C: ConnectionTrait>(
        &self,
        conn: &C,
        date: NaiveDate,
    ) -> Result<Vec<String>, ServiceError> {
        TransactionRecord::find()
            .select_only()
            .column(transaction_record::Column::ReceiptNumber)
            .distinct()
            .filter(transaction_record::Column::TransactionDate.eq(date))
            .filter(transaction_record::Column::ReceiptNumber.ne(""))
            .order_by_asc(transaction_record::Column::ReceiptNumber)
            .into_tuple()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Next free slip number for a date: `io{YYYYMMDD}{seq:03}`.
    pub async fn next_slip_receipt<C: ConnectionTrait>(
        &self,
        conn: &C,
        date: NaiveDate,
    ) -> Result<String, ServiceError> {
        let stem = slip_stem(date);
        let existing: Vec<String> = TransactionRecord::find()
            .select_only()
            .column(transaction_record::Column::ReceiptNumber)
            .distinct()
            .filter(transaction_record::Column::ReceiptNumber.starts_with(stem.as_str()))
            .into_tuple()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        let last = existing
            .iter()
            .filter_map(|r| r.strip_prefix(stem.as_str()))
            .filter_map(|seq| seq.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(format!("{stem}{:03}", last + 1))
    }

    /// Every row dated on or before `until`, in ledger order.
    pub async fn history_until<C: ConnectionTrait>(
        &self,
        conn: &C,
        until: NaiveDate,
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        TransactionRecord::find()
            .filter(transaction_record::Column::TransactionDate.lte(until))
            .order_by_asc(transaction_record::Column::TransactionDate)
            .order_by_asc(transaction_record::Column::Flag)
            .order_by_asc(transaction_record::Column::Id)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }
}

fn slip_stem(date: NaiveDate) -> String {
    format!("{SLIP_PREFIX}{}", date.format("%Y%m%d"))
}
