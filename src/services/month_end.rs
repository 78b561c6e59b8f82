use crate::entities::transaction_record::{self, LedgerEffect, ProcessFlag, TransactionFlag};
use crate::errors::ServiceError;
use crate::services::catalog;
use crate::services::transactions::TransactionStore;
use crate::services::units::UnitTable;
use chrono::{Datelike, Months, NaiveDate};
use metrics::counter;
use sea_orm::{
    DatabaseConnection, DatabaseTransaction, EntityTrait, QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Receipt prefix of month-end snapshot rows.
pub const MONTH_END_PREFIX: &str = "ZA";

/// Last calendar day of `year-month`.
pub fn month_end(year: i32, month: u32) -> Result<NaiveDate, ServiceError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| ServiceError::InvalidInput(format!("invalid month {year}-{month:02}")))
}

/// Parses `YYYY-MM`.
pub fn parse_month(raw: &str) -> Result<(i32, u32), ServiceError> {
    let invalid = || ServiceError::InvalidInput(format!("expected YYYY-MM, got {raw:?}"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    month_end(year, month)?;
    Ok((year, month))
}

/// Closing YJ balance of one product's history.
///
/// Starts from the latest inventory-count day (summing that day's counts)
/// and adds every signed movement from that day on.
pub fn closing_balance(rows: &[transaction_record::Model]) -> f64 {
    let anchor = rows
        .iter()
        .filter(|r| r.flag == TransactionFlag::InventoryCount)
        .map(|r| r.transaction_date)
        .max();
    rows.iter()
        .filter(|r| anchor.map_or(true, |a| r.transaction_date >= a))
        .fold(0.0, |balance, r| match r.flag.effect() {
            LedgerEffect::Reset => balance + r.yj_quantity,
            LedgerEffect::Delta(sign) => balance + sign * r.yj_quantity,
            LedgerEffect::Informational => balance,
        })
}

#[derive(Clone)]
pub struct MonthEndService {
    db: Arc<DatabaseConnection>,
    units: Arc<UnitTable>,
    store: TransactionStore,
}

impl MonthEndService {
    pub fn new(db: Arc<DatabaseConnection>, units: Arc<UnitTable>) -> Self {
        Self {
            db,
            units,
            store: TransactionStore::new(),
        }
    }

    /// Recomputes the month-end snapshot for `year-month`, replacing any
    /// earlier run, and returns the saved snapshot rows.
    #[instrument(skip(self))]
    pub async fn close_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let closing_date = month_end(year, month)?;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        match self.write_snapshot(&txn, closing_date).await {
            Ok(saved) => {
                txn.commit().await.map_err(ServiceError::db_error)?;
                counter!("pharmstock.month_end.snapshots", saved.len() as u64);
                info!(%closing_date, snapshots = saved.len(), "Closed month");
                Ok(saved)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                warn!(%closing_date, error = %err, "Month-end close rolled back");
                Err(err)
            }
        }
    }

    async fn write_snapshot(
        &self,
        txn: &DatabaseTransaction,
        closing_date: NaiveDate,
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let removed = self
            .store
            .delete_by_flag_and_date(txn, TransactionFlag::MonthEnd, closing_date)
            .await?;
        if removed > 0 {
            info!(removed, %closing_date, "Replacing earlier month-end snapshot");
        }

        let mut by_product: BTreeMap<String, Vec<transaction_record::Model>> = BTreeMap::new();
        for row in self.store.history_until(txn, closing_date).await? {
            by_product.entry(row.product_code.clone()).or_default().push(row);
        }
        if by_product.is_empty() {
            return Ok(Vec::new());
        }

        let codes: Vec<String> = by_product.keys().cloned().collect();
        let masters = catalog::masters_by_codes(txn, &codes).await?;
        let receipt = format!("{MONTH_END_PREFIX}{}", closing_date.format("%Y%m%d"));

        let mut snapshots = Vec::with_capacity(by_product.len());
        for (product_code, rows) in &by_product {
            let Some(master) = masters.get(product_code) else {
                warn!(%product_code, "No master for product with history; skipping snapshot");
                continue;
            };
            let mut record = transaction_record::Model::blank(closing_date, TransactionFlag::MonthEnd);
            record.receipt_number = receipt.clone();
            record.line_number = (snapshots.len() + 1).to_string();
            record.product_code = master.product_code.clone();
            record.yj_code = master.yj_code.clone();
            record.product_name = master.product_name.clone();
            record.kana_name = master.kana_name.clone();
            record.maker_name = master.maker_name.clone();
            record.package_form = master.package_spec.clone();
            record.package_spec = self.units.format_package_spec(master);
            record.yj_pack_unit_qty = master.yj_pack_unit_qty;
            record.jan_pack_unit_qty = master.jan_pack_unit_qty;
            record.jan_pack_inner_qty = master.jan_pack_inner_qty;
            record.yj_unit_name = self.units.resolve_name(&master.yj_unit_name).to_string();
            record.jan_unit_code = master.jan_unit_code.to_string();
            record.jan_unit_name = self
                .units
                .jan_unit_name(&record.jan_unit_code, &master.yj_unit_name);
            record.flag_poison = master.flag_poison;
            record.flag_deleterious = master.flag_deleterious;
            record.flag_narcotic = master.flag_narcotic;
            record.flag_psychotropic = master.flag_psychotropic;
            record.flag_stimulant = master.flag_stimulant;
            record.flag_stimulant_raw = master.flag_stimulant_raw;
            record.yj_quantity = closing_balance(rows);
            record.set_process_flag(ProcessFlag::Complete);
            snapshots.push(record);
        }

        self.store.insert_all(txn, &snapshots).await
    }

    /// Months (`YYYY-MM`) that have at least one transaction row.
    pub async fn months_with_activity(&self) -> Result<Vec<String>, ServiceError> {
        let dates: Vec<NaiveDate> = transaction_record::Entity::find()
            .select_only()
            .column(transaction_record::Column::TransactionDate)
            .distinct()
            .order_by_asc(transaction_record::Column::TransactionDate)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        let months: BTreeSet<String> = dates
            .into_iter()
            .map(|d| format!("{}-{:02}", d.year(), d.month()))
            .collect();
        Ok(months.into_iter().collect())
    }
}
