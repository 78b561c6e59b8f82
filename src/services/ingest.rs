use crate::entities::transaction_record::{self, TransactionFlag};
use crate::errors::ServiceError;
use crate::services::incoming::{IncomingLine, LineKind};
use crate::services::resolution::{ReprocessSummary, ResolutionService};
use crate::services::transactions::TransactionStore;
use chrono::NaiveDate;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Runs resolution and persistence for one feed batch inside a single
/// transaction. Nothing from a failed batch is kept, including masters and
/// sequence codes it allocated.
#[derive(Clone)]
pub struct IngestService {
    db: Arc<DatabaseConnection>,
    resolver: ResolutionService,
    store: TransactionStore,
}

impl IngestService {
    pub fn new(db: Arc<DatabaseConnection>, resolver: ResolutionService) -> Self {
        Self {
            db,
            resolver,
            store: TransactionStore::new(),
        }
    }

    async fn in_transaction<T, F, Fut>(&self, operation: &'static str, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(DatabaseTransaction) -> Fut,
        Fut: Future<Output = (DatabaseTransaction, Result<T, ServiceError>)>,
    {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let (txn, result) = work(txn).await;
        match result {
            Ok(value) => {
                txn.commit().await.map_err(ServiceError::db_error)?;
                counter!("pharmstock.ingest.committed", 1, "operation" => operation);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(operation, error = %rollback_err, "Rollback failed");
                }
                counter!("pharmstock.ingest.rolled_back", 1, "operation" => operation);
                warn!(operation, error = %err, "Batch rolled back");
                Err(err)
            }
        }
    }

    async fn resolve_and_store(
        &self,
        txn: &DatabaseTransaction,
        lines: &[IncomingLine],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let records = self.resolver.resolve(txn, lines).await?;
        self.store.insert_all(txn, &records).await
    }

    /// Resolves and appends a batch of lines from any feed.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn ingest_batch(
        &self,
        lines: &[IncomingLine],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let saved = self
            .in_transaction("ingest_batch", |txn| async move {
                let result = self.resolve_and_store(&txn, lines).await;
                (txn, result)
            })
            .await?;
        info!(saved = saved.len(), "Ingested batch");
        Ok(saved)
    }

    /// Replaces the dispensing history covering the batch's dates.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn replace_usage(
        &self,
        lines: &[IncomingLine],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        if let Some(line) = lines.iter().find(|l| l.kind != LineKind::Usage) {
            return Err(ServiceError::InvalidInput(format!(
                "usage import received a {} line",
                line.kind
            )));
        }
        let span = lines
            .iter()
            .map(|l| l.date)
            .min()
            .zip(lines.iter().map(|l| l.date).max());
        let Some((from, to)) = span else {
            return Ok(Vec::new());
        };

        self.in_transaction("replace_usage", |txn| async move {
            let result = async {
                let removed = self
                    .store
                    .delete_by_flag_in_range(&txn, TransactionFlag::Dispense, from, to)
                    .await?;
                info!(removed, %from, %to, "Cleared dispensing rows");
                self.resolve_and_store(&txn, lines).await
            }
            .await;
            (txn, result)
        })
        .await
    }

    /// Replaces the inventory count taken on `date`.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn replace_inventory(
        &self,
        date: NaiveDate,
        lines: &[IncomingLine],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        let lines: Vec<IncomingLine> = lines
            .iter()
            .map(|l| {
                let mut line = l.clone();
                line.kind = LineKind::InventoryCount;
                line.date = date;
                line
            })
            .collect();
        self.in_transaction("replace_inventory", |txn| async move {
            let result = async {
                let removed = self
                    .store
                    .delete_by_flag_and_date(&txn, TransactionFlag::InventoryCount, date)
                    .await?;
                info!(removed, %date, "Cleared inventory count");
                self.resolve_and_store(&txn, &lines).await
            }
            .await;
            (txn, result)
        })
        .await
    }

    /// Saves a manual receipt (flag 1) or outbound (flag 2) slip and returns
    /// its receipt number. With `original_receipt` the stored slip of that
    /// number is replaced and the number kept.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn save_slip(
        &self,
        date: NaiveDate,
        flag: TransactionFlag,
        client_code: &str,
        lines: &[IncomingLine],
        original_receipt: Option<&str>,
    ) -> Result<String, ServiceError> {
        if !matches!(flag, TransactionFlag::Receipt | TransactionFlag::Outbound) {
            return Err(ServiceError::InvalidInput(format!(
                "slips record receipts (1) or outbound (2), not flag {}",
                flag.code()
            )));
        }
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput("slip has no lines".to_string()));
        }
        let original_receipt = original_receipt.map(str::trim).filter(|r| !r.is_empty());

        self.in_transaction("save_slip", |txn| async move {
            let result = async {
                let receipt = match original_receipt {
                    Some(receipt) => {
                        let removed = self.store.delete_by_receipt(&txn, receipt).await?;
                        info!(removed, receipt, "Replacing slip");
                        receipt.to_string()
                    }
                    None => self.store.next_slip_receipt(&txn, date).await?,
                };
                let slip: Vec<IncomingLine> = lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| {
                        let mut line = l.clone();
                        line.kind = LineKind::Slip;
                        line.date = date;
                        line.flag = flag;
                        line.client_code = client_code.to_string();
                        line.receipt_number = receipt.clone();
                        line.line_number = (i + 1).to_string();
                        line
                    })
                    .collect();
                self.resolve_and_store(&txn, &slip).await?;
                Ok::<_, ServiceError>(receipt)
            }
            .await;
            (txn, result)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_slip(&self, receipt_number: &str) -> Result<u64, ServiceError> {
        let receipt_number = receipt_number.trim().to_string();
        self.in_transaction("cancel_slip", |txn| async move {
            let result = match self.store.delete_by_receipt(&txn, &receipt_number).await {
                Ok(0) => Err(ServiceError::NotFound(format!("slip {receipt_number}"))),
                other => other,
            };
            (txn, result)
        })
        .await
    }

    pub async fn reprocess_provisional(&self) -> Result<ReprocessSummary, ServiceError> {
        self.in_transaction("reprocess_provisional", |txn| async move {
            let result = self.resolver.reprocess_provisional(&txn).await;
            (txn, result)
        })
        .await
    }
}
