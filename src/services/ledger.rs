use crate::entities::product_master;
use crate::entities::transaction_record::{self, LedgerEffect, TransactionFlag};
use crate::errors::ServiceError;
use crate::services::units::UnitTable;
use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const PRODUCT_CHUNK: usize = 500;

/// Controlled-substance categories the ledger can be narrowed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DrugCategory {
    Poison,
    Deleterious,
    Narcotic,
    #[serde(rename = "psychotropic1")]
    #[strum(serialize = "psychotropic1")]
    Psychotropic1,
    #[serde(rename = "psychotropic2")]
    #[strum(serialize = "psychotropic2")]
    Psychotropic2,
    #[serde(rename = "psychotropic3")]
    #[strum(serialize = "psychotropic3")]
    Psychotropic3,
    Stimulant,
    StimulantRaw,
}

impl DrugCategory {
    fn condition(self) -> Condition {
        use product_master::Column;
        let expr = match self {
            DrugCategory::Poison => Column::FlagPoison.eq(1),
            DrugCategory::Deleterious => Column::FlagDeleterious.eq(1),
            DrugCategory::Narcotic => Column::FlagNarcotic.eq(1),
            DrugCategory::Psychotropic1 => Column::FlagPsychotropic.eq(1),
            DrugCategory::Psychotropic2 => Column::FlagPsychotropic.eq(2),
            DrugCategory::Psychotropic3 => Column::FlagPsychotropic.eq(3),
            DrugCategory::Stimulant => Column::FlagStimulant.eq(1),
            DrugCategory::StimulantRaw => Column::FlagStimulantRaw.eq(1),
        };
        Condition::all().add(expr)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Substring of the kana or display name.
    pub name: Option<String>,
    /// Any-of match; empty means every drug.
    #[serde(default)]
    pub categories: Vec<DrugCategory>,
    /// Only drugs never dispensed in the window.
    #[serde(default)]
    pub no_movement: bool,
    /// Multiplier on peak single dispense; the configured default when absent.
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub record: transaction_record::Model,
    pub running_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageLedger {
    /// `spec|inner_qty|unit` signature shared by same-sized packages.
    pub package_key: String,
    pub jan_unit_name: String,
    pub starting_balance: f64,
    pub net_change: f64,
    pub ending_balance: f64,
    pub max_usage: f64,
    pub reorder_point: f64,
    pub is_reorder_needed: bool,
    pub transactions: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugGroup {
    pub yj_code: String,
    pub product_name: String,
    pub yj_unit_name: String,
    pub starting_balance: f64,
    pub net_change: f64,
    pub ending_balance: f64,
    pub total_reorder_point: f64,
    pub is_reorder_needed: bool,
    pub package_ledgers: Vec<PackageLedger>,
}

pub fn package_key(master: &product_master::Model) -> String {
    format!(
        "{}|{}|{}",
        master.package_spec, master.jan_pack_inner_qty, master.yj_unit_name
    )
}

fn ledger_order(a: &transaction_record::Model, b: &transaction_record::Model) -> std::cmp::Ordering {
    a.transaction_date
        .cmp(&b.transaction_date)
        .then(a.flag.cmp(&b.flag))
        .then(a.id.cmp(&b.id))
}

/// Running balances and reorder figures for one package group.
///
/// The first inventory-count day anchors the ledger; rows before it are
/// listed at balance 0. Without any count the opening balance is implied
/// as if the ledger started one row earlier.
pub fn summarize_package(
    package_key: String,
    mut txs: Vec<transaction_record::Model>,
    coefficient: f64,
) -> PackageLedger {
    txs.sort_by(ledger_order);

    let jan_unit_name = txs
        .first()
        .map(|t| t.jan_unit_name.clone())
        .unwrap_or_default();
    let mut entries = Vec::with_capacity(txs.len());
    let anchor = txs
        .iter()
        .find(|t| t.flag == TransactionFlag::InventoryCount)
        .map(|t| t.transaction_date);

    let (starting_balance, ending_balance) = match anchor {
        Some(anchor_date) => {
            let starting: f64 = txs
                .iter()
                .filter(|t| {
                    t.transaction_date == anchor_date && t.flag == TransactionFlag::InventoryCount
                })
                .map(|t| t.yj_quantity)
                .sum();
            let mut balance = 0.0;
            let mut counted_on: Option<NaiveDate> = None;
            for t in txs {
                if t.transaction_date < anchor_date {
                    entries.push(LedgerEntry {
                        record: t,
                        running_balance: 0.0,
                    });
                    continue;
                }
                match t.flag.effect() {
                    LedgerEffect::Reset => {
                        // counts sort first within a day; later ones add up
                        if counted_on != Some(t.transaction_date) {
                            balance = 0.0;
                            counted_on = Some(t.transaction_date);
                        }
                        balance += t.yj_quantity;
                    }
                    LedgerEffect::Delta(sign) => balance += sign * t.yj_quantity,
                    LedgerEffect::Informational => {}
                }
                entries.push(LedgerEntry {
                    record: t,
                    running_balance: balance,
                });
            }
            (starting, balance)
        }
        None => {
            let starting = txs
                .first()
                .map(|t| -t.flag.signed(t.yj_quantity))
                .unwrap_or(0.0);
            let mut balance = starting;
            for t in txs {
                balance += t.flag.signed(t.yj_quantity);
                entries.push(LedgerEntry {
                    record: t,
                    running_balance: balance,
                });
            }
            (starting, balance)
        }
    };

    let max_usage = entries
        .iter()
        .filter(|e| e.record.flag == TransactionFlag::Dispense)
        .map(|e| e.record.yj_quantity)
        .fold(0.0, f64::max);
    let reorder_point = max_usage * coefficient;

    PackageLedger {
        package_key,
        jan_unit_name,
        starting_balance,
        net_change: ending_balance - starting_balance,
        ending_balance,
        max_usage,
        reorder_point,
        is_reorder_needed: ending_balance < reorder_point && max_usage > 0.0,
        transactions: entries,
    }
}

/// Drug-level totals over its package ledgers.
pub fn summarize_drug(
    yj_code: String,
    product_name: String,
    yj_unit_name: String,
    package_ledgers: Vec<PackageLedger>,
) -> DrugGroup {
    let starting_balance: f64 = package_ledgers.iter().map(|p| p.starting_balance).sum();
    let ending_balance: f64 = package_ledgers.iter().map(|p| p.ending_balance).sum();
    DrugGroup {
        yj_code,
        product_name,
        yj_unit_name,
        starting_balance,
        net_change: ending_balance - starting_balance,
        ending_balance,
        total_reorder_point: package_ledgers.iter().map(|p| p.reorder_point).sum(),
        is_reorder_needed: package_ledgers.iter().any(|p| p.is_reorder_needed),
        package_ledgers,
    }
}

/// Stock ledger aggregation engine. Read-only.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DatabaseConnection>,
    units: Arc<UnitTable>,
    default_coefficient: f64,
}

impl StockLedgerService {
    pub fn new(db: Arc<DatabaseConnection>, units: Arc<UnitTable>, default_coefficient: f64) -> Self {
        Self {
            db,
            units,
            default_coefficient,
        }
    }

    #[instrument(skip(self))]
    pub async fn build_ledger(&self, filters: &LedgerFilters) -> Result<Vec<DrugGroup>, ServiceError> {
        let coefficient = filters.coefficient.unwrap_or(self.default_coefficient);
        if !coefficient.is_finite() || coefficient <= 0.0 {
            return Err(ServiceError::InvalidInput(format!(
                "reorder coefficient must be positive, got {coefficient}"
            )));
        }
        if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
            if start > end {
                return Err(ServiceError::InvalidInput(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }

        // one read transaction for a consistent view of masters and rows
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let mut master_query = product_master::Entity::find()
            .filter(product_master::Column::YjCode.ne(""))
            .order_by_asc(product_master::Column::ProductCode);
        if let Some(name) = filters.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            master_query = master_query.filter(
                Condition::any()
                    .add(product_master::Column::KanaName.contains(name))
                    .add(product_master::Column::ProductName.contains(name)),
            );
        }
        if !filters.categories.is_empty() {
            let any = filters
                .categories
                .iter()
                .fold(Condition::any(), |cond, c| cond.add(c.condition()));
            master_query = master_query.filter(any);
        }
        let masters = master_query.all(&txn).await.map_err(ServiceError::db_error)?;

        let product_codes: Vec<String> = masters.iter().map(|m| m.product_code.clone()).collect();
        let mut txs_by_product: HashMap<String, Vec<transaction_record::Model>> = HashMap::new();
        for chunk in product_codes.chunks(PRODUCT_CHUNK) {
            let mut query = transaction_record::Entity::find()
                .filter(transaction_record::Column::ProductCode.is_in(chunk.iter().cloned()));
            if let Some(start) = filters.start_date {
                query = query.filter(transaction_record::Column::TransactionDate.gte(start));
            }
            if let Some(end) = filters.end_date {
                query = query.filter(transaction_record::Column::TransactionDate.lte(end));
            }
            let rows = query
                .order_by_asc(transaction_record::Column::TransactionDate)
                .order_by_asc(transaction_record::Column::Flag)
                .order_by_asc(transaction_record::Column::Id)
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            for row in rows {
                txs_by_product.entry(row.product_code.clone()).or_default().push(row);
            }
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        let mut masters_by_yj: BTreeMap<String, Vec<product_master::Model>> = BTreeMap::new();
        for master in masters {
            masters_by_yj.entry(master.yj_code.clone()).or_default().push(master);
        }

        let mut groups = Vec::new();
        let mut sort_keys = HashMap::new();
        for (yj_code, masters) in masters_by_yj {
            let mut txs_by_package: BTreeMap<String, Vec<transaction_record::Model>> = BTreeMap::new();
            for master in &masters {
                if let Some(txs) = txs_by_product.remove(&master.product_code) {
                    txs_by_package
                        .entry(package_key(master))
                        .or_default()
                        .extend(txs);
                }
            }

            let dispensed = txs_by_package
                .values()
                .flatten()
                .any(|t| t.flag == TransactionFlag::Dispense);
            let moved = txs_by_package.values().any(|txs| !txs.is_empty());
            let keep = if filters.no_movement { !dispensed } else { moved };
            if !keep {
                continue;
            }

            let packages = txs_by_package
                .into_iter()
                .map(|(key, txs)| summarize_package(key, txs, coefficient))
                .collect();
            let first = &masters[0];
            sort_keys.insert(yj_code.clone(), first.kana_name.clone());
            groups.push(summarize_drug(
                yj_code,
                first.product_name.clone(),
                self.units.resolve_name(&first.yj_unit_name).to_string(),
                packages,
            ));
        }

        groups.sort_by(|a: &DrugGroup, b: &DrugGroup| {
            sort_keys
                .get(&a.yj_code)
                .cmp(&sort_keys.get(&b.yj_code))
                .then_with(|| a.yj_code.cmp(&b.yj_code))
        });

        debug!(coefficient, "Ledger coefficient");
        info!(drugs = groups.len(), no_movement = filters.no_movement, "Built stock ledger");
        Ok(groups)
    }
}
