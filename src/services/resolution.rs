use crate::entities::product_master;
use crate::entities::reference_catalog;
use crate::entities::transaction_record::{self, ProcessFlag};
use crate::errors::ServiceError;
use crate::services::catalog::{self, ReferenceProduct};
use crate::services::incoming::{
    convert, derive_key, is_missing_code, is_synthetic_key, IncomingLine, LineKind, PackFactors,
};
use crate::services::sequence::SequenceGenerator;
use crate::services::transactions::TransactionStore;
use crate::services::units::UnitTable;
use metrics::counter;
use sea_orm::DatabaseTransaction;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Which rule produced a line's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionBranch {
    LocalMaster,
    Reference,
    ReferenceNewCode,
    Provisional,
}

/// Masters and reference rows fetched for one batch, plus the masters the
/// batch itself created. Lives exactly as long as one resolve call.
#[derive(Debug, Default)]
pub struct BatchCache {
    masters: HashMap<String, product_master::Model>,
    references: HashMap<String, reference_catalog::Model>,
}

impl BatchCache {
    /// One bulk query per table for the distinct keys and real codes.
    pub async fn prefetch(
        txn: &DatabaseTransaction,
        keys: BTreeSet<String>,
        codes: BTreeSet<String>,
    ) -> Result<Self, ServiceError> {
        let keys: Vec<String> = keys.into_iter().collect();
        let codes: Vec<String> = codes.into_iter().collect();
        let masters = if keys.is_empty() {
            HashMap::new()
        } else {
            catalog::masters_by_codes(txn, &keys).await?
        };
        let references = if codes.is_empty() {
            HashMap::new()
        } else {
            catalog::references_by_codes(txn, &codes).await?
        };
        Ok(Self {
            masters,
            references,
        })
    }

    pub fn master(&self, key: &str) -> Option<&product_master::Model> {
        self.masters.get(key)
    }

    pub fn reference(&self, code: &str) -> Option<&reference_catalog::Model> {
        self.references.get(code)
    }

    pub fn remember(&mut self, key: String, master: product_master::Model) {
        self.masters.insert(key, master);
    }
}

#[derive(Debug, Clone)]
struct Identity {
    master: product_master::Model,
    process_flag: ProcessFlag,
    branch: ResolutionBranch,
}

/// Outcome of a reprocessing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReprocessSummary {
    /// PROVISIONAL rows examined.
    pub scanned: usize,
    /// Rows rewritten with fresher master data.
    pub refreshed: usize,
    /// Rows moved from PROVISIONAL to COMPLETE.
    pub upgraded: usize,
}

/// Master-data resolution engine.
///
/// Every call runs on a caller-owned transaction; masters and sequence codes
/// it creates disappear with it on rollback.
#[derive(Debug, Clone)]
pub struct ResolutionService {
    units: Arc<UnitTable>,
    sequence: SequenceGenerator,
}

impl ResolutionService {
    pub fn new(units: Arc<UnitTable>, sequence: SequenceGenerator) -> Self {
        Self { units, sequence }
    }

    /// Resolves every line to a product identity, creating masters as needed,
    /// and returns unsaved transaction rows in input order.
    #[instrument(skip(self, txn, lines), fields(lines = lines.len()))]
    pub async fn resolve(
        &self,
        txn: &DatabaseTransaction,
        lines: &[IncomingLine],
    ) -> Result<Vec<transaction_record::Model>, ServiceError> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        for line in lines {
            line.validate()?;
        }

        let keys = lines.iter().map(IncomingLine::key).collect();
        let codes = lines
            .iter()
            .filter_map(|l| l.real_code().map(str::to_string))
            .collect();
        let mut cache = BatchCache::prefetch(txn, keys, codes).await?;

        let mut records = Vec::with_capacity(lines.len());
        let mut created = 0usize;
        for line in lines {
            let key = line.key();
            let identity = self
                .identify(txn, &mut cache, &key, line.real_code(), &line.product_name, true)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!("no identity produced for key {key}"))
                })?;
            if identity.branch != ResolutionBranch::LocalMaster {
                created += 1;
            }
            records.push(self.build_record(line, &identity));
        }

        info!(
            records = records.len(),
            masters_created = created,
            "Resolved batch"
        );
        Ok(records)
    }

    /// Re-matches PROVISIONAL rows against the current catalog. Never creates
    /// provisional masters and never touches COMPLETE rows.
    #[instrument(skip(self, txn))]
    pub async fn reprocess_provisional(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ReprocessSummary, ServiceError> {
        let store = TransactionStore::new();
        let rows = store.list_provisional(txn).await?;
        let mut summary = ReprocessSummary {
            scanned: rows.len(),
            ..Default::default()
        };
        if rows.is_empty() {
            return Ok(summary);
        }

        let keys = rows
            .iter()
            .map(|r| derive_key(&r.product_code, &r.product_name))
            .collect();
        let codes = rows
            .iter()
            .filter(|r| !is_missing_code(&r.product_code) && !is_synthetic_key(&r.product_code))
            .map(|r| r.product_code.trim().to_string())
            .collect();
        let mut cache = BatchCache::prefetch(txn, keys, codes).await?;

        for mut row in rows {
            let key = derive_key(&row.product_code, &row.product_name);
            let real_code = (!is_missing_code(&row.product_code) && !is_synthetic_key(&row.product_code))
                .then(|| row.product_code.trim().to_string());
            let Some(identity) = self
                .identify(txn, &mut cache, &key, real_code.as_deref(), &row.product_name, false)
                .await?
            else {
                continue;
            };

            let kind = LineKind::for_flag(row.flag);
            let ground_truth = match kind {
                LineKind::Usage => row.yj_quantity,
                LineKind::InventoryCount => row.jan_quantity,
                LineKind::Delivery | LineKind::Slip => row.dat_quantity,
            };
            self.apply_master(&mut row, &identity.master, None);
            let q = convert(kind, ground_truth, PackFactors::from(&identity.master));
            row.dat_quantity = q.dat;
            row.jan_quantity = q.jan;
            row.yj_quantity = q.yj;

            if identity.process_flag == ProcessFlag::Complete {
                row.set_process_flag(ProcessFlag::Complete);
                summary.upgraded += 1;
            }
            store.update(txn, &row).await?;
            summary.refreshed += 1;
        }

        counter!("pharmstock.resolution.reprocess_upgraded", summary.upgraded as u64);
        info!(
            scanned = summary.scanned,
            refreshed = summary.refreshed,
            upgraded = summary.upgraded,
            "Reprocessed provisional transactions"
        );
        Ok(summary)
    }

    /// First matching rule wins: local master, reference with drug code,
    /// reference without drug code, then (if allowed) a provisional master.
    async fn identify(
        &self,
        txn: &DatabaseTransaction,
        cache: &mut BatchCache,
        key: &str,
        real_code: Option<&str>,
        product_name: &str,
        allow_provisional: bool,
    ) -> Result<Option<Identity>, ServiceError> {
        if let Some(master) = cache.master(key) {
            let process_flag = if master.is_jcshms() {
                ProcessFlag::Complete
            } else {
                ProcessFlag::Provisional
            };
            return Ok(Some(self.record_branch(Identity {
                master: master.clone(),
                process_flag,
                branch: ResolutionBranch::LocalMaster,
            })));
        }

        if let Some(raw) = real_code.and_then(|code| cache.reference(code)) {
            let reference = ReferenceProduct::parse(raw)?;
            let (yj_code, branch) = if reference.has_yj_code() {
                (reference.yj_code.clone(), ResolutionBranch::Reference)
            } else {
                (
                    self.sequence.next(txn).await?,
                    ResolutionBranch::ReferenceNewCode,
                )
            };
            let master = reference.to_master(&reference.jan_code, &yj_code);
            catalog::insert_master(txn, &master).await?;
            cache.remember(key.to_string(), master.clone());
            return Ok(Some(self.record_branch(Identity {
                master,
                process_flag: ProcessFlag::Complete,
                branch,
            })));
        }

        if !allow_provisional {
            return Ok(None);
        }

        // key is the real code when there is one, the synthetic key otherwise
        let yj_code = self.sequence.next(txn).await?;
        let master = product_master::Model::provisional(
            key.to_string(),
            yj_code,
            product_name.to_string(),
        );
        catalog::insert_master(txn, &master).await?;
        cache.remember(key.to_string(), master.clone());
        Ok(Some(self.record_branch(Identity {
            master,
            process_flag: ProcessFlag::Provisional,
            branch: ResolutionBranch::Provisional,
        })))
    }

    fn record_branch(&self, identity: Identity) -> Identity {
        let branch: &'static str = identity.branch.into();
        counter!("pharmstock.resolution.lines", 1, "branch" => branch);
        debug!(
            product_code = %identity.master.product_code,
            yj_code = %identity.master.yj_code,
            branch,
            "Resolved line identity"
        );
        identity
    }

    fn build_record(&self, line: &IncomingLine, identity: &Identity) -> transaction_record::Model {
        let mut record = transaction_record::Model::blank(line.date, line.effective_flag());
        record.client_code = line.client_code.clone();
        record.receipt_number = line.receipt_number.clone();
        record.line_number = line.line_number.clone();
        record.unit_price = line.unit_price;
        record.subtotal = line.subtotal;
        record.tax_amount = line.tax_amount;
        record.tax_rate = line.tax_rate;
        record.expiry_date = line.expiry_date.clone();
        record.lot_number = line.lot_number.clone();

        self.apply_master(&mut record, &identity.master, line.yj_code.as_deref());

        let q = convert(line.kind, line.quantity, PackFactors::from(&identity.master));
        record.dat_quantity = q.dat;
        record.jan_quantity = q.jan;
        record.yj_quantity = q.yj;
        record.set_process_flag(identity.process_flag);
        record
    }

    /// Copies identity, display fields and conversion factors from a master.
    fn apply_master(
        &self,
        record: &mut transaction_record::Model,
        master: &product_master::Model,
        yj_hint: Option<&str>,
    ) {
        record.product_code = master.product_code.clone();
        record.yj_code = match yj_hint {
            Some(hint) if master.yj_code.is_empty() && !hint.trim().is_empty() => {
                hint.trim().to_string()
            }
            _ => master.yj_code.clone(),
        };
        record.product_name = master.product_name.clone();
        record.kana_name = master.kana_name.clone();
        record.maker_name = master.maker_name.clone();
        record.package_form = master.package_spec.clone();
        record.package_spec = self.units.format_package_spec(master);
        record.yj_pack_unit_qty = master.yj_pack_unit_qty;
        record.jan_pack_unit_qty = master.jan_pack_unit_qty;
        record.jan_pack_inner_qty = master.jan_pack_inner_qty;
        record.flag_poison = master.flag_poison;
        record.flag_deleterious = master.flag_deleterious;
        record.flag_narcotic = master.flag_narcotic;
        record.flag_psychotropic = master.flag_psychotropic;
        record.flag_stimulant = master.flag_stimulant;
        record.flag_stimulant_raw = master.flag_stimulant_raw;

        let jan_unit_code = master.jan_unit_code.to_string();
        record.yj_unit_name = self.units.resolve_name(&master.yj_unit_name).to_string();
        record.jan_unit_name = self.units.jan_unit_name(&jan_unit_code, &master.yj_unit_name);
        record.jan_unit_code = jan_unit_code;
    }
}
