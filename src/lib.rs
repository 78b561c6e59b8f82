//! Pharmacy stock library
//!
//! Resolves wholesaler deliveries, dispensing logs, inventory counts and
//! manual slips to product masters, and aggregates the resulting
//! transaction history into per-drug stock ledgers.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use errors::{Result, ServiceError};
pub use services::incoming::{IncomingLine, LineKind};
pub use services::ledger::{DrugCategory, DrugGroup, LedgerFilters, PackageLedger};

use services::{
    ingest::IngestService, ledger::StockLedgerService, month_end::MonthEndService,
    resolution::ResolutionService, sequence::SequenceGenerator, units::UnitTable,
};

/// Services wired against one connection pool and one loaded unit table.
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<DatabaseConnection>,
    pub units: Arc<UnitTable>,
    pub sequence: SequenceGenerator,
    pub ingest: IngestService,
    pub ledger: StockLedgerService,
    pub month_end: MonthEndService,
}

impl AppServices {
    /// Loads the unit table and builds every service.
    pub async fn build(db: Arc<DatabaseConnection>, config: &config::AppConfig) -> Result<Self> {
        let units = Arc::new(UnitTable::load(db.as_ref()).await?);
        Ok(Self::with_units(db, units, config))
    }

    pub fn with_units(
        db: Arc<DatabaseConnection>,
        units: Arc<UnitTable>,
        config: &config::AppConfig,
    ) -> Self {
        let sequence = SequenceGenerator::yj_codes(config);
        let resolver = ResolutionService::new(units.clone(), sequence.clone());
        Self {
            ingest: IngestService::new(db.clone(), resolver),
            ledger: StockLedgerService::new(
                db.clone(),
                units.clone(),
                config.default_reorder_coefficient,
            ),
            month_end: MonthEndService::new(db.clone(), units.clone()),
            sequence,
            units,
            db,
        }
    }
}
