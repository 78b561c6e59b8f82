use crate::entities::product_master::{self, MasterOrigin};
use crate::entities::reference_catalog;
use crate::errors::ServiceError;
use metrics::counter;
use rust_decimal::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Keeps `IN (...)` lists under SQLite's bound-parameter limit.
const LOOKUP_CHUNK: usize = 500;

/// Bulk-loads product masters keyed by `product_code`.
#[instrument(skip(conn, codes), fields(codes = codes.len()))]
pub async fn masters_by_codes<C: ConnectionTrait>(
    conn: &C,
    codes: &[String],
) -> Result<HashMap<String, product_master::Model>, ServiceError> {
    let mut found = HashMap::with_capacity(codes.len());
    for chunk in codes.chunks(LOOKUP_CHUNK) {
        let rows = product_master::Entity::find()
            .filter(product_master::Column::ProductCode.is_in(chunk.iter().cloned()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        found.extend(rows.into_iter().map(|m| (m.product_code.clone(), m)));
    }
    debug!(found = found.len(), "Fetched product masters");
    Ok(found)
}

/// Bulk-loads reference catalog rows keyed by JAN code.
#[instrument(skip(conn, codes), fields(codes = codes.len()))]
pub async fn references_by_codes<C: ConnectionTrait>(
    conn: &C,
    codes: &[String],
) -> Result<HashMap<String, reference_catalog::Model>, ServiceError> {
    let mut found = HashMap::with_capacity(codes.len());
    for chunk in codes.chunks(LOOKUP_CHUNK) {
        let rows = reference_catalog::Entity::find()
            .filter(reference_catalog::Column::JanCode.is_in(chunk.iter().cloned()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        found.extend(rows.into_iter().map(|r| (r.jan_code.clone(), r)));
    }
    debug!(found = found.len(), "Fetched reference catalog entries");
    Ok(found)
}

/// Inserts a new master. A duplicate `product_code` (another batch created it
/// first) surfaces as a retryable conflict.
#[instrument(skip(conn, master), fields(product_code = %master.product_code, origin = %master.origin))]
pub async fn insert_master<C: ConnectionTrait>(
    conn: &C,
    master: &product_master::Model,
) -> Result<(), ServiceError> {
    master
        .to_active_model()
        .insert(conn)
        .await
        .map_err(|e| ServiceError::from_write(e, &format!("product_master {}", master.product_code)))?;
    counter!("pharmstock.catalog.master_created", 1, "origin" => master.origin.clone());
    Ok(())
}

/// Reference catalog entry with its vendor text fields parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceProduct {
    pub jan_code: String,
    pub yj_code: String,
    pub product_name: String,
    pub kana_name: String,
    pub maker_name: String,
    pub package_spec: String,
    pub yj_unit_name: String,
    pub yj_pack_unit_qty: f64,
    pub flag_poison: i32,
    pub flag_deleterious: i32,
    pub flag_narcotic: i32,
    pub flag_psychotropic: i32,
    pub flag_stimulant: i32,
    pub flag_stimulant_raw: i32,
    pub jan_pack_inner_qty: f64,
    pub jan_unit_code: i32,
    pub jan_pack_unit_qty: f64,
    pub price: Decimal,
}

impl ReferenceProduct {
    /// Parses a raw row. Unparsable numbers default to zero with a warning;
    /// a blank product name makes the row unusable.
    pub fn parse(raw: &reference_catalog::Model) -> Result<Self, ServiceError> {
        if raw.product_name.trim().is_empty() {
            return Err(ServiceError::MalformedReference(format!(
                "reference entry {} has no product name",
                raw.jan_code
            )));
        }

        let code = raw.jan_code.as_str();
        Ok(Self {
            jan_code: raw.jan_code.clone(),
            yj_code: raw.yj_code.trim().to_string(),
            product_name: raw.product_name.clone(),
            kana_name: raw.kana_name.clone(),
            maker_name: raw.maker_name.clone(),
            package_spec: raw.package_spec.clone(),
            yj_unit_name: raw.yj_unit_name.clone(),
            yj_pack_unit_qty: parse_quantity(code, "yj_pack_unit_qty", Some(&raw.yj_pack_unit_qty)),
            flag_poison: raw.flag_poison,
            flag_deleterious: raw.flag_deleterious,
            flag_narcotic: raw.flag_narcotic,
            flag_psychotropic: raw.flag_psychotropic,
            flag_stimulant: raw.flag_stimulant,
            flag_stimulant_raw: raw.flag_stimulant_raw,
            jan_pack_inner_qty: parse_quantity(
                code,
                "jan_pack_inner_qty",
                raw.jan_pack_inner_qty.as_deref(),
            ),
            jan_unit_code: parse_unit_code(code, raw.jan_unit_code.as_deref()),
            jan_pack_unit_qty: parse_quantity(
                code,
                "jan_pack_unit_qty",
                raw.jan_pack_unit_qty.as_deref(),
            ),
            price: parse_price(code, raw.nhi_price.as_deref()),
        })
    }

    pub fn has_yj_code(&self) -> bool {
        !self.yj_code.is_empty()
    }

    /// Price per YJ unit; zero when the pack quantity is unknown.
    pub fn unit_price(&self) -> Decimal {
        if self.yj_pack_unit_qty <= 0.0 {
            return Decimal::ZERO;
        }
        match Decimal::from_f64(self.yj_pack_unit_qty) {
            Some(qty) if !qty.is_zero() => (self.price / qty).round_dp(4),
            _ => {
                warn!(jan_code = %self.jan_code, "Unrepresentable yj_pack_unit_qty, NHI price set to 0");
                Decimal::ZERO
            }
        }
    }

    /// JCSHMS-origin master for this entry under the given identity.
    pub fn to_master(&self, product_code: &str, yj_code: &str) -> product_master::Model {
        product_master::Model {
            product_code: product_code.to_string(),
            yj_code: yj_code.to_string(),
            product_name: self.product_name.clone(),
            origin: MasterOrigin::Jcshms.as_str().to_string(),
            kana_name: self.kana_name.clone(),
            maker_name: self.maker_name.clone(),
            package_spec: self.package_spec.clone(),
            yj_unit_name: self.yj_unit_name.clone(),
            yj_pack_unit_qty: self.yj_pack_unit_qty,
            flag_poison: self.flag_poison,
            flag_deleterious: self.flag_deleterious,
            flag_narcotic: self.flag_narcotic,
            flag_psychotropic: self.flag_psychotropic,
            flag_stimulant: self.flag_stimulant,
            flag_stimulant_raw: self.flag_stimulant_raw,
            jan_pack_inner_qty: self.jan_pack_inner_qty,
            jan_unit_code: self.jan_unit_code,
            jan_pack_unit_qty: self.jan_pack_unit_qty,
            reorder_point: 0.0,
            nhi_price: self.unit_price(),
        }
    }
}

fn parse_quantity(code: &str, field: &str, raw: Option<&str>) -> f64 {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0.0;
    };
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!(jan_code = %code, field, value = %text, "Unparsable reference quantity, using 0");
            counter!("pharmstock.catalog.reference_defaults", 1);
            0.0
        }
    }
}

fn parse_unit_code(code: &str, raw: Option<&str>) -> i32 {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0;
    };
    text.parse().unwrap_or_else(|_| {
        warn!(jan_code = %code, value = %text, "Unparsable reference unit code, using 0");
        counter!("pharmstock.catalog.reference_defaults", 1);
        0
    })
}

fn parse_price(code: &str, raw: Option<&str>) -> Decimal {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Decimal::ZERO;
    };
    Decimal::from_str(text).unwrap_or_else(|_| {
        warn!(jan_code = %code, value = %text, "Unparsable reference price, using 0");
        counter!("pharmstock.catalog.reference_defaults", 1);
        Decimal::ZERO
    })
}
