use crate::entities::product_master;
use crate::entities::transaction_record::TransactionFlag;
use crate::errors::ServiceError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lookup-key prefix used when a line carries no usable product code.
pub const SYNTHETIC_PREFIX: &str = "9999999999999";

/// All-zero code some feeds send instead of leaving the field blank.
pub const ZERO_CODE: &str = "0000000000000";

pub fn is_missing_code(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code == ZERO_CODE
}

/// Whether `code` was built by [`derive_key`] rather than read from a feed.
pub fn is_synthetic_key(code: &str) -> bool {
    code.len() > SYNTHETIC_PREFIX.len() && code.starts_with(SYNTHETIC_PREFIX)
}

/// Master lookup key for a line: the product code, or the synthetic prefix
/// plus the product name when the code is missing.
pub fn derive_key(product_code: &str, product_name: &str) -> String {
    if is_missing_code(product_code) {
        format!("{SYNTHETIC_PREFIX}{product_name}")
    } else {
        product_code.trim().to_string()
    }
}

/// Feed a line came from; decides which quantity is ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LineKind {
    /// Wholesaler delivery; quantity is a package count.
    Delivery,
    /// Dispensing log; quantity is in YJ units.
    Usage,
    /// Physical count; the feed must supply JAN units, not YJ units.
    InventoryCount,
    /// Manual in/out slip; quantity is a package count.
    Slip,
}

impl LineKind {
    /// Kind whose ground-truth quantity a stored row was derived from.
    pub fn for_flag(flag: TransactionFlag) -> Self {
        match flag {
            TransactionFlag::Dispense => LineKind::Usage,
            TransactionFlag::InventoryCount => LineKind::InventoryCount,
            _ => LineKind::Delivery,
        }
    }
}

/// One parsed line from any feed, before identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingLine {
    pub kind: LineKind,
    pub date: NaiveDate,
    #[serde(default)]
    pub client_code: String,
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default)]
    pub line_number: String,
    pub flag: TransactionFlag,
    #[serde(default)]
    pub product_code: String,
    pub product_name: String,
    /// Drug code some usage feeds carry alongside the product code.
    #[serde(default)]
    pub yj_code: Option<String>,
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub lot_number: String,
}

impl IncomingLine {
    pub fn new(
        kind: LineKind,
        date: NaiveDate,
        product_code: impl Into<String>,
        product_name: impl Into<String>,
        quantity: f64,
    ) -> Self {
        let flag = match kind {
            LineKind::Usage => TransactionFlag::Dispense,
            LineKind::InventoryCount => TransactionFlag::InventoryCount,
            LineKind::Delivery | LineKind::Slip => TransactionFlag::Receipt,
        };
        Self {
            kind,
            date,
            client_code: String::new(),
            receipt_number: String::new(),
            line_number: String::new(),
            flag,
            product_code: product_code.into(),
            product_name: product_name.into(),
            yj_code: None,
            quantity,
            unit_price: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            expiry_date: String::new(),
            lot_number: String::new(),
        }
    }

    pub fn with_flag(mut self, flag: TransactionFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_receipt(mut self, receipt_number: impl Into<String>, line_number: impl Into<String>) -> Self {
        self.receipt_number = receipt_number.into();
        self.line_number = line_number.into();
        self
    }

    pub fn with_client(mut self, client_code: impl Into<String>) -> Self {
        self.client_code = client_code.into();
        self
    }

    pub fn with_yj_hint(mut self, yj_code: impl Into<String>) -> Self {
        self.yj_code = Some(yj_code.into());
        self
    }

    pub fn with_prices(mut self, unit_price: Decimal, subtotal: Decimal) -> Self {
        self.unit_price = unit_price;
        self.subtotal = subtotal;
        self
    }

    pub fn key(&self) -> String {
        derive_key(&self.product_code, &self.product_name)
    }

    /// Real product code, if the line has one.
    pub fn real_code(&self) -> Option<&str> {
        (!is_missing_code(&self.product_code)).then(|| self.product_code.trim())
    }

    /// Usage lines are always dispenses and counts always anchors,
    /// whatever flag the feed put on them.
    pub fn effective_flag(&self) -> TransactionFlag {
        match self.kind {
            LineKind::Usage => TransactionFlag::Dispense,
            LineKind::InventoryCount => TransactionFlag::InventoryCount,
            LineKind::Delivery | LineKind::Slip => self.flag,
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if !self.quantity.is_finite() {
            return Err(ServiceError::InvalidInput(format!(
                "line {}/{}: quantity is not a number",
                self.receipt_number, self.line_number
            )));
        }
        if self.effective_flag() == TransactionFlag::MonthEnd {
            return Err(ServiceError::InvalidInput(format!(
                "line {}/{}: month-end snapshots cannot be imported",
                self.receipt_number, self.line_number
            )));
        }
        if is_missing_code(&self.product_code) && self.product_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "line {}/{}: neither product code nor product name given",
                self.receipt_number, self.line_number
            )));
        }
        Ok(())
    }
}

/// A quantity expressed in every unit system a row carries.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quantities {
    pub dat: f64,
    pub jan: f64,
    pub yj: f64,
}

/// Package factors of a resolved master.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PackFactors {
    /// YJ units per package.
    pub yj_pack_unit_qty: f64,
    /// JAN units per package.
    pub jan_pack_unit_qty: f64,
    /// YJ units per JAN unit.
    pub jan_pack_inner_qty: f64,
}

impl From<&product_master::Model> for PackFactors {
    fn from(master: &product_master::Model) -> Self {
        Self {
            yj_pack_unit_qty: master.yj_pack_unit_qty,
            jan_pack_unit_qty: master.jan_pack_unit_qty,
            jan_pack_inner_qty: master.jan_pack_inner_qty,
        }
    }
}

/// Converts a ground-truth quantity using the package factors of the resolved
/// master. Zero or negative factors convert as identity.
///
/// A package count becomes YJ through the drug-level pack size; the JAN
/// inner quantity is only used when that is missing.
pub fn convert(kind: LineKind, quantity: f64, factors: PackFactors) -> Quantities {
    let per_jan = if factors.jan_pack_inner_qty > 0.0 {
        factors.jan_pack_inner_qty
    } else {
        1.0
    };
    match kind {
        LineKind::Delivery | LineKind::Slip => {
            let jan = if factors.jan_pack_unit_qty > 0.0 {
                quantity * factors.jan_pack_unit_qty
            } else {
                quantity
            };
            let yj = if factors.yj_pack_unit_qty > 0.0 {
                quantity * factors.yj_pack_unit_qty
            } else {
                jan * per_jan
            };
            Quantities { dat: quantity, jan, yj }
        }
        LineKind::Usage => Quantities {
            dat: 0.0,
            jan: quantity / per_jan,
            yj: quantity,
        },
        LineKind::InventoryCount => Quantities {
            dat: 0.0,
            jan: quantity,
            yj: quantity * per_jan,
        },
    }
}
