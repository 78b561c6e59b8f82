use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};
use serde::{Deserialize, Serialize};

/// Transaction type carried by every ledger row.
///
/// Variants are declared in code order so the derived `Ord` matches the
/// integer ordering used by the ledger sort.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(into = "i32", try_from = "i32")]
pub enum TransactionFlag {
    #[sea_orm(num_value = 0)]
    InventoryCount,
    #[sea_orm(num_value = 1)]
    Receipt,
    #[sea_orm(num_value = 2)]
    Outbound,
    #[sea_orm(num_value = 3)]
    Dispense,
    #[sea_orm(num_value = 4)]
    AdjustIncrease,
    #[sea_orm(num_value = 5)]
    AdjustDecrease,
    #[sea_orm(num_value = 11)]
    WholesaleReceipt,
    #[sea_orm(num_value = 12)]
    WholesaleReturn,
    #[sea_orm(num_value = 30)]
    MonthEnd,
}

/// How a row moves the running balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedgerEffect {
    /// Sets the absolute balance.
    Reset,
    /// Adds `sign * yj_quantity`.
    Delta(f64),
    /// Listed but never moves the balance.
    Informational,
}

impl TransactionFlag {
    pub fn code(self) -> i32 {
        match self {
            TransactionFlag::InventoryCount => 0,
            TransactionFlag::Receipt => 1,
            TransactionFlag::Outbound => 2,
            TransactionFlag::Dispense => 3,
            TransactionFlag::AdjustIncrease => 4,
            TransactionFlag::AdjustDecrease => 5,
            TransactionFlag::WholesaleReceipt => 11,
            TransactionFlag::WholesaleReturn => 12,
            TransactionFlag::MonthEnd => 30,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(TransactionFlag::InventoryCount),
            1 => Some(TransactionFlag::Receipt),
            2 => Some(TransactionFlag::Outbound),
            3 => Some(TransactionFlag::Dispense),
            4 => Some(TransactionFlag::AdjustIncrease),
            5 => Some(TransactionFlag::AdjustDecrease),
            11 => Some(TransactionFlag::WholesaleReceipt),
            12 => Some(TransactionFlag::WholesaleReturn),
            30 => Some(TransactionFlag::MonthEnd),
            _ => None,
        }
    }

    pub fn effect(self) -> LedgerEffect {
        match self {
            TransactionFlag::InventoryCount => LedgerEffect::Reset,
            TransactionFlag::Receipt
            | TransactionFlag::AdjustIncrease
            | TransactionFlag::WholesaleReceipt => LedgerEffect::Delta(1.0),
            TransactionFlag::Outbound
            | TransactionFlag::Dispense
            | TransactionFlag::AdjustDecrease
            | TransactionFlag::WholesaleReturn => LedgerEffect::Delta(-1.0),
            TransactionFlag::MonthEnd => LedgerEffect::Informational,
        }
    }

    /// Signed contribution of `qty` to a running balance; zero for resets and snapshots.
    pub fn signed(self, qty: f64) -> f64 {
        match self.effect() {
            LedgerEffect::Delta(sign) => sign * qty,
            LedgerEffect::Reset | LedgerEffect::Informational => 0.0,
        }
    }
}

impl From<TransactionFlag> for i32 {
    fn from(flag: TransactionFlag) -> Self {
        flag.code()
    }
}

impl TryFrom<i32> for TransactionFlag {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        TransactionFlag::from_code(code).ok_or_else(|| format!("unknown transaction flag {code}"))
    }
}

/// Confidence in the identity a row was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProcessFlag {
    #[sea_orm(string_value = "COMPLETE")]
    #[serde(rename = "COMPLETE")]
    Complete,
    #[sea_orm(string_value = "PROVISIONAL")]
    #[serde(rename = "PROVISIONAL")]
    Provisional,
}

impl ProcessFlag {
    /// Matching `processing_status` label.
    pub fn status_label(self) -> &'static str {
        match self {
            ProcessFlag::Complete => "completed",
            ProcessFlag::Provisional => "provisional",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_records")]
pub struct Model {
    /// Assigned on insert; also the insertion order used to break ledger ties.
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_date: Date,
    pub client_code: String,
    pub receipt_number: String,
    pub line_number: String,
    pub flag: TransactionFlag,
    pub product_code: String,
    pub yj_code: String,
    pub product_name: String,
    pub kana_name: String,
    pub package_form: String,
    pub package_spec: String,
    pub maker_name: String,
    pub dat_quantity: f64,
    pub jan_pack_inner_qty: f64,
    pub jan_quantity: f64,
    pub jan_pack_unit_qty: f64,
    pub jan_unit_name: String,
    pub jan_unit_code: String,
    pub yj_quantity: f64,
    pub yj_pack_unit_qty: f64,
    pub yj_unit_name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax_rate: Decimal,
    pub expiry_date: String,
    pub lot_number: String,
    pub flag_poison: i32,
    pub flag_deleterious: i32,
    pub flag_narcotic: i32,
    pub flag_psychotropic: i32,
    pub flag_stimulant: i32,
    pub flag_stimulant_raw: i32,
    pub process_flag: ProcessFlag,
    pub processing_status: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Empty row for the given date and flag; resolution fills in the rest.
    pub fn blank(transaction_date: Date, flag: TransactionFlag) -> Self {
        Self {
            id: 0,
            transaction_date,
            client_code: String::new(),
            receipt_number: String::new(),
            line_number: String::new(),
            flag,
            product_code: String::new(),
            yj_code: String::new(),
            product_name: String::new(),
            kana_name: String::new(),
            package_form: String::new(),
            package_spec: String::new(),
            maker_name: String::new(),
            dat_quantity: 0.0,
            jan_pack_inner_qty: 0.0,
            jan_quantity: 0.0,
            jan_pack_unit_qty: 0.0,
            jan_unit_name: String::new(),
            jan_unit_code: String::new(),
            yj_quantity: 0.0,
            yj_pack_unit_qty: 0.0,
            yj_unit_name: String::new(),
            unit_price: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            expiry_date: String::new(),
            lot_number: String::new(),
            flag_poison: 0,
            flag_deleterious: 0,
            flag_narcotic: 0,
            flag_psychotropic: 0,
            flag_stimulant: 0,
            flag_stimulant_raw: 0,
            process_flag: ProcessFlag::Provisional,
            processing_status: None,
        }
    }

    pub fn set_process_flag(&mut self, flag: ProcessFlag) {
        self.process_flag = flag;
        self.processing_status = Some(flag.status_label().to_string());
    }

    /// Active model for insertion; the id is left to the database.
    pub fn to_insert_model(&self) -> ActiveModel {
        let mut am = self.to_update_model();
        am.id = NotSet;
        am
    }

    /// Active model that rewrites every column of an existing row.
    pub fn to_update_model(&self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id),
            transaction_date: Set(self.transaction_date),
            client_code: Set(self.client_code.clone()),
            receipt_number: Set(self.receipt_number.clone()),
            line_number: Set(self.line_number.clone()),
            flag: Set(self.flag),
            product_code: Set(self.product_code.clone()),
            yj_code: Set(self.yj_code.clone()),
            product_name: Set(self.product_name.clone()),
            kana_name: Set(self.kana_name.clone()),
            package_form: Set(self.package_form.clone()),
            package_spec: Set(self.package_spec.clone()),
            maker_name: Set(self.maker_name.clone()),
            dat_quantity: Set(self.dat_quantity),
            jan_pack_inner_qty: Set(self.jan_pack_inner_qty),
            jan_quantity: Set(self.jan_quantity),
            jan_pack_unit_qty: Set(self.jan_pack_unit_qty),
            jan_unit_name: Set(self.jan_unit_name.clone()),
            jan_unit_code: Set(self.jan_unit_code.clone()),
            yj_quantity: Set(self.yj_quantity),
            yj_pack_unit_qty: Set(self.yj_pack_unit_qty),
            yj_unit_name: Set(self.yj_unit_name.clone()),
            unit_price: Set(self.unit_price),
            subtotal: Set(self.subtotal),
            tax_amount: Set(self.tax_amount),
            tax_rate: Set(self.tax_rate),
            expiry_date: Set(self.expiry_date.clone()),
            lot_number: Set(self.lot_number.clone()),
            flag_poison: Set(self.flag_poison),
            flag_deleterious: Set(self.flag_deleterious),
            flag_narcotic: Set(self.flag_narcotic),
            flag_psychotropic: Set(self.flag_psychotropic),
            flag_stimulant: Set(self.flag_stimulant),
            flag_stimulant_raw: Set(self.flag_stimulant_raw),
            process_flag: Set(self.process_flag),
            processing_status: Set(self.processing_status.clone()),
        }
    }
}
