use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// External drug database row (catalog joined with its JAN packaging table).
///
/// The numeric packaging columns are stored exactly as the vendor ships them;
/// see `services::catalog::ReferenceProduct` for the parsed view.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reference_catalog")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub jan_code: String,
    pub yj_code: String,
    pub product_name: String,
    pub kana_name: String,
    pub maker_name: String,
    pub package_spec: String,
    pub yj_unit_name: String,
    pub yj_pack_unit_qty: String,
    pub flag_poison: i32,
    pub flag_deleterious: i32,
    pub flag_narcotic: i32,
    pub flag_psychotropic: i32,
    pub flag_stimulant: i32,
    pub flag_stimulant_raw: i32,
    pub jan_pack_inner_qty: Option<String>,
    pub jan_unit_code: Option<String>,
    pub jan_pack_unit_qty: Option<String>,
    pub nhi_price: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
