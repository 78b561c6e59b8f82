use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a product master row came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasterOrigin {
    /// Copied from the external reference catalog.
    Jcshms,
    /// Auto-created with a name only while resolving an unknown line.
    Provisional,
    /// Entered or imported by hand; the label is kept verbatim.
    Other(String),
}

impl MasterOrigin {
    pub const JCSHMS: &'static str = "JCSHMS";
    pub const PROVISIONAL: &'static str = "PROVISIONAL";

    pub fn as_str(&self) -> &str {
        match self {
            MasterOrigin::Jcshms => Self::JCSHMS,
            MasterOrigin::Provisional => Self::PROVISIONAL,
            MasterOrigin::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            Self::JCSHMS => MasterOrigin::Jcshms,
            Self::PROVISIONAL => MasterOrigin::Provisional,
            other => MasterOrigin::Other(other.to_string()),
        }
    }
}

/// A physical package identity. `yj_code` groups package sizes of one drug.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_master")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_code: String,
    pub yj_code: String,
    pub product_name: String,
    pub origin: String,
    pub kana_name: String,
    pub maker_name: String,
    /// Raw package description, e.g. "PTP".
    pub package_spec: String,
    /// Unit code of the YJ (dosage) unit.
    pub yj_unit_name: String,
    pub yj_pack_unit_qty: f64,
    pub flag_poison: i32,
    pub flag_deleterious: i32,
    pub flag_narcotic: i32,
    pub flag_psychotropic: i32,
    pub flag_stimulant: i32,
    pub flag_stimulant_raw: i32,
    /// YJ units per JAN unit; the conversion factor between the two systems.
    pub jan_pack_inner_qty: f64,
    pub jan_unit_code: i32,
    /// JAN units per delivered package.
    pub jan_pack_unit_qty: f64,
    pub reorder_point: f64,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub nhi_price: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn origin(&self) -> MasterOrigin {
        MasterOrigin::from_label(&self.origin)
    }

    pub fn is_jcshms(&self) -> bool {
        self.origin() == MasterOrigin::Jcshms
    }

    /// Minimal master carrying only identity and name.
    pub fn provisional(product_code: String, yj_code: String, product_name: String) -> Self {
        Self {
            product_code,
            yj_code,
            product_name,
            origin: MasterOrigin::Provisional.as_str().to_string(),
            kana_name: String::new(),
            maker_name: String::new(),
            package_spec: String::new(),
            yj_unit_name: String::new(),
            yj_pack_unit_qty: 0.0,
            flag_poison: 0,
            flag_deleterious: 0,
            flag_narcotic: 0,
            flag_psychotropic: 0,
            flag_stimulant: 0,
            flag_stimulant_raw: 0,
            jan_pack_inner_qty: 0.0,
            jan_unit_code: 0,
            jan_pack_unit_qty: 0.0,
            reorder_point: 0.0,
            nhi_price: Decimal::ZERO,
        }
    }

    pub fn to_active_model(&self) -> ActiveModel {
        use sea_orm::Set;
        ActiveModel {
            product_code: Set(self.product_code.clone()),
            yj_code: Set(self.yj_code.clone()),
            product_name: Set(self.product_name.clone()),
            origin: Set(self.origin.clone()),
            kana_name: Set(self.kana_name.clone()),
            maker_name: Set(self.maker_name.clone()),
            package_spec: Set(self.package_spec.clone()),
            yj_unit_name: Set(self.yj_unit_name.clone()),
            yj_pack_unit_qty: Set(self.yj_pack_unit_qty),
            flag_poison: Set(self.flag_poison),
            flag_deleterious: Set(self.flag_deleterious),
            flag_narcotic: Set(self.flag_narcotic),
            flag_psychotropic: Set(self.flag_psychotropic),
            flag_stimulant: Set(self.flag_stimulant),
            flag_stimulant_raw: Set(self.flag_stimulant_raw),
            jan_pack_inner_qty: Set(self.jan_pack_inner_qty),
            jan_unit_code: Set(self.jan_unit_code),
            jan_pack_unit_qty: Set(self.jan_pack_unit_qty),
            reorder_point: Set(self.reorder_point),
            nhi_price: Set(self.nhi_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_labels_round_trip_known_values() {
        assert_eq!(MasterOrigin::from_label("JCSHMS"), MasterOrigin::Jcshms);
        assert_eq!(
            MasterOrigin::from_label("PROVISIONAL"),
            MasterOrigin::Provisional
        );
        assert_eq!(
            MasterOrigin::from_label("MANUAL").as_str(),
            "MANUAL"
        );
    }

    #[test]
    fn provisional_master_has_no_package_detail() {
        let m = Model::provisional("9999999999999Foo".into(), "MA2Y00000001".into(), "Foo".into());
        assert_eq!(m.origin(), MasterOrigin::Provisional);
        assert!(!m.is_jcshms());
        assert_eq!(m.jan_pack_inner_qty, 0.0);
        assert!(m.package_spec.is_empty());
    }
}
