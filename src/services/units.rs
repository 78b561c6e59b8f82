use crate::entities::{product_master, unit_name};
use crate::errors::ServiceError;
use sea_orm::{ConnectionTrait, EntityTrait};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Immutable unit code <-> display name table, loaded once at startup and
/// shared by reference with the resolution and ledger services.
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    names: HashMap<String, String>,
    codes: HashMap<String, String>,
}

impl UnitTable {
    pub fn from_pairs<I, C, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        let names: HashMap<String, String> = pairs
            .into_iter()
            .map(|(c, n)| (c.into(), n.into()))
            .collect();
        let codes = names
            .iter()
            .map(|(code, name)| (name.clone(), code.clone()))
            .collect();
        Self { names, codes }
    }

    /// Reads the whole `unit_names` table.
    #[instrument(skip(conn))]
    pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Self, ServiceError> {
        let rows = unit_name::Entity::find()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        debug!(units = rows.len(), "Loaded unit table");
        Ok(Self::from_pairs(rows.into_iter().map(|r| (r.code, r.name))))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display name for a code; unknown codes are shown as-is.
    pub fn resolve_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    /// Code for a display name, if the table knows it.
    pub fn resolve_code(&self, name: &str) -> Option<&str> {
        self.codes.get(name).map(String::as_str)
    }

    /// Name of the JAN (package) unit. Blank or `0` codes mean the package is
    /// counted in the YJ unit itself.
    pub fn jan_unit_name(&self, jan_unit_code: &str, yj_unit_code: &str) -> String {
        if is_blank_unit(jan_unit_code) {
            self.resolve_name(yj_unit_code).to_string()
        } else {
            self.resolve_name(jan_unit_code).to_string()
        }
    }

    /// Display package spec, e.g. `"PTP 100錠 (10錠×10シート)"`.
    /// Empty for masters without package detail (provisional ones).
    pub fn format_package_spec(&self, master: &product_master::Model) -> String {
        if master.package_spec.is_empty() && master.yj_pack_unit_qty == 0.0 {
            return String::new();
        }
        let yj_unit = self.resolve_name(&master.yj_unit_name);
        let mut spec = format!(
            "{} {}{}",
            master.package_spec, master.yj_pack_unit_qty, yj_unit
        );
        if master.jan_pack_inner_qty != 0.0 && master.jan_pack_unit_qty != 0.0 {
            let inner_unit =
                self.jan_unit_name(&master.jan_unit_code.to_string(), &master.yj_unit_name);
            spec.push_str(&format!(
                " ({}{}×{}{})",
                master.jan_pack_inner_qty, yj_unit, master.jan_pack_unit_qty, inner_unit
            ));
        }
        spec
    }
}

fn is_blank_unit(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code == "0"
}
