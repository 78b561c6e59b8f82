use crate::config::AppConfig;
use crate::entities::{code_sequence, product_master};
use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::{debug, info, instrument};

/// Named, persisted counter producing codes like `MA2Y00000001`.
///
/// The counter is advanced inside the caller's transaction, so a rollback
/// un-issues every code handed out within it.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    name: String,
    prefix: String,
    padding: u32,
}

impl SequenceGenerator {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, padding: u32) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            padding,
        }
    }

    /// Drug-identity sequence configured for the application.
    pub fn yj_codes(config: &AppConfig) -> Self {
        Self::new(
            config.yj_sequence_name.clone(),
            config.yj_sequence_prefix.clone(),
            config.yj_sequence_padding,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Largest number that fits the padding.
    pub fn capacity(&self) -> i64 {
        10i64.saturating_pow(self.padding).saturating_sub(1)
    }

    pub fn format(&self, number: i64) -> String {
        format!(
            "{}{:0width$}",
            self.prefix,
            number,
            width = self.padding as usize
        )
    }

    /// Numeric part of a code issued by this sequence.
    pub fn parse(&self, code: &str) -> Option<i64> {
        code.strip_prefix(self.prefix.as_str())
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
    }

    /// Advances the counter and returns the formatted code.
    ///
    /// Must run on a transaction: the increment is only observable by other
    /// callers once the enclosing transaction commits.
    #[instrument(skip(self, txn), fields(sequence = %self.name))]
    pub async fn next<C: ConnectionTrait>(&self, txn: &C) -> Result<String, ServiceError> {
        let updated = code_sequence::Entity::update_many()
            .col_expr(
                code_sequence::Column::LastNo,
                Expr::col(code_sequence::Column::LastNo).add(1),
            )
            .filter(code_sequence::Column::Name.eq(self.name.as_str()))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;

        if updated.rows_affected == 0 {
            return Err(ServiceError::SequenceError(format!(
                "sequence '{}' not found",
                self.name
            )));
        }

        let row = code_sequence::Entity::find_by_id(self.name.clone())
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::SequenceError(format!("sequence '{}' vanished", self.name))
            })?;

        if row.last_no > self.capacity() {
            return Err(ServiceError::SequenceError(format!(
                "sequence '{}' exhausted at {} ({} digits)",
                self.name, row.last_no, self.padding
            )));
        }

        counter!("pharmstock.sequence.issued", 1, "sequence" => self.name.clone());
        let code = self.format(row.last_no);
        debug!(code = %code, "Issued sequence code");
        Ok(code)
    }

    /// Current counter value, or `None` when the counter row is missing.
    pub async fn current<C: ConnectionTrait>(&self, conn: &C) -> Result<Option<i64>, ServiceError> {
        Ok(code_sequence::Entity::find_by_id(self.name.clone())
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|row| row.last_no))
    }

    /// Raises the counter to the highest number already used by product
    /// masters, creating the counter row if needed. Run after restoring a
    /// database so codes are never issued twice. Returns the counter value.
    #[instrument(skip(self, conn), fields(sequence = %self.name))]
    pub async fn initialize_from_existing<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<i64, ServiceError> {
        let codes: Vec<String> = product_master::Entity::find()
            .select_only()
            .column(product_master::Column::YjCode)
            .filter(product_master::Column::YjCode.starts_with(self.prefix.as_str()))
            .into_tuple()
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let max_used = codes.iter().filter_map(|c| self.parse(c)).max().unwrap_or(0);

        let value = match self.current(conn).await? {
            None => {
                code_sequence::ActiveModel {
                    name: Set(self.name.clone()),
                    last_no: Set(max_used),
                }
                .insert(conn)
                .await
                .map_err(ServiceError::db_error)?;
                max_used
            }
            Some(current) if max_used > current => {
                code_sequence::ActiveModel {
                    name: Set(self.name.clone()),
                    last_no: Set(max_used),
                }
                .update(conn)
                .await
                .map_err(ServiceError::db_error)?;
                max_used
            }
            Some(current) => current,
        };

        info!(last_no = value, scanned = codes.len(), "Sequence initialized from product masters");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ma2y() -> SequenceGenerator {
        SequenceGenerator::new("MA2Y", "MA2Y", 8)
    }

    #[test]
    fn formats_zero_padded_codes() {
        assert_eq!(ma2y().format(1), "MA2Y00000001");
        assert_eq!(ma2y().format(12345678), "MA2Y12345678");
    }

    #[test]
    fn capacity_follows_padding() {
        assert_eq!(ma2y().capacity(), 99_999_999);
        assert_eq!(SequenceGenerator::new("T", "T", 2).capacity(), 99);
    }

    #[test]
    fn parses_only_own_codes() {
        let seq = ma2y();
        assert_eq!(seq.parse("MA2Y00000042"), Some(42));
        assert_eq!(seq.parse("MA2Y"), None);
        assert_eq!(seq.parse("MA2Yabc"), None);
        assert_eq!(seq.parse("1234567F1000"), None);
    }
}
