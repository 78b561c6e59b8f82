pub mod code_sequence;
pub mod product_master;
pub mod reference_catalog;
pub mod transaction_record;
pub mod unit_name;
