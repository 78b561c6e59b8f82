#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use pharmstock::{
    config::AppConfig,
    db,
    entities::{product_master, reference_catalog, transaction_record, unit_name},
    services::{catalog, sequence::SequenceGenerator},
    AppServices,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// In-memory database with migrations applied and a small unit table.
pub struct TestDb {
    pub pool: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub services: AppServices,
}

impl TestDb {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        // every pooled connection would otherwise get its own memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations");

        for (code, name) in [("1", "錠"), ("2", "カプセル"), ("3", "mL"), ("60", "シート"), ("61", "瓶")] {
            unit_name::ActiveModel {
                code: Set(code.to_string()),
                name: Set(name.to_string()),
            }
            .insert(&pool)
            .await
            .expect("seed unit");
        }

        let pool = Arc::new(pool);
        let services = AppServices::build(pool.clone(), &cfg)
            .await
            .expect("build services");
        Self {
            pool,
            config: cfg,
            services,
        }
    }

    pub fn sequence(&self) -> SequenceGenerator {
        SequenceGenerator::yj_codes(&self.config)
    }

    pub async fn sequence_value(&self) -> i64 {
        self.sequence()
            .current(self.pool.as_ref())
            .await
            .expect("read sequence")
            .expect("sequence row")
    }

    pub async fn insert_reference(&self, row: reference_catalog::Model) {
        reference_catalog::ActiveModel {
            jan_code: Set(row.jan_code),
            yj_code: Set(row.yj_code),
            product_name: Set(row.product_name),
            kana_name: Set(row.kana_name),
            maker_name: Set(row.maker_name),
            package_spec: Set(row.package_spec),
            yj_unit_name: Set(row.yj_unit_name),
            yj_pack_unit_qty: Set(row.yj_pack_unit_qty),
            flag_poison: Set(row.flag_poison),
            flag_deleterious: Set(row.flag_deleterious),
            flag_narcotic: Set(row.flag_narcotic),
            flag_psychotropic: Set(row.flag_psychotropic),
            flag_stimulant: Set(row.flag_stimulant),
            flag_stimulant_raw: Set(row.flag_stimulant_raw),
            jan_pack_inner_qty: Set(row.jan_pack_inner_qty),
            jan_unit_code: Set(row.jan_unit_code),
            jan_pack_unit_qty: Set(row.jan_pack_unit_qty),
            nhi_price: Set(row.nhi_price),
        }
        .insert(self.pool.as_ref())
        .await
        .expect("seed reference");
    }

    pub async fn insert_master(&self, master: &product_master::Model) {
        catalog::insert_master(self.pool.as_ref(), master)
            .await
            .expect("seed master");
    }

    pub async fn master(&self, product_code: &str) -> Option<product_master::Model> {
        product_master::Entity::find_by_id(product_code.to_string())
            .one(self.pool.as_ref())
            .await
            .expect("load master")
    }

    pub async fn master_count(&self) -> usize {
        product_master::Entity::find()
            .all(self.pool.as_ref())
            .await
            .expect("load masters")
            .len()
    }

    pub async fn records(&self) -> Vec<transaction_record::Model> {
        transaction_record::Entity::find()
            .order_by_asc(transaction_record::Column::Id)
            .all(self.pool.as_ref())
            .await
            .expect("load records")
    }

    pub async fn records_for(&self, product_code: &str) -> Vec<transaction_record::Model> {
        transaction_record::Entity::find()
            .filter(transaction_record::Column::ProductCode.eq(product_code))
            .order_by_asc(transaction_record::Column::Id)
            .all(self.pool.as_ref())
            .await
            .expect("load records")
    }
}

pub fn day(year: i32, month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, d).expect("valid date")
}

/// Tablet reference entry: boxes of 10 sheets of 10 tablets.
pub fn reference(jan_code: &str, yj_code: &str, name: &str) -> reference_catalog::Model {
    reference_catalog::Model {
        jan_code: jan_code.to_string(),
        yj_code: yj_code.to_string(),
        product_name: name.to_string(),
        kana_name: format!("{name}カナ"),
        maker_name: "Maker".to_string(),
        package_spec: "PTP".to_string(),
        yj_unit_name: "1".to_string(),
        yj_pack_unit_qty: "100".to_string(),
        flag_poison: 0,
        flag_deleterious: 0,
        flag_narcotic: 0,
        flag_psychotropic: 0,
        flag_stimulant: 0,
        flag_stimulant_raw: 0,
        jan_pack_inner_qty: Some("10".to_string()),
        jan_unit_code: Some("60".to_string()),
        jan_pack_unit_qty: Some("10".to_string()),
        nhi_price: Some("1000".to_string()),
    }
}

/// JCSHMS master whose three unit systems coincide.
pub fn unit_master(product_code: &str, yj_code: &str, name: &str, kana: &str) -> product_master::Model {
    let mut m = product_master::Model::provisional(
        product_code.to_string(),
        yj_code.to_string(),
        name.to_string(),
    );
    m.origin = "JCSHMS".to_string();
    m.kana_name = kana.to_string();
    m.package_spec = "PTP".to_string();
    m.yj_unit_name = "1".to_string();
    m.yj_pack_unit_qty = 1.0;
    m.jan_pack_inner_qty = 1.0;
    m.jan_pack_unit_qty = 1.0;
    m
}
