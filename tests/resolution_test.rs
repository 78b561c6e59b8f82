mod common;

use assert_matches::assert_matches;
use common::{day, reference, unit_master, TestDb};
use pharmstock::entities::product_master::{self, MasterOrigin};
use pharmstock::entities::transaction_record::{ProcessFlag, TransactionFlag};
use pharmstock::services::catalog;
use pharmstock::services::resolution::ResolutionService;
use pharmstock::{IncomingLine, LineKind, ServiceError};
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;

#[tokio::test]
async fn reference_match_creates_complete_master() {
    let db = TestDb::new().await;
    db.insert_reference(reference("4987000000011", "1149019F1020", "Loxo 60mg"))
        .await;

    let line = IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4987000000011", "ロキソ", 2.0)
        .with_receipt("D001", "1");
    let saved = db.services.ingest.ingest_batch(&[line]).await.unwrap();

    assert_eq!(saved.len(), 1);
    let row = &saved[0];
    assert_eq!(row.product_code, "4987000000011");
    assert_eq!(row.yj_code, "1149019F1020");
    assert_eq!(row.product_name, "Loxo 60mg");
    assert_eq!(row.process_flag, ProcessFlag::Complete);
    assert_eq!(row.processing_status.as_deref(), Some("completed"));
    assert_eq!(row.dat_quantity, 2.0);
    assert_eq!(row.jan_quantity, 20.0);
    assert_eq!(row.yj_quantity, 200.0);
    assert_eq!(row.yj_unit_name, "錠");
    assert_eq!(row.jan_unit_name, "シート");
    assert_eq!(row.package_form, "PTP");
    assert_eq!(row.package_spec, "PTP 100錠 (10錠×10シート)");

    let master = db.master("4987000000011").await.expect("master created");
    assert_eq!(master.origin(), MasterOrigin::Jcshms);
    assert_eq!(master.nhi_price, Decimal::from(10));
    assert_eq!(db.sequence_value().await, 0);
}

#[tokio::test]
async fn delivery_uses_drug_pack_size_without_jan_packaging() {
    let db = TestDb::new().await;
    let mut bottle = reference("4987000000042", "3399007H1021", "Syrup 100mL");
    bottle.yj_unit_name = "3".to_string();
    bottle.jan_pack_inner_qty = None;
    bottle.jan_unit_code = None;
    bottle.jan_pack_unit_qty = None;
    db.insert_reference(bottle).await;

    let line = IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4987000000042", "", 2.0);
    let saved = db.services.ingest.ingest_batch(&[line]).await.unwrap();

    let row = &saved[0];
    assert_eq!(row.dat_quantity, 2.0);
    assert_eq!(row.jan_quantity, 2.0);
    assert_eq!(row.yj_quantity, 200.0);
    assert_eq!(row.yj_unit_name, "mL");
    assert_eq!(row.package_spec, "PTP 100mL");
}

#[tokio::test]
async fn prices_and_client_carry_through_to_the_record() {
    let db = TestDb::new().await;
    db.insert_reference(reference("4987000000059", "1149019F1039", "Priced Tabs"))
        .await;

    let line = IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4987000000059", "", 3.0)
        .with_client("W01")
        .with_receipt("D009", "4")
        .with_prices(Decimal::new(125050, 2), Decimal::new(375150, 2));
    let saved = db.services.ingest.ingest_batch(&[line]).await.unwrap();

    let row = &saved[0];
    assert_eq!(row.client_code, "W01");
    assert_eq!(row.receipt_number, "D009");
    assert_eq!(row.line_number, "4");
    assert_eq!(row.unit_price, Decimal::new(125050, 2));
    assert_eq!(row.subtotal, Decimal::new(375150, 2));

    let stored = &db.records().await[0];
    assert_eq!(stored.unit_price, Decimal::new(125050, 2));
    assert_eq!(stored.subtotal, Decimal::new(375150, 2));
}

#[tokio::test]
async fn reference_without_drug_code_gets_generated_code() {
    let db = TestDb::new().await;
    db.insert_reference(reference("4987000000028", "", "Generic Cream")).await;

    let line = IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4987000000028", "", 1.0);
    let saved = db.services.ingest.ingest_batch(&[line]).await.unwrap();

    assert_eq!(saved[0].yj_code, "MA2Y00000001");
    assert_eq!(saved[0].process_flag, ProcessFlag::Complete);
    assert_eq!(db.sequence_value().await, 1);
}

#[tokio::test]
async fn unknown_code_gets_one_provisional_master_per_batch() {
    let db = TestDb::new().await;
    let lines = vec![
        IncomingLine::new(LineKind::Usage, day(2024, 4, 1), "4900000000001", "Unknown Syrup", 5.0),
        IncomingLine::new(LineKind::Usage, day(2024, 4, 2), "4900000000001", "Unknown Syrup", 7.0),
    ];
    let saved = db.services.ingest.ingest_batch(&lines).await.unwrap();

    assert_eq!(saved.len(), 2);
    for row in &saved {
        assert_eq!(row.product_code, "4900000000001");
        assert_eq!(row.yj_code, "MA2Y00000001");
        assert_eq!(row.flag, TransactionFlag::Dispense);
        assert_eq!(row.process_flag, ProcessFlag::Provisional);
        assert_eq!(row.processing_status.as_deref(), Some("provisional"));
        assert!(row.package_spec.is_empty());
    }
    assert_eq!(saved[0].yj_quantity, 5.0);
    assert_eq!(saved[1].yj_quantity, 7.0);
    assert_eq!(db.master_count().await, 1);
    assert_eq!(db.sequence_value().await, 1);

    let master = db.master("4900000000001").await.unwrap();
    assert_eq!(master.origin(), MasterOrigin::Provisional);
    assert_eq!(master.product_name, "Unknown Syrup");
}

#[tokio::test]
async fn codeless_lines_resolve_by_name() {
    let db = TestDb::new().await;
    let lines = vec![
        IncomingLine::new(LineKind::Usage, day(2024, 4, 1), "", "Compounded Ointment", 3.0),
        IncomingLine::new(LineKind::Usage, day(2024, 4, 1), "0000000000000", "Compounded Ointment", 4.0),
        IncomingLine::new(LineKind::Usage, day(2024, 4, 1), "", "Other Mix", 1.0),
    ];
    let saved = db.services.ingest.ingest_batch(&lines).await.unwrap();

    assert_eq!(saved[0].product_code, "9999999999999Compounded Ointment");
    assert_eq!(saved[1].product_code, saved[0].product_code);
    assert_eq!(saved[0].yj_code, saved[1].yj_code);
    assert_eq!(saved[2].product_code, "9999999999999Other Mix");
    assert_eq!(saved[2].yj_code, "MA2Y00000002");
    assert_eq!(db.master_count().await, 2);
}

#[tokio::test]
async fn local_master_wins_and_keeps_its_confidence() {
    let db = TestDb::new().await;
    let mut manual = unit_master("4900000000002", "YJMANUAL", "House Brand", "ハウス");
    manual.origin = "MANUAL".to_string();
    db.insert_master(&manual).await;
    db.insert_master(&unit_master("4900000000003", "YJ0003", "Known", "ノウン"))
        .await;
    // the reference entry is never consulted while a local master exists
    db.insert_reference(reference("4900000000002", "9999999F9999", "Vendor Name"))
        .await;

    let lines = vec![
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 3), "4900000000002", "x", 1.0),
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 3), "4900000000003", "y", 1.0),
    ];
    let saved = db.services.ingest.ingest_batch(&lines).await.unwrap();

    assert_eq!(saved[0].yj_code, "YJMANUAL");
    assert_eq!(saved[0].product_name, "House Brand");
    assert_eq!(saved[0].process_flag, ProcessFlag::Provisional);
    assert_eq!(saved[1].process_flag, ProcessFlag::Complete);
    assert_eq!(db.master_count().await, 2);
    assert_eq!(db.sequence_value().await, 0);
}

#[tokio::test]
async fn usage_drug_code_fills_only_a_blank_master_code() {
    let db = TestDb::new().await;
    db.insert_master(&unit_master("4900000000004", "", "No Code", "ノーコード"))
        .await;
    db.insert_master(&unit_master("4900000000005", "YJ0005", "Has Code", "ハズコード"))
        .await;

    let lines = vec![
        IncomingLine::new(LineKind::Usage, day(2024, 4, 3), "4900000000004", "a", 1.0)
            .with_yj_hint("2171014F1020"),
        IncomingLine::new(LineKind::Usage, day(2024, 4, 3), "4900000000005", "b", 1.0)
            .with_yj_hint("2171014F1020"),
    ];
    let saved = db.services.ingest.ingest_batch(&lines).await.unwrap();
    assert_eq!(saved[0].yj_code, "2171014F1020");
    assert_eq!(saved[1].yj_code, "YJ0005");
}

#[tokio::test]
async fn failed_batch_leaves_no_trace() {
    let db = TestDb::new().await;
    let mut broken = reference("4987000000035", "", "placeholder");
    broken.product_name = "  ".to_string();
    db.insert_reference(broken).await;

    let lines = vec![
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4900000000009", "Fresh", 1.0),
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4987000000035", "Broken", 1.0),
    ];
    let err = db.services.ingest.ingest_batch(&lines).await.unwrap_err();

    assert_matches!(err, ServiceError::MalformedReference(_));
    assert!(db.master("4900000000009").await.is_none());
    assert!(db.records().await.is_empty());
    assert_eq!(db.sequence_value().await, 0);
}

#[tokio::test]
async fn duplicate_master_write_is_a_retryable_conflict() {
    let db = TestDb::new().await;
    let resolver = ResolutionService::new(db.services.units.clone(), db.sequence());
    let line = IncomingLine::new(LineKind::Usage, day(2024, 4, 1), "4900000000011", "Racy Drops", 1.0);

    let txn = db.pool.begin().await.unwrap();
    let records = resolver.resolve(&txn, &[line.clone()]).await.unwrap();
    assert_eq!(records[0].yj_code, "MA2Y00000001");

    // another writer created the same product code in the meantime
    let twin = product_master::Model::provisional(
        "4900000000011".to_string(),
        "MA2Y00000002".to_string(),
        "Racy Drops".to_string(),
    );
    let err = catalog::insert_master(&txn, &twin).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert!(err.is_retryable());
    assert_eq!(err.exit_code(), 4);
    txn.rollback().await.unwrap();

    assert_eq!(db.master_count().await, 0);
    assert!(db.records().await.is_empty());
    assert_eq!(db.sequence_value().await, 0);

    // rerunning the batch from scratch succeeds
    let saved = db.services.ingest.ingest_batch(&[line]).await.unwrap();
    assert_eq!(saved[0].yj_code, "MA2Y00000001");
    assert_eq!(db.sequence_value().await, 1);
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_any_write() {
    let db = TestDb::new().await;
    let lines = vec![
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "4900000000010", "Fine", 1.0),
        IncomingLine::new(LineKind::Delivery, day(2024, 4, 1), "", "", 1.0),
    ];
    let err = db.services.ingest.ingest_batch(&lines).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(db.master_count().await, 0);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let db = TestDb::new().await;
    let saved = db.services.ingest.ingest_batch(&[]).await.unwrap();
    assert!(saved.is_empty());
}
