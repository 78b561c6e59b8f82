mod common;

use assert_matches::assert_matches;
use common::{day, unit_master, TestDb};
use pharmstock::entities::transaction_record::{ProcessFlag, TransactionFlag};
use pharmstock::{IncomingLine, LedgerFilters, LineKind, ServiceError};

const COUNTED: &str = "4900000000601";
const UNCOUNTED: &str = "4900000000602";
const IDLE: &str = "4900000000603";

async fn seeded() -> TestDb {
    let db = TestDb::new().await;
    db.insert_master(&unit_master(COUNTED, "YJCNT", "Counted", "カウント"))
        .await;
    db.insert_master(&unit_master(UNCOUNTED, "YJUNC", "Uncounted", "アンカウント"))
        .await;
    db.insert_master(&unit_master(IDLE, "YJIDL", "Idle", "アイドル"))
        .await;
    let lines = vec![
        IncomingLine::new(LineKind::InventoryCount, day(2024, 3, 1), COUNTED, "", 100.0),
        IncomingLine::new(LineKind::Usage, day(2024, 3, 10), COUNTED, "", 30.0),
        IncomingLine::new(LineKind::Delivery, day(2024, 3, 20), COUNTED, "", 20.0),
        IncomingLine::new(LineKind::Usage, day(2024, 4, 2), COUNTED, "", 5.0),
        IncomingLine::new(LineKind::Delivery, day(2024, 3, 5), UNCOUNTED, "", 10.0),
    ];
    db.services.ingest.ingest_batch(&lines).await.unwrap();
    db
}

#[tokio::test]
async fn writes_one_snapshot_per_product_with_history() {
    let db = seeded().await;
    let snapshots = db.services.month_end.close_month(2024, 3).await.unwrap();

    assert_eq!(snapshots.len(), 2);
    let counted = snapshots.iter().find(|s| s.product_code == COUNTED).unwrap();
    assert_eq!(counted.transaction_date, day(2024, 3, 31));
    assert_eq!(counted.flag, TransactionFlag::MonthEnd);
    assert_eq!(counted.receipt_number, "ZA20240331");
    assert_eq!(counted.yj_quantity, 90.0);
    assert_eq!(counted.yj_code, "YJCNT");
    assert_eq!(counted.product_name, "Counted");
    assert_eq!(counted.yj_unit_name, "錠");
    assert_eq!(counted.process_flag, ProcessFlag::Complete);

    let uncounted = snapshots.iter().find(|s| s.product_code == UNCOUNTED).unwrap();
    assert_eq!(uncounted.yj_quantity, 10.0);

    let mut lines: Vec<&str> = snapshots.iter().map(|s| s.line_number.as_str()).collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["1", "2"]);
    assert!(snapshots.iter().all(|s| s.product_code != IDLE));
}

#[tokio::test]
async fn rerun_replaces_previous_snapshot() {
    let db = seeded().await;
    db.services.month_end.close_month(2024, 3).await.unwrap();
    db.services
        .ingest
        .ingest_batch(&[IncomingLine::new(
            LineKind::Usage,
            day(2024, 3, 31),
            COUNTED,
            "",
            10.0,
        )])
        .await
        .unwrap();
    db.services.month_end.close_month(2024, 3).await.unwrap();

    let snapshots: Vec<_> = db
        .records_for(COUNTED)
        .await
        .into_iter()
        .filter(|r| r.flag == TransactionFlag::MonthEnd)
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].yj_quantity, 80.0);
}

#[tokio::test]
async fn snapshots_do_not_move_balances() {
    let db = seeded().await;
    db.services.month_end.close_month(2024, 3).await.unwrap();
    let april = db.services.month_end.close_month(2024, 4).await.unwrap();
    let counted = april.iter().find(|s| s.product_code == COUNTED).unwrap();
    assert_eq!(counted.yj_quantity, 85.0);

    let filters = LedgerFilters {
        name: Some("カウント".to_string()),
        start_date: Some(day(2024, 3, 1)),
        end_date: Some(day(2024, 3, 31)),
        ..Default::default()
    };
    let groups = db.services.ledger.build_ledger(&filters).await.unwrap();
    let drug = groups.iter().find(|g| g.yj_code == "YJCNT").unwrap();
    let balances: Vec<f64> = drug.package_ledgers[0]
        .transactions
        .iter()
        .map(|e| e.running_balance)
        .collect();
    assert_eq!(balances, vec![100.0, 70.0, 90.0, 90.0]);
}

#[tokio::test]
async fn lists_months_with_activity() {
    let db = seeded().await;
    let months = db.services.month_end.months_with_activity().await.unwrap();
    assert_eq!(months, vec!["2024-03".to_string(), "2024-04".to_string()]);
}

#[tokio::test]
async fn rejects_invalid_month() {
    let db = seeded().await;
    assert_matches!(
        db.services.month_end.close_month(2024, 13).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn empty_history_writes_nothing() {
    let db = TestDb::new().await;
    let snapshots = db.services.month_end.close_month(2024, 1).await.unwrap();
    assert!(snapshots.is_empty());
}
