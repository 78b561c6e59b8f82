//! Property-based tests for key derivation, unit conversion and the ledger.

use chrono::NaiveDate;
use pharmstock::entities::transaction_record::{self, TransactionFlag};
use pharmstock::services::incoming::{
    convert, derive_key, is_synthetic_key, PackFactors, SYNTHETIC_PREFIX,
};
use pharmstock::services::ledger::summarize_package;
use pharmstock::LineKind;
use proptest::prelude::*;

fn code_strategy() -> impl Strategy<Value = String> {
    "49[0-9]{11}"
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,20}"
}

fn factor_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), (1u32..100).prop_map(f64::from)]
}

fn movement_strategy() -> impl Strategy<Value = (u32, TransactionFlag, f64)> {
    (
        1u32..28,
        prop_oneof![
            Just(TransactionFlag::Receipt),
            Just(TransactionFlag::Outbound),
            Just(TransactionFlag::Dispense),
            Just(TransactionFlag::AdjustIncrease),
            Just(TransactionFlag::AdjustDecrease),
            Just(TransactionFlag::WholesaleReceipt),
            Just(TransactionFlag::WholesaleReturn),
        ],
        (0u32..500).prop_map(f64::from),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn real_codes_are_their_own_key(code in code_strategy(), name in name_strategy()) {
        let key = derive_key(&code, &name);
        prop_assert_eq!(&key, &code);
        prop_assert!(!is_synthetic_key(&key));
    }

    #[test]
    fn missing_codes_key_by_name(name in name_strategy(), blank in prop_oneof![Just(""), Just("  "), Just("0000000000000")]) {
        let key = derive_key(blank, &name);
        prop_assert!(key.starts_with(SYNTHETIC_PREFIX));
        prop_assert_eq!(&key[SYNTHETIC_PREFIX.len()..], name.as_str());
        prop_assert_eq!(derive_key(blank, &name), key);
    }

    #[test]
    fn package_conversion_is_consistent(qty in 0u32..1000, unit in factor_strategy(), inner in factor_strategy()) {
        let qty = f64::from(qty);
        let pack = PackFactors { yj_pack_unit_qty: 0.0, jan_pack_unit_qty: unit, jan_pack_inner_qty: inner };
        let q = convert(LineKind::Delivery, qty, pack);
        prop_assert_eq!(q.dat, qty);
        let per_jan = if inner > 0.0 { inner } else { 1.0 };
        prop_assert_eq!(q.yj, q.jan * per_jan);
        prop_assert!(q.jan >= qty);
    }

    #[test]
    fn drug_pack_size_drives_delivered_yj(qty in 0u32..1000, yj_unit in 1u32..500, unit in factor_strategy(), inner in factor_strategy()) {
        let qty = f64::from(qty);
        let pack = PackFactors { yj_pack_unit_qty: f64::from(yj_unit), jan_pack_unit_qty: unit, jan_pack_inner_qty: inner };
        let q = convert(LineKind::Delivery, qty, pack);
        prop_assert_eq!(q.yj, qty * f64::from(yj_unit));
    }

    #[test]
    fn usage_keeps_yj_as_ground_truth(qty in 0u32..1000, inner in factor_strategy()) {
        let pack = PackFactors { yj_pack_unit_qty: 100.0, jan_pack_unit_qty: 10.0, jan_pack_inner_qty: inner };
        let q = convert(LineKind::Usage, f64::from(qty), pack);
        prop_assert_eq!(q.yj, f64::from(qty));
        prop_assert_eq!(q.dat, 0.0);
    }

    #[test]
    fn ledger_net_change_is_sum_of_movements(moves in prop::collection::vec(movement_strategy(), 1..30)) {
        let rows: Vec<transaction_record::Model> = moves
            .iter()
            .enumerate()
            .map(|(i, (d, flag, qty))| {
                let date = NaiveDate::from_ymd_opt(2024, 2, *d).unwrap();
                let mut r = transaction_record::Model::blank(date, *flag);
                r.id = i as i64 + 1;
                r.yj_quantity = *qty;
                r
            })
            .collect();
        let total: f64 = rows.iter().map(|r| r.flag.signed(r.yj_quantity)).sum();
        let first = rows
            .iter()
            .min_by(|a, b| a.transaction_date.cmp(&b.transaction_date).then(a.flag.cmp(&b.flag)).then(a.id.cmp(&b.id)))
            .unwrap();
        let p = summarize_package("k".to_string(), rows.clone(), 1.5);
        prop_assert_eq!(p.starting_balance, -first.flag.signed(first.yj_quantity));
        prop_assert!((p.net_change - total).abs() < 1e-9);
        prop_assert_eq!(p.transactions.len(), rows.len());
        prop_assert_eq!(p.transactions[0].running_balance, 0.0);
    }
}
