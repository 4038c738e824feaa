//! Property tests against an in-memory model.

use optikv_core::{OptimisticTransactionOptions, ReadOptions, WriteOptions};
use optikv_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn assert_matches_model(db: &OptimisticTransactionDb, model: &BTreeMap<Vec<u8>, Vec<u8>>) {
    for key in model.keys() {
        let value = read_latest(db, key).unwrap();
        assert_eq!(value.as_ref(), model.get(key));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sequential_transactions_match_model(batches in transactions_strategy()) {
        let db = TestDb::memory();
        let mut model = BTreeMap::new();
        let wo = WriteOptions::new();
        let to = OptimisticTransactionOptions::new();

        let mut previous = None;
        for batch in &batches {
            let mut txn = db.transaction_begin(&wo, &to, previous.take());
            for op in batch {
                op.apply_to(&mut txn).unwrap();
                op.apply_model(&mut model);
            }
            txn.commit().unwrap();
            previous = Some(txn);
        }
        drop(previous);
        assert_matches_model(&db, &model);

        for op in batches.iter().flatten() {
            let value = db.get(&ReadOptions::new(), op.key()).unwrap().into_vec();
            prop_assert_eq!(value.as_ref(), model.get(op.key()));
        }
    }

    #[test]
    fn rolled_back_batch_changes_nothing(
        committed in write_ops_strategy(16),
        discarded in write_ops_strategy(16),
    ) {
        let db = TestDb::memory();
        let mut model = BTreeMap::new();
        for op in &committed {
            op.apply_direct(&db).unwrap();
            op.apply_model(&mut model);
        }

        let mut txn = db.transaction_begin(&WriteOptions::new(), &OptimisticTransactionOptions::new(), None);
        for op in &discarded {
            op.apply_to(&mut txn).unwrap();
        }
        txn.rollback().unwrap();
        drop(txn);

        for op in committed.iter().chain(&discarded) {
            let value = read_latest(&db, op.key()).unwrap();
            prop_assert_eq!(value.as_ref(), model.get(op.key()));
        }
    }

    #[test]
    fn snapshot_sees_state_at_creation(
        before in write_ops_strategy(12),
        after in write_ops_strategy(12),
    ) {
        let db = TestDb::memory();
        let mut model = BTreeMap::new();
        for op in &before {
            op.apply_direct(&db).unwrap();
            op.apply_model(&mut model);
        }

        let mut snapshot = db.new_snapshot();
        for op in &after {
            op.apply_direct(&db).unwrap();
        }

        let at_snapshot = ReadOptions::new().snapshot(&snapshot);
        for op in before.iter().chain(&after) {
            let value = db.get(&at_snapshot, op.key()).unwrap().into_vec();
            prop_assert_eq!(value.as_ref(), model.get(op.key()));
        }
        db.release_snapshot(&mut snapshot);
    }
}
