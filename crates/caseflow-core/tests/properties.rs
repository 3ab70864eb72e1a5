//! Property tests for the lag queue, split-file grouping and multipass stores.

use caseflow_core::{
    AutoPagingStore, CaseStore, DiskStore, GroupHandler, LagQueue, MemoryStore, Replay,
    VecSource, group_cases, read_all,
};
use caseflow_model::{Case, CaseProto, Value};
use proptest::prelude::*;

fn numeric(x: f64) -> Case {
    Case::new(vec![Value::number(x)])
}

#[derive(Default)]
struct Counter {
    begins: usize,
    ends: usize,
    processed: usize,
    open: bool,
    balanced: bool,
}

impl GroupHandler for Counter {
    fn begin(&mut self, _first: &Case) -> caseflow_core::Result<()> {
        if self.open {
            self.balanced = false;
        }
        self.open = true;
        self.begins += 1;
        Ok(())
    }

    fn process(&mut self, _case: &Case) -> caseflow_core::Result<()> {
        if !self.open {
            self.balanced = false;
        }
        self.processed += 1;
        Ok(())
    }

    fn end(&mut self) -> caseflow_core::Result<()> {
        if !self.open {
            self.balanced = false;
        }
        self.open = false;
        self.ends += 1;
        Ok(())
    }
}

fn runs(keys: &[u8]) -> usize {
    keys.windows(2).filter(|w| w[0] != w[1]).count() + usize::from(!keys.is_empty())
}

fn replay_twice(replay: &Replay) -> (Vec<Case>, Vec<Case>) {
    let first = read_all(&mut replay.reader().unwrap()).unwrap();
    let second = read_all(&mut replay.reader().unwrap()).unwrap();
    (first, second)
}

fn mixed_cases() -> impl Strategy<Value = Vec<Case>> {
    prop::collection::vec((-1.0e9f64..1.0e9, "[a-z]{0,6}"), 0..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(x, s)| Case::new(vec![Value::number(x), Value::string(s, 6)]))
            .collect()
    })
}

fn bits(cases: &[Case]) -> Vec<Vec<u64>> {
    cases
        .iter()
        .map(|c| {
            c.values()
                .iter()
                .map(|v| match v {
                    Value::Number(x) => x.to_bits(),
                    Value::String(b) => b.iter().fold(0u64, |h, &byte| {
                        h.wrapping_mul(31).wrapping_add(u64::from(byte))
                    }),
                })
                .collect()
        })
        .collect()
}

proptest! {
    #[test]
    fn lag_returns_case_pushed_k_ago(
        values in prop::collection::vec(-1000.0f64..1000.0, 0..50),
        capacity in 0usize..8,
    ) {
        let mut lag = LagQueue::new(capacity);
        for (pushed, &x) in values.iter().enumerate() {
            for k in 1..=capacity + 1 {
                let got = lag.get(k).and_then(|c| c.number(0));
                if k <= capacity && k <= pushed {
                    prop_assert_eq!(got, Some(values[pushed - k]));
                } else {
                    prop_assert_eq!(got, None);
                }
            }
            lag.push(numeric(x));
        }
    }

    #[test]
    fn split_groups_match_runs(mut keys in prop::collection::vec(0u8..5, 0..60)) {
        keys.sort_unstable();
        let cases = keys.iter().map(|&k| numeric(f64::from(k))).collect();
        let mut source = VecSource::new(CaseProto::new(vec![0]), cases);
        let mut counter = Counter { balanced: true, ..Counter::default() };

        let stats = group_cases(&mut source, &[0], &mut counter).unwrap();

        prop_assert!(counter.balanced);
        prop_assert!(!counter.open);
        prop_assert_eq!(counter.begins, counter.ends);
        prop_assert_eq!(counter.begins, runs(&keys));
        prop_assert_eq!(counter.processed, keys.len());
        prop_assert_eq!(stats.groups as usize, runs(&keys));
    }

    #[test]
    fn unsorted_keys_still_call_process_for_every_case(
        keys in prop::collection::vec(0u8..3, 0..30),
    ) {
        let cases = keys.iter().map(|&k| numeric(f64::from(k))).collect();
        let mut source = VecSource::new(CaseProto::new(vec![0]), cases);
        let mut counter = Counter { balanced: true, ..Counter::default() };
        group_cases(&mut source, &[0], &mut counter).unwrap();
        prop_assert_eq!(counter.processed, keys.len());
        prop_assert_eq!(counter.begins, runs(&keys));
    }

    #[test]
    fn memory_replay_is_idempotent(cases in mixed_cases()) {
        let mut store = MemoryStore::new(CaseProto::new(vec![0, 6]));
        for case in &cases {
            store.append(case.clone()).unwrap();
        }
        let replay = Box::new(store).into_replay().unwrap();
        let (first, second) = replay_twice(&replay);
        prop_assert_eq!(bits(&first), bits(&second));
        prop_assert_eq!(first, cases);
    }

    #[test]
    fn disk_replay_is_idempotent(cases in mixed_cases()) {
        let mut store = DiskStore::new(CaseProto::new(vec![0, 6]), None).unwrap();
        for case in &cases {
            store.append(case.clone()).unwrap();
        }
        let replay = Box::new(store).into_replay().unwrap();
        prop_assert_eq!(replay.len(), cases.len() as u64);
        let (first, second) = replay_twice(&replay);
        prop_assert_eq!(bits(&first), bits(&second));
        prop_assert_eq!(first, cases);
    }

    #[test]
    fn paging_replay_preserves_order(cases in mixed_cases(), budget in 0usize..10) {
        let mut store = AutoPagingStore::new(CaseProto::new(vec![0, 6]), budget, None);
        for case in &cases {
            store.append(case.clone()).unwrap();
        }
        prop_assert_eq!(store.is_paged(), cases.len() > budget);
        let replay = Box::new(store).into_replay().unwrap();
        let (first, second) = replay_twice(&replay);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, cases);
    }
}
