mod common;

use proptest::prelude::*;
use std::sync::Arc;

use common::{FakeEmbedder, RecordingStore, fragment_line, pipeline};
use fragment_ingest::sources::FragmentReader;

fn run_ingest(total: usize, threshold: usize) -> (Vec<usize>, u64) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let input: String = (1..=total).map(|i| fragment_line(i) + "\n").collect();
        let store = Arc::new(RecordingStore::default());
        let mut pipeline = pipeline(Arc::new(FakeEmbedder::default()), store.clone(), threshold);
        let report = pipeline
            .run(FragmentReader::new(input.as_bytes()))
            .await
            .unwrap();
        (store.upsert_sizes(), report.points_persisted)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn flushes_are_full_except_the_remainder(total in 0usize..260, threshold in 1usize..60) {
        let (sizes, persisted) = run_ingest(total, threshold);

        prop_assert_eq!(persisted as usize, total);
        prop_assert_eq!(sizes.iter().sum::<usize>(), total);
        prop_assert_eq!(sizes.len(), total.div_ceil(threshold));
        prop_assert!(sizes.iter().all(|s| *s > 0));

        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|s| *s == threshold));
            let expected_last = match total % threshold {
                0 => threshold,
                rem => rem,
            };
            prop_assert_eq!(*last, expected_last);
        }
    }
}
