use proptest::prelude::*;
use tempfile::TempDir;

use localdoc_core::traits::FeedbackScores;
use localdoc_feedback::{FeedbackStore, JsonFeedbackStore};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn aggregate_is_the_sum_of_ratings_across_reopen(ratings in prop::collection::vec((0usize..3, any::<bool>()), 0..40)) {
        let tmp = TempDir::new().unwrap();
        let mut expected = [0i64; 3];
        {
            let store = JsonFeedbackStore::open(tmp.path()).unwrap();
            for (chunk, relevant) in &ratings {
                store.record_feedback("q", &format!("c{chunk}"), *relevant).unwrap();
                expected[*chunk] += if *relevant { 1 } else { -1 };
            }
        }
        let store = JsonFeedbackStore::open(tmp.path()).unwrap();
        for (chunk, want) in expected.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let want = *want as f32;
            prop_assert_eq!(store.feedback_score("q", &format!("c{chunk}")).unwrap(), want);
        }
        prop_assert_eq!(store.stats().records, ratings.len());
    }
}
