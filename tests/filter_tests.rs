use bucket_bloom_rs::{
    BucketFilter, BucketFilterOps, BucketFilterStats, BulkBucketFilterOps,
    FilterConfigBuilder, FilterError,
};
use bucket_bloom_rs::filter::MAX_TIME;

// Helper function to create a filter with a small window for testing
fn create_test_filter(capacity: usize, num_buckets: usize) -> BucketFilter {
    let config = FilterConfigBuilder::default()
        .capacity_per_bucket(capacity)
        .false_positive_rate(0.01)
        .num_buckets(num_buckets)
        .max_item_len(256)
        .build()
        .expect("Failed to build test config");

    BucketFilter::new(config).expect("Failed to create test filter")
}

// Helper function to generate consistent test data
fn generate_test_items(prefix: &str, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("{prefix}_{i:06}").into_bytes())
        .collect()
}

#[cfg(test)]
mod basic_operations_tests {
    use super::*;

    #[test]
    fn test_new_filter_is_empty() {
        let filter = create_test_filter(1000, 4);

        assert_eq!(filter.current_time(), 0);
        assert_eq!(filter.num_buckets(), 4);
        assert_eq!(filter.live_buckets(), 0);
        assert_eq!(filter.total_insert_count(), 0);
        assert!(!filter.exists(b"anything").unwrap());
    }

    #[test]
    fn test_insert_and_exists() {
        let mut filter = create_test_filter(1000, 4);
        let items = generate_test_items("basic", 100);

        for item in &items {
            filter.insert(item).expect("Insert should succeed");
        }
        for item in &items {
            assert!(
                filter.exists(item).expect("Exists should succeed"),
                "Item {:?} should be found after insertion",
                String::from_utf8_lossy(item)
            );
        }
        assert_eq!(filter.total_insert_count(), 100);
        assert_eq!(filter.live_buckets(), 1);
    }

    #[test]
    fn test_empty_item_is_valid() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"").unwrap();
        assert!(filter.exists(b"").unwrap());
    }

    #[test]
    fn test_duplicate_inserts_are_counted() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"dup").unwrap();
        filter.insert(b"dup").unwrap();

        assert!(filter.exists(b"dup").unwrap());
        assert_eq!(filter.total_insert_count(), 2);
    }

    #[test]
    fn test_bulk_operations() {
        let mut filter = create_test_filter(1000, 4);
        let items = generate_test_items("bulk", 50);
        let refs: Vec<&[u8]> = items.iter().map(|i| i.as_slice()).collect();

        filter.insert_bulk(&refs).unwrap();
        let found = filter.exists_bulk(&refs).unwrap();
        assert!(found.iter().all(|&f| f));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"x").unwrap();
        filter.advance_time(3).unwrap();
        filter.insert(b"y").unwrap();

        filter.clear();
        assert_eq!(filter.current_time(), 0);
        assert_eq!(filter.live_buckets(), 0);
        assert!(!filter.exists(b"x").unwrap());
        assert!(!filter.exists(b"y").unwrap());
    }
}

#[cfg(test)]
mod window_tests {
    use super::*;

    #[test]
    fn test_items_survive_while_bucket_is_live() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"t0").unwrap();

        // Window [0, 3] still holds bucket 0
        filter.advance_time(3).unwrap();
        assert!(filter.exists(b"t0").unwrap());

        // Window [1, 4] has dropped it
        filter.advance_time(1).unwrap();
        assert!(!filter.exists(b"t0").unwrap());
    }

    #[test]
    fn test_each_bucket_expires_in_order() {
        let mut filter = create_test_filter(1000, 3);
        for t in 0..3 {
            filter.set_time(t).unwrap();
            filter.insert(format!("item_{t}").as_bytes()).unwrap();
        }

        filter.advance_time(1).unwrap();
        assert!(!filter.exists(b"item_0").unwrap());
        assert!(filter.exists(b"item_1").unwrap());
        assert!(filter.exists(b"item_2").unwrap());

        filter.advance_time(1).unwrap();
        assert!(!filter.exists(b"item_1").unwrap());
        assert!(filter.exists(b"item_2").unwrap());
    }

    #[test]
    fn test_large_jump_empties_window() {
        let mut filter = create_test_filter(1000, 4);
        for item in generate_test_items("jump", 20) {
            filter.insert(&item).unwrap();
        }

        filter.advance_time(100).unwrap();
        assert_eq!(filter.current_time(), 100);
        assert_eq!(filter.live_buckets(), 0);
        for item in generate_test_items("jump", 20) {
            assert!(!filter.exists(&item).unwrap());
        }
    }

    #[test]
    fn test_single_bucket_window() {
        let mut filter = create_test_filter(1000, 1);
        filter.insert(b"now").unwrap();
        assert!(filter.exists(b"now").unwrap());

        filter.advance_time(1).unwrap();
        assert!(!filter.exists(b"now").unwrap());
        filter.insert(b"later").unwrap();
        assert!(filter.exists(b"later").unwrap());
    }

    #[test]
    fn test_advance_time_returns_new_time() {
        let mut filter = create_test_filter(1000, 4);
        assert_eq!(filter.advance_time(1).unwrap(), 1);
        assert_eq!(filter.advance_time(5).unwrap(), 6);
    }

    #[test]
    fn test_advance_time_rejects_zero_and_overflow() {
        let mut filter = create_test_filter(1000, 4);
        assert!(matches!(
            filter.advance_time(0),
            Err(FilterError::InvalidTime(_))
        ));

        filter.set_time(i64::MAX).unwrap();
        filter.insert(b"edge").unwrap();
        let result = filter.advance_time(u64::MAX);
        assert!(matches!(result, Err(FilterError::InvalidTime(_))));

        // A rejected advance leaves the filter untouched
        assert_eq!(filter.current_time(), i64::MAX as u64);
        assert!(filter.exists(b"edge").unwrap());
    }

    #[test]
    fn test_advance_time_stops_at_signed_range() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(i64::MAX - 1).unwrap();
        assert_eq!(filter.advance_time(1).unwrap(), MAX_TIME);
        filter.insert(b"last").unwrap();

        // u64 has room left, but no command could address those buckets
        assert!(matches!(
            filter.advance_time(5),
            Err(FilterError::InvalidTime(_))
        ));
        assert!(matches!(
            filter.advance_time(1),
            Err(FilterError::InvalidTime(_))
        ));
        assert_eq!(filter.current_time(), MAX_TIME);
        assert!(filter.exists(b"last").unwrap());

        // The live bucket stays reachable through the signed API
        assert!(filter.clear_time(i64::MAX).unwrap());
        assert!(!filter.exists(b"last").unwrap());
    }
}

#[cfg(test)]
mod set_time_tests {
    use super::*;

    #[test]
    fn test_set_time_forward_within_window() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"keep").unwrap();
        filter.set_time(2).unwrap();

        assert_eq!(filter.current_time(), 2);
        assert!(filter.exists(b"keep").unwrap());
    }

    #[test]
    fn test_set_time_rollback_drops_future_buckets() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(5).unwrap();
        filter.insert(b"five").unwrap();
        filter.set_time(6).unwrap();
        filter.insert(b"six").unwrap();

        filter.set_time(5).unwrap();
        assert!(filter.exists(b"five").unwrap());
        assert!(!filter.exists(b"six").unwrap());
    }

    #[test]
    fn test_rollback_does_not_resurrect_evicted_buckets() {
        let mut filter = create_test_filter(1000, 2);
        filter.insert(b"zero").unwrap();
        filter.set_time(10).unwrap();
        assert!(!filter.exists(b"zero").unwrap());

        filter.set_time(0).unwrap();
        assert!(!filter.exists(b"zero").unwrap());
    }

    #[test]
    fn test_set_time_same_value_is_noop() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(3).unwrap();
        filter.insert(b"same").unwrap();
        filter.set_time(3).unwrap();
        assert!(filter.exists(b"same").unwrap());
    }

    #[test]
    fn test_set_time_rejects_negative() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(2).unwrap();

        assert!(matches!(
            filter.set_time(-1),
            Err(FilterError::InvalidTime(_))
        ));
        assert_eq!(filter.current_time(), 2);
    }
}

#[cfg(test)]
mod clear_time_tests {
    use super::*;

    #[test]
    fn test_clear_time_evicts_only_that_bucket() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"a").unwrap();
        filter.advance_time(1).unwrap();
        filter.insert(b"b").unwrap();

        assert!(filter.clear_time(0).unwrap());
        assert!(!filter.exists(b"a").unwrap());
        assert!(filter.exists(b"b").unwrap());
    }

    #[test]
    fn test_clear_time_is_idempotent() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"a").unwrap();

        assert!(filter.clear_time(0).unwrap());
        assert!(!filter.clear_time(0).unwrap());
        assert!(!filter.exists(b"a").unwrap());
    }

    #[test]
    fn test_clear_time_unknown_bucket_is_noop() {
        let mut filter = create_test_filter(1000, 4);
        filter.insert(b"a").unwrap();

        // Bucket 4 shares slot 0 with bucket 0 but is not the one stored there
        assert!(!filter.clear_time(4).unwrap());
        assert!(!filter.clear_time(1000).unwrap());
        assert!(filter.exists(b"a").unwrap());
    }

    #[test]
    fn test_clear_active_bucket_accepts_new_items() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(2).unwrap();
        filter.insert(b"before").unwrap();

        assert!(filter.clear_time(2).unwrap());
        assert!(!filter.exists(b"before").unwrap());

        filter.insert(b"after").unwrap();
        assert!(filter.exists(b"after").unwrap());
        assert!(!filter.exists(b"before").unwrap());
    }

    #[test]
    fn test_clear_time_rejects_negative() {
        let mut filter = create_test_filter(1000, 4);
        assert!(matches!(
            filter.clear_time(-3),
            Err(FilterError::InvalidTime(_))
        ));
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_oversized_item_rejected() {
        let mut filter = create_test_filter(1000, 4);
        let big = vec![7u8; 257];

        let result = filter.insert(&big);
        assert!(matches!(
            result,
            Err(FilterError::InvalidItem { len: 257, max: 256 })
        ));
        assert_eq!(filter.total_insert_count(), 0);
        assert_eq!(filter.live_buckets(), 0);

        assert!(filter.exists(&big).is_err());
        assert!(filter.insert(&big[..256]).is_ok());
    }

    #[test]
    fn test_bulk_insert_is_all_or_nothing() {
        let mut filter = create_test_filter(1000, 4);
        let big = vec![1u8; 300];
        let items: Vec<&[u8]> =
            vec![b"fine".as_slice(), big.as_slice(), b"also_fine".as_slice()];

        assert!(filter.insert_bulk(&items).is_err());
        assert_eq!(filter.total_insert_count(), 0);
        assert!(!filter.exists(b"fine").unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FilterConfigBuilder::default()
            .num_buckets(0)
            .build()
            .unwrap();
        assert!(matches!(
            BucketFilter::new(config),
            Err(FilterError::InvalidConfig(_))
        ));
    }
}

#[cfg(test)]
mod info_tests {
    use super::*;

    #[test]
    fn test_info_reports_live_buckets_in_order() {
        let mut filter = create_test_filter(1000, 4);
        filter.set_time(5).unwrap();
        filter.insert(b"a").unwrap();
        filter.insert(b"b").unwrap();
        filter.set_time(3).unwrap();
        filter.set_time(4).unwrap();
        filter.insert(b"c").unwrap();
        filter.advance_time(1).unwrap();
        filter.insert(b"d").unwrap();

        let info = filter.info();
        assert_eq!(info.current_time, 5);
        assert_eq!(info.window_start, 2);
        assert_eq!(info.num_buckets, 4);
        assert_eq!(info.total_insert_count, 2);
        let buckets: Vec<u64> = info.buckets.iter().map(|b| b.bucket).collect();
        assert_eq!(buckets, vec![4, 5]);
        assert!(info.buckets.iter().all(|b| b.fill_ratio > 0.0));
    }

    #[test]
    fn test_estimated_fpr_grows_with_load() {
        let mut filter = create_test_filter(100, 4);
        assert_eq!(filter.estimated_fpr(), 0.0);

        for item in generate_test_items("load", 50) {
            filter.insert(&item).unwrap();
        }
        let half = filter.estimated_fpr();
        for item in generate_test_items("more", 150) {
            filter.insert(&item).unwrap();
        }
        let over = filter.estimated_fpr();

        assert!(half > 0.0);
        assert!(over > half);
    }
}

#[cfg(test)]
mod false_positive_tests {
    use super::*;
    use rand::random;

    #[test]
    fn test_false_positive_rate_within_bounds() {
        let capacity = 10_000;
        let mut filter = create_test_filter(capacity, 4);

        for i in 0..capacity {
            filter.insert(format!("member_{i}").as_bytes()).unwrap();
        }

        let trials = 20_000;
        let mut false_positives = 0;
        for _ in 0..trials {
            let candidate = format!("candidate_{}", random::<u64>());
            if filter.exists(candidate.as_bytes()).unwrap() {
                false_positives += 1;
            }
        }

        let observed = false_positives as f64 / trials as f64;
        // One live bucket at capacity, target 1%
        assert!(observed < 0.02, "observed false positive rate {observed}");
    }

    #[test]
    fn test_no_false_negatives_across_window() {
        let mut filter = create_test_filter(500, 8);
        for t in 0..8 {
            filter.set_time(t).unwrap();
            for item in generate_test_items(&format!("bucket{t}"), 200) {
                filter.insert(&item).unwrap();
            }
        }

        for t in 0..8 {
            for item in generate_test_items(&format!("bucket{t}"), 200) {
                assert!(filter.exists(&item).unwrap());
            }
        }
    }
}
