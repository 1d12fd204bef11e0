mod common;

use bucket_bloom_rs::{
    BucketFilter, BucketFilterOps, BucketFilterStats, FilterConfigBuilder,
    FilterError, KeyRegistry, lock_filter,
};
use common::test_utils::TestStateFile;

fn create_test_filter() -> BucketFilter {
    let config = FilterConfigBuilder::default()
        .capacity_per_bucket(500)
        .false_positive_rate(0.01)
        .num_buckets(4)
        .build()
        .expect("Failed to build test config");
    BucketFilter::new(config).expect("Failed to create test filter")
}

#[cfg(test)]
mod filter_snapshot_tests {
    use super::*;

    #[test]
    fn test_restored_filter_keeps_window() {
        let mut filter = create_test_filter();
        filter.insert(b"zero").unwrap();
        filter.set_time(2).unwrap();
        filter.insert(b"two").unwrap();
        filter.clear_time(0).unwrap();

        let bytes = filter.to_bytes().unwrap();
        let mut restored = BucketFilter::from_bytes(&bytes).unwrap();

        assert_eq!(restored.current_time(), 2);
        assert_eq!(restored.config(), filter.config());
        assert_eq!(restored.info(), filter.info());
        assert!(restored.exists(b"two").unwrap());
        assert!(!restored.exists(b"zero").unwrap());

        // Restored filter keeps sliding like the source filter
        restored.advance_time(4).unwrap();
        assert!(!restored.exists(b"two").unwrap());
    }

    #[test]
    fn test_empty_filter_snapshot() {
        let filter = create_test_filter();
        let restored = BucketFilter::from_bytes(&filter.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.live_buckets(), 0);
        assert_eq!(restored.current_time(), 0);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let mut filter = create_test_filter();
        filter.insert(b"x").unwrap();
        let bytes = filter.to_bytes().unwrap();

        assert!(matches!(
            BucketFilter::from_bytes(&bytes[..bytes.len() / 2]),
            Err(FilterError::SerializationError(_))
        ));
        assert!(BucketFilter::from_bytes(b"").is_err());
    }
}

#[cfg(test)]
mod registry_snapshot_tests {
    use super::*;

    #[test]
    fn test_save_and_load_registry() {
        let state = TestStateFile::new("save_and_load_registry");
        let config = FilterConfigBuilder::default()
            .capacity_per_bucket(500)
            .num_buckets(4)
            .build()
            .unwrap();
        let registry = KeyRegistry::new(config.clone()).unwrap();

        {
            let a = registry.get_or_create(b"a").unwrap();
            let mut a = lock_filter(&a).unwrap();
            a.insert(b"alpha").unwrap();
            a.advance_time(3).unwrap();
            a.insert(b"beta").unwrap();

            let b = registry.get_or_create(b"b").unwrap();
            lock_filter(&b).unwrap().insert(b"gamma").unwrap();
        }
        registry.save_to_path(&state.path()).unwrap();

        let loaded = KeyRegistry::load_from_path(&state.path()).unwrap();
        assert_eq!(loaded.config(), &config);
        assert_eq!(loaded.keys().unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);

        let a = loaded.get(b"a").unwrap().unwrap();
        let a = lock_filter(&a).unwrap();
        assert_eq!(a.current_time(), 3);
        assert!(a.exists(b"alpha").unwrap());
        assert!(a.exists(b"beta").unwrap());

        let b = loaded.get(b"b").unwrap().unwrap();
        let b = lock_filter(&b).unwrap();
        assert!(b.exists(b"gamma").unwrap());
        assert!(!b.exists(b"alpha").unwrap());
    }

    #[test]
    fn test_empty_registry_roundtrip() {
        let registry = KeyRegistry::new(Default::default()).unwrap();
        let restored = KeyRegistry::restore(&registry.snapshot().unwrap()).unwrap();
        assert!(restored.is_empty().unwrap());
        assert_eq!(restored.config(), registry.config());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let state = TestStateFile::new("missing_file");
        assert!(matches!(
            KeyRegistry::load_from_path(&state.path()),
            Err(FilterError::Io(_))
        ));
    }
}
