//! # Concurrent Validation
//!
//! Handlers validate in parallel against one shared manager. The replay
//! check must admit exactly one of several identical in-flight calls while
//! leaving distinct calls untouched.

#[cfg(test)]
mod tests {
    use super::super::TEST_SECRET;
    use shared_signing::{
        InMemoryReplayStore, ManualClock, SigningConfigOverrides, SigningManager,
        ValidationContext, ValidationErrorKind,
    };
    use std::sync::Arc;
    use tokio::task::JoinSet;

    const NOW: u64 = 1_700_000_000_000;
    const CALLERS: usize = 64;

    fn shared_manager() -> Arc<SigningManager> {
        Arc::new(
            SigningManager::with_parts(
                SigningConfigOverrides::default(),
                Arc::new(ManualClock::new(NOW)),
                Arc::new(InMemoryReplayStore::new()),
            )
            .unwrap(),
        )
    }

    fn signed_context(manager: &SigningManager, body: &str, cid: Option<&str>) -> ValidationContext {
        let headers = manager
            .sign_outbound("POST", "/contracts", body, TEST_SECRET, cid)
            .unwrap();
        ValidationContext::new("POST", "/contracts", body, NOW).with_headers(headers)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_identical_calls_admit_exactly_one() {
        let manager = shared_manager();
        let ctx = Arc::new(signed_context(&manager, "{\"a\":1}", Some("cid-1")));

        let mut set = JoinSet::new();
        for _ in 0..CALLERS {
            let manager = Arc::clone(&manager);
            let ctx = Arc::clone(&ctx);
            set.spawn(async move { manager.validate(&ctx, TEST_SECRET) });
        }

        let mut accepted = 0;
        let mut replays = 0;
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap();
            if result.is_valid {
                accepted += 1;
            } else {
                assert_eq!(result.kind, Some(ValidationErrorKind::ReplayDetected));
                replays += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(replays, CALLERS - 1);
        assert_eq!(manager.stats().replay_cache_size, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_correlation_ids_all_pass() {
        let manager = shared_manager();

        let mut set = JoinSet::new();
        for i in 0..CALLERS {
            let manager = Arc::clone(&manager);
            let ctx = signed_context(&manager, "{\"a\":1}", Some(&format!("cid-{i}")));
            set.spawn(async move { manager.validate(&ctx, TEST_SECRET) });
        }

        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap();
            assert!(result.is_valid, "{:?}", result.error);
        }

        let stats = manager.stats();
        assert_eq!(stats.replay_cache_size, CALLERS);
        assert_eq!(stats.validations.accepted, CALLERS as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_forged_calls_leave_no_lasting_entry() {
        let manager = shared_manager();
        let genuine = signed_context(&manager, "{\"a\":1}", None);

        // Same signature and timestamp, different body: fails the digest and
        // releases the replay key it held while in flight. The genuine call
        // only succeeds once every forger has finished.
        let mut set = JoinSet::new();
        for i in 0..CALLERS {
            let manager = Arc::clone(&manager);
            let mut forged = genuine.clone();
            forged.body = format!("{{\"a\":{}}}", i + 2);
            set.spawn(async move { manager.validate(&forged, TEST_SECRET) });
        }
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap();
            assert!(!result.is_valid);
            // a forger can also lose the race to another forger holding the key
            assert!(matches!(
                result.kind,
                Some(ValidationErrorKind::SignatureMismatch | ValidationErrorKind::ReplayDetected)
            ));
        }
        assert_eq!(manager.stats().replay_cache_size, 0);

        assert!(manager.validate(&genuine, TEST_SECRET).is_valid);
    }
}
