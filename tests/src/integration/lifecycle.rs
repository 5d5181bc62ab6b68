//! # Manager Lifecycle
//!
//! Runtime reconfiguration of a live manager: cleanup task start/stop,
//! restarts on tolerance change, and shutdown. Time is paused so the
//! clearing cadence can be observed deterministically.

#[cfg(test)]
mod tests {
    use super::super::TEST_SECRET;
    use shared_signing::{
        Clock, ConfigError, InMemoryReplayStore, ManualClock, SigningAlgorithm, SigningConfigOverrides,
        SigningError, SigningManager, ValidationContext, ValidationErrorKind,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const NOW: u64 = 1_700_000_000_000;

    fn manager(overrides: SigningConfigOverrides) -> (SigningManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let manager = SigningManager::with_parts(
            overrides,
            clock.clone(),
            Arc::new(InMemoryReplayStore::new()),
        )
        .unwrap();
        (manager, clock)
    }

    fn tolerance(ms: u64) -> SigningConfigOverrides {
        SigningConfigOverrides {
            timestamp_tolerance_ms: Some(ms),
            ..Default::default()
        }
    }

    fn replay(enabled: bool) -> SigningConfigOverrides {
        SigningConfigOverrides {
            enable_replay_protection: Some(enabled),
            ..Default::default()
        }
    }

    fn record_one(manager: &SigningManager, cid: &str) {
        let now = manager.clock().now_ms();
        let headers = manager
            .sign_outbound("POST", "/contracts", "{}", TEST_SECRET, Some(cid))
            .unwrap();
        let ctx = ValidationContext::new("POST", "/contracts", "{}", now).with_headers(headers);
        assert!(manager.validate(&ctx, TEST_SECRET).is_valid);
    }

    // =============================================================================
    // TASK BOOKKEEPING
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_toggle_replay_protection_never_leaks_tasks() {
        let (manager, _) = manager(SigningConfigOverrides::default());
        assert!(manager.is_cleanup_running());
        assert_eq!(manager.cleanup_generation(), 1);

        for _ in 0..5 {
            manager.configure(replay(false)).unwrap();
            assert!(!manager.is_cleanup_running());
            manager.configure(replay(true)).unwrap();
            assert!(manager.is_cleanup_running());
        }
        assert_eq!(manager.cleanup_generation(), 6);

        // Re-enabling an already enabled feature is a no-op for the task.
        manager.configure(replay(true)).unwrap();
        assert_eq!(manager.cleanup_generation(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerance_change_restarts_task_on_new_cadence() {
        let (manager, clock) = manager(tolerance(10_000));
        manager.configure(tolerance(2_000)).unwrap();
        assert_eq!(manager.cleanup_generation(), 2);

        record_one(&manager, "cid-1");
        clock.advance(2_000);
        tokio::time::sleep(Duration::from_millis(2_001)).await;
        assert_eq!(manager.stats().replay_cache_size, 0);

        record_one(&manager, "cid-2");
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(manager.stats().replay_cache_size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_algorithm_change_keeps_running_task() {
        let (manager, _) = manager(SigningConfigOverrides::default());
        let config = manager
            .configure(SigningConfigOverrides {
                algorithm: Some(SigningAlgorithm::Sha512),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.algorithm, SigningAlgorithm::Sha512);
        assert_eq!(manager.cleanup_generation(), 1);
        assert_eq!(manager.stats().config.algorithm, SigningAlgorithm::Sha512);
    }

    // =============================================================================
    // CADENCE
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_cache_cleared_every_tolerance_window() {
        let (manager, clock) = manager(tolerance(5_000));

        for round in 0..3 {
            record_one(&manager, &format!("cid-{round}"));
            assert_eq!(manager.stats().replay_cache_size, 1);

            clock.advance(5_000);
            tokio::time::sleep(Duration::from_millis(5_001)).await;
            assert_eq!(manager.stats().replay_cache_size, 0, "round {round}");
        }
        assert!(manager.stats().last_cleared_ms > NOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_protection_stops_clearing_and_recording() {
        let (manager, _) = manager(tolerance(1_000));
        record_one(&manager, "cid-1");

        manager.configure(replay(false)).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        // Entry left behind, nothing clears it any more.
        assert_eq!(manager.stats().replay_cache_size, 1);

        record_one(&manager, "cid-2");
        assert_eq!(manager.stats().replay_cache_size, 1);
    }

    // =============================================================================
    // FAILURES AND SHUTDOWN
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_invalid_reconfiguration_keeps_previous_state() {
        let (manager, _) = manager(tolerance(5_000));
        let err = manager.configure(tolerance(0)).unwrap_err();
        assert!(matches!(
            err,
            SigningError::InvalidConfig(ConfigError::ZeroTolerance { .. })
        ));
        assert_eq!(manager.config().timestamp_tolerance_ms, 5_000);
        assert!(manager.is_cleanup_running());
        assert_eq!(manager.cleanup_generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_then_validation_still_works() {
        let (manager, _) = manager(tolerance(1_000));
        manager.shutdown();
        assert!(!manager.is_cleanup_running());

        record_one(&manager, "cid-1");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.stats().replay_cache_size, 1);

        // Replay protection itself is still in force.
        let now = manager.clock().now_ms();
        let headers = manager
            .sign_outbound("POST", "/contracts", "{}", TEST_SECRET, Some("cid-1"))
            .unwrap();
        let ctx = ValidationContext::new("POST", "/contracts", "{}", now).with_headers(headers);
        assert_eq!(
            manager.validate(&ctx, TEST_SECRET).kind,
            Some(ValidationErrorKind::ReplayDetected)
        );
    }

    #[test]
    fn test_manager_outside_runtime_is_refused() {
        let err = SigningManager::new(SigningConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, SigningError::RuntimeUnavailable));

        let without_replay = SigningManager::new(replay(false)).unwrap();
        assert!(!without_replay.is_cleanup_running());
    }
}
