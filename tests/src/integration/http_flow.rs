//! # HTTP Flow
//!
//! Two internal services, each with its own signing manager and clock,
//! sharing one secret. The caller signs with [`signed_request`]; the
//! receiving router validates in its signature layer before any procedure
//! or admin handler runs.

#[cfg(test)]
mod tests {
    use super::super::TEST_SECRET;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use serde_json::{json, Value};
    use shared_signing::{
        InMemoryReplayStore, ManualClock, SigningConfigOverrides, SigningManager, SIGNATURE_HEADER,
    };
    use signed_handler::{
        build_router, signed_request, AppState, EchoGateway, HandlerConfig, HandlerService,
        RouterOptions, SharedSecret,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const NOW: u64 = 1_700_000_000_000;

    struct Services {
        router: Router,
        receiver: Arc<SigningManager>,
        caller: SigningManager,
        caller_clock: Arc<ManualClock>,
    }

    fn manager_at(clock: Arc<ManualClock>) -> SigningManager {
        SigningManager::with_parts(
            SigningConfigOverrides::default(),
            clock,
            Arc::new(InMemoryReplayStore::new()),
        )
        .unwrap()
    }

    fn services(require_signature: bool) -> Services {
        let receiver = Arc::new(manager_at(Arc::new(ManualClock::new(NOW))));
        let caller_clock = Arc::new(ManualClock::new(NOW));
        let caller = manager_at(caller_clock.clone());

        let router = build_router(
            AppState {
                signing: Arc::clone(&receiver),
                gateway: Arc::new(EchoGateway::default()),
            },
            RouterOptions {
                secret: SharedSecret::new(TEST_SECRET),
                max_body_bytes: 4 * 1024,
                require_signature,
            },
        );

        Services {
            router,
            receiver,
            caller,
            caller_clock,
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn echo(services: &Services, body: &str, cid: Option<&str>) -> Request<Body> {
        signed_request(&services.caller, TEST_SECRET, "POST", "/rpc/echo", body, cid).unwrap()
    }

    // =============================================================================
    // PROCEDURE CALLS
    // =============================================================================

    #[tokio::test]
    async fn test_signed_call_then_replay() {
        let services = services(true);

        let response = services
            .router
            .clone()
            .oneshot(echo(&services, "{\"a\":1}", Some("cid-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["result"], json!({ "a": 1 }));
        assert_eq!(json["correlation_id"], "cid-1");

        let response = services
            .router
            .clone()
            .oneshot(echo(&services, "{\"a\":1}", Some("cid-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["kind"], "replay_detected");
        assert_eq!(json["algorithm"], "sha256");
    }

    #[tokio::test]
    async fn test_tampered_body_is_signature_mismatch() {
        let services = services(true);
        let signed = echo(&services, "{\"amount\":10}", None);

        let (parts, _) = signed.into_parts();
        let tampered = Request::from_parts(parts, Body::from("{\"amount\":99}"));

        let response = services.router.clone().oneshot(tampered).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["kind"], "signature_mismatch");
        assert_eq!(json["error"], "Signature mismatch");

        // The rejected attempt left nothing behind in the replay cache.
        assert_eq!(services.receiver.stats().replay_cache_size, 0);
    }

    #[tokio::test]
    async fn test_caller_clock_skew_is_timestamp_invalid() {
        let services = services(true);
        services.caller_clock.set(NOW - 300_001);

        let response = services
            .router
            .clone()
            .oneshot(echo(&services, "{}", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["kind"], "timestamp_invalid");

        services.caller_clock.set(NOW + 300_000);
        let response = services
            .router
            .clone()
            .oneshot(echo(&services, "{}", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unsigned_call_depends_on_requirement() {
        let unsigned = || {
            Request::builder()
                .method("POST")
                .uri("/rpc/ping")
                .body(Body::empty())
                .unwrap()
        };

        let strict = services(true);
        let response = strict.router.clone().oneshot(unsigned()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["kind"], "missing_signature");

        let lenient = services(false);
        let response = lenient.router.clone().oneshot(unsigned()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["result"], "pong");
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let services = services(true);
        let forged = signed_request(
            &services.caller,
            "another-secret-another-secret-00",
            "POST",
            "/rpc/echo",
            "{}",
            None,
        )
        .unwrap();
        let response = services.router.clone().oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["kind"], "signature_mismatch");
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let services = services(true);
        let body = format!("{{\"blob\":\"{}\"}}", "x".repeat(8 * 1024));
        let response = services
            .router
            .clone()
            .oneshot(echo(&services, &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["kind"], "body_read_error");
    }

    // =============================================================================
    // ADMIN ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_admin_reconfigure_and_clear() {
        let services = services(false);

        let response = services
            .router
            .clone()
            .oneshot(echo(&services, "{}", Some("cid-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stats = signed_request(
            &services.caller,
            TEST_SECRET,
            "GET",
            "/admin/signing/stats",
            "",
            None,
        )
        .unwrap();
        let response = services.router.clone().oneshot(stats).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        // the stats call itself is recorded too
        assert_eq!(json["replay_cache_size"], 2);
        assert_eq!(json["validations"]["accepted"], 2);

        let update = signed_request(
            &services.caller,
            TEST_SECRET,
            "PUT",
            "/admin/signing/config",
            "{\"timestamp_tolerance_ms\":60000}",
            None,
        )
        .unwrap();
        let response = services.router.clone().oneshot(update).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["timestamp_tolerance_ms"], 60_000);
        assert_eq!(services.receiver.cleanup_generation(), 2);

        let clear = signed_request(
            &services.caller,
            TEST_SECRET,
            "DELETE",
            "/admin/signing/replay-cache",
            "",
            None,
        )
        .unwrap();
        let response = services.router.clone().oneshot(clear).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["evicted"], 4);
        assert_eq!(services.receiver.stats().replay_cache_size, 0);
    }

    #[tokio::test]
    async fn test_admin_rejects_zero_tolerance() {
        let services = services(true);
        let update = signed_request(
            &services.caller,
            TEST_SECRET,
            "PUT",
            "/admin/signing/config",
            "{\"timestamp_tolerance_ms\":0}",
            None,
        )
        .unwrap();
        let response = services.router.clone().oneshot(update).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            services.receiver.config().timestamp_tolerance_ms,
            300_000
        );
    }

    #[tokio::test]
    async fn test_admin_signature_header_alone_is_not_enough() {
        let services = services(false);
        let request = Request::builder()
            .method("DELETE")
            .uri("/admin/signing/replay-cache")
            .header(SIGNATURE_HEADER, "00".repeat(32))
            .body(Body::empty())
            .unwrap();
        let response = services.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // =============================================================================
    // FULL SERVICE
    // =============================================================================

    #[tokio::test]
    async fn test_service_router_validates_with_system_clock() {
        let service = HandlerService::new(
            HandlerConfig::with_secret(TEST_SECRET),
            Arc::new(EchoGateway::default()),
        )
        .unwrap();
        let signing = service.signing();
        let router = service.router();

        let request =
            signed_request(&signing, TEST_SECRET, "post", "/rpc/echo?trace=1", "[1,2]", None)
                .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["result"], json!([1, 2]));

        signing.shutdown();
    }
}
