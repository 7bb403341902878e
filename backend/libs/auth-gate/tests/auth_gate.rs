use actix_web::{test, web, App, HttpResponse};
use auth_gate::{AuthGate, AuthGateConfig, Identity, Verified, Verifier, VerifyError, VerifyRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Verifier with canned answers keyed by credential
struct StubVerifier;

#[async_trait::async_trait]
impl Verifier for StubVerifier {
    async fn verify_token(&self, request: VerifyRequest) -> Result<Verified, VerifyError> {
        if let Some(hint) = request.subject_hint {
            if hint != 42 {
                return Err(VerifyError::Rejected("subject mismatch".into()));
            }
        }

        match request.credential.as_str() {
            "valid" => Ok(Verified::new(42)),
            "rotate" => Ok(Verified::new(42).with_rotation("tok-2")),
            "empty-rotation" => Ok(Verified::new(42).with_rotation("")),
            "bad-rotation" => Ok(Verified::new(42).with_rotation("tok\n2")),
            "down" => Err(VerifyError::Unavailable("redis down".into())),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Verified::new(42))
            }
            _ => Err(VerifyError::Rejected("unknown credential".into())),
        }
    }
}

/// Handler that records every invocation
async fn whoami(identity: Identity, hits: web::Data<AtomicUsize>) -> HttpResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().body(identity.subject_id.to_string())
}

fn gate(config: AuthGateConfig) -> AuthGate {
    AuthGate::new(Arc::new(StubVerifier), config)
}

macro_rules! gated_app {
    ($hits:expr, $config:expr) => {
        test::init_service(
            App::new()
                .app_data($hits.clone())
                .wrap(gate($config))
                .route("/whoami", web::get().to(whoami)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_valid_credential_attaches_identity() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "Bearer valid"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert!(resp.headers().get("New-Token").is_none());
    let body = test::read_body(resp).await;
    assert_eq!(body, "42");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_rotated_credential_relayed_in_reply() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "rotate"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("New-Token").unwrap(), "tok-2");
    let body = test::read_body(resp).await;
    assert_eq!(body, "42");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_empty_rotation_sets_no_header() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "empty-rotation"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert!(resp.headers().get("New-Token").is_none());
}

#[actix_web::test]
async fn test_unusable_rotation_rejects_request() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "bad-rotation"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 503);
    assert!(resp.headers().get("New-Token").is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_invalid_credential_rejected_before_handler() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "Bearer forged"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    assert!(resp.headers().get("New-Token").is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert_eq!(body["status"], 401);
}

#[actix_web::test]
async fn test_missing_credential_is_malformed() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get().uri("/whoami").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "MALFORMED_CREDENTIALS");
}

#[actix_web::test]
async fn test_non_numeric_hint_is_malformed() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "valid"))
        .insert_header(("Current-User-Sid", "not-a-number"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_hint_forwarded_to_verifier() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "valid"))
        .insert_header(("Current-User-Sid", "42"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "valid"))
        .insert_header(("Current-User-Sid", "7"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_backend_unavailable_rejects_request() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = gated_app!(hits, AuthGateConfig::default());

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "down"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 503);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_verifier_timeout_rejects_request() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let config = AuthGateConfig {
        verify_timeout_ms: 50,
        ..AuthGateConfig::default()
    };
    let app = gated_app!(hits, config);

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "slow"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 503);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_identity_without_gate_fails_loudly() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test::init_service(
        App::new()
            .app_data(hits.clone())
            .route("/whoami", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "valid"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_second_identity_not_attached() {
    let hits = web::Data::new(AtomicUsize::new(0));
    let app = test::init_service(
        App::new()
            .app_data(hits.clone())
            .wrap(gate(AuthGateConfig::default()))
            .wrap(gate(AuthGateConfig::default()))
            .route("/whoami", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", "valid"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
