//! # Auth Gate
//!
//! Authentication interception layer for actix-web services.
//!
//! ## Modules
//! - `middleware`: `AuthGate`, the request interception middleware
//! - `identity`: per-request `Identity` and its extractor
//! - `verifier`: the credential verification capability the gate consumes
//! - `session`: store-backed session issue / rotate / revoke and `SessionVerifier`
//! - `config`: gate and session settings
//! - `metrics`: Prometheus counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use actix_web::{web, App, HttpResponse, HttpServer};
//! use auth_gate::{AuthGate, AuthGateConfig, Identity, SessionManager, SessionVerifier};
//! use session_store::{RedisTokenStore, StoreConfig};
//! use std::sync::Arc;
//!
//! async fn whoami(identity: Identity) -> HttpResponse {
//!     HttpResponse::Ok().body(identity.subject_id.to_string())
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AuthGateConfig::from_env()?;
//! let store = Arc::new(RedisTokenStore::connect(&StoreConfig::from_env()?).await?);
//! let verifier = Arc::new(SessionVerifier::new(SessionManager::new(store, &config)));
//!
//! HttpServer::new(move || {
//!     App::new()
//!         .wrap(AuthGate::new(verifier.clone(), config.clone()))
//!         .route("/whoami", web::get().to(whoami))
//! })
//! .bind(("0.0.0.0", 8080))?
//! .run()
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod session;
pub mod verifier;

pub use config::AuthGateConfig;
pub use error::{AuthError, SessionError};
pub use identity::Identity;
pub use middleware::{
    AuthGate, AuthGateService, CREDENTIAL_HEADER, ROTATED_CREDENTIAL_HEADER, SUBJECT_HINT_HEADER,
};
pub use session::{SessionManager, SessionRecord, SessionVerifier};
pub use verifier::{Verified, Verifier, VerifyError, VerifyRequest};
