use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};
use tracing::error;

use crate::error::AuthError;

/// Caller identity resolved by [`AuthGate`](crate::AuthGate).
///
/// Lives in the extensions of exactly one request and is dropped with it.
/// Handlers take it as an extractor:
///
/// ```rust,no_run
/// use actix_web::HttpResponse;
/// use auth_gate::Identity;
///
/// async fn whoami(identity: Identity) -> HttpResponse {
///     HttpResponse::Ok().body(identity.subject_id.to_string())
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: u64,
}

impl Identity {
    pub fn new(subject_id: u64) -> Self {
        Self { subject_id }
    }

    /// Identity attached to this request.
    ///
    /// A request that never passed the gate has none. That is a routing
    /// mistake, not an authentication failure, so it surfaces as a 500.
    pub fn attached(req: &HttpRequest) -> Result<Self, AuthError> {
        match req.extensions().get::<Identity>() {
            Some(identity) => Ok(*identity),
            None => {
                error!(
                    path = %req.path(),
                    "Identity requested on a route not wrapped by AuthGate"
                );
                Err(AuthError::IdentityMissing)
            }
        }
    }
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Identity::attached(req).map_err(Into::into))
    }
}
