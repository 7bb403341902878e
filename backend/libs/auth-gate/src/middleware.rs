use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderName, HeaderValue},
    Error, HttpMessage, ResponseError,
};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::config::AuthGateConfig;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::metrics;
use crate::verifier::{Verifier, VerifyRequest};

/// Credential header; an optional `Bearer ` prefix is stripped
pub const CREDENTIAL_HEADER: HeaderName = header::AUTHORIZATION;
/// Optional numeric subject hint
pub const SUBJECT_HINT_HEADER: &str = "current-user-sid";
/// Reply header carrying a rotated credential
pub const ROTATED_CREDENTIAL_HEADER: &str = "new-token";

/// Authentication gate middleware
///
/// Runs before every wrapped handler: verifies the credential, attaches the
/// resolved [`Identity`] to the request, and relays a rotated credential in
/// the `New-Token` reply header. Any failure short-circuits with an error
/// response and the wrapped service never runs.
pub struct AuthGate {
    verifier: Arc<dyn Verifier>,
    config: AuthGateConfig,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn Verifier>, config: AuthGateConfig) -> Self {
        Self { verifier, config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
            verify_timeout: self.config.verify_timeout(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    verifier: Arc<dyn Verifier>,
    verify_timeout: Duration,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let verifier = self.verifier.clone();
        let verify_timeout = self.verify_timeout;

        Box::pin(async move {
            let rotated = match authenticate(&req, verifier.as_ref(), verify_timeout).await {
                Ok(rotated) => rotated,
                Err(err) => {
                    metrics::record_outcome(err.outcome());
                    let response = err.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };
            metrics::record_outcome("authenticated");

            let mut res = service.call(req).await?;

            if let Some(value) = rotated {
                res.headers_mut()
                    .insert(HeaderName::from_static(ROTATED_CREDENTIAL_HEADER), value);
                metrics::record_rotation();
            }

            Ok(res.map_into_left_body())
        })
    }
}

/// Verify the request and attach its identity.
///
/// Returns the rotated credential as a reply header value, if the verifier
/// issued one.
async fn authenticate(
    req: &ServiceRequest,
    verifier: &dyn Verifier,
    verify_timeout: Duration,
) -> Result<Option<HeaderValue>, AuthError> {
    let request = extract_verify_request(req)?;

    let verified = match timeout(verify_timeout, verifier.verify_token(request)).await {
        Ok(Ok(verified)) => verified,
        Ok(Err(e)) => {
            warn!(path = %req.path(), "Credential verification failed: {}", e);
            return Err(e.into());
        }
        Err(_) => {
            error!(
                path = %req.path(),
                "Credential verification timed out after {:?}",
                verify_timeout
            );
            return Err(AuthError::BackendUnavailable(format!(
                "verification timed out after {:?}",
                verify_timeout
            )));
        }
    };

    let rotated = match verified.rotation() {
        Some(credential) => Some(HeaderValue::from_str(credential).map_err(|e| {
            error!(
                subject_id = verified.subject_id,
                "Rotated credential is not a valid header value: {}", e
            );
            AuthError::BackendUnavailable(
                "verifier issued an unusable rotated credential".to_string(),
            )
        })?),
        None => None,
    };

    if req.extensions().contains::<Identity>() {
        error!(path = %req.path(), "AuthGate applied twice to the same request");
        return Err(AuthError::IdentityAlreadyAttached);
    }
    req.extensions_mut()
        .insert(Identity::new(verified.subject_id));

    debug!(subject_id = verified.subject_id, "Request authenticated");
    Ok(rotated)
}

/// Read the credential and optional subject hint from request headers.
pub fn extract_verify_request(req: &ServiceRequest) -> Result<VerifyRequest, AuthError> {
    let raw = req
        .headers()
        .get(CREDENTIAL_HEADER)
        .ok_or_else(|| AuthError::Malformed("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AuthError::Malformed("Authorization header is not valid text".to_string()))?;

    let credential = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if credential.is_empty() {
        return Err(AuthError::Malformed("Empty credential".to_string()));
    }

    let subject_hint = match req.headers().get(SUBJECT_HINT_HEADER) {
        Some(value) => {
            let hint = value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    AuthError::Malformed("Current-User-Sid must be an unsigned integer".to_string())
                })?;
            Some(hint)
        }
        None => None,
    };

    Ok(VerifyRequest {
        credential: credential.to_string(),
        subject_hint,
    })
}
