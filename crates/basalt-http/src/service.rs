//! The hyper service: request id, built-in endpoints, routing,
//! authentication, dispatch, audit, and the error envelope.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, warn};
use uuid::Uuid;

use basalt_core::{
    Authenticator, RequestBody, RequestContext, ServiceState, handle,
};
use basalt_index::AuditFilter;
use basalt_model::types::{AuditEvent, Principal};
use basalt_model::{S3Error, S3ErrorCode, S3Operation};

use crate::body::S3ResponseBody;
use crate::response::{error_to_response, lower_response};
use crate::router::{Router, RoutingContext};

/// The S3 service as hyper sees it. One instance per connection (so the
/// peer address travels with it); cloning is cheap.
pub struct BasaltService {
    state: Arc<ServiceState>,
    authenticator: Arc<dyn Authenticator>,
    router: Router,
    peer: Option<SocketAddr>,
}

impl std::fmt::Debug for BasaltService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasaltService")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl Clone for BasaltService {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            authenticator: Arc::clone(&self.authenticator),
            router: self.router.clone(),
            peer: self.peer,
        }
    }
}

impl BasaltService {
    /// Create a service over shared state and an authenticator.
    #[must_use]
    pub fn new(state: Arc<ServiceState>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            state,
            authenticator,
            router: Router::new(),
            peer: None,
        }
    }

    /// Attach the peer address of the connection being served.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }
}

impl Service<http::Request<Incoming>> for BasaltService {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = service.process(req, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

impl BasaltService {
    async fn process(
        &self,
        req: http::Request<Incoming>,
        request_id: &str,
    ) -> http::Response<S3ResponseBody> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        debug!(%method, %path, request_id, "incoming request");

        // Built-in diagnostics endpoints, outside the S3 namespace.
        if method == http::Method::GET {
            match path.as_str() {
                "/_basalt/health" => return health_response(),
                "/_basalt/metrics" => return metrics_response(&self.state),
                "/_basalt/audit" => return self.audit_response(&req, request_id).await,
                _ => {}
            }
        }

        // Routing.
        let ctx = match self.router.resolve(&req) {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(%method, %path, error = %err, request_id, "unroutable request");
                self.state.metrics.record_status(err.status_code.as_u16());
                return error_to_response(&err, request_id);
            }
        };
        let operation = ctx.operation;

        // Authentication.
        let (parts, incoming) = req.into_parts();
        let principal = match self
            .authenticator
            .authenticate(&parts.headers, &ctx.query_params)
            .await
        {
            Ok(principal) => principal,
            Err(err) => {
                self.finish(operation, &ctx, &Principal::Anonymous, &err, request_id);
                return error_to_response(&err, request_id);
            }
        };

        let request_ctx = RequestContext {
            request_id: request_id.to_owned(),
            principal,
            bucket: ctx.bucket.clone(),
            key: ctx.key.clone(),
            query: ctx.query_params.clone(),
            headers: parts.headers,
            source_ip: self.peer.map(|addr| addr.ip().to_string()),
        };
        let body = RequestBody::Stream(Box::pin(
            incoming.into_data_stream().map_err(std::io::Error::other),
        ));

        // Dispatch, with the optional deadline and the single retry for
        // idempotent operations that hit an internal error.
        let result = self.dispatch(operation, &request_ctx, body).await;

        match result {
            Ok(response) => {
                self.audit(operation, &request_ctx, response.status.as_u16(), None);
                self.state.metrics.record_status(response.status.as_u16());
                lower_response(response)
            }
            Err(err) => {
                self.audit(
                    operation,
                    &request_ctx,
                    err.status_code.as_u16(),
                    Some(err.message.clone()),
                );
                self.state.metrics.record_status(err.status_code.as_u16());
                error_to_response(&err, request_id)
            }
        }
    }

    async fn dispatch(
        &self,
        operation: S3Operation,
        ctx: &RequestContext,
        body: RequestBody,
    ) -> Result<basalt_core::S3Response, S3Error> {
        let first = self.run_with_deadline(operation, ctx, body).await;
        match first {
            Err(err)
                if err.code == S3ErrorCode::InternalError && operation.is_retryable() =>
            {
                // Retryable operations carry no request body, so replaying
                // with an empty one is faithful.
                warn!(operation = %operation, "retrying idempotent operation after internal error");
                self.run_with_deadline(operation, ctx, RequestBody::Empty)
                    .await
            }
            other => other,
        }
    }

    async fn run_with_deadline(
        &self,
        operation: S3Operation,
        ctx: &RequestContext,
        body: RequestBody,
    ) -> Result<basalt_core::S3Response, S3Error> {
        match self.state.config.request_timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(
                    Duration::from_secs(secs),
                    handle(&self.state, operation, ctx, body),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(S3Error::internal("request deadline exceeded")),
                }
            }
            None => handle(&self.state, operation, ctx, body).await,
        }
    }

    /// Audit path for requests that failed before a context existed.
    fn finish(
        &self,
        operation: S3Operation,
        routing: &RoutingContext,
        principal: &Principal,
        err: &S3Error,
        request_id: &str,
    ) {
        let event = AuditEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: operation.as_str().to_owned(),
            principal: principal.to_string(),
            source_ip: self.peer.map(|addr| addr.ip().to_string()),
            user_agent: None,
            request_id: request_id.to_owned(),
            bucket: routing.bucket.clone(),
            key: routing.key.clone(),
            operation: operation.as_str().to_owned(),
            status: err.status_code.as_u16(),
            error_message: Some(err.message.clone()),
            additional_data: None,
        };
        if let Err(e) = self.state.index.append_audit(&event) {
            warn!(error = %e, "failed to append audit event");
        }
        self.state.metrics.record_status(err.status_code.as_u16());
    }

    fn audit(
        &self,
        operation: S3Operation,
        ctx: &RequestContext,
        status: u16,
        error_message: Option<String>,
    ) {
        let event = AuditEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: operation.as_str().to_owned(),
            principal: ctx.principal.to_string(),
            source_ip: ctx.source_ip.clone(),
            user_agent: ctx.header("user-agent").map(str::to_owned),
            request_id: ctx.request_id.clone(),
            bucket: ctx.bucket.clone(),
            key: ctx.key.clone(),
            operation: operation.as_str().to_owned(),
            status,
            error_message,
            additional_data: None,
        };
        if let Err(e) = self.state.index.append_audit(&event) {
            warn!(error = %e, "failed to append audit event");
        }
    }

    /// `GET /_basalt/audit` — JSON audit query, admin only.
    async fn audit_response(
        &self,
        req: &http::Request<Incoming>,
        request_id: &str,
    ) -> http::Response<S3ResponseBody> {
        let query: Vec<(String, String)> = req
            .uri()
            .query()
            .unwrap_or("")
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_owned(), v.to_owned()),
                None => (pair.to_owned(), String::new()),
            })
            .collect();

        let principal = match self.authenticator.authenticate(req.headers(), &query).await {
            Ok(principal) => principal,
            Err(err) => return error_to_response(&err, request_id),
        };
        if principal.canonical_id() != Some(self.state.admin_id()) {
            let err = S3Error::access_denied("audit log");
            return error_to_response(&err, request_id);
        }

        let value_of = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let filter = AuditFilter {
            bucket: value_of("bucket"),
            principal: value_of("principal"),
            event_type: value_of("event-type"),
        };
        let limit = value_of("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(100usize);
        let token = value_of("token");

        match self
            .state
            .index
            .query_audit(&filter, limit, token.as_deref())
        {
            Ok((events, next_token)) => {
                let payload = serde_json::json!({
                    "events": events,
                    "nextToken": next_token,
                });
                http::Response::builder()
                    .status(http::StatusCode::OK)
                    .header("Content-Type", "application/json")
                    .body(S3ResponseBody::from_bytes(payload.to_string()))
                    .unwrap_or_else(|_| http::Response::new(S3ResponseBody::empty()))
            }
            Err(e) => {
                let err: S3Error = e.into();
                error_to_response(&err, request_id)
            }
        }
    }
}

fn health_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(S3ResponseBody::from_bytes(
            r#"{"status":"running","service":"basalt"}"#,
        ))
        .expect("static health response should be valid")
}

fn metrics_response(state: &ServiceState) -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
        .body(S3ResponseBody::from_bytes(
            state.metrics.render_prometheus(),
        ))
        .expect("static metrics response should be valid")
}

/// Add the headers every response carries.
fn add_common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(value) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", value.clone());
        headers.insert("x-amz-id-2", value);
    }
    headers.insert("Server", http::header::HeaderValue::from_static("Basalt"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_health_response() {
        let response = health_response();
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("Content-Type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn test_should_add_common_headers() {
        let response = http::Response::new(S3ResponseBody::empty());
        let response = add_common_headers(response, "req-1");
        assert_eq!(
            response
                .headers()
                .get("x-amz-request-id")
                .and_then(|v| v.to_str().ok()),
            Some("req-1")
        );
        assert_eq!(
            response
                .headers()
                .get("Server")
                .and_then(|v| v.to_str().ok()),
            Some("Basalt")
        );
    }
}
