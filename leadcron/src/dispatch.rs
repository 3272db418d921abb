// Internal request dispatch: drive the host router without a network hop

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use tracing::debug;

use crate::errors::DispatchError;
use crate::jobs::RequestSpec;

/// Host collaborator that carries a job's request spec to its handler.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, spec: &RequestSpec) -> Result<StatusCode, DispatchError>;
}

/// Dispatches request specs into a cloned axum router, simulating an
/// inbound request without touching the network.
pub struct RouterDispatcher {
    router: Router,
}

impl RouterDispatcher {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Dispatcher for RouterDispatcher {
    async fn dispatch(&self, spec: &RequestSpec) -> Result<StatusCode, DispatchError> {
        let mut builder = Request::builder()
            .method(spec.method.clone())
            .uri(spec.path.as_str());
        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }

        let body = match &spec.body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(json).map_err(|e| DispatchError::BodyEncoding {
                    path: spec.path.clone(),
                    reason: e.to_string(),
                })?)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).map_err(|e| DispatchError::InvalidRequest {
            path: spec.path.clone(),
            reason: e.to_string(),
        })?;

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };

        let status = response.status();
        debug!(path = %spec.path, status = %status, "internal request dispatched");

        if !status.is_success() {
            return Err(DispatchError::ErrorStatus {
                path: spec.path.clone(),
                status: status.as_u16(),
            });
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use axum::routing::{get, post};
    use axum::Json;

    fn test_router() -> Router {
        Router::new()
            .route("/test-url", get(|| async { "ok" }))
            .route(
                "/echo",
                post(|Json(body): Json<serde_json::Value>| async move { Json(body) }),
            )
            .route(
                "/broken",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let dispatcher = RouterDispatcher::new(test_router());
        let status = dispatcher
            .dispatch(&RequestSpec::get("/test-url"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dispatch_json_body() {
        let dispatcher = RouterDispatcher::new(test_router());
        let spec = RequestSpec::new(Method::POST, "/echo")
            .json_body(serde_json::json!({"report": "daily"}));
        let status = dispatcher.dispatch(&spec).await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_an_error() {
        let dispatcher = RouterDispatcher::new(test_router());
        let err = dispatcher
            .dispatch(&RequestSpec::get("/missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ErrorStatus { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let dispatcher = RouterDispatcher::new(test_router());
        let err = dispatcher
            .dispatch(&RequestSpec::get("/broken"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ErrorStatus { status: 500, .. }
        ));
    }
}
