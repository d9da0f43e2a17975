//! Application span and per-request context.
//!
//! # Design
//! - One leaked `app` span carries mode and build for the whole process.
//! - [`RequestContext`] is task-local: set once by the HTTP middleware and
//!   read wherever a response or log line needs the request id.
//! - Request-id layers live here so every surface uses the same header.

use std::future::Future;
use std::sync::Arc;

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the `app` span entered until dropped.
pub struct GlobalContextGuard {
    _entered: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the `app` span tagged with `mode` (`serve`, `cli`, ...).
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        Self {
            _entered: span.enter(),
        }
    }
}

/// Layer that assigns a UUID `x-request-id` to requests lacking one.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request's `x-request-id` onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Identity of the request being served on the current task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Arc<str>,
    route: Arc<str>,
}

tokio::task_local! {
    static CURRENT_REQUEST: RequestContext;
}

impl RequestContext {
    /// Context for one request.
    #[must_use]
    pub fn new(request_id: impl Into<Arc<str>>, route: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: request_id.into(),
            route: route.into(),
        }
    }

    /// The `x-request-id` value; empty when the request carried none.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Matched route template, e.g. `/download/{filename}`.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Context of the request running on this task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT_REQUEST.try_with(Clone::clone).ok()
    }

    /// Run `fut` with `self` as the current request.
    pub async fn scope<Fut>(self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CURRENT_REQUEST.scope(self, fut).await
    }
}
