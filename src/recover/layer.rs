use crate::config::RecoveryOptions;
use crate::error::RecoverError;
use crate::logger::write_entry;
use crate::recover::RequestHead;
use crate::recover::negotiate::accepts_html;
use crate::report::PanicReport;
use crate::trap::{self, Trapped};
use axum::{
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    response::{Html, IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Tower Layer that turns handler panics into 500 responses
///
/// # Example
/// ```
/// use axum::{Router, routing::get};
/// use recoverer::{RecoverLayer, RecoveryOptions};
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "ok" }))
///     .layer(RecoverLayer::new(RecoveryOptions::builder().show(true).build()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecoverLayer {
    options: Arc<RecoveryOptions>,
}

impl RecoverLayer {
    pub fn new(options: RecoveryOptions) -> Self {
        trap::install_hook();
        Self {
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &RecoveryOptions {
        &self.options
    }
}

impl<S> Layer<S> for RecoverLayer {
    type Service = RecoverMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoverMiddleware {
            inner,
            options: self.options.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecoverMiddleware<S> {
    inner: S,
    options: Arc<RecoveryOptions>,
}

impl<S> Service<Request<Body>> for RecoverMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let options = self.options.clone();
        let head = RequestHead::from(&request);

        // Keep the instance poll_ready was called on; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = match trap::catch(|| inner.call(request)) {
                Ok(future) => trap::catch_future(future).await,
                Err(trapped) => Err(trapped),
            };

            match outcome {
                Ok(result) => result,
                Err(trapped) => Ok(recover(&options, &head, trapped)),
            }
        })
    }
}

/// Turn a trapped panic into the response `options` allow.
fn recover(options: &RecoveryOptions, head: &RequestHead, trapped: Trapped) -> Response {
    let report = PanicReport::from(trapped);
    let logger = options.logger.as_deref();

    write_entry(logger, &report.log_entry());
    tracing::debug!(
        method = %head.method,
        uri = %head.uri,
        location = %report.location(),
        "Trapped panic: {}",
        report.value()
    );

    if let Some(interceptor) = &options.interceptor {
        if let Err(e) = interceptor.intercept(head, report.value(), report.location()) {
            let err = RecoverError::Interceptor(e);
            tracing::warn!("Panic details withheld: {}", err);
            write_entry(logger, &format!("{}\n", err));
            return opaque();
        }
    }

    if !options.show {
        return opaque();
    }

    if options.simple || !accepts_html(&head.headers) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, TEXT_PLAIN)],
            report.render_text(),
        )
            .into_response();
    }

    // Var::render is user code; a fault there must not escape either.
    let rendered = trap::catch(move || {
        let report = match &options.vars {
            Some(vars) => report.with_vars(vars.snapshot()),
            None => report,
        };
        report.render_html()
    });

    let err = match rendered {
        Ok(Ok(page)) => return (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response(),
        Ok(Err(e)) => e,
        Err(trapped) => {
            RecoverError::RenderPanicked(PanicReport::from(trapped).value().to_string())
        }
    };
    tracing::error!("Falling back to opaque response: {}", err);
    write_entry(logger, &format!("{}\n", err));
    opaque()
}

/// `500 Internal Server Error` with nothing else in it
fn opaque() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        [(CONTENT_TYPE, TEXT_PLAIN), (X_CONTENT_TYPE_OPTIONS, "nosniff")],
        status.canonical_reason().unwrap_or("Internal Server Error"),
    )
        .into_response()
}
