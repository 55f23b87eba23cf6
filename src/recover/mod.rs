use crate::error::BoxError;
use crate::report::{PanicValue, SourceLocation};
use axum::http::{HeaderMap, Method, Request, Uri, Version};

pub mod layer;
pub mod negotiate;

pub use layer::{RecoverLayer, RecoverMiddleware};

/// What the interceptor gets to see of the request that panicked.
///
/// The request itself has been handed to the inner service by the time it
/// panics, so its head is copied before the call.
#[derive(Clone, Debug)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}

/// Policy hook consulted before a panic is disclosed to the client.
///
/// Returning `Err` downgrades this response to an opaque 500; the error is
/// written to the panic logger. Useful for rate limiting exposure or bumping
/// a counter.
///
/// The hook runs after the panic has been trapped and is not trapped itself:
/// a panic raised here propagates to the caller.
///
/// # Example
/// ```
/// use recoverer::config::RecoveryOptions;
///
/// let options = RecoveryOptions::builder()
///     .show(true)
///     .intercept_with(|request, _value, _location| {
///         if request.headers.contains_key("x-debug") {
///             Ok(())
///         } else {
///             Err("diagnostics require x-debug".into())
///         }
///     })
///     .build();
/// assert!(options.interceptor.is_some());
/// ```
pub trait PanicInterceptor: Send + Sync + 'static {
    fn intercept(
        &self,
        request: &RequestHead,
        value: &PanicValue,
        location: &SourceLocation,
    ) -> Result<(), BoxError>;
}

impl<F> PanicInterceptor for F
where
    F: Fn(&RequestHead, &PanicValue, &SourceLocation) -> Result<(), BoxError>
        + Send
        + Sync
        + 'static,
{
    fn intercept(
        &self,
        request: &RequestHead,
        value: &PanicValue,
        location: &SourceLocation,
    ) -> Result<(), BoxError> {
        self(request, value, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::ACCEPT;

    #[test]
    fn test_request_head_copies_parts() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/orders?id=7")
            .header(ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();

        let head = RequestHead::from(&request);
        assert_eq!(head.method, Method::POST);
        assert_eq!(head.uri.path(), "/orders");
        assert_eq!(head.uri.query(), Some("id=7"));
        assert_eq!(head.headers.get(ACCEPT).unwrap(), "text/html");
    }

    struct DenyAll;

    impl PanicInterceptor for DenyAll {
        fn intercept(
            &self,
            _request: &RequestHead,
            _value: &PanicValue,
            _location: &SourceLocation,
        ) -> Result<(), BoxError> {
            Err("denied".into())
        }
    }

    #[test]
    fn test_struct_interceptor() {
        let head = RequestHead::from(&Request::new(Body::empty()));
        let value = PanicValue::Message("boom".to_string());
        let err = DenyAll
            .intercept(&head, &value, &SourceLocation::unknown())
            .unwrap_err();
        assert_eq!(err.to_string(), "denied");
    }
}
