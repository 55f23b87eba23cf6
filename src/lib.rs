//! # Recoverer
//!
//! Panic recovery middleware for axum and tower.
//!
//! A panic inside a handler normally tears down the connection and leaves the
//! client with a reset. [`RecoverLayer`] traps it and answers with a
//! `500 Internal Server Error` instead, optionally with a diagnostic report.
//!
//! ## Features
//!
//! - **Safe by default**: panics are logged to stderr, clients see a bare 500
//! - **Diagnostic reports**: panic value, source location and backtrace, as
//!   plain text or an HTML page picked from the `Accept` header
//! - **Policy hook**: a [`PanicInterceptor`] can withhold details per request
//! - **Exported variables**: list counters and build info in the HTML report
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use recoverer::prelude::*;
//!
//! async fn handler() -> &'static str {
//!     panic!("this should never actually panic");
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = RecoveryOptions::builder()
//!         .logger(StderrLogger)
//!         .show(cfg!(debug_assertions))
//!         .build();
//!
//!     let app: Router = Router::new()
//!         .route("/", get(handler))
//!         .layer(RecoverLayer::new(options));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod recover;
pub mod report;
pub mod trap;
pub mod vars;

// Re-export core types
pub use config::{RecoveryOptions, RecoveryOptionsBuilder};
pub use error::{BoxError, RecoverError, Result};
pub use recover::{PanicInterceptor, RecoverLayer, RecoverMiddleware, RequestHead};
pub use report::{PanicReport, PanicValue, SourceLocation};

/// Prelude module for convenient imports
///
/// ```
/// use recoverer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RecoveryOptions, RecoveryOptionsBuilder};
    pub use crate::error::{BoxError, RecoverError, Result};
    pub use crate::logger::{MemoryLogger, PanicLogger, StderrLogger, TracingLogger, WriterLogger};
    pub use crate::recover::{PanicInterceptor, RecoverLayer, RecoverMiddleware, RequestHead};
    pub use crate::report::{PanicReport, PanicValue, SourceLocation};
    pub use crate::vars::{Counter, ExportedVars, Label, Var, VarSource};
}
