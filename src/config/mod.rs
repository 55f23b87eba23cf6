use crate::error::{BoxError, RecoverError, Result};
use crate::logger::{PanicLogger, StderrLogger};
use crate::recover::{PanicInterceptor, RequestHead};
use crate::report::{PanicValue, SourceLocation};
use crate::vars::{ExportedVars, VarSource};
use std::env;
use std::fmt;
use std::sync::Arc;

/// Environment variable toggling [`RecoveryOptions::show`]
pub const SHOW_ENV: &str = "RECOVERER_SHOW";
/// Environment variable toggling [`RecoveryOptions::simple`]
pub const SIMPLE_ENV: &str = "RECOVERER_SIMPLE";

/// Recovery configuration, fixed when the layer is built.
///
/// The default is safe for production: panics are written to stderr and
/// the client only sees a bare `500 Internal Server Error`.
#[derive(Clone)]
pub struct RecoveryOptions {
    /// Where `"panic: <value>\n<stack>"` is written for every trapped panic
    pub logger: Option<Arc<dyn PanicLogger>>,

    /// Render the panic and stack trace to the client
    pub show: bool,

    /// Render as plain text instead of HTML
    pub simple: bool,

    /// Policy hook that can veto disclosure per request.
    ///
    /// The hook runs outside the trap: if it panics, that panic propagates.
    pub interceptor: Option<Arc<dyn PanicInterceptor>>,

    /// Exported variables listed in the HTML report
    pub vars: Option<Arc<dyn VarSource>>,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            logger: Some(Arc::new(StderrLogger)),
            show: false,
            simple: false,
            interceptor: None,
            vars: None,
        }
    }
}

impl fmt::Debug for RecoveryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryOptions")
            .field("logger", &self.logger.is_some())
            .field("show", &self.show)
            .field("simple", &self.simple)
            .field("interceptor", &self.interceptor.is_some())
            .field("vars", &self.vars.is_some())
            .finish()
    }
}

impl RecoveryOptions {
    pub fn builder() -> RecoveryOptionsBuilder {
        RecoveryOptionsBuilder::new()
    }

    /// Defaults, overridden by `RECOVERER_SHOW` / `RECOVERER_SIMPLE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(value) = lookup(SHOW_ENV) {
            options.show = parse_flag(SHOW_ENV, &value)?;
        }
        if let Some(value) = lookup(SIMPLE_ENV) {
            options.simple = parse_flag(SIMPLE_ENV, &value)?;
        }
        Ok(options)
    }

    /// List the process-wide [`ExportedVars::global`] registry in reports
    pub fn with_global_vars(mut self) -> Self {
        self.vars = Some(Arc::new(ExportedVars::global().clone()));
        self
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(RecoverError::invalid_config(key, value)),
    }
}

/// Builder for [`RecoveryOptions`]
///
/// Starts with no logger, unlike [`RecoveryOptions::default`].
///
/// # Example
/// ```
/// use recoverer::config::RecoveryOptions;
/// use recoverer::logger::TracingLogger;
///
/// let options = RecoveryOptions::builder()
///     .logger(TracingLogger)
///     .show(true)
///     .simple(true)
///     .build();
/// assert!(options.show);
/// ```
pub struct RecoveryOptionsBuilder {
    options: RecoveryOptions,
}

impl RecoveryOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: RecoveryOptions {
                logger: None,
                ..RecoveryOptions::default()
            },
        }
    }

    pub fn logger<L: PanicLogger>(mut self, logger: L) -> Self {
        self.options.logger = Some(Arc::new(logger));
        self
    }

    pub fn show(mut self, show: bool) -> Self {
        self.options.show = show;
        self
    }

    pub fn simple(mut self, simple: bool) -> Self {
        self.options.simple = simple;
        self
    }

    pub fn interceptor<I: PanicInterceptor>(mut self, interceptor: I) -> Self {
        self.options.interceptor = Some(Arc::new(interceptor));
        self
    }

    /// Closure form of [`interceptor`](Self::interceptor); spelling out the
    /// `Fn` bound here lets the closure's argument lifetimes be inferred.
    pub fn intercept_with<F>(self, interceptor: F) -> Self
    where
        F: Fn(&RequestHead, &PanicValue, &SourceLocation) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.interceptor(interceptor)
    }

    pub fn vars<V: VarSource>(mut self, vars: V) -> Self {
        self.options.vars = Some(Arc::new(vars));
        self
    }

    pub fn build(self) -> RecoveryOptions {
        self.options
    }
}

impl Default for RecoveryOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
