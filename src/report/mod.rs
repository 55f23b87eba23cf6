//! Panic reports and their renderings
//!
//! A [`PanicReport`] is built once per trapped panic, rendered, and dropped.

use crate::error::{BoxError, Result};
use crate::trap::Trapped;
use askama::Template;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::panic::Location;

/// The value a handler panicked with
#[derive(Debug)]
pub enum PanicValue {
    /// `panic!("...")`, or a `String`/`&str` raised with `panic_any`
    Message(String),
    /// A boxed error or `anyhow::Error` raised with `panic_any`
    Error(BoxError),
    /// Any other payload
    Unknown,
}

impl PanicValue {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return PanicValue::Message((*message).to_string()),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return PanicValue::Message(*message),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(err) => return PanicValue::Error(*err),
            Err(payload) => payload,
        };
        match payload.downcast::<anyhow::Error>() {
            Ok(err) => PanicValue::Error((*err).into()),
            Err(_) => PanicValue::Unknown,
        }
    }
}

impl fmt::Display for PanicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanicValue::Message(message) => f.write_str(message),
            PanicValue::Error(err) => write!(f, "{}", err),
            PanicValue::Unknown => f.write_str("Box<dyn Any>"),
        }
    }
}

/// Where a panic was raised
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
        }
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Everything known about one trapped panic
#[derive(Debug)]
pub struct PanicReport {
    value: PanicValue,
    stack: String,
    location: SourceLocation,
    vars: Vec<(String, String)>,
    occurred_at: DateTime<Utc>,
}

impl PanicReport {
    pub fn new(value: PanicValue, stack: String, location: SourceLocation) -> Self {
        Self {
            value,
            stack,
            location,
            vars: Vec::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Attach an exported-variable snapshot
    pub fn with_vars(mut self, vars: Vec<(String, String)>) -> Self {
        self.vars = vars;
        self
    }

    pub fn value(&self) -> &PanicValue {
        &self.value
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// The line written to the panic logger
    pub fn log_entry(&self) -> String {
        format!("panic: {}\n{}", self.value, self.stack)
    }

    pub fn render_text(&self) -> String {
        format!(
            "panic: {}\nin: {}\n\nstack at time of panic:\n{}",
            self.value, self.location, self.stack
        )
    }

    pub fn render_html(&self) -> Result<String> {
        let page = ReportPage {
            value: self.value.to_string(),
            file: &self.location.file,
            line: self.location.line,
            stack: &self.stack,
            vars: &self.vars,
            occurred_at: self.occurred_at.to_rfc3339(),
        };
        Ok(page.render()?)
    }
}

impl From<Trapped> for PanicReport {
    fn from(trapped: Trapped) -> Self {
        PanicReport::new(
            PanicValue::from_payload(trapped.payload),
            trapped.backtrace,
            trapped.location.unwrap_or_else(SourceLocation::unknown),
        )
    }
}

#[derive(Template)]
#[template(path = "panic.html")]
struct ReportPage<'a> {
    value: String,
    file: &'a str,
    line: u32,
    stack: &'a str,
    vars: &'a [(String, String)],
    occurred_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(value: &str) -> PanicReport {
        PanicReport::new(
            PanicValue::Message(value.to_string()),
            "   0: handler\n   1: main\n".to_string(),
            SourceLocation {
                file: "src/handlers.rs".to_string(),
                line: 17,
                column: 5,
            },
        )
    }

    #[test]
    fn test_payload_variants() {
        let message = PanicValue::from_payload(Box::new("static"));
        assert_eq!(message.to_string(), "static");

        let owned = PanicValue::from_payload(Box::new(String::from("owned")));
        assert_eq!(owned.to_string(), "owned");

        let err: BoxError = std::io::Error::other("io went away").into();
        let boxed = PanicValue::from_payload(Box::new(err));
        assert!(matches!(boxed, PanicValue::Error(_)));
        assert_eq!(boxed.to_string(), "io went away");

        let any = PanicValue::from_payload(Box::new(anyhow::anyhow!("anyhow failure")));
        assert_eq!(any.to_string(), "anyhow failure");

        let unknown = PanicValue::from_payload(Box::new(7_u8));
        assert!(matches!(unknown, PanicValue::Unknown));
        assert_eq!(unknown.to_string(), "Box<dyn Any>");
    }

    #[test]
    fn test_render_text_layout() {
        let text = report("bad state").render_text();
        assert_eq!(
            text,
            "panic: bad state\nin: src/handlers.rs:17\n\nstack at time of panic:\n   0: handler\n   1: main\n"
        );
    }

    #[test]
    fn test_log_entry() {
        assert_eq!(
            report("bad state").log_entry(),
            "panic: bad state\n   0: handler\n   1: main\n"
        );
    }

    #[test]
    fn test_render_html_escapes_values() {
        let html = report("<script>alert(1)</script>")
            .with_vars(vec![(
                "build".to_string(),
                "\"<b>v1</b>\"".to_string(),
            )])
            .render_html()
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;"));
        assert!(html.contains("handlers.rs"));
        assert!(html.contains("(line 17)"));
        assert!(html.contains("0: handler"));
        assert!(html.contains("<td>build</td>"));
        assert!(!html.contains("<b>v1"));
    }

    #[test]
    fn test_render_html_without_vars_has_no_table() {
        let html = report("plain").render_html().unwrap();
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_unknown_location() {
        let location = SourceLocation::unknown();
        assert_eq!(location.to_string(), "<unknown>:0");
    }
}
