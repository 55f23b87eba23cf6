//! Exported diagnostic variables
//!
//! A registry of named values published for runtime introspection: build
//! info, counters, anything renderable. Values render as JSON text.
//! The panic report snapshots a [`VarSource`] on its HTML path.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A value that can be rendered for display
pub trait Var: Send + Sync + 'static {
    fn render(&self) -> String;
}

impl<F> Var for F
where
    F: Fn() -> serde_json::Value + Send + Sync + 'static,
{
    fn render(&self) -> String {
        self().to_string()
    }
}

/// Read access to a set of exported variables
pub trait VarSource: Send + Sync + 'static {
    /// Point-in-time `(name, rendered value)` pairs, sorted by name
    fn snapshot(&self) -> Vec<(String, String)>;
}

/// An integer counter
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Var for Counter {
    fn render(&self) -> String {
        self.value().to_string()
    }
}

/// A string value
#[derive(Debug, Default)]
pub struct Label(RwLock<String>);

impl Label {
    pub fn new(value: impl Into<String>) -> Self {
        Self(RwLock::new(value.into()))
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }

    pub fn value(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Var for Label {
    fn render(&self) -> String {
        serde_json::Value::String(self.value()).to_string()
    }
}

/// Thread-safe variable registry
#[derive(Clone, Default)]
pub struct ExportedVars {
    vars: Arc<DashMap<String, Arc<dyn Var>>>,
}

impl ExportedVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, seeded with `cmdline`
    pub fn global() -> &'static ExportedVars {
        static GLOBAL: OnceLock<ExportedVars> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let vars = ExportedVars::new();
            vars.publish("cmdline", || {
                serde_json::Value::from(std::env::args().collect::<Vec<_>>())
            });
            vars
        })
    }

    /// Register `var` under `name`, replacing any previous value.
    /// Returns the shared handle so callers can keep updating it.
    pub fn publish<V: Var>(&self, name: impl Into<String>, var: V) -> Arc<V> {
        let var = Arc::new(var);
        self.vars.insert(name.into(), var.clone());
        var
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).map(|var| var.render())
    }

    pub fn remove(&self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl VarSource for ExportedVars {
    fn snapshot(&self) -> Vec<(String, String)> {
        // collect handles first so no shard lock is held while rendering
        let handles: Vec<(String, Arc<dyn Var>)> = self
            .vars
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut rendered: Vec<(String, String)> = handles
            .into_iter()
            .map(|(name, var)| (name, var.render()))
            .collect();
        rendered.sort_by(|a, b| a.0.cmp(&b.0));
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_snapshot_sorted() {
        let vars = ExportedVars::new();
        let hits = vars.publish("requests", Counter::new());
        vars.publish("build", Label::new("v1.2.3"));
        vars.publish("ready", || serde_json::Value::Bool(true));

        hits.add(3);
        hits.add(2);

        assert_eq!(
            vars.snapshot(),
            vec![
                ("build".to_string(), "\"v1.2.3\"".to_string()),
                ("ready".to_string(), "true".to_string()),
                ("requests".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_publish_replaces_and_remove() {
        let vars = ExportedVars::new();
        vars.publish("mode", Label::new("a"));
        let mode = vars.publish("mode", Label::new("b"));
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("mode").as_deref(), Some("\"b\""));

        mode.set("c");
        assert_eq!(vars.get("mode").as_deref(), Some("\"c\""));

        assert!(vars.remove("mode"));
        assert!(vars.is_empty());
        assert!(!vars.remove("mode"));
    }

    #[test]
    fn test_label_renders_as_json_string() {
        let label = Label::new("quote \" and <tag>");
        assert_eq!(label.render(), "\"quote \\\" and <tag>\"");
    }

    #[test]
    fn test_global_has_cmdline() {
        let cmdline = ExportedVars::global().get("cmdline").unwrap();
        assert!(cmdline.starts_with('['));
    }
}
