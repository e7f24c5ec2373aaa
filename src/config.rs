//! Configuration facade.
//!
//! A [`Config`] is the handle a host program keeps: it accumulates source
//! paths (fallback-ordered), host parameters, and reload callbacks, and it
//! owns the parsed resources between loads.  One instance can back several
//! subsystems — a main program plus its plugins each register a callback and
//! re-read their resources whenever the configuration reloads:
//!
//! ```
//! use rescfg::Config;
//!
//! let mut cfg = Config::new();
//! cfg.push_source("/etc/myapp.cfg");
//! cfg.load_str("ui font mono 12");
//!
//! cfg.fetch("ui", "font");
//! let mut values = Vec::new();
//! while cfg.iterate() {
//!     values.push(cfg.resource().to_owned());
//! }
//! assert_eq!(values, ["mono", "12"]);
//! ```
//!
//! Missing things are never errors: an unopenable source, an unknown
//! resource, or an unset variable all surface as empty results.  The only
//! recorded failures are the hard ones (store capacity, refused
//! allocations); they stick until [`repair`](Config::repair).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::book::Book;
use crate::context::Context;
use crate::dict::Dict;
use crate::error::Error;
use crate::source;

/// A reload notification.  Runs after every load attempt with `true` when a
/// source was parsed cleanly; state travels in the closure's captures.
pub type ReloadCallback = Arc<dyn Fn(&mut Config, bool)>;

/// A parsed, reloadable configuration.
#[derive(Clone, Default)]
pub struct Config {
    sequences: Book,
    keys_sequences: Dict,
    sources: Vec<PathBuf>,
    params: Vec<(String, String)>,
    callbacks: Vec<ReloadCallback>,
    error: Option<Error>,
    restricted: bool,
    /// Read cursor: resolved group and 1-based value offset (0 = before the
    /// first value).
    fetched: Option<(usize, usize)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    /// Add a candidate source file.  Only the first source that can be
    /// opened is parsed; the rest are fallbacks.
    pub fn push_source(&mut self, path: impl Into<PathBuf>) {
        if self.error.is_some() {
            return;
        }
        self.sources.push(path.into());
    }

    /// Add an integer parameter, readable from sources by injection.
    pub fn push_param_long(&mut self, name: impl Into<String>, value: i64) {
        self.push_param(name.into(), value.to_string());
    }

    /// Add a floating-point parameter; reads back with 8-decimal formatting
    /// like any other computed number.
    pub fn push_param_double(&mut self, name: impl Into<String>, value: f64) {
        self.push_param(name.into(), format!("{value:.8}"));
    }

    /// Add a string parameter.
    pub fn push_param_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push_param(name.into(), value.into());
    }

    fn push_param(&mut self, name: String, value: String) {
        if self.error.is_some() {
            return;
        }
        // One value per parameter: a re-push replaces.
        self.params.retain(|(existing, _)| *existing != name);
        self.params.push((name, value));
    }

    /// Register a reload callback.  Callbacks run in registration order
    /// after every load attempt.
    pub fn push_callback(&mut self, callback: ReloadCallback) {
        if self.error.is_some() {
            return;
        }
        self.callbacks.push(callback);
    }

    pub fn clear_sources(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.sources.clear();
    }

    pub fn clear_params(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.params.clear();
    }

    pub fn clear_callbacks(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.callbacks.clear();
    }

    /// Drop all parsed resources (they come back on the next load).
    pub fn clear_resources(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.sequences.clear();
        self.keys_sequences.clear();
        self.fetched = None;
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Parse the first openable source, replacing all previously parsed
    /// resources, then notify the callbacks.  No openable source leaves the
    /// configuration empty and notifies with `false`.
    pub fn load(&mut self) {
        if self.error.is_some() {
            return;
        }
        self.clear_resources();

        let mut success = false;
        if let Some(rank) = source::first_openable(&self.sources) {
            let path = self.sources[rank].clone();
            if let Ok(bytes) = fs::read(&path) {
                debug!(target: "rescfg::source", path = %path.display(), rank, "loading");
                let canonical = path.canonicalize().ok();
                let dir = canonical
                    .as_deref()
                    .unwrap_or(&path)
                    .parent()
                    .map(Path::to_path_buf);
                let ancestors = canonical.into_iter().collect();
                let mut ctx = Context::new(
                    &mut self.sequences,
                    &mut self.keys_sequences,
                    bytes,
                    dir,
                    ancestors,
                    &self.params,
                    self.restricted,
                );
                source::parse_all(&mut ctx);
                self.error = ctx.take_error();
                success = self.error.is_none();
            }
        }

        self.run_callbacks(success);
    }

    /// Parse an in-memory buffer instead of a source file.  Behaves exactly
    /// like [`load`](Config::load) except that `INCLUDE` statements are
    /// inert (a buffer has no directory to resolve against).
    pub fn load_str(&mut self, buffer: &str) {
        if self.error.is_some() {
            return;
        }
        self.clear_resources();

        let mut ctx = Context::new(
            &mut self.sequences,
            &mut self.keys_sequences,
            buffer.as_bytes().to_vec(),
            None,
            Vec::new(),
            &self.params,
            self.restricted,
        );
        source::parse_all(&mut ctx);
        self.error = ctx.take_error();

        let success = self.error.is_none();
        self.run_callbacks(success);
    }

    fn run_callbacks(&mut self, success: bool) {
        // The list is taken out so callbacks may fetch from (and even push
        // callbacks onto) this very instance.
        let callbacks = std::mem::take(&mut self.callbacks);
        for callback in &callbacks {
            callback(self, success);
        }
        let added = std::mem::replace(&mut self.callbacks, callbacks);
        self.callbacks.extend(added);
    }

    // ── Resource access ───────────────────────────────────────────────────────

    /// Position the read cursor on a resource.  A miss leaves the cursor
    /// unset, which [`iterate`](Config::iterate) and friends report as an
    /// empty resource.
    pub fn fetch(&mut self, namespace: &str, property: &str) {
        if self.error.is_some() {
            return;
        }
        self.fetched = self
            .keys_sequences
            .find(namespace, 0)
            .and_then(|id| self.keys_sequences.find(property, id))
            .map(|group| (group as usize, 0));
    }

    /// Step the cursor to the next value of the fetched resource.
    pub fn iterate(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        match &mut self.fetched {
            Some((group, offset)) if *offset < self.sequences.group_len(*group) => {
                *offset += 1;
                true
            }
            _ => false,
        }
    }

    /// The value the cursor is on, or `""` when not positioned.
    pub fn resource(&self) -> &str {
        match self.fetched {
            Some((group, offset)) if offset > 0 => {
                self.sequences.word(group, offset - 1).unwrap_or("")
            }
            _ => "",
        }
    }

    /// Number of values of the fetched resource (0 when nothing is fetched).
    pub fn resource_length(&self) -> usize {
        match self.fetched {
            Some((group, _)) => self.sequences.group_len(group),
            None => 0,
        }
    }

    // ── State ─────────────────────────────────────────────────────────────────

    /// Rank of the first source that can currently be opened.
    pub fn can_open_sources(&self) -> Option<usize> {
        if self.error.is_some() {
            return None;
        }
        source::first_openable(&self.sources)
    }

    /// The sticky error, if any.
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Clear the sticky error and make the instance usable again.
    pub fn repair(&mut self) {
        self.error = None;
    }

    /// Parse the restricted subset only: resource declarations and section
    /// gates.  Meant for untrusted input.
    pub fn restrict(&mut self) {
        self.restricted = true;
    }

    pub fn unrestrict(&mut self) {
        self.restricted = false;
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("resources", &self.sequences.group_count())
            .field("sources", &self.sources)
            .field("params", &self.params.len())
            .field("callbacks", &self.callbacks.len())
            .field("error", &self.error)
            .field("restricted", &self.restricted)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn values(cfg: &mut Config, namespace: &str, property: &str) -> Vec<String> {
        cfg.fetch(namespace, property);
        let mut out = Vec::new();
        while cfg.iterate() {
            out.push(cfg.resource().to_owned());
        }
        out
    }

    #[test]
    fn load_str_and_fetch() {
        let mut cfg = Config::new();
        cfg.load_str("ui font mono 12");
        assert_eq!(values(&mut cfg, "ui", "font"), ["mono", "12"]);
    }

    #[test]
    fn fetch_miss_is_empty() {
        let mut cfg = Config::new();
        cfg.load_str("ui font mono");
        cfg.fetch("ui", "nothing");
        assert!(!cfg.iterate());
        assert_eq!(cfg.resource(), "");
        assert_eq!(cfg.resource_length(), 0);
        cfg.fetch("nowhere", "font");
        assert_eq!(cfg.resource_length(), 0);
    }

    #[test]
    fn iterate_visits_each_value_once() {
        let mut cfg = Config::new();
        cfg.load_str("ns list a b c");
        cfg.fetch("ns", "list");
        let mut count = 0;
        while cfg.iterate() {
            count += 1;
        }
        assert_eq!(count, cfg.resource_length());
        assert!(!cfg.iterate());
    }

    #[test]
    fn resource_before_iterate_is_empty() {
        let mut cfg = Config::new();
        cfg.load_str("ns x v");
        cfg.fetch("ns", "x");
        assert_eq!(cfg.resource(), "");
    }

    #[test]
    fn reload_replaces_resources() {
        let mut cfg = Config::new();
        cfg.load_str("ns x old");
        cfg.load_str("ns y new");
        assert_eq!(values(&mut cfg, "ns", "x"), Vec::<String>::new());
        assert_eq!(values(&mut cfg, "ns", "y"), ["new"]);
    }

    #[test]
    fn params_inject() {
        let mut cfg = Config::new();
        cfg.push_param_double("scale", 1337.0);
        cfg.push_param_long("count", -3);
        cfg.push_param_str("label", "hi there");
        cfg.load_str(
            "ns a (% scale)\n\
             ns b (% count)\n\
             ns c (% label)",
        );
        assert_eq!(values(&mut cfg, "ns", "a"), ["1337.00000000"]);
        assert_eq!(values(&mut cfg, "ns", "b"), ["-3"]);
        assert_eq!(values(&mut cfg, "ns", "c"), ["hi there"]);
    }

    #[test]
    fn param_repush_replaces() {
        let mut cfg = Config::new();
        cfg.push_param_long("n", 1);
        cfg.push_param_long("n", 2);
        cfg.load_str("ns v (% n)");
        assert_eq!(values(&mut cfg, "ns", "v"), ["2"]);
    }

    #[test]
    fn variables_shadow_params() {
        let mut cfg = Config::new();
        cfg.push_param_str("x", "param");
        cfg.load_str("LET x var\nns v (% x)");
        assert_eq!(values(&mut cfg, "ns", "v"), ["var"]);
    }

    #[test]
    fn clear_params() {
        let mut cfg = Config::new();
        cfg.push_param_str("x", "1");
        cfg.clear_params();
        cfg.load_str("ns v (% x)");
        assert_eq!(values(&mut cfg, "ns", "v"), Vec::<String>::new());
    }

    #[test]
    fn callbacks_run_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut cfg = Config::new();
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            cfg.push_callback(Arc::new(move |_, success| {
                assert!(success);
                order.lock().unwrap().push(tag);
            }));
        }
        cfg.load_str("ns x 1");
        assert_eq!(*order.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn callbacks_can_fetch() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        let mut cfg = Config::new();
        cfg.push_callback(Arc::new(|cfg, _| {
            cfg.fetch("ns", "x");
            let mut n = 0;
            while cfg.iterate() {
                n += 1;
            }
            SEEN.store(n, Ordering::SeqCst);
        }));
        cfg.load_str("ns x a b c");
        assert_eq!(SEEN.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn load_without_sources_notifies_failure() {
        let flagged = Arc::new(std::sync::Mutex::new(None));
        let mut cfg = Config::new();
        {
            let flagged = Arc::clone(&flagged);
            cfg.push_callback(Arc::new(move |_, success| {
                *flagged.lock().unwrap() = Some(success);
            }));
        }
        cfg.load();
        assert_eq!(*flagged.lock().unwrap(), Some(false));
    }

    #[test]
    fn restricted_load() {
        let mut cfg = Config::new();
        cfg.restrict();
        cfg.load_str("LET v 1\nns x (% v)\nns y ok");
        assert_eq!(values(&mut cfg, "ns", "x"), Vec::<String>::new());
        assert_eq!(values(&mut cfg, "ns", "y"), ["ok"]);
        cfg.unrestrict();
        cfg.load_str("LET v 1\nns x (% v)");
        assert_eq!(values(&mut cfg, "ns", "x"), ["1"]);
    }

    #[test]
    fn clone_is_deep() {
        let mut cfg = Config::new();
        cfg.load_str("ns x 1");
        let mut copy = cfg.clone();
        copy.load_str("ns x 2");
        assert_eq!(values(&mut cfg, "ns", "x"), ["1"]);
        assert_eq!(values(&mut copy, "ns", "x"), ["2"]);
    }

    #[test]
    fn sticky_error_short_circuits_everything() {
        let mut cfg = Config::new();
        cfg.load_str("ns x 1");
        cfg.error = Some(Error::Overflow);

        cfg.push_source("/tmp/ignored.cfg");
        cfg.load_str("ns x 2");
        cfg.fetch("ns", "x");
        assert!(!cfg.iterate());
        assert_eq!(cfg.resource(), "");
        assert_eq!(cfg.can_open_sources(), None);
        assert_eq!(cfg.error(), Some(Error::Overflow));

        cfg.repair();
        assert_eq!(cfg.error(), None);
        assert_eq!(values(&mut cfg, "ns", "x"), ["1"]);
        cfg.load_str("ns x 2");
        assert_eq!(values(&mut cfg, "ns", "x"), ["2"]);
    }

    #[test]
    fn load_is_idempotent() {
        let src = "LET n 1 2\nFOR_EACH n\nns (JOIN p (% n)) (* (% n) 3)\nFOR_END\nns t (RANDOM 0 1)";
        let mut cfg = Config::new();
        cfg.load_str(src);
        let first: Vec<_> = ["p1", "p2", "t"]
            .iter()
            .map(|p| values(&mut cfg, "ns", p))
            .collect();
        cfg.load_str(src);
        let second: Vec<_> = ["p1", "p2", "t"]
            .iter()
            .map(|p| values(&mut cfg, "ns", p))
            .collect();
        assert_eq!(first, second);
    }
}
