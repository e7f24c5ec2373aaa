//! rescfg – a small dynamic configuration language with live reloading.
//!
//! A configuration is a set of *resources*: named arrays of string values,
//! addressed by a `(namespace, property)` pair.  Source files describe them
//! in a line-oriented, whitespace-separated format that supports variables,
//! enumerations, arithmetic and color expressions, conditionals, section
//! gating, file inclusion, and iteration:
//!
//! ```text
//! LET widths 1 2 4
//! LET_ENUM alpha 0 255 8 0
//!
//! window border_color (RGB 128 16 16)
//! window padding      (* 2 (% widths))
//!
//! FOR_EACH widths w
//!     line (JOIN stroke- (% w)) (% w)
//! FOR_END
//! ```
//!
//! The host keeps a single [`Config`] handle, pushes source paths (in
//! fallback order), optional parameters and reload callbacks, and calls
//! [`Config::load`] whenever the files may have changed.  Parsed resources
//! are read back through [`Config::fetch`] / [`Config::iterate`] /
//! [`Config::resource`].  Because the whole file is resolved and stored on
//! every load, one configuration can be shared by a main program and its
//! plugins: each registers a callback and re-reads its values on reload.
//!
//! ## Modules
//! * [`config`] – the host-facing facade.
//! * [`book`] / [`dict`] – the backing stores (grouped word arena, namespaced
//!   key map).
//! * [`token`] – keyword table of the language.
//! * [`color`] – ARGB helpers used by the color operations.
//! * [`rng`] – deterministic RNG behind `RANDOM` and `SEED`.
//! * [`error`] – the sticky error taxonomy.
//!
//! Parsing internals (tokenizer, substitution evaluator, sequence
//! dispatcher, source loader) are private modules.
//!
//! ## Untrusted input
//! [`Config::restrict`] drops the language to resource declarations and
//! section gates only — no variables, no iteration, no includes — which
//! makes it safe to parse files from untrusted origins.

pub mod book;
pub mod color;
pub mod config;
pub mod dict;
pub mod error;
pub mod rng;
pub mod token;

mod context;
mod sequence;
mod source;
mod substitution;
mod util;

pub use config::{Config, ReloadCallback};
pub use context::TOKEN_MAX_LEN;
pub use error::Error;
pub use token::TokenKind;
