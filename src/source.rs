//! Source file access.
//!
//! A configuration lists candidate source paths in fallback order; only the
//! first one that opens is parsed.  `INCLUDE` re-enters here for child
//! files, which share the parent's whole context (variables, sections,
//! restricted mode) but get their own input cursor and include directory.
//! Cycles are caught by keeping the canonical paths of the open include
//! chain; the chain length doubles as the recursion bound.
//!
//! Unreadable files are silent misses everywhere — an absent configuration
//! is a legitimate state, not an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::{Context, MAX_DEPTH};
use crate::sequence;

/// Rank of the first source path that can actually be opened.
pub(crate) fn first_openable(sources: &[PathBuf]) -> Option<usize> {
    sources.iter().position(|path| fs::File::open(path).is_ok())
}

/// Drive the dispatcher over the context's current input until the end of
/// the file.
pub(crate) fn parse_all(ctx: &mut Context) {
    while !ctx.eof_reached {
        ctx.eol_reached = false;
        sequence::parse(ctx);
    }
}

/// Parse an included child file in place.
///
/// Unopenable paths, cycle hits, and chains deeper than the recursion bound
/// are all silently skipped.
pub(crate) fn parse_child(ctx: &mut Context, path: &Path) {
    if ctx.ancestors.len() >= MAX_DEPTH {
        return;
    }
    let Ok(canonical) = path.canonicalize() else {
        return;
    };
    if ctx.ancestors.contains(&canonical) {
        debug!(target: "rescfg::source", path = %canonical.display(), "include cycle skipped");
        return;
    }
    let Ok(bytes) = fs::read(path) else {
        return;
    };

    debug!(target: "rescfg::source", path = %canonical.display(), "including");

    let dir = canonical.parent().map(Path::to_path_buf);
    let saved = ctx.swap_input(bytes, dir);
    ctx.ancestors.push(canonical);
    ctx.depth += 1;

    parse_all(ctx);

    ctx.depth -= 1;
    ctx.ancestors.pop();
    ctx.restore_input(saved);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn first_openable_respects_order() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.cfg");
        fs::File::create(&present).unwrap().write_all(b"ns x 1\n").unwrap();

        let sources = vec![dir.path().join("missing.cfg"), present.clone(), present];
        assert_eq!(first_openable(&sources), Some(1));
    }

    #[test]
    fn no_openable_source() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![dir.path().join("nope.cfg")];
        assert_eq!(first_openable(&sources), None);
        assert_eq!(first_openable(&[]), None);
    }
}
