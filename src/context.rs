//! Per-load parsing context.
//!
//! A [`Context`] lives for the duration of one `load` and owns everything
//! transient: the input cursor, the end-of-line/file flags, the recursion
//! depth, the variable world (variables, enumerations, section tags,
//! iteration bindings, host parameters) and the deterministic RNG.  The
//! resource store it writes into is borrowed from the owning configuration.
//!
//! The tokenizer lives here too.  `get_token_raw` has a priority order:
//! an active *variable replay* is drained first (one word per call), then an
//! active *iteration replay*, and only then is fresh input read.  Both replay
//! cursors are single-use and die at `goto_eol`, so an unconsumed tail never
//! leaks past its line.

use std::path::PathBuf;

use crate::book::Book;
use crate::color::Color;
use crate::dict::Dict;
use crate::error::Error;
use crate::rng::Rng;
use crate::substitution::{self, Token};
use crate::util;

/// Hard bound on nested substitutions, nested sequence parses, and include
/// chains.  Exceeding it yields `Invalid` tokens, never a stack overflow.
pub(crate) const MAX_DEPTH: usize = 32;

/// Upper bound on a single word, in bytes, including the C-heritage slot for
/// a terminator: produced words are at most `TOKEN_MAX_LEN - 1` bytes.
pub const TOKEN_MAX_LEN: usize = 256;

// Namespaces inside `keys_vars`.
pub(crate) const NS_VARIABLE: u64 = 0;
pub(crate) const NS_SECTION: u64 = 1;
pub(crate) const NS_ITERATION: u64 = 2;
pub(crate) const NS_PARAMETER: u64 = 3;

/// Inactive-cursor sentinel: compares `>=` any group length.
const CURSOR_OFF: usize = usize::MAX;

pub(crate) struct Context<'a> {
    // Resource store, borrowed from the configuration.
    pub sequences: &'a mut Book,
    pub keys_sequences: &'a mut Dict,

    // Input.
    input: Vec<u8>,
    pos: usize,
    /// Directory for resolving relative includes.  `None` when parsing an
    /// in-memory buffer, which disables `INCLUDE` entirely.
    pub file_dir: Option<PathBuf>,
    /// Canonical paths of the include chain, root first.  Bounds include
    /// recursion and detects cycles.
    pub ancestors: Vec<PathBuf>,

    pub eol_reached: bool,
    pub eof_reached: bool,
    pub depth: usize,

    // Variable world.
    pub vars: Book,
    pub keys_vars: Dict,
    pub iteration: Book,

    // Replay cursors.
    pub var_group: usize,
    pub var_i: usize,
    pub it_group: usize,
    pub it_i: usize,

    pub skip_sequences: bool,
    pub restricted: bool,
    pub rng: Rng,
}

/// Saved input position, swapped out while a child file is parsed.
pub(crate) struct InputState {
    input: Vec<u8>,
    pos: usize,
    file_dir: Option<PathBuf>,
    eol_reached: bool,
    eof_reached: bool,
    var_group: usize,
    var_i: usize,
    it_group: usize,
    it_i: usize,
    skip_sequences: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        sequences: &'a mut Book,
        keys_sequences: &'a mut Dict,
        input: Vec<u8>,
        file_dir: Option<PathBuf>,
        ancestors: Vec<PathBuf>,
        params: &[(String, String)],
        restricted: bool,
    ) -> Self {
        let mut ctx = Context {
            sequences,
            keys_sequences,
            input,
            pos: 0,
            file_dir,
            ancestors,
            eol_reached: false,
            eof_reached: false,
            depth: 0,
            vars: Book::new(),
            keys_vars: Dict::new(),
            iteration: Book::new(),
            var_group: 0,
            var_i: CURSOR_OFF,
            it_group: 0,
            it_i: CURSOR_OFF,
            skip_sequences: false,
            restricted,
            rng: Rng::default(),
        };

        // Host parameters become one-word groups, looked up on injection
        // after variables miss.  Later pushes of the same name overwrite.
        for (name, value) in params {
            ctx.vars.begin_group();
            ctx.vars.push(value.clone());
            ctx.keys_vars
                .write(name.clone(), NS_PARAMETER, ctx.vars.group_count() as u64 - 1);
        }

        ctx
    }

    // ── Character level ───────────────────────────────────────────────────────

    fn read_char(&mut self) -> u8 {
        match self.input.get(self.pos) {
            Some(&c) if c != 0 => {
                self.pos += 1;
                c
            }
            _ => 0,
        }
    }

    fn update_state(&mut self, c: u8) {
        if c == 0 {
            self.eof_reached = true;
        }
        if c == 0 || c == b'\n' {
            self.eol_reached = true;
        }
    }

    // ── Word level ────────────────────────────────────────────────────────────

    /// Read the next whitespace-separated word from fresh input.
    ///
    /// Parentheses separate but are never stored.  `'` and `"` open literal
    /// mode in which the other quote and all separators are ordinary bytes;
    /// the quotes themselves are consumed, not stored.  Newline and end of
    /// buffer terminate the word even inside quotes.  Words cap out at
    /// `TOKEN_MAX_LEN - 1` bytes; the excess is dropped, not an error.
    fn read_word(&mut self) -> Option<String> {
        if self.eol_reached {
            return None;
        }

        // Skip leading separators.
        let mut c = loop {
            match self.read_char() {
                b' ' | b'(' | b')' | b'\t' | 0x0b => {}
                other => break other,
            }
        };

        let mut quotes_1 = false; // '
        let mut quotes_2 = false; // "
        let mut word: Vec<u8> = Vec::new();

        loop {
            match c {
                0 | b'\n' => break,
                b' ' | b'(' | b')' | b'\t' | 0x0b if !quotes_1 && !quotes_2 => break,
                b'\'' if !quotes_2 => quotes_1 = !quotes_1,
                b'"' if !quotes_1 => quotes_2 = !quotes_2,
                _ => {
                    if word.len() < TOKEN_MAX_LEN - 1 {
                        word.push(c);
                    }
                }
            }
            c = self.read_char();
        }

        self.update_state(c);

        if word.is_empty() {
            return None;
        }
        let mut word = String::from_utf8_lossy(&word).into_owned();
        util::truncate_utf8(&mut word, TOKEN_MAX_LEN - 1);
        Some(word)
    }

    /// Next word without substitution: drains the variable replay, then the
    /// iteration replay, then reads fresh input.
    pub fn get_token_raw(&mut self) -> Option<String> {
        if self.var_i < self.vars.group_len(self.var_group) {
            let word = self.vars.word(self.var_group, self.var_i).unwrap_or("");
            let mut word = word.to_owned();
            self.var_i += 1;
            util::truncate_utf8(&mut word, TOKEN_MAX_LEN - 1);
            Some(word)
        } else if self.it_i < self.iteration.group_len(self.it_group) {
            let word = self.iteration.word(self.it_group, self.it_i).unwrap_or("");
            let mut word = word.to_owned();
            self.it_i += 1;
            util::truncate_utf8(&mut word, TOKEN_MAX_LEN - 1);
            Some(word)
        } else {
            self.read_word()
        }
    }

    /// Next word, fully evaluated.
    pub fn get_token(&mut self) -> Token {
        match self.get_token_raw() {
            Some(word) => substitution::apply(self, &word),
            None => Token::Invalid,
        }
    }

    /// Next word coerced to a number.
    ///
    /// Strings starting with `#` parse as hex colors (invalid hex is a
    /// miss); any other string coerces through a `strtod`-style prefix
    /// parse and never fails.
    pub fn get_token_numeral(&mut self) -> Option<f64> {
        match self.get_token() {
            Token::Num(v) => Some(v),
            Token::Color(argb) => Some(argb as f64),
            Token::Str(s) => {
                if s.starts_with('#') {
                    Color::from_str(&s).map(|c| c.to_argb_u32() as f64)
                } else {
                    Some(util::str_to_f64(&s))
                }
            }
            Token::Stmt(..) | Token::Invalid => None,
        }
    }

    /// Consume the rest of the physical line and drop any pending replays.
    pub fn goto_eol(&mut self) {
        while !self.eol_reached {
            let c = self.read_char();
            self.update_state(c);
        }
        self.var_i = CURSOR_OFF;
        self.it_i = CURSOR_OFF;
    }

    // ── Include support ───────────────────────────────────────────────────────

    /// Swap in a child file's input, returning the saved parent state.
    /// Replay cursors and the section gate start fresh in the child.
    pub fn swap_input(&mut self, input: Vec<u8>, file_dir: Option<PathBuf>) -> InputState {
        let saved = InputState {
            input: std::mem::replace(&mut self.input, input),
            pos: self.pos,
            file_dir: std::mem::replace(&mut self.file_dir, file_dir),
            eol_reached: self.eol_reached,
            eof_reached: self.eof_reached,
            var_group: self.var_group,
            var_i: self.var_i,
            it_group: self.it_group,
            it_i: self.it_i,
            skip_sequences: self.skip_sequences,
        };
        self.pos = 0;
        self.eol_reached = false;
        self.eof_reached = false;
        self.var_group = 0;
        self.var_i = CURSOR_OFF;
        self.it_group = 0;
        self.it_i = CURSOR_OFF;
        self.skip_sequences = false;
        saved
    }

    pub fn restore_input(&mut self, saved: InputState) {
        self.input = saved.input;
        self.pos = saved.pos;
        self.file_dir = saved.file_dir;
        self.eol_reached = saved.eol_reached;
        self.eof_reached = saved.eof_reached;
        self.var_group = saved.var_group;
        self.var_i = saved.var_i;
        self.it_group = saved.it_group;
        self.it_i = saved.it_i;
        self.skip_sequences = saved.skip_sequences;
    }

    /// First sticky store error, if any arose during this load.
    pub fn take_error(&mut self) -> Option<Error> {
        self.sequences
            .take_error()
            .or_else(|| self.vars.take_error())
            .or_else(|| self.iteration.take_error())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ctx<R>(input: &str, f: impl FnOnce(&mut Context) -> R) -> R {
        let mut sequences = Book::new();
        let mut keys_sequences = Dict::new();
        let mut ctx = Context::new(
            &mut sequences,
            &mut keys_sequences,
            input.as_bytes().to_vec(),
            None,
            Vec::new(),
            &[],
            false,
        );
        f(&mut ctx)
    }

    fn words(input: &str) -> Vec<String> {
        with_ctx(input, |ctx| {
            let mut out = Vec::new();
            while let Some(w) = ctx.get_token_raw() {
                out.push(w);
            }
            out
        })
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(words("a b\tc"), ["a", "b", "c"]);
    }

    #[test]
    fn parens_separate_but_vanish() {
        assert_eq!(words("(a)(b)c"), ["a", "b", "c"]);
        assert_eq!(words("(+ 1 2)"), ["+", "1", "2"]);
    }

    #[test]
    fn quotes_protect_separators() {
        assert_eq!(words(r#""a b" c"#), ["a b", "c"]);
        assert_eq!(words("'x (y)' z"), ["x (y)", "z"]);
    }

    #[test]
    fn opposite_quote_is_literal_inside() {
        assert_eq!(words(r#""it's" done"#), ["it's", "done"]);
        assert_eq!(words(r#"'say "hi"' ok"#), [r#"say "hi""#, "ok"]);
    }

    #[test]
    fn empty_quotes_yield_nothing() {
        assert_eq!(words(r#""" next"#), ["next"]);
    }

    #[test]
    fn newline_ends_line_even_in_quotes() {
        let got = with_ctx("\"a\nb\" c", |ctx| {
            let first = ctx.get_token_raw();
            let eol = ctx.eol_reached;
            (first, eol)
        });
        assert_eq!(got, (Some("a".into()), true));
    }

    #[test]
    fn reading_stops_at_eol_until_reset() {
        with_ctx("one two\nthree", |ctx| {
            assert_eq!(ctx.get_token_raw().as_deref(), Some("one"));
            assert_eq!(ctx.get_token_raw().as_deref(), Some("two"));
            assert_eq!(ctx.get_token_raw(), None);
            assert!(ctx.eol_reached);
            ctx.eol_reached = false;
            assert_eq!(ctx.get_token_raw().as_deref(), Some("three"));
            assert!(ctx.eof_reached);
        });
    }

    #[test]
    fn long_word_is_truncated() {
        let long = "x".repeat(400);
        let got = words(&long);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].len(), TOKEN_MAX_LEN - 1);
    }

    #[test]
    fn goto_eol_consumes_rest_of_line() {
        with_ctx("skip me\nkept", |ctx| {
            assert_eq!(ctx.get_token_raw().as_deref(), Some("skip"));
            ctx.goto_eol();
            ctx.eol_reached = false;
            assert_eq!(ctx.get_token_raw().as_deref(), Some("kept"));
        });
    }

    #[test]
    fn variable_replay_precedes_input() {
        with_ctx("fresh", |ctx| {
            ctx.vars.begin_group();
            ctx.vars.push("one");
            ctx.vars.push("two");
            ctx.var_group = 0;
            ctx.var_i = 0;
            assert_eq!(ctx.get_token_raw().as_deref(), Some("one"));
            assert_eq!(ctx.get_token_raw().as_deref(), Some("two"));
            assert_eq!(ctx.get_token_raw().as_deref(), Some("fresh"));
        });
    }

    #[test]
    fn goto_eol_kills_pending_replay() {
        with_ctx("", |ctx| {
            ctx.vars.begin_group();
            ctx.vars.push("one");
            ctx.vars.push("two");
            ctx.var_group = 0;
            ctx.var_i = 0;
            assert_eq!(ctx.get_token_raw().as_deref(), Some("one"));
            ctx.goto_eol();
            assert_eq!(ctx.get_token_raw(), None);
        });
    }

    #[test]
    fn parameters_materialize_as_groups() {
        let mut sequences = Book::new();
        let mut keys_sequences = Dict::new();
        let params = vec![
            ("alpha".to_owned(), "1".to_owned()),
            ("alpha".to_owned(), "2".to_owned()),
        ];
        let ctx = Context::new(
            &mut sequences,
            &mut keys_sequences,
            Vec::new(),
            None,
            Vec::new(),
            &params,
            false,
        );
        // The later push shadows the earlier one.
        let g = ctx.keys_vars.find("alpha", NS_PARAMETER).unwrap() as usize;
        assert_eq!(ctx.vars.word(g, 0), Some("2"));
    }

    #[test]
    fn numeral_coercion() {
        assert_eq!(with_ctx("12.5", |ctx| ctx.get_token_numeral()), Some(12.5));
        assert_eq!(with_ctx("yes", |ctx| ctx.get_token_numeral()), Some(0.0));
        assert_eq!(
            with_ctx("#ff0000", |ctx| ctx.get_token_numeral()),
            Some(0xff_ff00_00u32 as f64)
        );
        assert_eq!(with_ctx("#badhex", |ctx| ctx.get_token_numeral()), None);
        assert_eq!(with_ctx("", |ctx| ctx.get_token_numeral()), None);
    }
}
