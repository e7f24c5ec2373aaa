//! Sequence dispatcher.
//!
//! One *sequence* is one logical line.  The dispatcher reads the line's
//! first evaluated token, classifies it, and hands the rest of the line to
//! the matching handler:
//!
//! | first token | handler |
//! |-------------|---------|
//! | `VAR` / `PREPEND` / `MERGE` | combine an existing variable into a new one |
//! | `LET` | declare a variable |
//! | `LET_ENUM` | generate a numeric enumeration variable |
//! | `SECTION` | gate the following lines (runs even while gated) |
//! | `SECTION_ADD` / `SECTION_DEL` | edit the active tag set |
//! | `INCLUDE` | parse child files in place |
//! | `FOR_EACH` | replay the block up to `FOR_END` per variable value |
//! | `SEED` | reseed the RNG |
//! | `PRINT` | emit the rest of the line as a diagnostic |
//! | `RESTRICT` | drop to the restricted subset |
//! | anything else | resource declaration, first word = namespace |
//!
//! While the section gate is closed every line except a `SECTION` is
//! dropped.  In restricted mode only resource declarations and the section
//! gate act; everything else consumes its line without effect, which makes
//! the subset safe for untrusted input.  The rest of the line is always
//! consumed on exit so malformed statements can't bleed into the next one.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::context::{Context, MAX_DEPTH, NS_ITERATION, NS_SECTION, NS_VARIABLE};
use crate::rng::Rng;
use crate::source;
use crate::substitution::Token;
use crate::token::TokenKind;
use crate::util;

/// Parse one sequence.
pub(crate) fn parse(ctx: &mut Context) {
    if ctx.depth >= MAX_DEPTH {
        return;
    }
    ctx.depth += 1;

    let mut token = ctx.get_token();
    if ctx.skip_sequences && !matches!(token, Token::Stmt(TokenKind::SectionBegin, _)) {
        token = Token::Invalid;
    }

    match token {
        Token::Stmt(kind @ (TokenKind::VarAppend | TokenKind::VarPrepend | TokenKind::VarMerge), _) => {
            combine_var(ctx, kind)
        }
        Token::Stmt(TokenKind::VarDeclaration, _) => declare_variable(ctx),
        Token::Stmt(TokenKind::EnumDeclaration, _) => declare_enum(ctx),
        Token::Stmt(TokenKind::SectionBegin, _) => section_begin(ctx),
        Token::Stmt(TokenKind::SectionAdd, _) => section_add(ctx),
        Token::Stmt(TokenKind::SectionDel, _) => section_del(ctx),
        Token::Stmt(TokenKind::Include, _) => include(ctx),
        Token::Stmt(TokenKind::ForBegin, _) => iterate(ctx),
        Token::Stmt(TokenKind::Seed, _) => seed(ctx),
        Token::Stmt(TokenKind::Print, _) => print(ctx),
        Token::Stmt(TokenKind::Restrict, _) => ctx.restricted = true,
        Token::Invalid => {}
        // Plain words, numbers, and stray statement words (a dangling
        // `FOR_END`, say) all read as a namespace.
        other => declare_resource(ctx, &other.render()),
    }

    ctx.goto_eol();
    ctx.depth -= 1;
}

// ── Resources & variables ─────────────────────────────────────────────────────

/// `namespace property value [value …]`
fn declare_resource(ctx: &mut Context, namespace: &str) {
    let name = ctx.get_token();
    if name.is_invalid() {
        return;
    }
    let name = name.render();

    ctx.sequences.begin_group();
    let mut values = 0usize;
    loop {
        let value = ctx.get_token();
        if value.is_invalid() {
            break;
        }
        ctx.sequences.push(value.render());
        values += 1;
    }
    if values == 0 {
        ctx.sequences.undo_group();
        return;
    }

    // Namespace ids are allocated on first use from the current group count,
    // which only grows: every id is > 0 and unique.
    let id = match ctx.keys_sequences.find(namespace, 0) {
        Some(id) => id,
        None => {
            let id = ctx.sequences.group_count() as u64;
            ctx.keys_sequences.write(namespace, 0, id);
            id
        }
    };
    ctx.keys_sequences
        .write(name, id, ctx.sequences.group_count() as u64 - 1);
}

/// `LET name value [value …]`
fn declare_variable(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }

    let name = ctx.get_token();
    if name.is_invalid() {
        return;
    }
    let name = name.render();

    ctx.vars.begin_group();
    let mut values = 0usize;
    loop {
        let value = ctx.get_token();
        if value.is_invalid() {
            break;
        }
        ctx.vars.push(value.render());
        values += 1;
    }
    if values == 0 {
        ctx.vars.undo_group();
        return;
    }

    ctx.keys_vars
        .write(name, NS_VARIABLE, ctx.vars.group_count() as u64 - 1);
}

/// `VAR name var suffix` / `PREPEND name var prefix` / `MERGE name var_a var_b`
fn combine_var(ctx: &mut Context, kind: TokenKind) {
    if ctx.restricted {
        return;
    }

    let name = ctx.get_token();
    let source = ctx.get_token();
    let extra = ctx.get_token();
    if name.is_invalid() || source.is_invalid() || extra.is_invalid() {
        return;
    }
    let name = name.render();
    let extra = extra.render();

    let Some(src) = ctx.keys_vars.find(&source.render(), NS_VARIABLE) else {
        return;
    };
    let src = src as usize;
    let merge_with = if kind == TokenKind::VarMerge {
        match ctx.keys_vars.find(&extra, NS_VARIABLE) {
            Some(group) => Some(group as usize),
            None => return,
        }
    } else {
        None
    };

    let mut combined = Vec::with_capacity(ctx.vars.group_len(src));
    for k in 0..ctx.vars.group_len(src) {
        let mut value = ctx.vars.word(src, k).unwrap_or("").to_owned();
        match kind {
            TokenKind::VarAppend => value.push_str(&extra),
            TokenKind::VarPrepend => value.insert_str(0, &extra),
            TokenKind::VarMerge => {
                // A shorter second variable contributes empty suffixes.
                if let Some(other) = merge_with {
                    value.push_str(ctx.vars.word(other, k).unwrap_or(""));
                }
            }
            _ => {}
        }
        combined.push(value);
    }

    ctx.vars.begin_group();
    for value in combined {
        ctx.vars.push(value);
    }
    ctx.keys_vars
        .write(name, NS_VARIABLE, ctx.vars.group_count() as u64 - 1);
}

/// `LET_ENUM name min max [steps [precision]]`
///
/// Missing parameters cascade: two parameters mean `0 … X` with unit steps,
/// three mean unit steps, four mean integer formatting.
fn declare_enum(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }

    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let mut steps = 0.0f64;
    let mut precision = 0.0f64;

    let name = ctx.get_token();
    let mut given = usize::from(!name.is_invalid());
    for slot in [&mut min, &mut max, &mut steps, &mut precision] {
        match ctx.get_token_numeral() {
            Some(v) => {
                *slot = v;
                given += 1;
            }
            None => break,
        }
    }

    match given {
        0 | 1 => return,
        2 => {
            max = min;
            min = 0.0;
            steps = max - min;
            precision = 0.0;
        }
        3 => {
            steps = max - min;
            precision = 0.0;
        }
        4 => precision = 0.0,
        _ => {}
    }

    if !(steps >= 1.0) || steps >= usize::MAX as f64 || precision < 0.0 {
        return;
    }
    let precision = util::limit(precision, 0.0, 16.0) as usize;

    ctx.vars.begin_group();
    let last = steps.floor() as usize;
    for i in 0..=last {
        let value = util::interpolate(min, max, i as f64 / steps);
        ctx.vars.push(format!("{value:.precision$}"));
    }

    ctx.keys_vars
        .write(name.render(), NS_VARIABLE, ctx.vars.group_count() as u64 - 1);
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// `SECTION [tag …]` — open the gate iff every tag is active; no tags always
/// opens it.  Deliberately not subject to restricted mode: gating stays
/// available for untrusted input.
fn section_begin(ctx: &mut Context) {
    loop {
        let token = ctx.get_token();
        if token.is_invalid() {
            break;
        }
        if ctx.keys_vars.find(&token.render(), NS_SECTION).is_none() {
            ctx.skip_sequences = true;
            return;
        }
    }
    ctx.skip_sequences = false;
}

/// `SECTION_ADD tag [tag …]`
fn section_add(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }
    loop {
        let token = ctx.get_token();
        if token.is_invalid() {
            break;
        }
        ctx.keys_vars.write(token.render(), NS_SECTION, 0);
    }
}

/// `SECTION_DEL tag [tag …]`
fn section_del(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }
    loop {
        let token = ctx.get_token();
        if token.is_invalid() {
            break;
        }
        ctx.keys_vars.erase(&token.render(), NS_SECTION);
    }
}

// ── Includes ──────────────────────────────────────────────────────────────────

/// `INCLUDE path [path …]` — relative paths resolve against the including
/// file's directory.  Inert in restricted mode and for buffer-origin parses.
fn include(ctx: &mut Context) {
    if ctx.restricted || ctx.file_dir.is_none() {
        return;
    }

    loop {
        let token = ctx.get_token();
        if token.is_invalid() {
            break;
        }
        let path = token.render();
        let full = if Path::new(&path).is_absolute() {
            PathBuf::from(&path)
        } else {
            match &ctx.file_dir {
                Some(dir) => dir.join(&path),
                None => continue,
            }
        };
        source::parse_child(ctx, &full);
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────────

/// `FOR_EACH var [alias]` — replay the block up to the matching `FOR_END`
/// once per value of `var`, each value bound under the alias (the variable's
/// own name by default).  Re-binding an active alias is refused.
fn iterate(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }

    let variable = ctx.get_token();
    if variable.is_invalid() {
        return;
    }
    let variable = variable.render();
    let Some(group) = ctx.keys_vars.find(&variable, NS_VARIABLE) else {
        return;
    };
    let group = group as usize;

    let alias = match ctx.get_token() {
        Token::Invalid => variable,
        token => token.render(),
    };
    if ctx.keys_vars.find(&alias, NS_ITERATION).is_some() {
        return;
    }

    // The outer-most loop captures its body from the input; nested loops
    // replay from the already-captured block and only need the index of
    // their matching terminator.
    let nested = !ctx.iteration.is_empty();
    let (group_start, group_end, failed) = if nested {
        let start = ctx.it_group + 1;
        let (end, failed) = preproc_iter_nest(ctx, start);
        (start, end, failed)
    } else {
        let failed = preproc_iter_new(ctx);
        (0, ctx.iteration.group_count(), failed)
    };

    if !failed {
        for k in 0..ctx.vars.group_len(group) {
            let index = ctx.vars.word_index(group, k) as u64;
            ctx.keys_vars.write(alias.clone(), NS_ITERATION, index);
            ctx.it_group = group_start;
            while ctx.it_group < group_end {
                ctx.it_i = 0;
                parse(ctx);
                ctx.it_group += 1;
            }
        }
        ctx.keys_vars.erase(&alias, NS_ITERATION);
    }

    if !nested {
        ctx.iteration.clear();
    }
}

/// Capture raw lines from the input into the iteration block until the
/// `FOR_END` matching the just-read `FOR_EACH`.  Lines are stored verbatim,
/// one group per line, including any nested loop markers.  Returns `true`
/// when the terminator is missing (nothing should run).
fn preproc_iter_new(ctx: &mut Context) -> bool {
    let mut nesting = 0usize;

    ctx.goto_eol();

    while !ctx.eof_reached {
        ctx.eol_reached = false;
        let Some(word) = ctx.get_token_raw() else {
            ctx.goto_eol();
            continue;
        };

        match TokenKind::from_lexeme(&word) {
            TokenKind::ForBegin => nesting += 1,
            TokenKind::ForEnd => {
                if nesting == 0 {
                    ctx.goto_eol();
                    return false;
                }
                nesting -= 1;
            }
            _ => {}
        }

        ctx.iteration.begin_group();
        ctx.iteration.push(word);
        while let Some(word) = ctx.get_token_raw() {
            ctx.iteration.push(word);
        }
    }

    true
}

/// Within an already-captured block, find the group index of the `FOR_END`
/// matching the `FOR_EACH` at `ctx.it_group`.
fn preproc_iter_nest(ctx: &mut Context, start_group: usize) -> (usize, bool) {
    let mut nesting = 0usize;

    for i in start_group..ctx.iteration.group_count() {
        ctx.it_group = i;
        ctx.it_i = 0;
        let Some(word) = ctx.get_token_raw() else {
            continue;
        };
        match TokenKind::from_lexeme(&word) {
            TokenKind::ForBegin => nesting += 1,
            TokenKind::ForEnd => {
                if nesting == 0 {
                    return (i, false);
                }
                nesting -= 1;
            }
            _ => {}
        }
    }

    (ctx.iteration.group_count(), true)
}

// ── Odds and ends ─────────────────────────────────────────────────────────────

/// `SEED number`
fn seed(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }
    if let Some(seed) = ctx.get_token_numeral() {
        ctx.rng = Rng::new(seed as u64);
    }
}

/// `PRINT token [token …]` — evaluated tokens go to the diagnostic stream.
fn print(ctx: &mut Context) {
    if ctx.restricted {
        return;
    }
    let mut tokens = Vec::new();
    loop {
        let token = ctx.get_token();
        if token.is_invalid() {
            break;
        }
        tokens.push(token.render());
    }
    info!(target: "rescfg::print", "{}", tokens.join(" "));
}

// ── Tests ─────────────────────────────────────────────────────────────────────
