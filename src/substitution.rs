//! Substitution evaluator.
//!
//! Every word handed out by the tokenizer passes through [`apply`].  Words
//! that match an expression keyword execute their semantics — possibly
//! consuming further tokens from the same line — and are replaced by the
//! result; statement keywords pass through untouched for the dispatcher;
//! anything else is a plain string.
//!
//! | keyword    | consumes | yields                                         |
//! |------------|----------|------------------------------------------------|
//! | `//`       | —        | invalid (caller discards the line tail)        |
//! | `EOF`      | —        | invalid, ends the file                         |
//! | `\`        | 1 raw    | that word, unevaluated (continues the line)    |
//! | `=`        | 1        | that token, evaluated (decorative filler)      |
//! | `JOIN`     | 2        | string concatenation                           |
//! | `%`        | 1 name   | iteration value / variable replay / parameter  |
//! | `< <= > >= == !=` | 2 numerals + 2 branches | the chosen branch       |
//! | math ops   | 0–3 numerals | number, rendered with 8 decimals           |
//! | `RGB` `RGBA` `CLITP` | 3–4 numerals | packed ARGB integer            |
//!
//! Evaluation depth is bounded; blowing the bound yields invalid tokens
//! rather than unwinding the stack.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::color::Color;
use crate::context::{Context, MAX_DEPTH, NS_ITERATION, NS_PARAMETER, NS_VARIABLE, TOKEN_MAX_LEN};
use crate::token::TokenKind;
use crate::util;

// ── Token ─────────────────────────────────────────────────────────────────────

/// An evaluated token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Nothing could be produced: end of line, depth blown, or a miss.
    Invalid,
    /// A plain word.
    Str(String),
    /// A math result; renders with fixed 8-decimal formatting.
    Num(f64),
    /// A color result; renders as the decimal packed-ARGB integer.
    Color(u32),
    /// A statement-introducing keyword, text preserved for the dispatcher.
    Stmt(TokenKind, String),
}

impl Token {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Token::Invalid)
    }

    /// The token's string form, as stored into resources and variables.
    pub fn render(self) -> String {
        match self {
            Token::Invalid => String::new(),
            Token::Str(s) | Token::Stmt(_, s) => s,
            Token::Num(v) => format!("{v:.8}"),
            Token::Color(argb) => argb.to_string(),
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate one word.
pub(crate) fn apply(ctx: &mut Context, word: &str) -> Token {
    if ctx.depth >= MAX_DEPTH {
        return Token::Invalid;
    }
    ctx.depth += 1;

    use TokenKind::*;
    let kind = TokenKind::from_lexeme(word);
    let token = match kind {
        Comment => Token::Invalid,

        Eof => {
            ctx.eof_reached = true;
            ctx.eol_reached = true;
            Token::Invalid
        }

        Escape => escape(ctx),
        Filler => ctx.get_token(),
        Join => join(ctx),
        VarInjection => variable(ctx),

        IfLess | IfLessEq | IfMore | IfMoreEq | IfEq | IfEqNot => conditional(ctx, kind),

        Timestamp | ConstPi | ConstEuler | ConstTrue | ConstFalse => math(ctx, kind, 0),

        OpSqrt | OpCbrt | OpAbs | OpCeiling | OpFloor | OpRound | OpCos | OpSin | OpTan
        | OpAcos | OpAsin | OpAtan | OpCosh | OpSinh | OpLn | OpLog => math(ctx, kind, 1),

        OpAdd | OpSubstract | OpMultiply | OpDivide | OpMod | OpPow | OpBiggest
        | OpSmallest | OpRandom => math(ctx, kind, 2),

        OpInterpolate | OpLimit => math(ctx, kind, 3),

        ClRgb | ClInterpolate => color_math(ctx, kind, 3),
        ClRgba => color_math(ctx, kind, 4),

        Str => Token::Str(word.to_owned()),

        // Statement introducers reach the dispatcher unmodified.
        _ => Token::Stmt(kind, word.to_owned()),
    };

    ctx.depth -= 1;
    token
}

// ── Keyword handlers ──────────────────────────────────────────────────────────

/// `\`: resume the line past a newline and pass the next word through
/// without substitution.
fn escape(ctx: &mut Context) -> Token {
    ctx.eol_reached = false;
    match ctx.get_token_raw() {
        Some(word) => Token::Str(word),
        None => Token::Invalid,
    }
}

fn join(ctx: &mut Context) -> Token {
    let a = ctx.get_token();
    if a.is_invalid() {
        return Token::Invalid;
    }
    let b = ctx.get_token();
    if b.is_invalid() {
        return Token::Invalid;
    }

    let mut joined = a.render();
    joined.push_str(&b.render());
    util::truncate_utf8(&mut joined, TOKEN_MAX_LEN - 1);
    Token::Str(joined)
}

/// `%`: inject an iteration value, a variable, or a host parameter.
///
/// Iteration bindings shadow everything (a loop alias defaults to the loop
/// variable's own name); a variable injection arms the replay cursor so the
/// rest of the group feeds subsequent reads on this line; parameters behave
/// like one-word variables.
fn variable(ctx: &mut Context) -> Token {
    let name = ctx.get_token();
    if name.is_invalid() {
        return Token::Invalid;
    }
    let name = name.render();

    if let Some(index) = ctx.keys_vars.find(&name, NS_ITERATION) {
        let word = match ctx.vars.word_at(index as usize) {
            Some(w) => w.to_owned(),
            None => return Token::Invalid,
        };
        return apply(ctx, &word);
    }

    let group = ctx
        .keys_vars
        .find(&name, NS_VARIABLE)
        .or_else(|| ctx.keys_vars.find(&name, NS_PARAMETER));
    match group {
        Some(group) => {
            ctx.var_group = group as usize;
            ctx.var_i = 0;
            ctx.get_token()
        }
        None => Token::Invalid,
    }
}

fn conditional(ctx: &mut Context, kind: TokenKind) -> Token {
    let a = match ctx.get_token_numeral() {
        Some(v) => v,
        None => return Token::Invalid,
    };
    let b = match ctx.get_token_numeral() {
        Some(v) => v,
        None => return Token::Invalid,
    };

    let result = match kind {
        TokenKind::IfLess => a < b,
        TokenKind::IfLessEq => a <= b,
        TokenKind::IfMore => a > b,
        TokenKind::IfMoreEq => a >= b,
        TokenKind::IfEq => a == b,
        TokenKind::IfEqNot => a != b,
        _ => return Token::Invalid,
    };

    // Only the chosen branch is evaluated; the other is consumed
    // structurally so its side effects (RNG draws, replays) never happen.
    if result {
        let token = ctx.get_token();
        skip_one(ctx);
        token
    } else {
        skip_one(ctx);
        ctx.get_token()
    }
}

/// Consume exactly one expression without evaluating it.
fn skip_one(ctx: &mut Context) {
    if ctx.depth >= MAX_DEPTH {
        return;
    }
    ctx.depth += 1;

    if let Some(word) = ctx.get_token_raw() {
        use TokenKind::*;
        let operands = match TokenKind::from_lexeme(&word) {
            Escape => {
                ctx.eol_reached = false;
                1
            }
            Filler | VarInjection => 1,
            OpSqrt | OpCbrt | OpAbs | OpCeiling | OpFloor | OpRound | OpCos | OpSin
            | OpTan | OpAcos | OpAsin | OpAtan | OpCosh | OpSinh | OpLn | OpLog => 1,
            Join => 2,
            OpAdd | OpSubstract | OpMultiply | OpDivide | OpMod | OpPow | OpBiggest
            | OpSmallest | OpRandom => 2,
            OpInterpolate | OpLimit | ClRgb | ClInterpolate => 3,
            ClRgba => 4,
            IfLess | IfLessEq | IfMore | IfMoreEq | IfEq | IfEqNot => 4,
            _ => 0,
        };
        for _ in 0..operands {
            skip_one(ctx);
        }
    }

    ctx.depth -= 1;
}

fn math(ctx: &mut Context, kind: TokenKind, operands: usize) -> Token {
    let mut d = [0.0f64; 3];
    for slot in d.iter_mut().take(operands) {
        match ctx.get_token_numeral() {
            Some(v) => *slot = v,
            None => return Token::Invalid,
        }
    }

    use TokenKind::*;
    let result = match kind {
        Timestamp => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as f64)
            .unwrap_or(0.0),
        ConstPi => std::f64::consts::PI,
        // The Euler–Mascheroni constant, kept for source compatibility.
        ConstEuler => 0.577_215_664_901_532_8,
        ConstTrue => 1.0,
        ConstFalse => 0.0,

        OpSqrt => d[0].sqrt(),
        OpCbrt => d[0].cbrt(),
        OpAbs => d[0].abs(),
        OpCeiling => d[0].ceil(),
        OpFloor => d[0].floor(),
        OpRound => d[0].round(),
        OpCos => d[0].cos(),
        OpSin => d[0].sin(),
        OpTan => d[0].tan(),
        OpAcos => d[0].acos(),
        OpAsin => d[0].asin(),
        OpAtan => d[0].atan(),
        OpCosh => d[0].cosh(),
        OpSinh => d[0].sinh(),
        OpLn => d[0].ln(),
        OpLog => d[0].log10(),

        OpAdd => d[0] + d[1],
        OpSubstract => d[0] - d[1],
        OpMultiply => d[0] * d[1],
        OpDivide => d[0] / d[1],
        OpMod => d[0] % d[1],
        OpPow => d[0].powf(d[1]),
        OpBiggest => if d[0] > d[1] { d[0] } else { d[1] },
        OpSmallest => if d[0] < d[1] { d[0] } else { d[1] },
        OpRandom => ctx.rng.uniform(d[0], d[1]),

        OpInterpolate => util::interpolate(d[0], d[1], d[2]),
        OpLimit => util::limit(d[0], d[1], d[2]),

        _ => return Token::Invalid,
    };

    Token::Num(result)
}

fn color_math(ctx: &mut Context, kind: TokenKind, operands: usize) -> Token {
    let mut d = [0.0f64; 4];
    for slot in d.iter_mut().take(operands) {
        match ctx.get_token_numeral() {
            Some(v) => *slot = v,
            None => return Token::Invalid,
        }
    }

    let result = match kind {
        TokenKind::ClRgb => Color::from_rgba(d[0], d[1], d[2], 255.0),
        TokenKind::ClRgba => Color::from_rgba(d[0], d[1], d[2], d[3]),
        TokenKind::ClInterpolate => {
            Color::from_argb_u32(d[0] as u32).interpolate(Color::from_argb_u32(d[1] as u32), d[2])
        }
        _ => return Token::Invalid,
    };

    Token::Color(result.to_argb_u32())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
