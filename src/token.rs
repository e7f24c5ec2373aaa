//! Token kinds and keyword recognition.
//!
//! Every word read from a source file is classified into a [`TokenKind`].
//! Three families exist:
//!
//! * *structural* kinds produced by the tokenizer and evaluator themselves
//!   (`Str`, `Number`, `Invalid`, …);
//! * *statement introducers*, recognized at the start of a logical line by
//!   the sequence dispatcher;
//! * *expression* keywords, expanded in place by the substitution evaluator
//!   wherever a value is expected.
//!
//! Recognition is a fixed compile-time `match` over the lexeme; there is no
//! runtime keyword table to build or cache.

/// Classification of a single word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ── Structural ───────────────────────────────────────────────────────────
    Invalid,
    Str,
    Number,
    Eof,
    Comment,
    Escape,
    Filler,
    Join,

    // ── Statement introducers ────────────────────────────────────────────────
    VarDeclaration,
    EnumDeclaration,
    VarAppend,
    VarPrepend,
    VarMerge,
    VarInjection,
    SectionBegin,
    SectionAdd,
    SectionDel,
    Include,
    ForBegin,
    ForEnd,
    Seed,
    Print,
    Restrict,

    // ── Conditionals ─────────────────────────────────────────────────────────
    IfLess,
    IfLessEq,
    IfMore,
    IfMoreEq,
    IfEq,
    IfEqNot,

    // ── Constants ────────────────────────────────────────────────────────────
    Timestamp,
    ConstPi,
    /// The Euler–Mascheroni constant γ ≈ 0.5772, not e ≈ 2.7183.  Kept this
    /// way for compatibility with existing source files.
    ConstEuler,
    ConstTrue,
    ConstFalse,

    // ── Unary math ───────────────────────────────────────────────────────────
    OpSqrt,
    OpCbrt,
    OpAbs,
    OpCeiling,
    OpFloor,
    OpRound,
    OpCos,
    OpSin,
    OpTan,
    OpAcos,
    OpAsin,
    OpAtan,
    OpCosh,
    OpSinh,
    OpLn,
    OpLog,

    // ── Binary math ──────────────────────────────────────────────────────────
    OpAdd,
    OpSubstract,
    OpMultiply,
    OpDivide,
    OpMod,
    OpPow,
    OpBiggest,
    OpSmallest,
    OpRandom,

    // ── Ternary math ─────────────────────────────────────────────────────────
    OpInterpolate,
    OpLimit,

    // ── Color ────────────────────────────────────────────────────────────────
    ClRgb,
    ClRgba,
    ClInterpolate,
}

impl TokenKind {
    /// Classify a word.  Anything that is not a recognized keyword is `Str`
    /// (it may still coerce to a number later).
    pub fn from_lexeme(word: &str) -> TokenKind {
        match word {
            "//" => TokenKind::Comment,
            "\\" => TokenKind::Escape,
            "=" => TokenKind::Filler,
            "EOF" => TokenKind::Eof,
            "JOIN" => TokenKind::Join,

            "LET" => TokenKind::VarDeclaration,
            "LET_ENUM" => TokenKind::EnumDeclaration,
            "VAR" => TokenKind::VarAppend,
            "PREPEND" => TokenKind::VarPrepend,
            "MERGE" => TokenKind::VarMerge,
            "%" => TokenKind::VarInjection,
            "SECTION" => TokenKind::SectionBegin,
            "SECTION_ADD" => TokenKind::SectionAdd,
            "SECTION_DEL" => TokenKind::SectionDel,
            "INCLUDE" => TokenKind::Include,
            "FOR_EACH" => TokenKind::ForBegin,
            "FOR_END" => TokenKind::ForEnd,
            "SEED" => TokenKind::Seed,
            "PRINT" => TokenKind::Print,
            "RESTRICT" => TokenKind::Restrict,

            "<" => TokenKind::IfLess,
            "<=" => TokenKind::IfLessEq,
            ">" => TokenKind::IfMore,
            ">=" => TokenKind::IfMoreEq,
            "==" => TokenKind::IfEq,
            "!=" => TokenKind::IfEqNot,

            "TIMESTAMP" => TokenKind::Timestamp,
            "PI" => TokenKind::ConstPi,
            "EULER" => TokenKind::ConstEuler,
            "TRUE" => TokenKind::ConstTrue,
            "FALSE" => TokenKind::ConstFalse,

            "SQRT" => TokenKind::OpSqrt,
            "CBRT" => TokenKind::OpCbrt,
            "ABS" => TokenKind::OpAbs,
            "CEIL" => TokenKind::OpCeiling,
            "FLOOR" => TokenKind::OpFloor,
            "ROUND" => TokenKind::OpRound,
            "COS" => TokenKind::OpCos,
            "SIN" => TokenKind::OpSin,
            "TAN" => TokenKind::OpTan,
            "ACOS" => TokenKind::OpAcos,
            "ASIN" => TokenKind::OpAsin,
            "ATAN" => TokenKind::OpAtan,
            "COSH" => TokenKind::OpCosh,
            "SINH" => TokenKind::OpSinh,
            "LN" => TokenKind::OpLn,
            "LOG" => TokenKind::OpLog,

            "+" => TokenKind::OpAdd,
            "-" => TokenKind::OpSubstract,
            "*" => TokenKind::OpMultiply,
            "/" => TokenKind::OpDivide,
            "MOD" => TokenKind::OpMod,
            "POW" => TokenKind::OpPow,
            "MAX" => TokenKind::OpBiggest,
            "MIN" => TokenKind::OpSmallest,
            "RANDOM" => TokenKind::OpRandom,

            "ITP" => TokenKind::OpInterpolate,
            "LIMIT" => TokenKind::OpLimit,

            "RGB" => TokenKind::ClRgb,
            "RGBA" => TokenKind::ClRgba,
            "CLITP" => TokenKind::ClInterpolate,

            _ => TokenKind::Str,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_keywords() {
        assert_eq!(TokenKind::from_lexeme("LET"), TokenKind::VarDeclaration);
        assert_eq!(TokenKind::from_lexeme("LET_ENUM"), TokenKind::EnumDeclaration);
        assert_eq!(TokenKind::from_lexeme("SECTION"), TokenKind::SectionBegin);
        assert_eq!(TokenKind::from_lexeme("FOR_EACH"), TokenKind::ForBegin);
        assert_eq!(TokenKind::from_lexeme("FOR_END"), TokenKind::ForEnd);
        assert_eq!(TokenKind::from_lexeme("INCLUDE"), TokenKind::Include);
        assert_eq!(TokenKind::from_lexeme("RESTRICT"), TokenKind::Restrict);
    }

    #[test]
    fn expression_keywords() {
        assert_eq!(TokenKind::from_lexeme("%"), TokenKind::VarInjection);
        assert_eq!(TokenKind::from_lexeme("+"), TokenKind::OpAdd);
        assert_eq!(TokenKind::from_lexeme("=="), TokenKind::IfEq);
        assert_eq!(TokenKind::from_lexeme("CLITP"), TokenKind::ClInterpolate);
        assert_eq!(TokenKind::from_lexeme("EULER"), TokenKind::ConstEuler);
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(TokenKind::from_lexeme("let"), TokenKind::Str);
        assert_eq!(TokenKind::from_lexeme("Section"), TokenKind::Str);
    }

    #[test]
    fn plain_words_are_strings() {
        assert_eq!(TokenKind::from_lexeme("font"), TokenKind::Str);
        assert_eq!(TokenKind::from_lexeme("12.5"), TokenKind::Str);
        assert_eq!(TokenKind::from_lexeme(""), TokenKind::Str);
    }
}
