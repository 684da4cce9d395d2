//! Lexer: turns source bytes into a stream of [`Token`]s.
//!
//! Ported from `HLSLTokenizer.cpp`'s scanning algorithm: two/three-char
//! operator probing before falling back to single-char punctuation, a
//! reserved-word table scanned by linear text match (not by hashing, per
//! the source) with the `else`+`if` fusion special case, and `#line`/
//! `#pragma` consumed in place rather than surfaced as tokens. Every other
//! `#`-directive (`#define`, `#if`, `#ifdef`, ...) has no counterpart in the
//! retrieved tokenizer source — in the original pipeline these never reach
//! the tokenizer because an external preprocessor has already expanded them
//! before this stage runs. Retaining them as pass-through tokens is this
//! crate's own addition on top of that behavior (see `SPEC_FULL.md` §3 and
//! `preprocessor.rs`), designed from the directive contract in §4.3 rather
//! than ported line-for-line.
use crate::ast::PreprocKind;
use crate::error::TokenizerError;
use crate::string_pool::{StringPool, Symbol};
use std::collections::VecDeque;

/// Dense, order-preserving reserved-word table. `token_kind == 256 + i` iff
/// the scanned identifier text equals `RESERVED_WORDS[i]` — this ordering
/// is load-bearing, not cosmetic: index 0 is `if`, 1 is the fused `else if`,
/// 2 is plain `else`, and the fusion in [`Tokenizer::scan_identifier`] relies
/// on `1 == 2 - 1` to retarget a bare `else` into the fused keyword.
pub const RESERVED_WORDS: &[&str] = &[
    "float",
    "float1x2",
    "float1x3",
    "float1x4",
    "float2",
    "float2x2",
    "float2x3",
    "float2x4",
    "float3",
    "float3x2",
    "float3x3",
    "float3x4",
    "float4",
    "float4x2",
    "float4x3",
    "float4x4",
    "half",
    "half1x2",
    "half1x3",
    "half1x4",
    "half2",
    "half2x2",
    "half2x3",
    "half2x4",
    "half3",
    "half3x2",
    "half3x3",
    "half3x4",
    "half4",
    "half4x2",
    "half4x3",
    "half4x4",
    "min16float",
    "min16float1x2",
    "min16float1x3",
    "min16float1x4",
    "min16float2",
    "min16float2x2",
    "min16float2x3",
    "min16float2x4",
    "min16float3",
    "min16float3x2",
    "min16float3x3",
    "min16float3x4",
    "min16float4",
    "min16float4x2",
    "min16float4x3",
    "min16float4x4",
    "min10float",
    "min10float1x2",
    "min10float1x3",
    "min10float1x4",
    "min10float2",
    "min10float2x2",
    "min10float2x3",
    "min10float2x4",
    "min10float3",
    "min10float3x2",
    "min10float3x3",
    "min10float3x4",
    "min10float4",
    "min10float4x2",
    "min10float4x3",
    "min10float4x4",
    "bool",
    "bool1x2",
    "bool1x3",
    "bool1x4",
    "bool2",
    "bool2x2",
    "bool2x3",
    "bool2x4",
    "bool3",
    "bool3x2",
    "bool3x3",
    "bool3x4",
    "bool4",
    "bool4x2",
    "bool4x3",
    "bool4x4",
    "int",
    "int1x2",
    "int1x3",
    "int1x4",
    "int2",
    "int2x2",
    "int2x3",
    "int2x4",
    "int3",
    "int3x2",
    "int3x3",
    "int3x4",
    "int4",
    "int4x2",
    "int4x3",
    "int4x4",
    "uint",
    "uint1x2",
    "uint1x3",
    "uint1x4",
    "uint2",
    "uint2x2",
    "uint2x3",
    "uint2x4",
    "uint3",
    "uint3x2",
    "uint3x3",
    "uint3x4",
    "uint4",
    "uint4x2",
    "uint4x3",
    "uint4x4",
    "InputPatch",
    "OutputPatch",
    "PointStream",
    "LineStream",
    "TriangleStream",
    "groupshared",
    "texture",
    "Texture1D",
    "Texture1DArray",
    "Texture2D",
    "Texture2DArray",
    "Texture3D",
    "Texture2DMS",
    "Texture2DMSArray",
    "TextureCube",
    "TextureCubeArray",
    "RasterizerOrderedTexture1D",
    "RasterizerOrderedTexture1DArray",
    "RasterizerOrderedTexture2D",
    "RasterizerOrderedTexture2DArray",
    "RasterizerOrderedTexture3D",
    "RWTexture1D",
    "RWTexture1DArray",
    "RWTexture2D",
    "RWTexture2DArray",
    "RWTexture3D",
    "SamplerState",
    "sampler",
    "sampler2D",
    "sampler3D",
    "samplerCUBE",
    "sampler2DShadow",
    "sampler2DMS",
    "sampler2DArray",
    "SamplerComparisonState",
    "if",
    "else if",
    "else",
    "for",
    "while",
    "switch",
    "case",
    "default",
    "break",
    "true",
    "false",
    "void",
    "struct",
    "cbuffer",
    "tbuffer",
    "ConstantBuffer",
    "StructuredBuffer",
    "Buffer",
    "RWBuffer",
    "RWStructuredBuffer",
    "ByteAddressBuffer",
    "RWByteAddressBuffer",
    "RasterizerOrderedBuffer",
    "RasterizerOrderedStructuredBuffer",
    "RasterizerOrderedByteAddressBuffer",
    "register",
    "return",
    "continue",
    "discard",
    "const",
    "static",
    "inline",
    "row_major",
    "column_major",
    "AddressU",
    "AddressV",
    "AddressW",
    "BorderColor",
    "Filter",
    "MaxAnisotropy",
    "MaxLOD",
    "MinLOD",
    "MipLODBias",
    "ComparisonFunc",
    "MIN_MAG_MIP_POINT",
    "MIN_MAG_POINT_MIP_LINEAR",
    "MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MIN_POINT_MAG_MIP_LINEAR",
    "MIN_LINEAR_MAG_MIP_POINT",
    "MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MIN_MAG_LINEAR_MIP_POINT",
    "MIN_MAG_MIP_LINEAR",
    "ANISOTROPIC",
    "COMPARISON_MIN_MAG_MIP_POINT",
    "COMPARISON_MIN_MAG_POINT_MIP_LINEAR",
    "COMPARISON_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "COMPARISON_MIN_POINT_MAG_MIP_LINEAR",
    "COMPARISON_MIN_LINEAR_MAG_MIP_POINT",
    "COMPARISON_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "COMPARISON_MIN_MAG_LINEAR_MIP_POINT",
    "COMPARISON_MIN_MAG_MIP_LINEAR",
    "COMPARISON_ANISOTROPIC",
    "MINIMUM_MIN_MAG_MIP_POINT",
    "MINIMUM_MIN_MAG_POINT_MIP_LINEAR",
    "MINIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MINIMUM_MIN_POINT_MAG_MIP_LINEAR",
    "MINIMUM_MIN_LINEAR_MAG_MIP_POINT",
    "MINIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MINIMUM_MIN_MAG_LINEAR_MIP_POINT",
    "MINIMUM_MIN_MAG_MIP_LINEAR",
    "MINIMUM_ANISOTROPIC",
    "MAXIMUM_MIN_MAG_MIP_POINT",
    "MAXIMUM_MIN_MAG_POINT_MIP_LINEAR",
    "MAXIMUM_MIN_POINT_MAG_LINEAR_MIP_POINT",
    "MAXIMUM_MIN_POINT_MAG_MIP_LINEAR",
    "MAXIMUM_MIN_LINEAR_MAG_MIP_POINT",
    "MAXIMUM_MIN_LINEAR_MAG_POINT_MIP_LINEAR",
    "MAXIMUM_MIN_MAG_LINEAR_MIP_POINT",
    "MAXIMUM_MIN_MAG_MIP_LINEAR",
    "MAXIMUM_ANISOTROPIC",
    "WRAP",
    "MIRROR",
    "CLAMP",
    "BORDER",
    "MIRROR_ONCE",
    "NEVER",
    "LESS",
    "EQUAL",
    "LESS_EQUAL",
    "GREATER",
    "NOT_EQUAL",
    "GREATER_EQUAL",
    "ALWAYS",
    "uniform",
    "in",
    "out",
    "inout",
    "point",
    "line",
    "triangle",
    "lineadj",
    "triangleadj",
    "technique",
    "pass",
    "sizeof",
];

/// Maximum number of scanned identifiers kept in [`Tokenizer`]'s rolling
/// history, mirroring the reference's bounded `m_identifierHistory` ring.
const IDENTIFIER_HISTORY_CAPACITY: usize = 1024;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TokenKind {
    /// A single-byte punctuation character (`{`, `;`, `,`, ...), stored raw.
    Punctuation(u8),
    /// Index into [`RESERVED_WORDS`]; the 256-offset numeric token kind is
    /// recoverable via [`TokenKind::numeric_value`].
    Keyword(u16),
    Identifier,
    FloatLiteral,
    HalfLiteral,
    IntLiteral,
    UintLiteral,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    PlusPlus,
    MinusMinus,
    PlusEqual,
    MinusEqual,
    TimesEqual,
    DivideEqual,
    AndAnd,
    BarBar,
    LeftShift,
    RightShift,
    AndEqual,
    BarEqual,
    XorEqual,
    /// A retained preprocessor directive line (see module docs).
    Preprocessor(PreprocKind),
    EndOfStream,
}

impl TokenKind {
    /// The reference's numeric token-kind convention: ASCII punctuation and
    /// the handful of multi-char operators keep their natural byte/sentinel
    /// values, reserved words start at 256.
    pub fn numeric_value(&self) -> u32 {
        match *self {
            TokenKind::Punctuation(b) => b as u32,
            TokenKind::Keyword(i) => 256 + i as u32,
            _ => 0,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub file: Symbol,
    pub line: u32,
    /// Interned identifier text for `Identifier`, the macro/condition name
    /// for a `Preprocessor` directive.
    pub text: Option<Symbol>,
    /// The raw rest-of-line for a `Preprocessor` directive (a `#define`
    /// body, an `#if` condition, ...), interned verbatim.
    pub contents: Option<Symbol>,
    pub float_value: f32,
    pub int_value: i32,
    pub uint_value: u32,
}

impl Token {
    fn eof(file: Symbol, line: u32) -> Token {
        Token {
            kind: TokenKind::EndOfStream,
            file,
            line,
            text: None,
            contents: None,
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Scans one source file's bytes into tokens. Holds the latched first
/// error (§7's "syntax error" policy): once set, every subsequent call to
/// [`Tokenizer::next`] is a no-op that returns an end-of-stream sentinel
/// instead of continuing to scan.
pub struct Tokenizer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    file: Symbol,
    file_name: String,
    history: VecDeque<Symbol>,
    error: Option<TokenizerError>,
    pending: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, file: Symbol, start_line: u32, pool: &StringPool) -> Tokenizer<'a> {
        Tokenizer {
            source: source.as_bytes(),
            pos: 0,
            line: start_line,
            file,
            file_name: pool.resolve(file).to_string(),
            history: VecDeque::with_capacity(IDENTIFIER_HISTORY_CAPACITY),
            error: None,
            pending: None,
        }
    }

    pub fn error(&self) -> Option<&TokenizerError> {
        self.error.as_ref()
    }

    /// Pushes `tok` back; the next call to `next` returns it unscanned. Only
    /// one token of lookahead is supported, matching the reference's single
    /// `Undo()`.
    pub fn undo(&mut self, tok: Token) {
        debug_assert!(self.pending.is_none(), "undo does not nest");
        self.pending = Some(tok);
    }

    pub fn history(&self) -> &VecDeque<Symbol> {
        &self.history
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        c
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(TokenizerError {
                file: self.file_name.clone(),
                line: self.line,
                message: message.into(),
            });
        }
    }

    /// Advances past whitespace and comments. The `// USERMACRO` marker is
    /// deliberately NOT swallowed here — it is surfaced as its own token by
    /// `next` so passes that re-emit user macros verbatim can see it.
    fn skip_whitespace_and_comments(&mut self, pool: &mut StringPool) -> Option<Token> {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    if self.rest_starts_with(b"// USERMACRO") {
                        return Some(self.scan_user_macro_comment(pool));
                    }
                    while !self.at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.advance();
                    self.advance();
                    while !self.at_end() && !(self.peek() == b'*' && self.peek_at(1) == b'/') {
                        self.advance();
                    }
                    if !self.at_end() {
                        self.advance();
                        self.advance();
                    }
                }
                _ => return None,
            }
        }
    }

    fn rest_starts_with(&self, needle: &[u8]) -> bool {
        self.source[self.pos..].starts_with(needle)
    }

    fn scan_user_macro_comment(&mut self, pool: &mut StringPool) -> Token {
        let line = self.line;
        self.pos += 2; // "//"
        let start = self.pos;
        while !self.at_end() && self.peek() != b'\n' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos])
            .unwrap_or("")
            .trim();
        let contents = pool.intern(text);
        Token {
            kind: TokenKind::Preprocessor(PreprocKind::UserMacroComment),
            file: self.file,
            line,
            text: None,
            contents: Some(contents),
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }

    fn line_to_end(&mut self) -> &'a [u8] {
        let start = self.pos;
        while !self.at_end() && self.peek() != b'\n' {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    /// `#line N "file"` updates scanning position in place; it is consumed
    /// and never surfaced as a token, matching `HLSLTokenizer::ScanLineDirective`.
    fn scan_line_directive(&mut self) {
        while self.peek() == b' ' || self.peek() == b'\t' {
            self.advance();
        }
        let digits_start = self.pos;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let digits = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap_or("");
        let new_line: u32 = match digits.parse() {
            Ok(n) => n,
            Err(_) => {
                self.fail("expected line number after #line");
                self.line_to_end();
                return;
            }
        };
        while self.peek() == b' ' || self.peek() == b'\t' {
            self.advance();
        }
        if self.peek() == b'"' {
            self.advance();
            let name_start = self.pos;
            while !self.at_end() && self.peek() != b'"' && self.peek() != b'\n' {
                self.advance();
            }
            let _name = std::str::from_utf8(&self.source[name_start..self.pos]).unwrap_or("");
            if self.peek() == b'"' {
                self.advance();
            }
        }
        self.line_to_end();
        self.line = new_line;
    }

    fn skip_pragma_directive(&mut self) {
        self.line_to_end();
    }

    fn scan_generic_directive(&mut self, pool: &mut StringPool, kind: PreprocKind) -> Token {
        let line = self.line;
        while self.peek() == b' ' || self.peek() == b'\t' {
            self.advance();
        }
        let ident_start = self.pos;
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let identifier = if self.pos > ident_start {
            let text = std::str::from_utf8(&self.source[ident_start..self.pos]).unwrap_or("");
            Some(pool.intern(text))
        } else {
            None
        };
        let rest = self.line_to_end();
        let contents_text = std::str::from_utf8(rest).unwrap_or("").trim();
        let contents = if contents_text.is_empty() {
            None
        } else {
            Some(pool.intern(contents_text))
        };
        Token {
            kind: TokenKind::Preprocessor(kind),
            file: self.file,
            line,
            text: identifier,
            contents,
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }

    fn scan_directive(&mut self, pool: &mut StringPool) -> Option<Token> {
        self.advance(); // '#'
        while self.peek() == b' ' || self.peek() == b'\t' {
            self.advance();
        }
        let word_start = self.pos;
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let word = std::str::from_utf8(&self.source[word_start..self.pos]).unwrap_or("");
        match word {
            "line" => {
                self.scan_line_directive();
                None
            }
            "pragma" => {
                self.skip_pragma_directive();
                None
            }
            "define" => Some(self.scan_generic_directive(pool, PreprocKind::Define)),
            "undef" => Some(self.scan_generic_directive(pool, PreprocKind::Undef)),
            "ifdef" => Some(self.scan_generic_directive(pool, PreprocKind::Ifdef)),
            "ifndef" => Some(self.scan_generic_directive(pool, PreprocKind::Ifndef)),
            "if" => Some(self.scan_generic_directive(pool, PreprocKind::If)),
            "elif" => Some(self.scan_generic_directive(pool, PreprocKind::Elif)),
            "else" => Some(self.scan_generic_directive(pool, PreprocKind::Else)),
            "endif" => Some(self.scan_generic_directive(pool, PreprocKind::Endif)),
            "include" => Some(self.scan_generic_directive(pool, PreprocKind::Include)),
            "" => {
                self.fail("expected preprocessor directive after '#'");
                None
            }
            other => {
                self.fail(format!("unrecognized preprocessor directive '#{other}'"));
                None
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        if self.peek() == b'0' && (self.peek_at(1) == b'x' || self.peek_at(1) == b'X') {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
            let digits = std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap_or("0");
            // hex literals are always unsigned regardless of any trailing
            // suffix, matching the reference's sscanf-based hex path.
            if self.peek() == b'u' || self.peek() == b'U' {
                self.advance();
            }
            let value = u32::from_str_radix(digits, 16).unwrap_or(0);
            return Token {
                kind: TokenKind::UintLiteral,
                file: self.file,
                line,
                text: None,
                contents: None,
                float_value: 0.0,
                int_value: 0,
                uint_value: value,
            };
        }

        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let mut has_dot = false;
        if self.peek() == b'.' {
            has_dot = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let mut has_exp = false;
        if self.peek() == b'e' || self.peek() == b'E' {
            has_exp = true;
            self.advance();
            if self.peek() == b'+' || self.peek() == b'-' {
                self.advance();
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if has_dot || has_exp {
            let text_end = self.pos;
            let mut explicit_float = false;
            if self.peek() == b'f' || self.peek() == b'F' {
                explicit_float = true;
                self.advance();
            } else if self.peek() == b'h' || self.peek() == b'H' {
                self.advance();
            }
            let digits = std::str::from_utf8(&self.source[start..text_end]).unwrap_or("0");
            let value: f32 = digits.parse().unwrap_or(0.0);
            // A decimal with a '.' but no exponent and no explicit 'f'
            // suffix defaults to Half, not Float — a quirk of the original
            // scanner's suffix test firing even with nothing consumed.
            // Preserved here for fidelity; an exponent always means Float.
            let kind = if explicit_float || has_exp {
                TokenKind::FloatLiteral
            } else {
                TokenKind::HalfLiteral
            };
            Token {
                kind,
                file: self.file,
                line,
                text: None,
                contents: None,
                float_value: value,
                int_value: 0,
                uint_value: 0,
            }
        } else {
            let digits = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("0");
            if self.peek() == b'u' || self.peek() == b'U' {
                self.advance();
                let value: u32 = digits.parse().unwrap_or(0);
                Token {
                    kind: TokenKind::UintLiteral,
                    file: self.file,
                    line,
                    text: None,
                    contents: None,
                    float_value: 0.0,
                    int_value: 0,
                    uint_value: value,
                }
            } else {
                let value: i32 = digits.parse().unwrap_or(0);
                Token {
                    kind: TokenKind::IntLiteral,
                    file: self.file,
                    line,
                    text: None,
                    contents: None,
                    float_value: 0.0,
                    int_value: value,
                    uint_value: 0,
                }
            }
        }
    }

    fn reserved_index(text: &str) -> Option<u16> {
        RESERVED_WORDS.iter().position(|w| *w == text).map(|i| i as u16)
    }

    /// Scans an identifier or reserved word, applying the `else`+`if`
    /// fusion: a bare `else` immediately followed (modulo horizontal
    /// whitespace) by the word `if` is retargeted to the fused `"else if"`
    /// keyword entry.
    fn scan_identifier(&mut self, pool: &mut StringPool) -> Token {
        let line = self.line;
        let start = self.pos;
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");

        if let Some(mut index) = Self::reserved_index(text) {
            if text == "else" {
                let save = self.pos;
                let save_line = self.line;
                while self.peek() == b' ' || self.peek() == b'\t' {
                    self.advance();
                }
                let if_start = self.pos;
                if self.peek_at(0) == b'i'
                    && self.peek_at(1) == b'f'
                    && !is_ident_continue(self.peek_at(2))
                {
                    self.pos = if_start + 2;
                    index = Self::reserved_index("else if").expect("\"else if\" is in RESERVED_WORDS");
                } else {
                    self.pos = save;
                    self.line = save_line;
                }
            }
            return Token {
                kind: TokenKind::Keyword(index),
                file: self.file,
                line,
                text: None,
                contents: None,
                float_value: 0.0,
                int_value: 0,
                uint_value: 0,
            };
        }

        let symbol = pool.intern(text);
        if self.history.len() == IDENTIFIER_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(symbol);
        Token {
            kind: TokenKind::Identifier,
            file: self.file,
            line,
            text: Some(symbol),
            contents: None,
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }

    fn punct(&mut self, kind: TokenKind, width: usize) -> Token {
        let line = self.line;
        for _ in 0..width {
            self.advance();
        }
        Token {
            kind,
            file: self.file,
            line,
            text: None,
            contents: None,
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }

    /// Scans and returns the next token. Once a tokenizer error has
    /// latched, this is a no-op returning an end-of-stream sentinel.
    pub fn next(&mut self, pool: &mut StringPool) -> Token {
        if let Some(tok) = self.pending.take() {
            return tok;
        }
        if self.error.is_some() {
            return Token::eof(self.file, self.line);
        }

        loop {
            if let Some(tok) = self.skip_whitespace_and_comments(pool) {
                return tok;
            }
            if self.at_end() {
                return Token::eof(self.file, self.line);
            }
            if self.peek() == b'#' {
                if let Some(tok) = self.scan_directive(pool) {
                    return tok;
                }
                if self.error.is_some() {
                    return Token::eof(self.file, self.line);
                }
                continue;
            }
            break;
        }

        let c = self.peek();
        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_ascii_digit()) {
            return self.scan_number();
        }
        if is_ident_start(c) {
            return self.scan_identifier(pool);
        }

        let two = (c, self.peek_at(1));
        let kind = match two {
            (b'<', b'=') => Some((TokenKind::LessEqual, 2)),
            (b'>', b'=') => Some((TokenKind::GreaterEqual, 2)),
            (b'=', b'=') => Some((TokenKind::EqualEqual, 2)),
            (b'!', b'=') => Some((TokenKind::NotEqual, 2)),
            (b'+', b'+') => Some((TokenKind::PlusPlus, 2)),
            (b'-', b'-') => Some((TokenKind::MinusMinus, 2)),
            (b'+', b'=') => Some((TokenKind::PlusEqual, 2)),
            (b'-', b'=') => Some((TokenKind::MinusEqual, 2)),
            (b'*', b'=') => Some((TokenKind::TimesEqual, 2)),
            (b'/', b'=') => Some((TokenKind::DivideEqual, 2)),
            (b'&', b'&') => Some((TokenKind::AndAnd, 2)),
            (b'|', b'|') => Some((TokenKind::BarBar, 2)),
            (b'<', b'<') => Some((TokenKind::LeftShift, 2)),
            (b'>', b'>') => Some((TokenKind::RightShift, 2)),
            (b'&', b'=') => Some((TokenKind::AndEqual, 2)),
            (b'|', b'=') => Some((TokenKind::BarEqual, 2)),
            (b'^', b'=') => Some((TokenKind::XorEqual, 2)),
            _ => None,
        };
        if let Some((kind, width)) = kind {
            return self.punct(kind, width);
        }

        if c.is_ascii_graphic() {
            return self.punct(TokenKind::Punctuation(c), 1);
        }

        self.fail(format!("unexpected character '{}'", c as char));
        Token::eof(self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> (Vec<Token>, StringPool) {
        let mut pool = StringPool::new();
        let file = pool.intern("test.hlsl");
        let mut tok = Tokenizer::new(source, file, 1, &pool);
        let mut out = Vec::new();
        loop {
            let t = tok.next(&mut pool);
            let is_eof = matches!(t.kind, TokenKind::EndOfStream);
            out.push(t);
            if is_eof {
                break;
            }
        }
        (out, pool)
    }

    #[test]
    fn reserved_word_table_is_dense_and_ordered() {
        assert_eq!(RESERVED_WORDS[0], "float");
        assert_eq!(RESERVED_WORDS[1], "float1x2");
        assert_eq!(RESERVED_WORDS.iter().filter(|w| **w == "if").count(), 1);
        assert_eq!(RESERVED_WORDS.iter().filter(|w| **w == "else if").count(), 1);
        assert_eq!(RESERVED_WORDS.iter().filter(|w| **w == "else").count(), 1);
    }

    #[test]
    fn keyword_numeric_value_matches_table_index() {
        let (tokens, _) = scan_all("float x;");
        let kw = tokens[0].kind;
        assert_eq!(kw, TokenKind::Keyword(0));
        assert_eq!(kw.numeric_value(), 256);
    }

    #[test]
    fn else_if_fuses_into_single_keyword() {
        let (tokens, _) = scan_all("else if (x) {}");
        let expected = Tokenizer::reserved_index("else if").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(expected));
    }

    #[test]
    fn bare_else_stays_unfused() {
        let (tokens, _) = scan_all("else {}");
        let expected = Tokenizer::reserved_index("else").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(expected));
    }

    #[test]
    fn unsuffixed_decimal_defaults_to_half() {
        let (tokens, _) = scan_all("1.5;");
        assert_eq!(tokens[0].kind, TokenKind::HalfLiteral);
    }

    #[test]
    fn explicit_f_suffix_is_float() {
        let (tokens, _) = scan_all("1.5f;");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn exponent_forces_float_even_without_suffix() {
        let (tokens, _) = scan_all("1.5e2;");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn hex_literal_is_always_uint() {
        let (tokens, _) = scan_all("0xFFu;");
        assert_eq!(tokens[0].kind, TokenKind::UintLiteral);
        assert_eq!(tokens[0].uint_value, 255);
    }

    #[test]
    fn plain_integer_without_suffix_is_int() {
        let (tokens, _) = scan_all("42;");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].int_value, 42);
    }

    #[test]
    fn user_macro_comment_is_retained_as_a_token() {
        let (tokens, pool) = scan_all("// USERMACRO foo bar\nfloat x;");
        match tokens[0].kind {
            TokenKind::Preprocessor(PreprocKind::UserMacroComment) => {
                let text = pool.resolve(tokens[0].contents.unwrap());
                assert_eq!(text, "USERMACRO foo bar");
            }
            other => panic!("expected user macro comment, got {other:?}"),
        }
    }

    #[test]
    fn define_directive_is_retained_as_a_statement_level_token() {
        let (tokens, pool) = scan_all("#define FOO 1\nfloat x;");
        match tokens[0].kind {
            TokenKind::Preprocessor(PreprocKind::Define) => {
                assert_eq!(pool.resolve(tokens[0].text.unwrap()), "FOO");
            }
            other => panic!("expected define directive, got {other:?}"),
        }
    }

    #[test]
    fn line_directive_is_consumed_without_emitting_a_token() {
        let (tokens, _) = scan_all("#line 100 \"other.hlsl\"\nfloat x;");
        assert_eq!(tokens[0].kind, TokenKind::Keyword(0));
        assert_eq!(tokens[0].line, 100);
    }

    #[test]
    fn unterminated_block_comment_does_not_hang() {
        let (tokens, _) = scan_all("/* never closes");
        assert_eq!(tokens[0].kind, TokenKind::EndOfStream);
    }

    #[test]
    fn unrecognized_character_latches_an_error_and_further_calls_are_no_ops() {
        let mut pool = StringPool::new();
        let file = pool.intern("test.hlsl");
        let mut tok = Tokenizer::new("float x = `;", file, 1, &pool);
        loop {
            let t = tok.next(&mut pool);
            if matches!(t.kind, TokenKind::EndOfStream) {
                break;
            }
        }
        assert!(tok.error().is_some());
        let before = tok.pos;
        let t = tok.next(&mut pool);
        assert_eq!(tok.pos, before);
        assert!(matches!(t.kind, TokenKind::EndOfStream));
    }
}
