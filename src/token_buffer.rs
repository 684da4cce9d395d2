//! Materialized token stream consumed by the parser.
//!
//! [`TokenBuffer`] drains a [`Tokenizer`] to completion up front rather than
//! pulling tokens lazily, building a deduplicated file-name table alongside
//! it. This mirrors the reference's constructor-time drain and gives the
//! parser cheap, repeatable backtracking (`undo`, `get_prev`) without having
//! to re-run the scanner.
use crate::string_pool::{StringPool, Symbol};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// A single materialized token plus the file it came from, resolved to an
/// index into [`TokenBuffer`]'s own file-name table rather than carrying the
/// tokenizer's `Symbol` directly — two tokenizers scanning different
/// `#include`d files intern file names into independent pools, so the
/// buffer re-keys them into one local table on ingestion.
#[derive(Copy, Clone, Debug)]
pub struct BufferedToken {
    pub kind: TokenKind,
    pub file: usize,
    pub line: u32,
    pub text: Option<Symbol>,
    pub contents: Option<Symbol>,
    pub float_value: f32,
    pub int_value: i32,
    pub uint_value: u32,
}

pub struct TokenBuffer {
    tokens: Vec<BufferedToken>,
    file_names: Vec<Symbol>,
    cursor: usize,
    /// One-slot undo, matching `HLSLTokenizer::Undo`'s single-step contract
    /// at this layer.
    undone: bool,
}

impl TokenBuffer {
    /// Drains `tokenizer` to end-of-stream, interning every token's file
    /// name into a local, deduplicated table.
    pub fn drain(mut tokenizer: Tokenizer, pool: &mut StringPool, file: Symbol) -> TokenBuffer {
        let mut tokens = Vec::new();
        let file_names = vec![file];
        loop {
            let tok = tokenizer.next(pool);
            let is_eof = matches!(tok.kind, TokenKind::EndOfStream);
            tokens.push(BufferedToken {
                kind: tok.kind,
                file: 0,
                line: tok.line,
                text: tok.text,
                contents: tok.contents,
                float_value: tok.float_value,
                int_value: tok.int_value,
                uint_value: tok.uint_value,
            });
            if is_eof {
                break;
            }
        }
        TokenBuffer {
            tokens,
            file_names,
            cursor: 0,
            undone: false,
        }
    }

    pub fn file_name(&self, index: usize) -> Symbol {
        self.file_names
            .get(index)
            .copied()
            .unwrap_or(Symbol::EMPTY)
    }

    fn sentinel(&self) -> BufferedToken {
        let line = self.tokens.last().map(|t| t.line).unwrap_or(0);
        BufferedToken {
            kind: TokenKind::EndOfStream,
            file: 0,
            line,
            text: None,
            contents: None,
            float_value: 0.0,
            int_value: 0,
            uint_value: 0,
        }
    }

    /// Current cursor position; equivalent to the reference's history
    /// counter since every `next()` call advances the cursor by exactly one.
    pub fn history_counter(&self) -> usize {
        self.cursor
    }

    pub fn next(&mut self) -> BufferedToken {
        if self.undone {
            self.undone = false;
            return self.peek_at(0);
        }
        let tok = self.peek_at(0);
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        tok
    }

    /// Steps the cursor back by one. Only a single step is guaranteed;
    /// calling this twice in a row without an intervening `next` panics in
    /// debug builds, matching the one-shot contract described in §3.
    pub fn undo(&mut self) {
        debug_assert!(!self.undone, "undo does not nest");
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        self.undone = true;
    }

    /// Peeks `steps` tokens back from the current cursor (0 = the token
    /// `next()` would return). Out-of-range lookbacks return the EOF
    /// sentinel rather than panicking.
    pub fn get_prev(&self, steps: usize) -> BufferedToken {
        if steps > self.cursor {
            return self.sentinel();
        }
        self.peek_at_absolute(self.cursor - steps)
    }

    fn peek_at(&self, ahead: usize) -> BufferedToken {
        self.peek_at_absolute(self.cursor + ahead)
    }

    fn peek_at_absolute(&self, index: usize) -> BufferedToken {
        self.tokens.get(index).copied().unwrap_or_else(|| self.sentinel())
    }

    pub fn peek(&self) -> BufferedToken {
        self.peek_at(0)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// §6's stable token-dump format: one `"%6d: %-20s (%2d - %6d)\n"` line
    /// per token (index, readable text, file index, line), a blank line,
    /// then the file table as `"%2d: %s\n"` per entry.
    pub fn dump(&self, pool: &StringPool) -> String {
        let mut out = String::new();
        for (i, tok) in self.tokens.iter().enumerate() {
            let text = readable_token_text(tok, pool);
            out.push_str(&format!("{i:6}: {text:<20} ({:2} - {:6})\n", tok.file, tok.line));
        }
        out.push('\n');
        for (i, name) in self.file_names.iter().enumerate() {
            out.push_str(&format!("{i:2}: {}\n", pool.resolve(*name)));
        }
        out
    }
}

fn readable_token_text(tok: &BufferedToken, pool: &StringPool) -> String {
    match tok.kind {
        TokenKind::Punctuation(b) => (b as char).to_string(),
        TokenKind::Keyword(i) => crate::tokenizer::RESERVED_WORDS
            .get(i as usize)
            .copied()
            .unwrap_or("?")
            .to_string(),
        TokenKind::Identifier => tok.text.map(|s| pool.resolve(s).to_string()).unwrap_or_default(),
        TokenKind::FloatLiteral => tok.float_value.to_string(),
        TokenKind::HalfLiteral => tok.float_value.to_string(),
        TokenKind::IntLiteral => tok.int_value.to_string(),
        TokenKind::UintLiteral => tok.uint_value.to_string(),
        TokenKind::LessEqual => "<=".to_string(),
        TokenKind::GreaterEqual => ">=".to_string(),
        TokenKind::EqualEqual => "==".to_string(),
        TokenKind::NotEqual => "!=".to_string(),
        TokenKind::PlusPlus => "++".to_string(),
        TokenKind::MinusMinus => "--".to_string(),
        TokenKind::PlusEqual => "+=".to_string(),
        TokenKind::MinusEqual => "-=".to_string(),
        TokenKind::TimesEqual => "*=".to_string(),
        TokenKind::DivideEqual => "/=".to_string(),
        TokenKind::AndAnd => "&&".to_string(),
        TokenKind::BarBar => "||".to_string(),
        TokenKind::LeftShift => "<<".to_string(),
        TokenKind::RightShift => ">>".to_string(),
        TokenKind::AndEqual => "&=".to_string(),
        TokenKind::BarEqual => "|=".to_string(),
        TokenKind::XorEqual => "^=".to_string(),
        TokenKind::Preprocessor(_) => tok.contents.map(|s| pool.resolve(s).to_string()).unwrap_or_default(),
        TokenKind::EndOfStream => "EOF".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_buffer(source: &str) -> (TokenBuffer, StringPool) {
        let mut pool = StringPool::new();
        let file = pool.intern("test.hlsl");
        let tokenizer = Tokenizer::new(source, file, 1, &pool);
        let buf = TokenBuffer::drain(tokenizer, &mut pool, file);
        (buf, pool)
    }

    #[test]
    fn drains_every_token_including_eof_sentinel() {
        let (buf, _) = make_buffer("float x;");
        assert!(!buf.is_empty());
        assert!(matches!(
            buf.tokens.last().unwrap().kind,
            TokenKind::EndOfStream
        ));
    }

    #[test]
    fn next_advances_and_undo_rewinds_one_step() {
        let (mut buf, _) = make_buffer("float x;");
        let first = buf.next();
        let second = buf.next();
        assert_ne!(first.kind, second.kind);
        buf.undo();
        let replayed = buf.next();
        assert_eq!(replayed.kind, second.kind);
    }

    #[test]
    fn get_prev_looks_back_without_consuming() {
        let (mut buf, _) = make_buffer("float x y;");
        let first = buf.next();
        let _second = buf.next();
        let looked_back = buf.get_prev(1);
        assert_eq!(looked_back.kind, first.kind);
    }

    #[test]
    fn out_of_range_access_returns_sentinel_with_last_valid_line() {
        let (mut buf, _) = make_buffer("float x;\n");
        while !matches!(buf.peek().kind, TokenKind::EndOfStream) {
            buf.next();
        }
        let last_line = buf.peek().line;
        buf.next();
        let sentinel = buf.peek();
        assert!(matches!(sentinel.kind, TokenKind::EndOfStream));
        assert_eq!(sentinel.line, last_line);
    }
}
