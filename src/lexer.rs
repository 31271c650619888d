use phf::phf_map;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    LParen,
    RParen,
    LSquirly,
    RSquirly,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Eq,
    Plus,
    Minus,
    Mul,
    Div,
    Let,
    Ident,
    Int,
    Float,
    /// unrecognized character, lexeme holds the diagnostic
    Error,
    Eof,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based
    pub line: u32,
    /// 1-based
    pub column: u32,
    /// byte offset of the lexeme start
    pub offset: usize,
}

static KEYWORDS: phf::Map<&'static [u8], TokenKind> = phf_map! {
    b"let" => TokenKind::Let,
};

/// Scans the whole input. Never fails, unknown characters become
/// `TokenKind::Error` tokens and the last token is always `Eof`.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lex = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let tok = lex.next_token();
        let is_eof = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    log::debug!("lexed {} tokens", tokens.len());
    return tokens;
}

pub struct Lexer<'a> {
    position: usize,
    start: usize,
    line: u32,
    line_start: usize,
    input: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            position: 0,
            start: 0,
            line: 1,
            line_start: 0,
            input,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.position;

        let kind = match self.ch() {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.ident_or_keyword(),
            b'0'..=b'9' => self.read_numeric(),
            0 if self.at_end() => TokenKind::Eof,
            _ => match self.read_symbol() {
                Some(kind) => kind,
                None => return self.error_token(),
            },
        };

        return self.make_token(kind);
    }

    fn at_end(&self) -> bool {
        return self.position >= self.input.len();
    }

    fn ch(&self) -> u8 {
        return self.byte_at(self.position);
    }

    fn peek(&self) -> u8 {
        return self.byte_at(self.position + 1);
    }

    fn byte_at(&self, i: usize) -> u8 {
        return self.input.as_bytes().get(i).copied().unwrap_or(0);
    }

    fn step(&mut self) {
        if self.ch() == b'\n' {
            self.line += 1;
            self.line_start = self.position + 1;
        }
        self.position += 1;
    }

    fn step_while<F>(&mut self, f: F)
    where
        F: Fn(u8) -> bool,
    {
        while !self.at_end() && f(self.ch()) {
            self.step();
        }
    }

    fn skip_whitespace(&mut self) {
        self.step_while(|ch| matches!(ch, b' ' | b'\t' | b'\r' | b'\n'));
    }

    fn ident_or_keyword(&mut self) -> TokenKind {
        self.step_while(|ch| ch.is_ascii_alphanumeric() || ch == b'_');
        let slice = &self.input.as_bytes()[self.start..self.position];
        if let Some(kw) = KEYWORDS.get(slice) {
            return *kw;
        }
        return TokenKind::Ident;
    }

    fn read_numeric(&mut self) -> TokenKind {
        self.step_while(|ch| ch.is_ascii_digit());
        // `5.` stays an int followed by a dot
        if self.ch() == b'.' && self.peek().is_ascii_digit() {
            self.step();
            self.step_while(|ch| ch.is_ascii_digit());
            return TokenKind::Float;
        }
        return TokenKind::Int;
    }

    fn read_symbol(&mut self) -> Option<TokenKind> {
        let kind = match self.ch() {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LSquirly,
            b'}' => TokenKind::RSquirly,
            b'[' => TokenKind::LBrace,
            b']' => TokenKind::RBrace,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'=' => TokenKind::Eq,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Mul,
            b'/' => TokenKind::Div,
            _ => return None,
        };
        self.step();
        return Some(kind);
    }

    fn error_token(&mut self) -> Token {
        // skip the whole (possibly multi-byte) char
        let ch = self.input[self.start..].chars().next().unwrap_or('\0');
        self.position += ch.len_utf8();
        let mut tok = self.make_token(TokenKind::Error);
        tok.lexeme = format!("unexpected character '{}'", ch.escape_default());
        return tok;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            lexeme: self.input[self.start..self.position].to_string(),
            line: self.line,
            column: (self.start - self.line_start + 1) as u32,
            offset: self.start,
        }
    }
}
