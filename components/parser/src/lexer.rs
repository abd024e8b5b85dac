//! JavaScript Lexer - tokenizes source code into tokens
//!
//! The lexer is pulled by the parser one token at a time. Because `/` is
//! ambiguous between division and the start of a regular expression, the
//! parser tells the lexer which kind of token it expects next through
//! [`LexMode`].

use std::fmt;

use core_types::conversion::parse_radix_digits;
use core_types::{JsError, SourcePosition};

use crate::error::syntax_error;

/// JavaScript keyword types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// break keyword
    Break,
    /// case keyword
    Case,
    /// catch keyword
    Catch,
    /// class keyword (reserved)
    Class,
    /// const keyword
    Const,
    /// continue keyword
    Continue,
    /// debugger keyword
    Debugger,
    /// default keyword
    Default,
    /// delete keyword
    Delete,
    /// do keyword
    Do,
    /// else keyword
    Else,
    /// enum keyword (reserved)
    Enum,
    /// export keyword (reserved)
    Export,
    /// extends keyword (reserved)
    Extends,
    /// false keyword
    False,
    /// finally keyword
    Finally,
    /// for keyword
    For,
    /// function keyword
    Function,
    /// if keyword
    If,
    /// import keyword (reserved)
    Import,
    /// in keyword
    In,
    /// instanceof keyword
    Instanceof,
    /// let keyword
    Let,
    /// new keyword
    New,
    /// null keyword
    Null,
    /// return keyword
    Return,
    /// super keyword (reserved)
    Super,
    /// switch keyword
    Switch,
    /// this keyword
    This,
    /// throw keyword
    Throw,
    /// true keyword
    True,
    /// try keyword
    Try,
    /// typeof keyword
    Typeof,
    /// var keyword
    Var,
    /// void keyword
    Void,
    /// while keyword
    While,
    /// with keyword
    With,
}

impl Keyword {
    /// Looks up the keyword spelled by `word`.
    pub fn lookup(word: &str) -> Option<Keyword> {
        Some(match word {
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "catch" => Keyword::Catch,
            "class" => Keyword::Class,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "debugger" => Keyword::Debugger,
            "default" => Keyword::Default,
            "delete" => Keyword::Delete,
            "do" => Keyword::Do,
            "else" => Keyword::Else,
            "enum" => Keyword::Enum,
            "export" => Keyword::Export,
            "extends" => Keyword::Extends,
            "false" => Keyword::False,
            "finally" => Keyword::Finally,
            "for" => Keyword::For,
            "function" => Keyword::Function,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "in" => Keyword::In,
            "instanceof" => Keyword::Instanceof,
            "let" => Keyword::Let,
            "new" => Keyword::New,
            "null" => Keyword::Null,
            "return" => Keyword::Return,
            "super" => Keyword::Super,
            "switch" => Keyword::Switch,
            "this" => Keyword::This,
            "throw" => Keyword::Throw,
            "true" => Keyword::True,
            "try" => Keyword::Try,
            "typeof" => Keyword::Typeof,
            "var" => Keyword::Var,
            "void" => Keyword::Void,
            "while" => Keyword::While,
            "with" => Keyword::With,
            _ => return None,
        })
    }

    /// Source spelling of the keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Catch => "catch",
            Keyword::Class => "class",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Debugger => "debugger",
            Keyword::Default => "default",
            Keyword::Delete => "delete",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::Enum => "enum",
            Keyword::Export => "export",
            Keyword::Extends => "extends",
            Keyword::False => "false",
            Keyword::Finally => "finally",
            Keyword::For => "for",
            Keyword::Function => "function",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::In => "in",
            Keyword::Instanceof => "instanceof",
            Keyword::Let => "let",
            Keyword::New => "new",
            Keyword::Null => "null",
            Keyword::Return => "return",
            Keyword::Super => "super",
            Keyword::Switch => "switch",
            Keyword::This => "this",
            Keyword::Throw => "throw",
            Keyword::True => "true",
            Keyword::Try => "try",
            Keyword::Typeof => "typeof",
            Keyword::Var => "var",
            Keyword::Void => "void",
            Keyword::While => "while",
            Keyword::With => "with",
        }
    }

    /// Keywords reserved for future use that are never valid in this grammar.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Keyword::Class
                | Keyword::Enum
                | Keyword::Export
                | Keyword::Extends
                | Keyword::Import
                | Keyword::Super
        )
    }
}

/// Punctuator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuator {
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// .
    Dot,
    /// :
    Colon,
    /// ?
    Question,
    /// =
    Assign,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// **
    StarStar,
    /// ==
    EqEq,
    /// ===
    EqEqEq,
    /// !=
    NotEq,
    /// !==
    NotEqEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,
    /// &
    And,
    /// |
    Or,
    /// ^
    Xor,
    /// ~
    Tilde,
    /// <<
    LtLt,
    /// >>
    GtGt,
    /// >>>
    GtGtGt,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// %=
    PercentEq,
    /// **=
    StarStarEq,
    /// &=
    AndEq,
    /// |=
    OrEq,
    /// ^=
    XorEq,
    /// <<=
    LtLtEq,
    /// >>=
    GtGtEq,
    /// >>>=
    GtGtGtEq,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
}

impl Punctuator {
    /// Source spelling of the punctuator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Punctuator::LParen => "(",
            Punctuator::RParen => ")",
            Punctuator::LBrace => "{",
            Punctuator::RBrace => "}",
            Punctuator::LBracket => "[",
            Punctuator::RBracket => "]",
            Punctuator::Semicolon => ";",
            Punctuator::Comma => ",",
            Punctuator::Dot => ".",
            Punctuator::Colon => ":",
            Punctuator::Question => "?",
            Punctuator::Assign => "=",
            Punctuator::Plus => "+",
            Punctuator::Minus => "-",
            Punctuator::Star => "*",
            Punctuator::Slash => "/",
            Punctuator::Percent => "%",
            Punctuator::StarStar => "**",
            Punctuator::EqEq => "==",
            Punctuator::EqEqEq => "===",
            Punctuator::NotEq => "!=",
            Punctuator::NotEqEq => "!==",
            Punctuator::Lt => "<",
            Punctuator::LtEq => "<=",
            Punctuator::Gt => ">",
            Punctuator::GtEq => ">=",
            Punctuator::AndAnd => "&&",
            Punctuator::OrOr => "||",
            Punctuator::Not => "!",
            Punctuator::And => "&",
            Punctuator::Or => "|",
            Punctuator::Xor => "^",
            Punctuator::Tilde => "~",
            Punctuator::LtLt => "<<",
            Punctuator::GtGt => ">>",
            Punctuator::GtGtGt => ">>>",
            Punctuator::PlusEq => "+=",
            Punctuator::MinusEq => "-=",
            Punctuator::StarEq => "*=",
            Punctuator::SlashEq => "/=",
            Punctuator::PercentEq => "%=",
            Punctuator::StarStarEq => "**=",
            Punctuator::AndEq => "&=",
            Punctuator::OrEq => "|=",
            Punctuator::XorEq => "^=",
            Punctuator::LtLtEq => "<<=",
            Punctuator::GtGtEq => ">>=",
            Punctuator::GtGtGtEq => ">>>=",
            Punctuator::PlusPlus => "++",
            Punctuator::MinusMinus => "--",
        }
    }
}

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier (variable name, property name, contextual word)
    Identifier(String),
    /// Number literal
    Number(f64),
    /// String literal (escapes already processed)
    String(String),
    /// Template literal with no substitutions (no `${}`)
    TemplateLiteral(String),
    /// Template head: from ` to first ${
    TemplateHead(String),
    /// Template middle: from } to next ${
    TemplateMiddle(String),
    /// Template tail: from } to closing `
    TemplateTail(String),
    /// Regular expression literal (pattern, flags)
    RegExp(String, String),
    /// Keyword
    Keyword(Keyword),
    /// Punctuator/operator
    Punctuator(Punctuator),
    /// End of file
    EOF,
}

impl Token {
    /// Returns true if this token is the given punctuator.
    pub fn is_punct(&self, punct: Punctuator) -> bool {
        matches!(self, Token::Punctuator(p) if *p == punct)
    }

    /// Returns true if this token is the given keyword.
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k) if *k == keyword)
    }

    /// Returns true if this token is the identifier `name`.
    pub fn is_identifier_named(&self, name: &str) -> bool {
        matches!(self, Token::Identifier(id) if id == name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Number(n) => write!(f, "number {}", core_types::conversion::number_to_string(*n)),
            Token::String(_) => f.write_str("string"),
            Token::TemplateLiteral(_)
            | Token::TemplateHead(_)
            | Token::TemplateMiddle(_)
            | Token::TemplateTail(_) => f.write_str("template"),
            Token::RegExp(pattern, flags) => write!(f, "/{}/{}", pattern, flags),
            Token::Keyword(k) => write!(f, "'{}'", k.as_str()),
            Token::Punctuator(p) => write!(f, "'{}'", p.as_str()),
            Token::EOF => f.write_str("end of input"),
        }
    }
}

/// What the parser expects next; decides how `/` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// An operand may start here: `/` begins a regular expression
    Operand,
    /// An operator may follow: `/` and `/=` are division
    Operator,
}

/// The current token plus its location.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    /// The token itself
    pub token: Token,
    /// Position of the first character
    pub start: SourcePosition,
    /// Byte offset one past the last character
    pub end: usize,
    /// A line terminator was consumed between the previous token and this one
    pub newline_before: bool,
    /// The token used legacy octal syntax (`010`, `"\07"`)
    pub legacy_octal: bool,
}

/// Lexer for JavaScript source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    position: usize,
    offset: usize,
    line: u32,
    column: u32,
    strict: bool,
    allow_legacy_octal: bool,
    saw_legacy_octal: bool,
    current: TokenInfo,
    previous_end: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    ///
    /// The lexer starts before the first token; call [`Lexer::advance`] to
    /// read it.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            strict: false,
            allow_legacy_octal: false,
            saw_legacy_octal: false,
            current: TokenInfo {
                token: Token::EOF,
                start: SourcePosition::new(1, 1, 0),
                end: 0,
                newline_before: false,
                legacy_octal: false,
            },
            previous_end: 0,
        }
    }

    /// Accept legacy octal integer literals in non-strict code.
    pub fn with_legacy_octal(mut self, allow: bool) -> Self {
        self.allow_legacy_octal = allow;
        self
    }

    /// The complete source text.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// The current token and its location.
    pub fn current(&self) -> &TokenInfo {
        &self.current
    }

    /// The current token.
    pub fn token(&self) -> &Token {
        &self.current.token
    }

    /// Position of the current token.
    pub fn position(&self) -> SourcePosition {
        self.current.start
    }

    /// Whether a line terminator preceded the current token.
    pub fn newline_before(&self) -> bool {
        self.current.newline_before
    }

    /// Byte offset just past the previously consumed token.
    pub fn previous_end(&self) -> usize {
        self.previous_end
    }

    /// Whether strict-mode lexical rules are active.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Switch strict-mode lexical rules on or off for following tokens.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Move to the next token, reading it in the given mode.
    pub fn advance(&mut self, mode: LexMode) -> Result<(), JsError> {
        self.previous_end = self.current.end;
        let newline_before = self.skip_whitespace_and_comments()?;
        let start = self.current_position();
        self.saw_legacy_octal = false;
        let token = self.scan_token(mode)?;
        self.current = TokenInfo {
            token,
            start,
            end: self.offset,
            newline_before,
            legacy_octal: self.saw_legacy_octal,
        };
        Ok(())
    }

    /// Re-read the source after a template substitution's closing `}` as the
    /// continuation of the template literal.
    pub fn rescan_template_continuation(&mut self) -> Result<(), JsError> {
        if !self.current.token.is_punct(Punctuator::RBrace) {
            return Err(syntax_error(
                "Expected '}' after template substitution",
                Some(self.current.start),
            ));
        }
        let start = self.current.start;
        let token = match self.scan_template_part(start)? {
            TemplatePart::Substitution(text) => Token::TemplateMiddle(text),
            TemplatePart::End(text) => Token::TemplateTail(text),
        };
        self.current = TokenInfo {
            token,
            start,
            end: self.offset,
            newline_before: false,
            legacy_octal: false,
        };
        Ok(())
    }

    fn scan_token(&mut self, mode: LexMode) -> Result<Token, JsError> {
        if self.is_at_end() {
            return Ok(Token::EOF);
        }

        let start_pos = self.current_position();
        let ch = self.bump();

        let punct = match ch {
            '(' => Punctuator::LParen,
            ')' => Punctuator::RParen,
            '{' => Punctuator::LBrace,
            '}' => Punctuator::RBrace,
            '[' => Punctuator::LBracket,
            ']' => Punctuator::RBracket,
            ';' => Punctuator::Semicolon,
            ',' => Punctuator::Comma,
            ':' => Punctuator::Colon,
            '?' => Punctuator::Question,
            '~' => Punctuator::Tilde,

            '.' => {
                if self.peek().is_ascii_digit() {
                    return self.scan_number('.', start_pos);
                }
                Punctuator::Dot
            }

            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        Punctuator::EqEqEq
                    } else {
                        Punctuator::EqEq
                    }
                } else {
                    Punctuator::Assign
                }
            }

            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        Punctuator::NotEqEq
                    } else {
                        Punctuator::NotEq
                    }
                } else {
                    Punctuator::Not
                }
            }

            '+' => {
                if self.match_char('+') {
                    Punctuator::PlusPlus
                } else if self.match_char('=') {
                    Punctuator::PlusEq
                } else {
                    Punctuator::Plus
                }
            }

            '-' => {
                if self.match_char('-') {
                    Punctuator::MinusMinus
                } else if self.match_char('=') {
                    Punctuator::MinusEq
                } else {
                    Punctuator::Minus
                }
            }

            '*' => {
                if self.match_char('*') {
                    if self.match_char('=') {
                        Punctuator::StarStarEq
                    } else {
                        Punctuator::StarStar
                    }
                } else if self.match_char('=') {
                    Punctuator::StarEq
                } else {
                    Punctuator::Star
                }
            }

            '/' => {
                if mode == LexMode::Operand {
                    return self.scan_regexp(start_pos);
                }
                if self.match_char('=') {
                    Punctuator::SlashEq
                } else {
                    Punctuator::Slash
                }
            }

            '%' => {
                if self.match_char('=') {
                    Punctuator::PercentEq
                } else {
                    Punctuator::Percent
                }
            }

            '<' => {
                if self.match_char('<') {
                    if self.match_char('=') {
                        Punctuator::LtLtEq
                    } else {
                        Punctuator::LtLt
                    }
                } else if self.match_char('=') {
                    Punctuator::LtEq
                } else {
                    Punctuator::Lt
                }
            }

            '>' => {
                if self.match_char('>') {
                    if self.match_char('>') {
                        if self.match_char('=') {
                            Punctuator::GtGtGtEq
                        } else {
                            Punctuator::GtGtGt
                        }
                    } else if self.match_char('=') {
                        Punctuator::GtGtEq
                    } else {
                        Punctuator::GtGt
                    }
                } else if self.match_char('=') {
                    Punctuator::GtEq
                } else {
                    Punctuator::Gt
                }
            }

            '&' => {
                if self.match_char('&') {
                    Punctuator::AndAnd
                } else if self.match_char('=') {
                    Punctuator::AndEq
                } else {
                    Punctuator::And
                }
            }

            '|' => {
                if self.match_char('|') {
                    Punctuator::OrOr
                } else if self.match_char('=') {
                    Punctuator::OrEq
                } else {
                    Punctuator::Or
                }
            }

            '^' => {
                if self.match_char('=') {
                    Punctuator::XorEq
                } else {
                    Punctuator::Xor
                }
            }

            '"' | '\'' => return self.scan_string(ch, start_pos),
            '`' => {
                return Ok(match self.scan_template_part(start_pos)? {
                    TemplatePart::Substitution(text) => Token::TemplateHead(text),
                    TemplatePart::End(text) => Token::TemplateLiteral(text),
                })
            }
            c if c.is_ascii_digit() => return self.scan_number(c, start_pos),
            '\\' => return self.scan_identifier(None, start_pos),
            c if is_id_start(c) => return self.scan_identifier(Some(c), start_pos),

            other => {
                return Err(syntax_error(
                    format!("Unexpected character '{}'", other),
                    Some(start_pos),
                ))
            }
        };

        Ok(Token::Punctuator(punct))
    }

    fn scan_string(&mut self, quote: char, start_pos: SourcePosition) -> Result<Token, JsError> {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(syntax_error("Unterminated string", Some(start_pos)));
            }
            let ch = self.peek();
            if ch == quote {
                self.bump();
                break;
            }
            if ch == '\n' || ch == '\r' {
                return Err(syntax_error("Unterminated string literal", Some(start_pos)));
            }
            self.bump();
            if ch == '\\' {
                self.scan_escape(&mut value, false, start_pos)?;
            } else {
                value.push(ch);
            }
        }

        Ok(Token::String(value))
    }

    /// Reads template characters up to `${` or the closing backtick.
    fn scan_template_part(&mut self, start_pos: SourcePosition) -> Result<TemplatePart, JsError> {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(syntax_error("Unterminated template literal", Some(start_pos)));
            }
            let ch = self.bump();
            match ch {
                '`' => return Ok(TemplatePart::End(value)),
                '$' if self.peek() == '{' => {
                    self.bump();
                    return Ok(TemplatePart::Substitution(value));
                }
                '\\' => self.scan_escape(&mut value, true, start_pos)?,
                '\r' => {
                    // CRLF and CR are normalized to LF
                    if self.peek() == '\n' {
                        self.bump();
                    }
                    self.new_line();
                    value.push('\n');
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.new_line();
                    value.push(ch);
                }
                _ => value.push(ch),
            }
        }
    }

    /// Processes one escape sequence; the backslash is already consumed.
    fn scan_escape(
        &mut self,
        value: &mut String,
        in_template: bool,
        start_pos: SourcePosition,
    ) -> Result<(), JsError> {
        if self.is_at_end() {
            return Err(syntax_error("Unterminated string", Some(start_pos)));
        }
        let escaped = self.bump();
        match escaped {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'b' => value.push('\u{0008}'),
            'f' => value.push('\u{000C}'),
            'v' => value.push('\u{000B}'),
            '0' if !self.peek().is_ascii_digit() => value.push('\0'),
            '0'..='7' => {
                if in_template {
                    return Err(syntax_error(
                        "Octal escape sequences are not allowed in template literals",
                        Some(start_pos),
                    ));
                }
                if self.strict {
                    return Err(syntax_error(
                        "Octal escape sequences are not allowed in strict mode",
                        Some(start_pos),
                    ));
                }
                self.saw_legacy_octal = true;
                // Up to three digits, value at most 0o377
                let mut code = escaped.to_digit(8).unwrap_or(0);
                let max_len = if escaped <= '3' { 3 } else { 2 };
                let mut len = 1;
                while len < max_len {
                    match self.peek().to_digit(8) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.bump();
                            len += 1;
                        }
                        None => break,
                    }
                }
                value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            '8' | '9' => {
                if in_template || self.strict {
                    return Err(syntax_error(
                        format!("\\{} is not allowed in strict mode", escaped),
                        Some(start_pos),
                    ));
                }
                self.saw_legacy_octal = true;
                value.push(escaped);
            }
            'x' => {
                let code = self.scan_hex_digits(2, start_pos)?;
                value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let ch = self.scan_unicode_escape_body(start_pos)?;
                value.push(ch);
            }
            '\r' => {
                if self.peek() == '\n' {
                    self.bump();
                }
                self.new_line();
            }
            '\n' | '\u{2028}' | '\u{2029}' => self.new_line(),
            other => value.push(other),
        }
        Ok(())
    }

    fn scan_hex_digits(&mut self, count: usize, start_pos: SourcePosition) -> Result<u32, JsError> {
        let mut code = 0u32;
        for _ in 0..count {
            match self.peek().to_digit(16) {
                Some(digit) => {
                    code = code * 16 + digit;
                    self.bump();
                }
                None => return Err(syntax_error("Invalid hexadecimal escape sequence", Some(start_pos))),
            }
        }
        Ok(code)
    }

    /// Reads the part of a `\u` escape after the `u`, combining surrogate
    /// pairs written as two consecutive escapes.
    fn scan_unicode_escape_body(&mut self, start_pos: SourcePosition) -> Result<char, JsError> {
        let code = if self.match_char('{') {
            let mut code = 0u32;
            let mut digits = 0;
            while let Some(digit) = self.peek().to_digit(16) {
                code = code.saturating_mul(16).saturating_add(digit);
                digits += 1;
                self.bump();
            }
            if digits == 0 || code > 0x10FFFF || !self.match_char('}') {
                return Err(syntax_error("Invalid Unicode escape sequence", Some(start_pos)));
            }
            code
        } else {
            self.scan_hex_digits(4, start_pos)?
        };

        if (0xD800..0xDC00).contains(&code)
            && self.peek() == '\\'
            && self.peek_next() == Some('u')
        {
            let saved = (self.position, self.offset, self.column);
            self.bump();
            self.bump();
            if let Ok(low) = self.scan_hex_digits(4, start_pos) {
                if (0xDC00..0xE000).contains(&low) {
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    return Ok(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                }
            }
            self.position = saved.0;
            self.offset = saved.1;
            self.column = saved.2;
        }

        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn scan_regexp(&mut self, start_pos: SourcePosition) -> Result<Token, JsError> {
        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            if self.is_at_end() || is_line_terminator(self.peek()) {
                return Err(syntax_error("Unterminated regular expression", Some(start_pos)));
            }
            let ch = self.bump();
            match ch {
                '\\' => {
                    pattern.push(ch);
                    if self.is_at_end() || is_line_terminator(self.peek()) {
                        return Err(syntax_error("Unterminated regular expression", Some(start_pos)));
                    }
                    pattern.push(self.bump());
                }
                '[' => {
                    in_class = true;
                    pattern.push(ch);
                }
                ']' if in_class => {
                    in_class = false;
                    pattern.push(ch);
                }
                '/' if !in_class => break,
                _ => pattern.push(ch),
            }
        }

        let mut flags = String::new();
        while !self.is_at_end() && is_id_continue(self.peek()) {
            flags.push(self.bump());
        }

        Ok(Token::RegExp(pattern, flags))
    }

    fn scan_number(&mut self, first: char, start_pos: SourcePosition) -> Result<Token, JsError> {
        let value = if first == '0' && matches!(self.peek(), 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
            let radix = match self.bump() {
                'x' | 'X' => 16,
                'o' | 'O' => 8,
                _ => 2,
            };
            let mut digits = String::new();
            while self.peek().is_digit(radix) {
                digits.push(self.bump());
            }
            if digits.is_empty() {
                return Err(syntax_error("Invalid number literal", Some(start_pos)));
            }
            parse_radix_digits(&digits, radix)
        } else if first == '0' && self.peek().is_ascii_digit() {
            self.scan_legacy_octal(start_pos)?
        } else {
            let mut text = String::new();
            text.push(first);
            if first != '.' {
                self.scan_decimal_digits(&mut text);
                if self.peek() == '.' {
                    text.push(self.bump());
                }
            }
            self.scan_decimal_digits(&mut text);
            if matches!(self.peek(), 'e' | 'E') {
                text.push(self.bump());
                if matches!(self.peek(), '+' | '-') {
                    text.push(self.bump());
                }
                if !self.peek().is_ascii_digit() {
                    return Err(syntax_error("Invalid number literal", Some(start_pos)));
                }
                self.scan_decimal_digits(&mut text);
            }
            let normalized = if text.ends_with('.') {
                &text[..text.len() - 1]
            } else {
                text.as_str()
            };
            normalized
                .parse::<f64>()
                .map_err(|_| syntax_error("Invalid number literal", Some(start_pos)))?
        };

        if !self.is_at_end() && (is_id_start(self.peek()) || self.peek().is_ascii_digit()) {
            return Err(syntax_error(
                "Identifier starts immediately after numeric literal",
                Some(start_pos),
            ));
        }

        Ok(Token::Number(value))
    }

    /// `0` followed by digits: octal when every digit is below 8, decimal
    /// otherwise. Only accepted in non-strict code when enabled.
    fn scan_legacy_octal(&mut self, start_pos: SourcePosition) -> Result<f64, JsError> {
        if self.strict {
            return Err(syntax_error(
                "Octal literals are not allowed in strict mode",
                Some(start_pos),
            ));
        }
        if !self.allow_legacy_octal {
            return Err(syntax_error("Legacy octal literals are not supported", Some(start_pos)));
        }
        let mut digits = String::new();
        self.scan_decimal_digits(&mut digits);
        self.saw_legacy_octal = true;
        if digits.chars().all(|c| c < '8') {
            Ok(parse_radix_digits(&digits, 8))
        } else {
            digits
                .parse::<f64>()
                .map_err(|_| syntax_error("Invalid number literal", Some(start_pos)))
        }
    }

    fn scan_decimal_digits(&mut self, text: &mut String) {
        while self.peek().is_ascii_digit() {
            text.push(self.bump());
        }
    }

    /// Scans an identifier or keyword. `first` is `None` when the identifier
    /// starts with a `\u` escape (the backslash already consumed).
    fn scan_identifier(&mut self, first: Option<char>, start_pos: SourcePosition) -> Result<Token, JsError> {
        let mut name = String::new();
        let mut escaped = false;

        match first {
            Some(c) => name.push(c),
            None => {
                escaped = true;
                let ch = self.scan_identifier_escape(start_pos)?;
                if !is_id_start(ch) {
                    return Err(syntax_error("Invalid identifier start character", Some(start_pos)));
                }
                name.push(ch);
            }
        }

        loop {
            let ch = self.peek();
            if self.is_at_end() {
                break;
            }
            if ch == '\\' {
                self.bump();
                escaped = true;
                let ch = self.scan_identifier_escape(start_pos)?;
                if !is_id_continue(ch) {
                    return Err(syntax_error("Invalid identifier part character", Some(start_pos)));
                }
                name.push(ch);
            } else if is_id_continue(ch) {
                name.push(self.bump());
            } else {
                break;
            }
        }

        match Keyword::lookup(&name) {
            Some(_) if escaped => Err(syntax_error(
                "Keyword must not contain escaped characters",
                Some(start_pos),
            )),
            Some(keyword) => Ok(Token::Keyword(keyword)),
            None => Ok(Token::Identifier(name)),
        }
    }

    fn scan_identifier_escape(&mut self, start_pos: SourcePosition) -> Result<char, JsError> {
        if !self.match_char('u') {
            return Err(syntax_error("Invalid escape in identifier", Some(start_pos)));
        }
        self.scan_unicode_escape_body(start_pos)
    }

    /// Skips whitespace and comments, returning whether a line terminator was
    /// crossed.
    fn skip_whitespace_and_comments(&mut self) -> Result<bool, JsError> {
        let mut newline = false;
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\t' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}' => {
                    self.bump();
                }
                '\r' => {
                    self.bump();
                    if self.peek() == '\n' {
                        self.bump();
                    }
                    self.new_line();
                    newline = true;
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.bump();
                    self.new_line();
                    newline = true;
                }
                '/' if self.peek_next() == Some('/') => {
                    while !self.is_at_end() && !is_line_terminator(self.peek()) {
                        self.bump();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    let start_pos = self.current_position();
                    self.bump();
                    self.bump();
                    let mut found_end = false;
                    while !self.is_at_end() {
                        let ch = self.bump();
                        if ch == '*' && self.peek() == '/' {
                            self.bump();
                            found_end = true;
                            break;
                        }
                        if ch == '\r' {
                            if self.peek() == '\n' {
                                self.bump();
                            }
                            self.new_line();
                            newline = true;
                        } else if matches!(ch, '\n' | '\u{2028}' | '\u{2029}') {
                            self.new_line();
                            newline = true;
                        }
                    }
                    if !found_end {
                        return Err(syntax_error("Unterminated multi-line comment", Some(start_pos)));
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                _ => break,
            }
        }
        Ok(newline)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.position).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn bump(&mut self) -> char {
        let ch = self.peek();
        self.position += 1;
        self.offset += ch.len_utf8();
        self.column += 1;
        ch
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.bump();
            true
        }
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn current_position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column, self.offset)
    }
}

enum TemplatePart {
    /// Text ending in `${`
    Substitution(String),
    /// Text ending in the closing backtick
    End(String),
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || ch.is_alphabetic()
}

fn is_id_continue(ch: char) -> bool {
    ch == '$' || ch == '_' || ch == '\u{200C}' || ch == '\u{200D}' || ch.is_alphanumeric()
}
