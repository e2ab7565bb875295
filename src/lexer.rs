//! 查询语言的词法分析器

use std::borrow::Cow;

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 返回当前位置之后第 n 个字符
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.position..].chars().nth(n)
    }

    /// 上一个已消费的字符是否为数字
    fn prev_is_digit(&self) -> bool {
        self.input[..self.position]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit())
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token { kind, span: Span::new(start, self.position) }
    }

    /// 读取下一个词法单元；输入结束后始终返回 `Eof`
    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return self.token(TokenKind::Eof, start); // 到达输入末尾
        };

        match c {
            '=' => self.token(TokenKind::Eq, start),
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            ',' => self.token(TokenKind::Comma, start),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::NotEq, start)
                } else {
                    self.token(TokenKind::Illegal("illegal character '!'".to_string()), start)
                }
            }
            '\'' => self.read_string(start),
            // 负号只有紧跟数字时才属于数字字面量
            '-' if self.peek().is_some_and(|d| d.is_ascii_digit()) => self.read_number(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            c => self.token(TokenKind::Illegal(format!("illegal character '{c}'")), start),
        }
    }

    /// 读取数字字面量：可选负号、千位分隔逗号、小数部分和科学计数法指数
    /// 注意：第一个字符（数字或负号）已经被调用者消费
    fn read_number(&mut self, start: usize) -> Token<'a> {
        self.read_digits(true);

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(); // 消费 '.'
            self.read_digits(false);
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let has_exponent = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if has_exponent {
                self.bump(); // 消费 'e'
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.read_digits(false);
            }
        }

        let literal = &self.input[start..self.position];
        self.token(TokenKind::Number(literal), start)
    }

    /// 读取连续数字；逗号只有在两侧都是数字时才属于数字
    fn read_digits(&mut self, allow_grouping: bool) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    self.bump();
                }
                Some(',')
                    if allow_grouping
                        && self.prev_is_digit()
                        && self.peek_next().is_some_and(|c| c.is_ascii_digit()) =>
                {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// 读取单引号包围的字符串字面量，`\'` 表示转义的单引号
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        // 只有遇到转义时才需要分配新的字符串
        let mut unescaped: Option<String> = None;

        loop {
            match self.peek() {
                None => {
                    let partial = &self.input[start..self.position];
                    return self.token(TokenKind::Illegal(format!("unclosed string: {partial}")), start);
                }
                Some('\'') => break,
                Some('\\') if self.peek_next() == Some('\'') => {
                    let buffer = unescaped
                        .get_or_insert_with(|| self.input[content_start..self.position].to_string());
                    buffer.push('\'');
                    self.bump();
                    self.bump();
                }
                Some(c) => {
                    if let Some(buffer) = unescaped.as_mut() {
                        buffer.push(c);
                    }
                    self.bump();
                }
            }
        }

        let content_end = self.position;
        self.bump(); // 消费结束引号

        let content = match unescaped {
            Some(owned) => Cow::Owned(owned),
            None => Cow::Borrowed(&self.input[content_start..content_end]),
        };
        self.token(TokenKind::String(content), start)
    }

    /// 读取标识符或关键字
    /// 标识符可以包含字母、数字、点和下划线，因此 `Department.Name` 是一个词法单元
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '.' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "is" => TokenKind::Is,
        "null" => TokenKind::Null,
        "any" => TokenKind::Any,
        "contains" => TokenKind::Contains,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_comparison() {
        let input = "Name = 'Alice'";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("Name"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::String("Alice".into()));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_next_token_keeps_returning_eof() {
        let mut lexer = Lexer::new("  ");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        assert_eq!(
            kinds("!= = > < >= <= ( ) ,"),
            vec![
                TokenKind::NotEq, TokenKind::Eq, TokenKind::Gt, TokenKind::Lt,
                TokenKind::Gte, TokenKind::Lte, TokenKind::LParen, TokenKind::RParen,
                TokenKind::Comma,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("AND or nOt is NULL Any contains Department.Name first_name"),
            vec![
                TokenKind::And, TokenKind::Or, TokenKind::Not, TokenKind::Is,
                TokenKind::Null, TokenKind::Any, TokenKind::Contains,
                TokenKind::Identifier("Department.Name"),
                TokenKind::Identifier("first_name"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 -7 3.14 1e5 2.5E-3 1,000,000"),
            vec![
                TokenKind::Number("42"),
                TokenKind::Number("-7"),
                TokenKind::Number("3.14"),
                TokenKind::Number("1e5"),
                TokenKind::Number("2.5E-3"),
                TokenKind::Number("1,000,000"),
            ]
        );
    }

    #[test]
    fn test_comma_outside_digits_is_punctuation() {
        assert_eq!(
            kinds("ANY(1, 2,x)"),
            vec![
                TokenKind::Any, TokenKind::LParen,
                TokenKind::Number("1"), TokenKind::Comma,
                TokenKind::Number("2"), TokenKind::Comma,
                TokenKind::Identifier("x"), TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_exponent_requires_digits() {
        // 没有指数数字时 `e` 属于后面的标识符
        assert_eq!(
            kinds("25abc 3e"),
            vec![
                TokenKind::Number("25"),
                TokenKind::Identifier("abc"),
                TokenKind::Number("3"),
                TokenKind::Identifier("e"),
            ]
        );
    }

    #[test]
    fn test_minus_without_digit_is_illegal() {
        assert_eq!(
            kinds("- x"),
            vec![
                TokenKind::Illegal("illegal character '-'".to_string()),
                TokenKind::Identifier("x"),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r"'O\'Brien'"), vec![TokenKind::String("O'Brien".into())]);
        assert_eq!(kinds(r"'a\b'"), vec![TokenKind::String(r"a\b".into())]);
        assert_eq!(kinds("''"), vec![TokenKind::String("".into())]);
    }

    #[test]
    fn test_unclosed_string_is_illegal() {
        let tokens: Vec<_> = Lexer::new("Name = 'Ali").collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].kind, TokenKind::Illegal("unclosed string: 'Ali".to_string()));
        assert_eq!(tokens[2].span, Span::new(7, 11));
    }

    #[test]
    fn test_illegal_characters() {
        assert_eq!(
            kinds("Age ! 5 #"),
            vec![
                TokenKind::Identifier("Age"),
                TokenKind::Illegal("illegal character '!'".to_string()),
                TokenKind::Number("5"),
                TokenKind::Illegal("illegal character '#'".to_string()),
            ]
        );
    }

    #[test]
    fn test_complex_query() {
        let input = "ANY(Tags) = ANY('a','b') AND NOT (Age >= -3 OR Manager IS NOT NULL)";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Any,
                TokenKind::LParen,
                TokenKind::Identifier("Tags"),
                TokenKind::RParen,
                TokenKind::Eq,
                TokenKind::Any,
                TokenKind::LParen,
                TokenKind::String("a".into()),
                TokenKind::Comma,
                TokenKind::String("b".into()),
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::LParen,
                TokenKind::Identifier("Age"),
                TokenKind::Gte,
                TokenKind::Number("-3"),
                TokenKind::Or,
                TokenKind::Identifier("Manager"),
                TokenKind::Is,
                TokenKind::Not,
                TokenKind::Null,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let spans: Vec<_> = Lexer::new("µs >= 10").map(|t| t.span).collect();
        assert_eq!(spans, vec![Span::new(0, 3), Span::new(4, 6), Span::new(7, 9)]);
    }
}
