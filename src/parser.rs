//! 查询语言的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ 报告所有非法 token（非法字符、未闭合字符串）
//!   ├─ 跳过开头多余的 AND / OR
//!   ├─ parse_or_expression()
//!   │    ├─ parse_and_expression()
//!   │    │    ├─ parse_primary_expression()
//!   │    │    │    ├─ "NOT" → NOT primary
//!   │    │    │    ├─ "(" → 分组表达式 (递归调用 parse_or_expression)，"()" 为空表达式
//!   │    │    │    ├─ "ANY" → ANY(field) op (literal | ANY(literal, ...))
//!   │    │    │    └─ 标识符 → IS [NOT] NULL 或 比较运算符 + 字面值
//!   │    │    │
//!   │    │    └─ 出错时记录错误并同步到下一个 AND / OR / ")"
//!   │    │
//!   │    └─ 遇到 OR 时，继续解析右侧 AND 表达式
//!   │
//!   └─ 检查多余的 ")" 和其他多余 token
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **NOT操作** `NOT primary`
//! 3. **比较操作** `Age > 25`, `Name IS NULL`, `ANY(Tags) = 'x'`
//! 4. **AND操作** `expr1 AND expr2`
//! 5. **OR操作** `expr1 OR expr2`
//!
//! ## 解析示例
//!
//! ```text
//! Age > 25 AND Name != 'Bob'
//! (Age = 25) OR (Age = 35)
//! ANY(Tags) = ANY('a', 'b')
//! Manager.Name IS NOT NULL
//! ```

use crate::ast::{CompOp, Expr, FieldPath, Literal};
use crate::error::{ParseError, ParseErrors};
use crate::token::{Token, TokenKind};

/// `NOT` 与括号允许的最大嵌套层数
const MAX_DEPTH: usize = 128;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 当前 primary 表达式的嵌套层数
    depth: usize,
}

/// 解析过程中收集的所有错误
#[derive(Debug, Default)]
struct Diagnostics {
    errors: Vec<ParseError>,
}

impl Diagnostics {
    fn report(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn finish<T>(self, value: T) -> Result<T, ParseErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ParseErrors(self.errors))
        }
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        let tokens = self.tokens;
        tokens.get(self.position).filter(|t| t.kind != TokenKind::Eof)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind, context: &str) -> Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("{context}, found {}", token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("{context}, but reached end of input"),
                None,
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 解析整个查询；`Ok(None)` 表示查询中没有任何表达式
    pub fn parse(&mut self) -> Result<Option<Expr>, ParseErrors> {
        let mut diagnostics = Diagnostics::default();

        // 词法错误一次性全部报告，不再继续解析
        for token in self.tokens {
            if let TokenKind::Illegal(message) = &token.kind {
                diagnostics.report(ParseError::at_position(message.clone(), token.span));
            }
        }
        if !diagnostics.is_empty() {
            return diagnostics.finish(None);
        }

        // 容忍开头多余的 AND / OR
        while self.match_token(&TokenKind::And) || self.match_token(&TokenKind::Or) {
            self.advance();
        }
        if self.peek().is_none() {
            return Ok(None);
        }

        let expr = self.parse_or_expression(&mut diagnostics);

        while let Some(token) = self.advance() {
            if token.kind == TokenKind::RParen {
                diagnostics.report(ParseError::at_position(
                    "unbalanced parenthesis: unexpected closing ')'",
                    token.span,
                ));
            } else {
                diagnostics.report(ParseError::at_position(
                    format!("unexpected {} after end of expression", token.kind),
                    token.span,
                ));
                break;
            }
        }

        diagnostics.finish(Some(expr))
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self, diagnostics: &mut Diagnostics) -> Expr {
        let mut children = vec![self.parse_and_expression(diagnostics)];

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 OR
            children.push(self.parse_and_expression(diagnostics));
        }

        Expr::any_of(children)
    }

    /// 解析AND表达式 (中等优先级)
    ///
    /// 语法: `primary (AND primary)*`
    /// 某个 primary 出错时记录错误并同步，继续解析后面的部分以收集更多错误
    fn parse_and_expression(&mut self, diagnostics: &mut Diagnostics) -> Expr {
        let mut children = Vec::new();

        loop {
            match self.parse_primary_expression(diagnostics) {
                Ok(expr) => children.push(expr),
                Err(error) => {
                    diagnostics.report(error);
                    self.synchronize();
                }
            }

            if !self.match_token(&TokenKind::And) {
                break;
            }
            self.advance(); // 消费 AND
        }

        Expr::all(children)
    }

    /// 跳过 token 直到同一括号层级的 AND / OR / ")" 或输入结束
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::And | TokenKind::Or if depth == 0 => return,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// 跳过 token 直到当前分组的 ")"，并消费它
    fn skip_to_group_close(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen if depth == 0 => return,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
        }
    }

    /// 解析基础表达式 (最高优先级)
    ///
    /// 支持的表达式类型:
    /// - `NOT primary` - 逻辑非
    /// - `(expression)` - 分组表达式，`()` 为永不匹配的空表达式
    /// - `ANY(field) op ...` - 集合匹配
    /// - `field IS [NOT] NULL` - 空值检查
    /// - `field op literal` - 比较
    ///
    /// 嵌套超过 `MAX_DEPTH` 层时报错，表达式树的求值、显示和释放都是递归的
    fn parse_primary_expression(&mut self, diagnostics: &mut Diagnostics) -> Result<Expr, ParseError> {
        if self.depth >= MAX_DEPTH {
            let span = self.peek().map(|token| token.span);
            return Err(ParseError::new("query nested too deeply", span));
        }
        self.depth += 1;
        let result = self.parse_nested_primary(diagnostics);
        self.depth -= 1;
        result
    }

    fn parse_nested_primary(&mut self, diagnostics: &mut Diagnostics) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new(
                "expected expression, but reached end of input",
                None,
            ));
        };

        match &token.kind {
            TokenKind::Not => {
                self.advance(); // 消费 NOT
                let inner = self.parse_primary_expression(diagnostics)?;
                Ok(Expr::Not(Box::new(inner)))
            }
            TokenKind::LParen => {
                self.advance(); // 消费 (
                if self.match_token(&TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::Empty);
                }
                let expr = self.parse_or_expression(diagnostics);
                if self.peek().is_none() {
                    return Err(ParseError::at_position(
                        "unbalanced parenthesis: missing closing ')'",
                        token.span,
                    ));
                }
                // 分组内多余的 token 只报告一次，并恢复到本组的 ")"
                if let Err(error) = self.expect(TokenKind::RParen, "expected ')' to close group") {
                    diagnostics.report(error);
                    self.skip_to_group_close();
                }
                Ok(expr)
            }
            TokenKind::Any => self.parse_any_clause(),
            TokenKind::Identifier(name) => {
                self.advance();
                let field = FieldPath::parse(name)
                    .map_err(|message| ParseError::at_position(message, token.span))?;

                if self.match_token(&TokenKind::Is) {
                    self.advance(); // 消费 IS
                    let negated = self.match_token(&TokenKind::Not);
                    if negated {
                        self.advance(); // 消费 NOT
                    }
                    self.expect(TokenKind::Null, "expected NULL after IS")?;
                    return Ok(Expr::IsNull { field, negated });
                }

                let op = self.parse_comparison_operator(&field)?;
                let value = self.parse_literal()?;
                Ok(Expr::Comparison { field, op, value })
            }
            _ => Err(ParseError::at_position(
                format!("expected expression, found {}", token.kind),
                token.span,
            )),
        }
    }

    /// 语法: `ANY '(' field ')' op ( literal | ANY '(' literal (',' literal)* ')' )`
    fn parse_any_clause(&mut self) -> Result<Expr, ParseError> {
        self.advance(); // 消费 ANY
        self.expect(TokenKind::LParen, "expected '(' after ANY")?;
        let field_token = self.expect(TokenKind::Identifier(""), "expected field name inside ANY()")?;
        let field = field_path(field_token)?;
        self.expect(TokenKind::RParen, "expected ')' after field name in ANY()")?;

        let op = self.parse_comparison_operator(&field)?;

        let values = if self.match_token(&TokenKind::Any) {
            self.advance(); // 消费 ANY
            let open = self.expect(TokenKind::LParen, "expected '(' after ANY")?;
            if self.match_token(&TokenKind::RParen) {
                return Err(ParseError::at_position(
                    "ANY() value list must not be empty",
                    open.span,
                ));
            }

            // 解析逗号分隔的值列表
            let mut values = Vec::new();
            loop {
                values.push(self.parse_literal()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                self.advance(); // 消费 ,
            }
            self.expect(TokenKind::RParen, "expected ')' after ANY() values")?;
            values
        } else {
            vec![self.parse_literal()?]
        };

        Ok(Expr::Any { field, op, values })
    }

    /// 出错时不消费 token，便于同步
    fn parse_comparison_operator(&mut self, field: &FieldPath) -> Result<CompOp, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new(
                format!("expected comparison operator after '{field}', but reached end of input"),
                None,
            ));
        };
        let op = match &token.kind {
            TokenKind::Eq => CompOp::Eq,
            TokenKind::NotEq => CompOp::NotEq,
            TokenKind::Gt => CompOp::Gt,
            TokenKind::Lt => CompOp::Lt,
            TokenKind::Gte => CompOp::Gte,
            TokenKind::Lte => CompOp::Lte,
            TokenKind::Contains => CompOp::Contains,
            other => {
                return Err(ParseError::at_position(
                    format!("expected comparison operator after '{field}', found {other}"),
                    token.span,
                ))
            }
        };
        self.advance();
        Ok(op)
    }

    /// 出错时不消费 token，便于同步
    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new(
                "expected literal value, but reached end of input",
                None,
            ));
        };
        let literal = match &token.kind {
            TokenKind::String(s) => Literal::String(s.to_string()),
            TokenKind::Number(n) => {
                // 数字后面紧跟标识符，例如 `25abc`
                if let Some(next) = self.tokens.get(self.position + 1) {
                    if let TokenKind::Identifier(suffix) = next.kind {
                        if next.span.start == token.span.end {
                            return Err(ParseError::at_position(
                                format!("invalid numeric value: {n}{suffix}"),
                                token.span,
                            ));
                        }
                    }
                }
                Literal::Number(n.to_string())
            }
            // 不带引号的单词
            TokenKind::Identifier(s) => Literal::Word(s.to_string()),
            other => {
                return Err(ParseError::at_position(
                    format!("expected literal value, found {other}"),
                    token.span,
                ))
            }
        };
        self.advance();
        Ok(literal)
    }
}

fn field_path(token: &Token<'_>) -> Result<FieldPath, ParseError> {
    match &token.kind {
        TokenKind::Identifier(name) => FieldPath::parse(name)
            .map_err(|message| ParseError::at_position(message, token.span)),
        other => Err(ParseError::at_position(
            format!("expected field name, found {other}"),
            token.span,
        )),
    }
}
