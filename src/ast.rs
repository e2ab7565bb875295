//! 查询表达式树
//!
//! 表达式树在编译时构建一次，求值期间只读，可以在记录之间和线程之间共享。
//! `Display` 输出完整加括号的规范查询文本，重新解析后得到相同的树。

use std::cmp::Ordering;
use std::fmt;

/// 表达式树的节点
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 基础比较运算, 例如：`Age > 25`
    Comparison { field: FieldPath, op: CompOp, value: Literal },
    /// `ANY(field) op ANY(v1, v2, ...)`，单个字面量是 `ANY(v)` 的简写
    Any { field: FieldPath, op: CompOp, values: Vec<Literal> },
    /// 逻辑非运算 (NOT)
    Not(Box<Expr>),
    /// `field IS [NOT] NULL`
    IsNull { field: FieldPath, negated: bool },
    /// 逻辑与运算 (AND)，至少两个子节点
    And(Vec<Expr>),
    /// 逻辑或运算 (OR)，至少两个子节点
    Or(Vec<Expr>),
    /// 空括号 `()`，永远不匹配
    Empty,
}

impl Expr {
    /// 由子节点构造合取；只有一个子节点时直接返回该节点
    pub(crate) fn all(mut children: Vec<Expr>) -> Expr {
        match children.len() {
            0 => Expr::Empty,
            1 => children.remove(0),
            _ => Expr::And(children),
        }
    }

    /// 由子节点构造析取；只有一个子节点时直接返回该节点
    pub(crate) fn any_of(mut children: Vec<Expr>) -> Expr {
        match children.len() {
            0 => Expr::Empty,
            1 => children.remove(0),
            _ => Expr::Or(children),
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,       // =
    NotEq,    // !=
    Gt,       // >
    Lt,       // <
    Gte,      // >=
    Lte,      // <=
    Contains, // CONTAINS
}

impl CompOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
            CompOp::Contains => "CONTAINS",
        }
    }

    /// 根据两个值的大小关系判断运算结果；`CONTAINS` 不是顺序运算，总是 false
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            CompOp::Eq => ordering == Ordering::Equal,
            CompOp::NotEq => ordering != Ordering::Equal,
            CompOp::Gt => ordering == Ordering::Greater,
            CompOp::Lt => ordering == Ordering::Less,
            CompOp::Gte => ordering != Ordering::Less,
            CompOp::Lte => ordering != Ordering::Greater,
            CompOp::Contains => false,
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 字面量值，保留原始文本，按比较目标的类型在求值时解释
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// 单引号字符串，已去除引号并处理转义
    String(String),
    /// 数字字面量的原始文本，例如 `-1,000.5`
    Number(String),
    /// 不带引号的单词，例如 `Active = true` 中的 `true`
    Word(String),
}

impl Literal {
    pub fn text(&self) -> &str {
        match self {
            Literal::String(s) | Literal::Number(s) | Literal::Word(s) => s,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::Number(s) | Literal::Word(s) => f.write_str(s),
        }
    }
}

/// 点分隔的字段路径, 例如：`Department.Name`
///
/// 在解析时只是字符串序列，不做任何解析或校验记录结构。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// 按 `.` 拆分路径；任何空段（`Map.`、`.Name`、`A..B`）都是错误
    pub fn parse(text: &str) -> Result<Self, String> {
        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(format!("invalid field path '{text}': empty path segment"));
        }
        Ok(FieldPath(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// 忽略大小写比较两个路径是否指向同一个字段
    pub fn same_field(&self, other: &FieldPath) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| crate::value::fold_eq(a, b))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Expr], keyword: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {keyword} ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison { field, op, value } => write!(f, "{field} {op} {value}"),
            Expr::Any { field, op, values } => {
                write!(f, "ANY({field}) {op} ANY(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::IsNull { field, negated: false } => write!(f, "{field} IS NULL"),
            Expr::IsNull { field, negated: true } => write!(f, "{field} IS NOT NULL"),
            Expr::And(children) => write_joined(f, children, "AND"),
            Expr::Or(children) => write_joined(f, children, "OR"),
            Expr::Empty => f.write_str("()"),
        }
    }
}
