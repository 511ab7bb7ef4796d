//! Query expression trees.
//!
//! An [`Expr`] is a node of a parsed query: a [`ExprKind`] plus an ordered
//! list of named arguments. Each argument holds a child expression, a list of
//! child expressions, or a primitive [`Value`]. Every kind declares which
//! argument names it accepts via [`ExprKind::arg_types`].

use core::fmt;
use core::hash::{Hash, Hasher};

use facet::Facet;
use smallvec::SmallVec;

/// Side of a join. Each side is a distinct node kind for diffing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum JoinSide {
    /// `INNER JOIN` (or a bare `JOIN`)
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL JOIN`
    Full,
    /// `CROSS JOIN`
    Cross,
}

/// Syntactic category of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum ExprKind {
    // Statements and clauses
    Select,
    From,
    Where,
    Group,
    Having,
    Order,
    Ordered,
    Limit,
    Join(JoinSide),
    With,
    Cte,
    Subquery,

    // References
    Table,
    Column,
    Identifier,
    Star,
    Alias,

    // Literals
    Literal,
    Boolean,
    Null,
    DataType,

    // Operators
    Paren,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    And,
    Or,
    Not,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Is,
    In,
    Between,
    Case,
    If,
    Cast,

    // Functions
    Anonymous,
    Lower,
    Upper,
    Coalesce,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    RowNumber,
    Rank,
    Window,
}

/// Whether an argument slot takes one occupant or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A single child expression or primitive value
    Single,
    /// An ordered list of child expressions
    List,
}

/// One entry of a kind's argument schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgType {
    /// Argument name
    pub name: &'static str,
    /// Accepted shape
    pub slot: Slot,
    /// Whether the argument must be present
    pub required: bool,
}

const fn req(name: &'static str) -> ArgType {
    ArgType {
        name,
        slot: Slot::Single,
        required: true,
    }
}

const fn opt(name: &'static str) -> ArgType {
    ArgType {
        name,
        slot: Slot::Single,
        required: false,
    }
}

const fn list(name: &'static str) -> ArgType {
    ArgType {
        name,
        slot: Slot::List,
        required: false,
    }
}

const fn req_list(name: &'static str) -> ArgType {
    ArgType {
        name,
        slot: Slot::List,
        required: true,
    }
}

const UNARY: &[ArgType] = &[req("this")];
const BINARY: &[ArgType] = &[req("this"), req("expression")];
const AGGREGATE: &[ArgType] = &[req("this"), opt("distinct")];
const NONE: &[ArgType] = &[];

const SELECT: &[ArgType] = &[
    opt("with"),
    opt("distinct"),
    req_list("expressions"),
    opt("from"),
    list("joins"),
    opt("where"),
    opt("group"),
    opt("having"),
    opt("order"),
    opt("limit"),
];
const EXPRESSIONS: &[ArgType] = &[req_list("expressions")];
const ORDERED: &[ArgType] = &[req("this"), opt("desc")];
const LIMIT: &[ArgType] = &[req("expression")];
const JOIN: &[ArgType] = &[req("this"), opt("on"), list("using")];
const WITH: &[ArgType] = &[req_list("expressions"), opt("recursive")];
const ALIASED: &[ArgType] = &[req("this"), req("alias")];
const SUBQUERY: &[ArgType] = &[req("this"), opt("alias")];
const TABLE: &[ArgType] = &[req("this"), opt("db"), opt("alias")];
const COLUMN: &[ArgType] = &[req("this"), opt("table")];
const IDENTIFIER: &[ArgType] = &[req("this"), opt("quoted")];
const LITERAL: &[ArgType] = &[req("this"), req("is_string")];
const IN: &[ArgType] = &[req("this"), req_list("expressions")];
const BETWEEN: &[ArgType] = &[req("this"), req("low"), req("high")];
const CASE: &[ArgType] = &[opt("this"), req_list("ifs"), opt("default")];
const IF: &[ArgType] = &[req("this"), req("true")];
const CAST: &[ArgType] = &[req("this"), req("to")];
const CALL: &[ArgType] = &[req("this"), list("expressions")];
const COUNT: &[ArgType] = &[opt("this"), opt("distinct")];
const WINDOW: &[ArgType] = &[req("this"), list("partition_by"), opt("order")];

impl ExprKind {
    /// Kind name, without the join side.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Select => "Select",
            ExprKind::From => "From",
            ExprKind::Where => "Where",
            ExprKind::Group => "Group",
            ExprKind::Having => "Having",
            ExprKind::Order => "Order",
            ExprKind::Ordered => "Ordered",
            ExprKind::Limit => "Limit",
            ExprKind::Join(_) => "Join",
            ExprKind::With => "With",
            ExprKind::Cte => "Cte",
            ExprKind::Subquery => "Subquery",
            ExprKind::Table => "Table",
            ExprKind::Column => "Column",
            ExprKind::Identifier => "Identifier",
            ExprKind::Star => "Star",
            ExprKind::Alias => "Alias",
            ExprKind::Literal => "Literal",
            ExprKind::Boolean => "Boolean",
            ExprKind::Null => "Null",
            ExprKind::DataType => "DataType",
            ExprKind::Paren => "Paren",
            ExprKind::Add => "Add",
            ExprKind::Sub => "Sub",
            ExprKind::Mul => "Mul",
            ExprKind::Div => "Div",
            ExprKind::Mod => "Mod",
            ExprKind::Neg => "Neg",
            ExprKind::And => "And",
            ExprKind::Or => "Or",
            ExprKind::Not => "Not",
            ExprKind::Eq => "Eq",
            ExprKind::Neq => "Neq",
            ExprKind::Lt => "Lt",
            ExprKind::Lte => "Lte",
            ExprKind::Gt => "Gt",
            ExprKind::Gte => "Gte",
            ExprKind::Like => "Like",
            ExprKind::Is => "Is",
            ExprKind::In => "In",
            ExprKind::Between => "Between",
            ExprKind::Case => "Case",
            ExprKind::If => "If",
            ExprKind::Cast => "Cast",
            ExprKind::Anonymous => "Anonymous",
            ExprKind::Lower => "Lower",
            ExprKind::Upper => "Upper",
            ExprKind::Coalesce => "Coalesce",
            ExprKind::Count => "Count",
            ExprKind::Sum => "Sum",
            ExprKind::Avg => "Avg",
            ExprKind::Min => "Min",
            ExprKind::Max => "Max",
            ExprKind::RowNumber => "RowNumber",
            ExprKind::Rank => "Rank",
            ExprKind::Window => "Window",
        }
    }

    /// Accepted arguments, in canonical order.
    pub fn arg_types(&self) -> &'static [ArgType] {
        match self {
            ExprKind::Select => SELECT,
            ExprKind::From | ExprKind::Where | ExprKind::Having => UNARY,
            ExprKind::Group | ExprKind::Order => EXPRESSIONS,
            ExprKind::Ordered => ORDERED,
            ExprKind::Limit => LIMIT,
            ExprKind::Join(_) => JOIN,
            ExprKind::With => WITH,
            ExprKind::Cte | ExprKind::Alias => ALIASED,
            ExprKind::Subquery => SUBQUERY,
            ExprKind::Table => TABLE,
            ExprKind::Column => COLUMN,
            ExprKind::Identifier => IDENTIFIER,
            ExprKind::Star | ExprKind::Null | ExprKind::RowNumber | ExprKind::Rank => NONE,
            ExprKind::Literal => LITERAL,
            ExprKind::Boolean | ExprKind::DataType => UNARY,
            ExprKind::Paren | ExprKind::Neg | ExprKind::Not => UNARY,
            ExprKind::Lower | ExprKind::Upper => UNARY,
            ExprKind::Add
            | ExprKind::Sub
            | ExprKind::Mul
            | ExprKind::Div
            | ExprKind::Mod
            | ExprKind::And
            | ExprKind::Or
            | ExprKind::Eq
            | ExprKind::Neq
            | ExprKind::Lt
            | ExprKind::Lte
            | ExprKind::Gt
            | ExprKind::Gte
            | ExprKind::Like
            | ExprKind::Is => BINARY,
            ExprKind::In => IN,
            ExprKind::Between => BETWEEN,
            ExprKind::Case => CASE,
            ExprKind::If => IF,
            ExprKind::Cast => CAST,
            ExprKind::Anonymous | ExprKind::Coalesce => CALL,
            ExprKind::Count => COUNT,
            ExprKind::Sum | ExprKind::Avg | ExprKind::Min | ExprKind::Max => AGGREGATE,
            ExprKind::Window => WINDOW,
        }
    }

    /// The schema entry for an argument name.
    pub fn arg_type(&self, name: &str) -> Option<&'static ArgType> {
        self.arg_types().iter().find(|arg| arg.name == name)
    }

    /// Leaf kinds carry only primitive values, never child expressions.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ExprKind::Identifier
                | ExprKind::Literal
                | ExprKind::Boolean
                | ExprKind::Null
                | ExprKind::Star
                | ExprKind::DataType
                | ExprKind::RowNumber
                | ExprKind::Rank
        )
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Join(side) => write!(f, "Join({side:?})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A primitive argument value.
#[derive(Debug, Clone, Facet)]
#[repr(u8)]
pub enum Value {
    /// Text, such as an identifier name or a string literal body
    Text(String),
    /// Numeric literal
    Number(f64),
    /// Flag
    Bool(bool),
    /// Explicit absence
    Null,
}

// Numbers compare by bit pattern so that `Value` can be `Eq + Hash`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Text(text) => text.hash(state),
            Value::Number(number) => number.to_bits().hash(state),
            Value::Bool(flag) => flag.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

/// What an argument holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgValue {
    /// One child expression
    Expr(Box<Expr>),
    /// Child expressions, in order
    List(Vec<Expr>),
    /// A primitive value
    Value(Value),
}

/// A named argument of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arg {
    /// Argument name, one of the kind's [`ExprKind::arg_types`]
    pub name: &'static str,
    /// Occupant
    pub value: ArgValue,
}

/// A node of a query expression tree.
///
/// Equality and hashing are structural: two expressions are equal when
/// their kinds, arguments and children are, wherever they were built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    /// Syntactic category
    pub kind: ExprKind,
    /// Arguments in insertion order
    pub args: SmallVec<[Arg; 4]>,
}

impl Expr {
    /// An expression with no arguments.
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            args: SmallVec::new(),
        }
    }

    /// Append a child expression argument.
    pub fn with_expr(mut self, name: &'static str, child: Expr) -> Self {
        self.args.push(Arg {
            name,
            value: ArgValue::Expr(Box::new(child)),
        });
        self
    }

    /// Append a list argument.
    pub fn with_list(mut self, name: &'static str, children: Vec<Expr>) -> Self {
        self.args.push(Arg {
            name,
            value: ArgValue::List(children),
        });
        self
    }

    /// Append a primitive argument.
    pub fn with_value(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.args.push(Arg {
            name,
            value: ArgValue::Value(value.into()),
        });
        self
    }

    /// An unquoted identifier.
    pub fn identifier(name: &str) -> Self {
        Self::new(ExprKind::Identifier)
            .with_value("this", name)
            .with_value("quoted", false)
    }

    /// A column reference `name`.
    pub fn column(name: &str) -> Self {
        Self::new(ExprKind::Column).with_expr("this", Self::identifier(name))
    }

    /// A column reference `table.name`.
    pub fn qualified_column(table: &str, name: &str) -> Self {
        Self::column(name).with_expr("table", Self::identifier(table))
    }

    /// A table reference.
    pub fn table(name: &str) -> Self {
        Self::new(ExprKind::Table).with_expr("this", Self::identifier(name))
    }

    /// A string literal.
    pub fn string_literal(text: &str) -> Self {
        Self::new(ExprKind::Literal)
            .with_value("this", text)
            .with_value("is_string", true)
    }

    /// A numeric literal.
    pub fn number_literal(number: f64) -> Self {
        Self::new(ExprKind::Literal)
            .with_value("this", number)
            .with_value("is_string", false)
    }

    /// A binary operation such as `left + right` or `left AND right`.
    pub fn binary(kind: ExprKind, left: Expr, right: Expr) -> Self {
        Self::new(kind)
            .with_expr("this", left)
            .with_expr("expression", right)
    }

    /// `this AS name`.
    pub fn alias(this: Expr, name: &str) -> Self {
        Self::new(ExprKind::Alias)
            .with_expr("this", this)
            .with_expr("alias", Self::identifier(name))
    }

    /// `SELECT expressions`, with no other clauses.
    pub fn select(expressions: Vec<Expr>) -> Self {
        Self::new(ExprKind::Select).with_list("expressions", expressions)
    }

    /// The argument named `name`, if present.
    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    /// Child expressions in argument order, lists expanded in place.
    pub fn children(&self) -> impl Iterator<Item = &Expr> + '_ {
        self.args.iter().flat_map(|arg| {
            let children: &[Expr] = match &arg.value {
                ArgValue::Expr(child) => core::slice::from_ref(&**child),
                ArgValue::List(children) => children,
                ArgValue::Value(_) => &[],
            };
            children.iter()
        })
    }

    /// Primitive arguments in argument order.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.args.iter().filter_map(|arg| match &arg.value {
            ArgValue::Value(value) => Some((arg.name, value)),
            _ => None,
        })
    }

    /// This expression and all of its descendants, in pre-order.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Number of nodes in this expression, itself included.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }
}

/// Pre-order iterator returned by [`Expr::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let expr = self.stack.pop()?;
        let first = self.stack.len();
        self.stack.extend(expr.children());
        self.stack[first..].reverse();
        Some(expr)
    }
}

impl fmt::Display for Expr {
    /// Compact s-expression: `(Column this=(Identifier this="a" quoted=false))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.kind)?;
        for arg in &self.args {
            write!(f, " {}=", arg.name)?;
            match &arg.value {
                ArgValue::Expr(child) => write!(f, "{child}")?,
                ArgValue::Value(value) => write!(f, "{value}")?,
                ArgValue::List(children) => {
                    f.write_str("[")?;
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" ")?;
                        }
                        write!(f, "{child}")?;
                    }
                    f.write_str("]")?;
                }
            }
        }
        f.write_str(")")
    }
}
