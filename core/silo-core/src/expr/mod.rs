//! String expression evaluation over table columns.
//!
//! Predicates and computed columns arrive as text (`"a > 2 and b < 10"`,
//! `"price * qty"`). [`SqlEvaluator`] parses the text with `sqlparser`,
//! lowers the AST to a small tree and evaluates it with arrow compute
//! kernels. Identifier resolution is explicit: names resolve through a
//! [`Scope`] and nothing else, so what an expression can see is always
//! spelled out at the call site.

mod eval;

use crate::error::{SiloError, SiloResult};
use crate::storage::{CellValue, SharedColumn};
use crate::table::Table;
use arrow::array::{Array, ArrayRef, BooleanArray};
use self::eval::{BinOp, EvalContext, ExprNode};
use sqlparser::ast::{self, Expr as SqlExpr, UnaryOperator, Value};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::fmt;
use tracing::debug;

// ════════════════════════════ Scope ════════════════════════════

/// One name → value binding inside a [`Scope`].
#[derive(Clone)]
pub enum Binding {
    /// A constant, broadcast to every row.
    Scalar(CellValue),
    /// A materialized array; its length must match the evaluation row count.
    Array(ArrayRef),
    /// A column handle, decompressed lazily if the name is actually used.
    Column(SharedColumn),
}

/// Ordered symbol table for expression evaluation.
///
/// Identifiers resolve against exactly these bindings, earliest first.
/// [`Table::eval`] places caller bindings ahead of the table's columns,
/// so a caller binding shadows a same-named column.
#[derive(Clone, Default)]
pub struct Scope {
    bindings: Vec<(String, Binding)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a broadcast scalar.
    pub fn with_value(mut self, name: impl Into<String>, value: CellValue) -> Self {
        self.bindings.push((name.into(), Binding::Scalar(value)));
        self
    }

    /// Bind a materialized array.
    pub fn with_array(mut self, name: impl Into<String>, array: ArrayRef) -> Self {
        self.bindings.push((name.into(), Binding::Array(array)));
        self
    }

    /// Bind a column handle.
    pub fn with_column(mut self, name: impl Into<String>, column: SharedColumn) -> Self {
        self.bindings.push((name.into(), Binding::Column(column)));
        self
    }

    pub(crate) fn push_column(&mut self, name: impl Into<String>, column: SharedColumn) {
        self.bindings.push((name.into(), Binding::Column(column)));
    }

    /// First binding with this name, plus its slot for per-pass caching.
    pub(crate) fn lookup(&self, name: &str) -> Option<(usize, &Binding)> {
        self.bindings
            .iter()
            .position(|(n, _)| n == name)
            .map(|slot| (slot, &self.bindings[slot].1))
    }

    /// Bound names in resolution order; shadowed names repeat.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

// ════════════════════════════ Evaluator ════════════════════════════

/// The seam between tables and the expression engine.
///
/// `rows` is the length every produced array must carry; scalar results
/// broadcast to it. Failures of any kind surface as [`SiloError::Expr`]
/// with the full expression text attached.
pub trait Evaluator {
    fn evaluate(&self, text: &str, scope: &Scope, rows: usize) -> SiloResult<ArrayRef>;
}

/// Default evaluator: SQL expression syntax via `sqlparser`.
///
/// Supported: identifiers, integer/float/string/boolean/NULL literals,
/// comparisons, `+ - * / %`, `AND`/`OR` (also spelled `&`/`|`), `NOT`,
/// unary minus, `IS [NOT] NULL` and parenthesized nesting.
pub struct SqlEvaluator {
    dialect: GenericDialect,
}

impl SqlEvaluator {
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse `text` as one standalone expression, consuming all input.
    fn parse(&self, text: &str) -> SiloResult<ExprNode> {
        let mut parser = Parser::new(&self.dialect)
            .try_with_sql(text)
            .map_err(|e| expr_error(e.to_string(), text))?;
        let ast = parser
            .parse_expr()
            .map_err(|e| expr_error(e.to_string(), text))?;
        parser
            .expect_token(&Token::EOF)
            .map_err(|e| expr_error(e.to_string(), text))?;
        translate(&ast, text)
    }
}

impl Default for SqlEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for SqlEvaluator {
    fn evaluate(&self, text: &str, scope: &Scope, rows: usize) -> SiloResult<ArrayRef> {
        let tree = self.parse(text)?;
        let mut cx = EvalContext::new(scope, rows, text);
        cx.evaluate(&tree).map_err(|e| match e {
            err @ SiloError::Expr { .. } => err,
            other => expr_error(other.to_string(), text),
        })
    }
}

// ════════════════════════════ AST lowering ════════════════════════════

fn expr_error(message: impl Into<String>, text: &str) -> SiloError {
    SiloError::Expr {
        message: message.into(),
        expression: text.to_string(),
    }
}

fn translate(expr: &SqlExpr, text: &str) -> SiloResult<ExprNode> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(ExprNode::Name(ident.value.clone())),
        // tables are flat; `a.b` keeps only the trailing segment
        SqlExpr::CompoundIdentifier(parts) => match parts.last() {
            Some(ident) => Ok(ExprNode::Name(ident.value.clone())),
            None => Err(expr_error("empty identifier", text)),
        },
        SqlExpr::Value(value) => literal(value, text),
        SqlExpr::BinaryOp { left, op, right } => Ok(ExprNode::Binary {
            left: Box::new(translate(left, text)?),
            op: binop(op, text)?,
            right: Box::new(translate(right, text)?),
        }),
        SqlExpr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(ExprNode::Not(Box::new(translate(expr, text)?))),
        SqlExpr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => Ok(ExprNode::Negate(Box::new(translate(expr, text)?))),
        SqlExpr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => translate(expr, text),
        SqlExpr::IsNull(inner) => Ok(ExprNode::IsNull(Box::new(translate(inner, text)?))),
        SqlExpr::IsNotNull(inner) => Ok(ExprNode::IsNotNull(Box::new(translate(inner, text)?))),
        SqlExpr::Nested(inner) => translate(inner, text),
        other => Err(expr_error(
            format!("unsupported expression element: {other}"),
            text,
        )),
    }
}

fn literal(value: &Value, text: &str) -> SiloResult<ExprNode> {
    match value {
        // integers park in the narrowest of i32/i64; oversize falls to f64
        Value::Number(n, _) => {
            if let Ok(v) = n.parse::<i32>() {
                Ok(ExprNode::Literal(CellValue::Int32(v)))
            } else if let Ok(v) = n.parse::<i64>() {
                Ok(ExprNode::Literal(CellValue::Int64(v)))
            } else if let Ok(v) = n.parse::<f64>() {
                Ok(ExprNode::Literal(CellValue::Float64(v)))
            } else {
                Err(expr_error(format!("unparseable number '{n}'"), text))
            }
        }
        Value::SingleQuotedString(s) => Ok(ExprNode::Literal(CellValue::Utf8(s.clone()))),
        Value::Boolean(b) => Ok(ExprNode::Literal(CellValue::Boolean(*b))),
        Value::Null => Ok(ExprNode::Literal(CellValue::Null)),
        other => Err(expr_error(format!("unsupported literal: {other}"), text)),
    }
}

fn binop(op: &ast::BinaryOperator, text: &str) -> SiloResult<BinOp> {
    use ast::BinaryOperator as Sql;
    Ok(match op {
        Sql::Eq => BinOp::Eq,
        Sql::NotEq => BinOp::NotEq,
        Sql::Lt => BinOp::Lt,
        Sql::LtEq => BinOp::LtEq,
        Sql::Gt => BinOp::Gt,
        Sql::GtEq => BinOp::GtEq,
        Sql::Plus => BinOp::Plus,
        Sql::Minus => BinOp::Minus,
        Sql::Multiply => BinOp::Multiply,
        Sql::Divide => BinOp::Divide,
        Sql::Modulo => BinOp::Modulo,
        Sql::And => BinOp::And,
        Sql::Or => BinOp::Or,
        // `&` and `|` act as AND/OR over boolean operands
        Sql::BitwiseAnd => BinOp::And,
        Sql::BitwiseOr => BinOp::Or,
        other => return Err(expr_error(format!("unsupported operator: {other}"), text)),
    })
}

// ════════════════════════════ Table entry points ════════════════════════════

impl Table {
    /// Evaluate an expression over this table's columns.
    ///
    /// `extras` bindings resolve ahead of columns, so callers can inject
    /// scalars and arrays or shadow a column for one call. The result
    /// carries exactly [`Table::len`] rows.
    pub fn eval(&self, text: &str, extras: &Scope) -> SiloResult<ArrayRef> {
        let mut scope = extras.clone();
        for (name, column) in self.cols.iter() {
            scope.push_column(name, column.clone());
        }
        let result = SqlEvaluator::new().evaluate(text, &scope, self.len())?;
        debug!(text, rows = result.len(), "evaluated expression");
        Ok(result)
    }

    /// Evaluate a predicate to a boolean mask over all rows.
    pub(crate) fn eval_mask(&self, text: &str) -> SiloResult<BooleanArray> {
        let array = self.eval(text, &Scope::new())?;
        match array.as_any().downcast_ref::<BooleanArray>() {
            Some(mask) => Ok(mask.clone()),
            None => Err(SiloError::Expr {
                message: format!("predicate produced {:?}, not booleans", array.data_type()),
                expression: text.to_string(),
            }),
        }
    }
}
