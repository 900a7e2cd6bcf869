//! Kernel evaluation for parsed expression trees.
//!
//! Every node evaluates to an array of exactly the pass's row count;
//! scalars broadcast on entry, so the kernels below only ever see
//! equal-length inputs.

use crate::error::{SiloError, SiloResult};
use crate::expr::{Binding, Scope};
use crate::storage::value::repeat_cell;
use crate::storage::CellValue;
use ahash::AHashMap;
use arrow::array::{Array, ArrayRef, BooleanArray, Int32Array};
use arrow::compute::{self, kernels::cmp, kernels::numeric};
use arrow::datatypes::DataType;
use std::sync::Arc;

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub(crate) enum ExprNode {
    /// Identifier, resolved through the scope at evaluation time.
    Name(String),
    Literal(CellValue),
    Binary {
        left: Box<ExprNode>,
        op: BinOp,
        right: Box<ExprNode>,
    },
    Not(Box<ExprNode>),
    Negate(Box<ExprNode>),
    IsNull(Box<ExprNode>),
    IsNotNull(Box<ExprNode>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

// ════════════════════════════ Tree walker ════════════════════════════

/// One evaluation pass over a tree.
///
/// Names resolve through the scope in binding order. Column bindings
/// materialize on first touch and stay cached for the rest of the pass,
/// so a column referenced many times decompresses once.
pub(crate) struct EvalContext<'a> {
    scope: &'a Scope,
    rows: usize,
    text: &'a str,
    materialized: AHashMap<usize, ArrayRef>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(scope: &'a Scope, rows: usize, text: &'a str) -> Self {
        Self {
            scope,
            rows,
            text,
            materialized: AHashMap::new(),
        }
    }

    pub(crate) fn evaluate(&mut self, node: &ExprNode) -> SiloResult<ArrayRef> {
        match node {
            ExprNode::Name(name) => self.resolve(name),
            ExprNode::Literal(value) => scalar_to_array(value, self.rows),
            ExprNode::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary_op(&left, *op, &right)
            }
            ExprNode::Not(inner) => {
                let array = self.evaluate(inner)?;
                let bools = as_bools(&array).ok_or_else(|| {
                    SiloError::Validation(format!(
                        "NOT takes a boolean operand, got {:?}",
                        array.data_type()
                    ))
                })?;
                Ok(Arc::new(compute::not(bools)?))
            }
            ExprNode::Negate(inner) => {
                let array = self.evaluate(inner)?;
                match array.data_type() {
                    DataType::Int32 | DataType::Int64 | DataType::Float64 => {
                        Ok(numeric::neg(&array)?)
                    }
                    dt => Err(SiloError::NotImplemented(format!("negation for type {dt:?}"))),
                }
            }
            ExprNode::IsNull(inner) => {
                let array = self.evaluate(inner)?;
                Ok(Arc::new(compute::is_null(&array)?))
            }
            ExprNode::IsNotNull(inner) => {
                let array = self.evaluate(inner)?;
                Ok(Arc::new(compute::is_not_null(&array)?))
            }
        }
    }

    fn resolve(&mut self, name: &str) -> SiloResult<ArrayRef> {
        let Some((slot, binding)) = self.scope.lookup(name) else {
            return Err(SiloError::Expr {
                message: format!("unknown identifier '{name}'"),
                expression: self.text.to_string(),
            });
        };
        match binding {
            Binding::Scalar(value) => scalar_to_array(value, self.rows),
            Binding::Array(array) => {
                self.check_rows(name, array.len())?;
                Ok(Arc::clone(array))
            }
            Binding::Column(column) => {
                if let Some(cached) = self.materialized.get(&slot) {
                    return Ok(Arc::clone(cached));
                }
                let array = column.read().to_array()?;
                self.check_rows(name, array.len())?;
                self.materialized.insert(slot, Arc::clone(&array));
                Ok(array)
            }
        }
    }

    fn check_rows(&self, name: &str, len: usize) -> SiloResult<()> {
        if len != self.rows {
            return Err(SiloError::Expr {
                message: format!("'{name}' binds {len} rows, expected {}", self.rows),
                expression: self.text.to_string(),
            });
        }
        Ok(())
    }
}

// ════════════════════════════ Kernels ════════════════════════════

/// Broadcast one scalar to a constant array of `rows` rows.
///
/// NULL broadcasts as an all-null Int32 array; comparisons against it
/// come back null everywhere.
pub(crate) fn scalar_to_array(value: &CellValue, rows: usize) -> SiloResult<ArrayRef> {
    match value {
        CellValue::Null => Ok(Arc::new(Int32Array::from(vec![None::<i32>; rows]))),
        CellValue::FixedList(_) => Err(SiloError::NotImplemented(
            "list values in expressions".to_string(),
        )),
        cell => repeat_cell(&cell.data_type(), cell, rows),
    }
}

fn binary_op(left: &ArrayRef, op: BinOp, right: &ArrayRef) -> SiloResult<ArrayRef> {
    match op {
        BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            comparison_op(left, right, op)
        }
        BinOp::And | BinOp::Or => logical_op(left, right, op),
        BinOp::Plus | BinOp::Minus | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic_op(left, right, op)
        }
    }
}

/// Promote a numeric pair to a common type: Int32 meets Int64 at Int64,
/// any integer meets Float64 at Float64. Everything else passes through
/// untouched and either matches already or fails in the kernel.
fn coerce_numeric(left: &ArrayRef, right: &ArrayRef) -> SiloResult<(ArrayRef, ArrayRef)> {
    if left.data_type() == right.data_type() {
        return Ok((Arc::clone(left), Arc::clone(right)));
    }
    match (left.data_type(), right.data_type()) {
        (DataType::Int32, DataType::Int64) => {
            Ok((compute::cast(left, &DataType::Int64)?, Arc::clone(right)))
        }
        (DataType::Int64, DataType::Int32) => {
            Ok((Arc::clone(left), compute::cast(right, &DataType::Int64)?))
        }
        (DataType::Int32 | DataType::Int64, DataType::Float64) => {
            Ok((compute::cast(left, &DataType::Float64)?, Arc::clone(right)))
        }
        (DataType::Float64, DataType::Int32 | DataType::Int64) => {
            Ok((Arc::clone(left), compute::cast(right, &DataType::Float64)?))
        }
        _ => Ok((Arc::clone(left), Arc::clone(right))),
    }
}

fn comparison_op(left: &ArrayRef, right: &ArrayRef, op: BinOp) -> SiloResult<ArrayRef> {
    let (left, right) = coerce_numeric(left, right)?;
    match left.data_type() {
        DataType::Boolean
        | DataType::Int32
        | DataType::Int64
        | DataType::Float64
        | DataType::Utf8 => {}
        dt => {
            return Err(SiloError::NotImplemented(format!(
                "comparison for type {dt:?}"
            )))
        }
    }
    let result = match op {
        BinOp::Eq => cmp::eq(&left, &right)?,
        BinOp::NotEq => cmp::neq(&left, &right)?,
        BinOp::Lt => cmp::lt(&left, &right)?,
        BinOp::LtEq => cmp::lt_eq(&left, &right)?,
        BinOp::Gt => cmp::gt(&left, &right)?,
        BinOp::GtEq => cmp::gt_eq(&left, &right)?,
        _ => unreachable!("non-comparison op routed to comparison_op"),
    };
    Ok(Arc::new(result))
}

fn arithmetic_op(left: &ArrayRef, right: &ArrayRef, op: BinOp) -> SiloResult<ArrayRef> {
    let (left, right) = coerce_numeric(left, right)?;
    match left.data_type() {
        DataType::Int32 | DataType::Int64 | DataType::Float64 => {}
        dt => {
            return Err(SiloError::NotImplemented(format!(
                "arithmetic for type {dt:?}"
            )))
        }
    }
    match op {
        BinOp::Plus => Ok(numeric::add(&left, &right)?),
        BinOp::Minus => Ok(numeric::sub(&left, &right)?),
        BinOp::Multiply => Ok(numeric::mul(&left, &right)?),
        BinOp::Divide => Ok(numeric::div(&left, &right)?),
        BinOp::Modulo => Ok(numeric::rem(&left, &right)?),
        _ => unreachable!("non-arithmetic op routed to arithmetic_op"),
    }
}

fn logical_op(left: &ArrayRef, right: &ArrayRef, op: BinOp) -> SiloResult<ArrayRef> {
    let (Some(l), Some(r)) = (as_bools(left), as_bools(right)) else {
        return Err(SiloError::Validation(format!(
            "logical operators take boolean operands, got {:?} and {:?}",
            left.data_type(),
            right.data_type()
        )));
    };
    let result = match op {
        BinOp::And => compute::and(l, r)?,
        BinOp::Or => compute::or(l, r)?,
        _ => unreachable!("non-logical op routed to logical_op"),
    };
    Ok(Arc::new(result))
}

fn as_bools(array: &ArrayRef) -> Option<&BooleanArray> {
    array.as_any().downcast_ref::<BooleanArray>()
}
