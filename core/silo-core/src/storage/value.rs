//! Cell values and array construction.
//!
//! `CellValue` is the scalar a single table cell materializes as. Columns
//! store Arrow arrays; this module is the boundary between the two: cell
//! extraction, per-dtype array building, fill values, and the dtype checks
//! every ingest path runs through.

use crate::error::{SiloError, SiloResult};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, FixedSizeListBuilder, Float64Builder, Int32Builder,
    Int64Builder, StringBuilder,
};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::DataType;
use arrow::util::display::FormatOptions;
use std::sync::Arc;

/// A scalar value held by one table cell.
///
/// `FixedList` carries the cells of a column with a fixed trailing shape;
/// all elements share one primitive type.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    FixedList(Vec<CellValue>),
}

impl CellValue {
    /// Get the Arrow DataType for this value.
    ///
    /// An empty `FixedList` has no element to infer from and maps to
    /// `DataType::Null`.
    pub fn data_type(&self) -> DataType {
        match self {
            CellValue::Null => DataType::Null,
            CellValue::Boolean(_) => DataType::Boolean,
            CellValue::Int32(_) => DataType::Int32,
            CellValue::Int64(_) => DataType::Int64,
            CellValue::Float64(_) => DataType::Float64,
            CellValue::Utf8(_) => DataType::Utf8,
            CellValue::FixedList(vs) => match vs.first() {
                Some(v) => DataType::new_fixed_size_list(v.data_type(), vs.len() as i32, true),
                None => DataType::Null,
            },
        }
    }

    /// Extract a value from an Arrow array at the given index.
    pub fn from_array(array: &ArrayRef, idx: usize) -> SiloResult<Self> {
        if array.is_null(idx) {
            return Ok(CellValue::Null);
        }
        match array.data_type() {
            DataType::Boolean => Ok(CellValue::Boolean(array.as_boolean().value(idx))),
            DataType::Int32 => Ok(CellValue::Int32(
                array
                    .as_primitive::<arrow::datatypes::Int32Type>()
                    .value(idx),
            )),
            DataType::Int64 => Ok(CellValue::Int64(
                array
                    .as_primitive::<arrow::datatypes::Int64Type>()
                    .value(idx),
            )),
            DataType::Float64 => Ok(CellValue::Float64(
                array
                    .as_primitive::<arrow::datatypes::Float64Type>()
                    .value(idx),
            )),
            DataType::Utf8 => Ok(CellValue::Utf8(
                array.as_string::<i32>().value(idx).to_string(),
            )),
            DataType::FixedSizeList(_, _) => {
                let inner = array.as_fixed_size_list().value(idx);
                let mut vs = Vec::with_capacity(inner.len());
                for j in 0..inner.len() {
                    vs.push(CellValue::from_array(&inner, j)?);
                }
                Ok(CellValue::FixedList(vs))
            }
            dt => Err(SiloError::TypeMismatch {
                expected: "Boolean|Int32|Int64|Float64|Utf8|FixedSizeList".to_string(),
                actual: format!("{dt:?}"),
            }),
        }
    }

    /// The fill value used when a column grows: `false`, `0`, `0.0`, `""`,
    /// or a zeroed fixed list.
    pub fn fill_for(dtype: &DataType) -> SiloResult<Self> {
        match dtype {
            DataType::Boolean => Ok(CellValue::Boolean(false)),
            DataType::Int32 => Ok(CellValue::Int32(0)),
            DataType::Int64 => Ok(CellValue::Int64(0)),
            DataType::Float64 => Ok(CellValue::Float64(0.0)),
            DataType::Utf8 => Ok(CellValue::Utf8(String::new())),
            DataType::FixedSizeList(field, size) => {
                let elem = CellValue::fill_for(field.data_type())?;
                Ok(CellValue::FixedList(vec![elem; *size as usize]))
            }
            dt => Err(unsupported_dtype(dt)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

fn unsupported_dtype(dt: &DataType) -> SiloError {
    SiloError::TypeMismatch {
        expected: "Boolean|Int32|Int64|Float64|Utf8|FixedSizeList of a primitive".to_string(),
        actual: format!("{dt:?}"),
    }
}

/// Check that a dtype is one the store can hold.
pub fn ensure_supported(dtype: &DataType) -> SiloResult<()> {
    match dtype {
        DataType::Boolean
        | DataType::Int32
        | DataType::Int64
        | DataType::Float64
        | DataType::Utf8 => Ok(()),
        DataType::FixedSizeList(field, size) if *size > 0 => match field.data_type() {
            DataType::Boolean | DataType::Int32 | DataType::Int64 | DataType::Float64 => Ok(()),
            dt => Err(unsupported_dtype(dt)),
        },
        dt => Err(unsupported_dtype(dt)),
    }
}

/// Loose dtype equality: fixed-size lists compare element type and size
/// only, ignoring the inner field's name and nullability flag (builders and
/// readers disagree on those).
pub fn dtype_matches(a: &DataType, b: &DataType) -> bool {
    match (a, b) {
        (DataType::FixedSizeList(fa, na), DataType::FixedSizeList(fb, nb)) => {
            na == nb && fa.data_type() == fb.data_type()
        }
        _ => a == b,
    }
}

/// Columns carry no validity bitmap; any null in an incoming array is a
/// hard error rather than something the fill value papers over.
pub fn ensure_no_nulls(array: &ArrayRef) -> SiloResult<()> {
    if array.null_count() > 0 {
        return Err(SiloError::Validation(format!(
            "array of type {:?} carries {} null(s); columns do not hold nulls",
            array.data_type(),
            array.null_count()
        )));
    }
    Ok(())
}

/// Adapt an incoming array to a column's dtype.
///
/// Exact or loosely-equal dtypes pass through; otherwise a strict cast runs
/// (overflow and parse failures error out instead of becoming nulls).
/// Fixed-size lists never cast.
pub fn adapt_array(array: &ArrayRef, dtype: &DataType) -> SiloResult<ArrayRef> {
    ensure_no_nulls(array)?;
    if dtype_matches(array.data_type(), dtype) {
        return Ok(Arc::clone(array));
    }
    if matches!(array.data_type(), DataType::FixedSizeList(_, _))
        || matches!(dtype, DataType::FixedSizeList(_, _))
    {
        return Err(SiloError::TypeMismatch {
            expected: dtype_to_string(dtype),
            actual: dtype_to_string(array.data_type()),
        });
    }
    let options = CastOptions {
        safe: false,
        format_options: FormatOptions::default(),
    };
    let cast = cast_with_options(array, dtype, &options)?;
    Ok(cast)
}

/// Build a single-column array from cells, dispatching on the column dtype.
pub fn cells_to_array(dtype: &DataType, cells: &[CellValue]) -> SiloResult<ArrayRef> {
    match dtype {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    CellValue::Boolean(v) => builder.append_value(*v),
                    other => return Err(cell_mismatch("Boolean", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int32 => {
            let mut builder = Int32Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    CellValue::Int32(v) => builder.append_value(*v),
                    other => return Err(cell_mismatch("Int32", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    CellValue::Int64(v) => builder.append_value(*v),
                    other => return Err(cell_mismatch("Int64", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    CellValue::Float64(v) => builder.append_value(*v),
                    other => return Err(cell_mismatch("Float64", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(cells.len(), 256);
            for cell in cells {
                match cell {
                    CellValue::Utf8(v) => builder.append_value(v),
                    other => return Err(cell_mismatch("Utf8", other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::FixedSizeList(field, size) => {
            fixed_list_to_array(field.data_type(), *size, cells)
        }
        dt => Err(unsupported_dtype(dt)),
    }
}

fn cell_mismatch(expected: &str, actual: &CellValue) -> SiloError {
    SiloError::TypeMismatch {
        expected: expected.to_string(),
        actual: format!("{actual:?}"),
    }
}

macro_rules! build_fixed_list {
    ($cells:expr, $size:expr, $builder:expr, $variant:path) => {{
        let mut builder = FixedSizeListBuilder::new($builder, $size);
        for cell in $cells {
            let vs = match cell {
                CellValue::FixedList(vs) => vs,
                other => return Err(cell_mismatch("FixedList", other)),
            };
            if vs.len() != $size as usize {
                return Err(SiloError::Validation(format!(
                    "fixed list cell has {} element(s), column expects {}",
                    vs.len(),
                    $size
                )));
            }
            for v in vs {
                match v {
                    $variant(x) => builder.values().append_value(*x),
                    other => return Err(cell_mismatch("fixed list element", other)),
                }
            }
            builder.append(true);
        }
        Ok(Arc::new(builder.finish()) as ArrayRef)
    }};
}

fn fixed_list_to_array(elem: &DataType, size: i32, cells: &[CellValue]) -> SiloResult<ArrayRef> {
    match elem {
        DataType::Boolean => {
            build_fixed_list!(cells, size, BooleanBuilder::new(), CellValue::Boolean)
        }
        DataType::Int32 => build_fixed_list!(cells, size, Int32Builder::new(), CellValue::Int32),
        DataType::Int64 => build_fixed_list!(cells, size, Int64Builder::new(), CellValue::Int64),
        DataType::Float64 => {
            build_fixed_list!(cells, size, Float64Builder::new(), CellValue::Float64)
        }
        dt => Err(unsupported_dtype(dt)),
    }
}

/// Read every cell of an array back out. Used when a sealed chunk must be
/// reopened for editing or partial trim.
pub fn array_to_cells(array: &ArrayRef) -> SiloResult<Vec<CellValue>> {
    let mut cells = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        cells.push(CellValue::from_array(array, i)?);
    }
    Ok(cells)
}

/// An array of `n` copies of one cell.
pub fn repeat_cell(dtype: &DataType, cell: &CellValue, n: usize) -> SiloResult<ArrayRef> {
    cells_to_array(dtype, &vec![cell.clone(); n])
}

/// An empty array of the given dtype.
pub fn empty_array(dtype: &DataType) -> SiloResult<ArrayRef> {
    cells_to_array(dtype, &[])
}

/// Dtype name persisted in column metadata.
pub fn dtype_to_string(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "Boolean".to_string(),
        DataType::Int32 => "Int32".to_string(),
        DataType::Int64 => "Int64".to_string(),
        DataType::Float64 => "Float64".to_string(),
        DataType::Utf8 => "Utf8".to_string(),
        DataType::FixedSizeList(field, size) => {
            format!("FixedSizeList({}, {})", dtype_to_string(field.data_type()), size)
        }
        dt => format!("{dt:?}"),
    }
}

/// Inverse of [`dtype_to_string`].
pub fn dtype_from_string(s: &str) -> SiloResult<DataType> {
    match s {
        "Boolean" => Ok(DataType::Boolean),
        "Int32" => Ok(DataType::Int32),
        "Int64" => Ok(DataType::Int64),
        "Float64" => Ok(DataType::Float64),
        "Utf8" => Ok(DataType::Utf8),
        _ => {
            let inner = s
                .strip_prefix("FixedSizeList(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|rest| rest.rsplit_once(", "));
            match inner {
                Some((elem, size)) => {
                    let elem = dtype_from_string(elem)?;
                    let size: i32 = size.parse().map_err(|_| {
                        SiloError::Serialization(format!("bad fixed list size in dtype '{s}'"))
                    })?;
                    Ok(DataType::new_fixed_size_list(elem, size, true))
                }
                None => Err(SiloError::Serialization(format!("unknown dtype '{s}'"))),
            }
        }
    }
}
