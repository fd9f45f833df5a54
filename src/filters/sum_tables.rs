//! Element-wise sum of two tables with the same columns.

use crate::array::{DataArray, ScalarType};
use crate::data::{DataKind, Table};
use crate::object::Object;
use crate::pipeline::{Algorithm, ExecutionContext, Information};
use crate::utils::impl_observable;
use crate::{Error, Result};

fn integer_rank(ty: ScalarType) -> ScalarType {
    // everything narrower than `int` is promoted to `int` first
    if ty.size() < 4 {
        ScalarType::Int
    } else {
        ty
    }
}

fn unsigned_of_width(size: usize) -> ScalarType {
    if size <= 4 {
        ScalarType::UnsignedInt
    } else {
        ScalarType::UnsignedLongLong
    }
}

/// Result type of adding values of types `a` and `b`, following the usual
/// arithmetic conversions: floats win, small integers become `Int`, mixed signedness
/// gives the unsigned type of the wider operand.
pub fn promoted_type(a: ScalarType, b: ScalarType) -> ScalarType {
    if a.is_float() || b.is_float() {
        return if a == ScalarType::Double || b == ScalarType::Double {
            ScalarType::Double
        } else {
            ScalarType::Float
        };
    }
    let (a, b) = (integer_rank(a), integer_rank(b));
    if a.is_signed() == b.is_signed() {
        return if b.size() > a.size() { b } else { a };
    }
    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if unsigned.size() >= signed.size() {
        unsigned
    } else {
        unsigned_of_width(signed.size())
    }
}

fn sum_columns(a: &DataArray, b: &DataArray, name: &str) -> Result<DataArray> {
    if a.number_of_components() != b.number_of_components() || a.number_of_tuples() != b.number_of_tuples() {
        return Err(Error::invalid_argument(format!(
            "column `{name}` has shape {}x{} and {}x{}",
            a.number_of_tuples(),
            a.number_of_components(),
            b.number_of_tuples(),
            b.number_of_components()
        )));
    }
    let ty = promoted_type(a.scalar_type(), b.scalar_type());
    let mut out = DataArray::with_name(ty, a.number_of_components(), name);
    out.set_number_of_tuples(a.number_of_tuples());
    for i in 0..a.number_of_values() {
        match (ty.is_integer(), a.integer_value(i), b.integer_value(i)) {
            (true, Some(x), Some(y)) => out.set_integer_value_wrapping(i, x + y)?,
            _ => out.set_value(i, a.value(i) + b.value(i))?,
        }
    }
    Ok(out)
}

/// Sums the tables on input ports 0 and 1 column by column.
#[derive(Debug, Default)]
pub struct SumTables {
    object: Object,
}

impl_observable!(SumTables);

impl SumTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sum(&self, first: &Table, second: &Table) -> Result<Table> {
        if first.number_of_columns() != second.number_of_columns() {
            return Err(Error::invalid_argument(format!(
                "tables have {} and {} columns",
                first.number_of_columns(),
                second.number_of_columns()
            )));
        }
        let mut out = Table::new();
        for name in first.column_names() {
            let (Some(a), Some(b)) = (first.column(name), second.column(name)) else {
                return Err(Error::invalid_argument(format!("second table has no column `{name}`")));
            };
            out.add_column(sum_columns(a, b, name)?)?;
        }
        Ok(out)
    }
}

impl Algorithm for SumTables {
    fn name(&self) -> &'static str {
        "SumTables"
    }

    fn number_of_input_ports(&self) -> usize {
        2
    }

    fn input_kind(&self, _port: usize) -> DataKind {
        DataKind::Table
    }

    fn request_information(&mut self, _inputs: &[Vec<Information>], outputs: &mut [Information]) -> Result<()> {
        outputs[0] = Information::of_kind(DataKind::Table);
        Ok(())
    }

    fn request_data(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let table = |port| {
            ctx.input(port)?
                .as_table()
                .ok_or_else(|| Error::pipeline(format!("expected a table on port {port}")))
        };
        let out = self.sum(table(0)?, table(1)?)?;
        ctx.set_output(0, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ScalarType::*;

    #[test]
    fn promotion_rules() {
        assert_eq!(promoted_type(Char, UnsignedChar), Int);
        assert_eq!(promoted_type(Short, Int), Int);
        assert_eq!(promoted_type(Int, Long), Long);
        assert_eq!(promoted_type(Int, UnsignedInt), UnsignedInt);
        assert_eq!(promoted_type(UnsignedInt, LongLong), UnsignedLongLong);
        assert_eq!(promoted_type(UnsignedShort, Int), Int);
        assert_eq!(promoted_type(UnsignedLongLong, Char), UnsignedLongLong);
        assert_eq!(promoted_type(Float, LongLong), Float);
        assert_eq!(promoted_type(Float, Double), Double);
        assert_eq!(promoted_type(Int, Double), Double);
    }

    fn table(columns: Vec<DataArray>) -> Table {
        let mut table = Table::new();
        for column in columns {
            table.add_column(column).unwrap();
        }
        table
    }

    #[test]
    fn sums_with_promotion_and_wrap() {
        let a = table(vec![
            DataArray::scalars("i", vec![-1i32, 5]),
            DataArray::scalars("f", vec![0.5f64, 1.5]),
        ]);
        let b = table(vec![
            DataArray::scalars("f", vec![1i32, 2]),
            DataArray::scalars("i", vec![0u32, 1]),
        ]);
        let out = SumTables::new().sum(&a, &b).unwrap();
        let i = out.column("i").unwrap();
        assert_eq!(i.scalar_type(), UnsignedInt);
        assert_eq!(i.integer_value(0), Some(u32::MAX as i128));
        assert_eq!(i.integer_value(1), Some(6));
        let f = out.column("f").unwrap();
        assert_eq!(f.scalar_type(), Double);
        assert_eq!(f.values_as_f64(), vec![1.5, 3.5]);
    }

    #[test]
    fn mismatched_tables_fail() {
        let a = table(vec![DataArray::scalars("x", vec![1.0f64])]);
        let b = table(vec![DataArray::scalars("y", vec![1.0f64])]);
        assert!(SumTables::new().sum(&a, &b).is_err());
        let c = table(vec![DataArray::scalars("x", vec![1.0f64, 2.0])]);
        assert!(SumTables::new().sum(&a, &c).is_err());
    }
}
