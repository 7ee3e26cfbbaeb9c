use crate::engine::predicate::{CompareMode, Predicate};
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::filter::filter::{BetweenBounds, CompareFilter, CompareOp, Filter};

/// Compiles [`Filter`] trees into the engine's [`Predicate`] form.
///
/// The compiler is stateless and fail-fast: the first structural problem
/// (a logical node with fewer than two operands, an empty field name, an
/// invalid pattern) aborts compilation with a descriptive error and no
/// engine interaction happens at all.
pub struct FilterCompiler;

impl FilterCompiler {
    pub fn compile(filter: &Filter) -> OlivineResult<Predicate> {
        match filter {
            Filter::Compare(compare) => Self::compile_compare(compare),
            Filter::And(operands) => {
                Self::check_arity("and", operands)?;
                let compiled = Self::compile_operands(operands)?;
                Ok(Predicate::and(compiled))
            }
            Filter::Or(operands) => {
                Self::check_arity("or", operands)?;
                let compiled = Self::compile_operands(operands)?;
                Ok(Predicate::or(compiled))
            }
            Filter::ElemMatch { field, filter } => {
                Self::check_field(field)?;
                let inner = Self::compile(filter)?;
                Ok(Predicate::elem_match(field.clone(), inner))
            }
        }
    }

    fn compile_operands(operands: &[Filter]) -> OlivineResult<Vec<Predicate>> {
        operands.iter().map(Self::compile).collect()
    }

    fn check_arity(name: &str, operands: &[Filter]) -> OlivineResult<()> {
        if operands.len() < 2 {
            log::error!(
                "Logical '{}' filter requires at least 2 operands, got {}",
                name,
                operands.len()
            );
            return Err(OlivineError::new(
                &format!(
                    "Logical '{}' filter requires at least 2 operands, got {}",
                    name,
                    operands.len()
                ),
                ErrorKind::FilterError,
            ));
        }
        Ok(())
    }

    fn check_field(field: &str) -> OlivineResult<()> {
        if field.is_empty() {
            log::error!("Filter field name cannot be empty");
            return Err(OlivineError::new(
                "Filter field name cannot be empty",
                ErrorKind::FilterError,
            ));
        }
        Ok(())
    }

    fn compile_compare(compare: &CompareFilter) -> OlivineResult<Predicate> {
        let field = compare.field();
        Self::check_field(field)?;

        match compare.op() {
            CompareOp::Eq(value) => Ok(Predicate::eq(field, value.clone())),
            CompareOp::NotEq(value) => Ok(Predicate::not_eq(field, value.clone())),
            CompareOp::Greater(value) => {
                Ok(Predicate::compare(field, value.clone(), CompareMode::Greater))
            }
            CompareOp::GreaterEq(value) => Ok(Predicate::compare(
                field,
                value.clone(),
                CompareMode::GreaterEqual,
            )),
            CompareOp::Lesser(value) => {
                Ok(Predicate::compare(field, value.clone(), CompareMode::Lesser))
            }
            CompareOp::LesserEq(value) => Ok(Predicate::compare(
                field,
                value.clone(),
                CompareMode::LesserEqual,
            )),
            CompareOp::Text(pattern) => Predicate::text(field, pattern.clone()),
            CompareOp::Regex(pattern) => Predicate::regex(field, pattern.clone()),
            CompareOp::Within(values) => Ok(Predicate::within(field, values.clone())),
            CompareOp::NotWithin(values) => Ok(Predicate::not_within(field, values.clone())),
            CompareOp::Between(bounds) => Ok(Self::compile_between(field, bounds)),
        }
    }

    /// A range compiles into a conjunction of its two bound comparisons,
    /// with each operator chosen by that bound's inclusivity.
    fn compile_between(field: &str, bounds: &BetweenBounds) -> Predicate {
        let lower_mode = if bounds.lower_inclusive {
            CompareMode::GreaterEqual
        } else {
            CompareMode::Greater
        };
        let upper_mode = if bounds.upper_inclusive {
            CompareMode::LesserEqual
        } else {
            CompareMode::Lesser
        };
        Predicate::and(vec![
            Predicate::compare(field, bounds.lower.clone(), lower_mode),
            Predicate::compare(field, bounds.upper.clone(), upper_mode),
        ])
    }
}
