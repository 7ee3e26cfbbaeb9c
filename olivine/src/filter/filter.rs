use crate::common::Value;
use std::fmt::Display;

/// A composable, storage-agnostic description of a query predicate.
///
/// A `Filter` is pure data: building one never touches the store and never
/// fails. Validation happens when the tree is compiled into the engine's
/// predicate form by [`FilterCompiler`](crate::filter::FilterCompiler).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A single comparison against one field.
    Compare(CompareFilter),
    /// Every operand must match. Requires at least two operands.
    And(Vec<Filter>),
    /// At least one operand must match. Requires at least two operands.
    Or(Vec<Filter>),
    /// Matches when any element of an array field satisfies the inner
    /// filter. Inner filters address element fields directly, or the
    /// element itself through [`ELEMENT`](crate::filter::ELEMENT).
    ElemMatch { field: String, filter: Box<Filter> },
}

/// A field paired with a comparison operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareFilter {
    pub(crate) field: String,
    pub(crate) op: CompareOp,
}

impl CompareFilter {
    pub(crate) fn new(field: String, op: CompareOp) -> Self {
        CompareFilter { field, op }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> &CompareOp {
        &self.op
    }
}

/// The comparison operations a [`CompareFilter`] can express.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOp {
    Eq(Value),
    NotEq(Value),
    Greater(Value),
    GreaterEq(Value),
    Lesser(Value),
    LesserEq(Value),
    /// Case-insensitive substring match; `*` acts as a wildcard.
    Text(String),
    /// Full regular-expression match.
    Regex(String),
    /// Matches when the field value is one of the listed values.
    Within(Vec<Value>),
    /// Matches when the field value is none of the listed values.
    NotWithin(Vec<Value>),
    /// Range with independently inclusive or exclusive bounds.
    Between(BetweenBounds),
}

/// Bounds for a range comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenBounds {
    pub lower: Value,
    pub upper: Value,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl BetweenBounds {
    /// Both bounds inclusive.
    pub fn new(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        BetweenBounds {
            lower: lower.into(),
            upper: upper.into(),
            lower_inclusive: true,
            upper_inclusive: true,
        }
    }

    pub fn with_bounds(
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Self {
        BetweenBounds {
            lower: lower.into(),
            upper: upper.into(),
            lower_inclusive,
            upper_inclusive,
        }
    }
}

/// Conjunction of filters. Arity is checked at compile time, not here.
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::And(filters)
}

/// Disjunction of filters. Arity is checked at compile time, not here.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::Or(filters)
}

fn join_values(values: &[Value]) -> String {
    let mut joined = String::new();
    for value in values {
        joined.push_str(&format!("{}, ", value));
    }
    joined.trim_end_matches(", ").to_string()
}

fn join_filters(filters: &[Filter], separator: &str) -> String {
    let mut joined = String::with_capacity(filters.len() * 16);
    for (i, filter) in filters.iter().enumerate() {
        joined.push_str(&format!("{}", filter));
        if i < filters.len() - 1 {
            joined.push_str(separator);
        }
    }
    joined
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Compare(compare) => write!(f, "{}", compare),
            Filter::And(filters) => write!(f, "({})", join_filters(filters, " && ")),
            Filter::Or(filters) => write!(f, "({})", join_filters(filters, " || ")),
            Filter::ElemMatch { filter, .. } => write!(f, "(elemMatch {})", filter),
        }
    }
}

impl Display for CompareFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = &self.field;
        match &self.op {
            CompareOp::Eq(value) => write!(f, "({} == {})", field, value),
            CompareOp::NotEq(value) => write!(f, "({} != {})", field, value),
            CompareOp::Greater(value) => write!(f, "({} > {})", field, value),
            CompareOp::GreaterEq(value) => write!(f, "({} >= {})", field, value),
            CompareOp::Lesser(value) => write!(f, "({} < {})", field, value),
            CompareOp::LesserEq(value) => write!(f, "({} <= {})", field, value),
            CompareOp::Text(pattern) => write!(f, "({} text {})", field, pattern),
            CompareOp::Regex(pattern) => write!(f, "({} =~ {})", field, pattern),
            CompareOp::Within(values) => write!(f, "({} in [{}])", field, join_values(values)),
            CompareOp::NotWithin(values) => {
                write!(f, "({} not in [{}])", field, join_values(values))
            }
            CompareOp::Between(bounds) => {
                let lower_op = if bounds.lower_inclusive { ">=" } else { ">" };
                let upper_op = if bounds.upper_inclusive { "<=" } else { "<" };
                write!(
                    f,
                    "(({} {} {}) && ({} {} {}))",
                    field, lower_op, bounds.lower, field, upper_op, bounds.upper
                )
            }
        }
    }
}
