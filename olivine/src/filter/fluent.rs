use crate::common::Value;
use crate::filter::filter::{BetweenBounds, CompareFilter, CompareOp, Filter};

/// Field name that addresses the array element itself inside an
/// `elem_match` filter, for arrays of scalars.
pub const ELEMENT: &str = "$";

/// Starts a fluent filter on a field.
///
/// ```rust,ignore
/// use olivine::filter::field;
///
/// let filter = field("formula").eq("C8H10N4O2");
/// ```
pub fn field(name: impl Into<String>) -> FieldExpr {
    FieldExpr { name: name.into() }
}

/// A partially built comparison; finish it with one of the operators.
#[derive(Debug, Clone)]
pub struct FieldExpr {
    name: String,
}

impl FieldExpr {
    fn compare(self, op: CompareOp) -> Filter {
        Filter::Compare(CompareFilter::new(self.name, op))
    }

    pub fn eq(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::Eq(value.into()))
    }

    pub fn not_eq(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::NotEq(value.into()))
    }

    pub fn gt(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::Greater(value.into()))
    }

    pub fn gte(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::GreaterEq(value.into()))
    }

    pub fn lt(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::Lesser(value.into()))
    }

    pub fn lte(self, value: impl Into<Value>) -> Filter {
        self.compare(CompareOp::LesserEq(value.into()))
    }

    /// Case-insensitive text search. `*` matches any run of characters,
    /// so `"al*"` matches strings starting with "al"; a pattern without
    /// `*` matches as a substring.
    pub fn text(self, pattern: impl Into<String>) -> Filter {
        self.compare(CompareOp::Text(pattern.into()))
    }

    /// Regular-expression match over string fields.
    pub fn regex(self, pattern: impl Into<String>) -> Filter {
        self.compare(CompareOp::Regex(pattern.into()))
    }

    pub fn within<V: Into<Value>>(self, values: Vec<V>) -> Filter {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(CompareOp::Within(values))
    }

    pub fn not_within<V: Into<Value>>(self, values: Vec<V>) -> Filter {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(CompareOp::NotWithin(values))
    }

    /// Range with both bounds inclusive.
    pub fn between(self, lower: impl Into<Value>, upper: impl Into<Value>) -> Filter {
        self.compare(CompareOp::Between(BetweenBounds::new(lower, upper)))
    }

    /// Range with independently inclusive or exclusive bounds.
    pub fn between_bounds(
        self,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Filter {
        self.compare(CompareOp::Between(BetweenBounds::with_bounds(
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        )))
    }

    /// Matches when any element of this array field satisfies `filter`.
    pub fn elem_match(self, filter: Filter) -> Filter {
        Filter::ElemMatch {
            field: self.name,
            filter: Box::new(filter),
        }
    }
}
