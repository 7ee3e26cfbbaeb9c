use crate::common::Value;
use crate::document::Document;
use crate::errors::{ErrorKind, OlivineError, OlivineResult};
use crate::filter::ELEMENT;
use regex::Regex;
use std::fmt::Display;
use std::sync::Arc;

/// The behavior behind a [`Predicate`]: evaluate one document.
///
/// Implementations must be pure with respect to the store; they only look
/// at the document they are given.
pub trait PredicateProvider: Send + Sync + Display {
    fn apply(&self, entry: &Document) -> OlivineResult<bool>;
}

/// The engine's runnable predicate form.
///
/// Filter trees compile into `Predicate` values, which the engine applies
/// to candidate documents during a scan. The `Display` form is canonical:
/// two predicates that render identically behave identically.
#[derive(Clone)]
pub struct Predicate {
    inner: Arc<dyn PredicateProvider>,
}

/// Comparison operator for range predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

impl CompareMode {
    fn symbol(&self) -> &'static str {
        match self {
            CompareMode::Greater => ">",
            CompareMode::GreaterEqual => ">=",
            CompareMode::Lesser => "<",
            CompareMode::LesserEqual => "<=",
        }
    }
}

impl Predicate {
    pub fn new(provider: impl PredicateProvider + 'static) -> Self {
        Predicate {
            inner: Arc::new(provider),
        }
    }

    /// Evaluates this predicate against a single document.
    pub fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        self.inner.apply(entry)
    }

    /// Matches every document.
    pub fn all() -> Predicate {
        Predicate::new(AllPredicate)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Predicate {
        Predicate::new(EqPredicate {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<Value>) -> Predicate {
        Predicate::new(NotEqPredicate {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn compare(
        field: impl Into<String>,
        value: impl Into<Value>,
        mode: CompareMode,
    ) -> Predicate {
        Predicate::new(ComparePredicate {
            field: field.into(),
            value: value.into(),
            mode,
        })
    }

    /// Case-insensitive text predicate; `*` acts as a wildcard. Fails when
    /// the pattern is a lone `*` or produces an invalid expression.
    pub fn text(field: impl Into<String>, pattern: impl Into<String>) -> OlivineResult<Predicate> {
        let field = field.into();
        let pattern = pattern.into();
        let matcher = TextMatcher::build(&field, &pattern)?;
        Ok(Predicate::new(TextPredicate {
            field,
            pattern,
            matcher,
        }))
    }

    /// Regular-expression predicate. Fails when the pattern does not parse.
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> OlivineResult<Predicate> {
        let field = field.into();
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).map_err(|err| {
            log::error!("Invalid regex '{}' on field '{}': {}", pattern, field, err);
            OlivineError::new(
                &format!("Invalid regex '{}' on field '{}': {}", pattern, field, err),
                ErrorKind::FilterError,
            )
        })?;
        Ok(Predicate::new(RegexPredicate {
            field,
            pattern,
            regex,
        }))
    }

    pub fn within(field: impl Into<String>, values: Vec<Value>) -> Predicate {
        Predicate::new(WithinPredicate {
            field: field.into(),
            values,
        })
    }

    pub fn not_within(field: impl Into<String>, values: Vec<Value>) -> Predicate {
        Predicate::new(NotWithinPredicate {
            field: field.into(),
            values,
        })
    }

    pub fn and(predicates: Vec<Predicate>) -> Predicate {
        Predicate::new(AndPredicate { predicates })
    }

    pub fn or(predicates: Vec<Predicate>) -> Predicate {
        Predicate::new(OrPredicate { predicates })
    }

    pub fn elem_match(field: impl Into<String>, predicate: Predicate) -> Predicate {
        Predicate::new(ElemMatchPredicate {
            field: field.into(),
            predicate,
        })
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.inner)
    }
}

struct AllPredicate;

impl PredicateProvider for AllPredicate {
    #[inline]
    fn apply(&self, _entry: &Document) -> OlivineResult<bool> {
        Ok(true)
    }
}

impl Display for AllPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllPredicate")
    }
}

struct EqPredicate {
    field: String,
    value: Value,
}

impl PredicateProvider for EqPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        Ok(entry.get(&self.field)? == self.value)
    }
}

impl Display for EqPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.field, self.value)
    }
}

struct NotEqPredicate {
    field: String,
    value: Value,
}

impl PredicateProvider for NotEqPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        Ok(entry.get(&self.field)? != self.value)
    }
}

impl Display for NotEqPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.field, self.value)
    }
}

struct ComparePredicate {
    field: String,
    value: Value,
    mode: CompareMode,
}

impl PredicateProvider for ComparePredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        if value.is_null() || !value.is_comparable_with(&self.value) {
            return Ok(false);
        }
        Ok(match self.mode {
            CompareMode::Greater => value > self.value,
            CompareMode::GreaterEqual => value >= self.value,
            CompareMode::Lesser => value < self.value,
            CompareMode::LesserEqual => value <= self.value,
        })
    }
}

impl Display for ComparePredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.field, self.mode.symbol(), self.value)
    }
}

enum TextMatcher {
    Contains(String),
    Wildcard(Regex),
}

impl TextMatcher {
    fn build(field: &str, pattern: &str) -> OlivineResult<TextMatcher> {
        if !pattern.contains('*') {
            return Ok(TextMatcher::Contains(pattern.to_lowercase()));
        }
        if pattern.chars().all(|c| c == '*') {
            log::error!("'*' alone is not a valid text pattern on field '{}'", field);
            return Err(OlivineError::new(
                &format!(
                    "Invalid text pattern '{}' on field '{}'. Use '*text', 'text*', or '*text*'",
                    pattern, field
                ),
                ErrorKind::FilterError,
            ));
        }

        let mut expression = String::from("(?i)^");
        for (i, part) in pattern.split('*').enumerate() {
            if i > 0 {
                expression.push_str(".*");
            }
            expression.push_str(&regex::escape(part));
        }
        expression.push('$');

        let regex = Regex::new(&expression).map_err(|err| {
            log::error!("Text pattern '{}' on field '{}' failed: {}", pattern, field, err);
            OlivineError::new(
                &format!("Text pattern '{}' on field '{}' failed: {}", pattern, field, err),
                ErrorKind::FilterError,
            )
        })?;
        Ok(TextMatcher::Wildcard(regex))
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            TextMatcher::Contains(needle) => value.to_lowercase().contains(needle),
            TextMatcher::Wildcard(regex) => regex.is_match(value),
        }
    }
}

struct TextPredicate {
    field: String,
    pattern: String,
    matcher: TextMatcher,
}

impl PredicateProvider for TextPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        match value.as_str() {
            Some(text) => Ok(self.matcher.matches(text)),
            None => Ok(false),
        }
    }
}

impl Display for TextPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} text {})", self.field, self.pattern)
    }
}

struct RegexPredicate {
    field: String,
    pattern: String,
    regex: Regex,
}

impl PredicateProvider for RegexPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        match value.as_str() {
            Some(text) => Ok(self.regex.is_match(text)),
            None => Ok(false),
        }
    }
}

impl Display for RegexPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} =~ {})", self.field, self.pattern)
    }
}

fn join_values(values: &[Value]) -> String {
    let mut joined = String::new();
    for value in values {
        joined.push_str(&format!("{}, ", value));
    }
    joined.trim_end_matches(", ").to_string()
}

struct WithinPredicate {
    field: String,
    values: Vec<Value>,
}

impl PredicateProvider for WithinPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        Ok(self.values.contains(&value))
    }
}

impl Display for WithinPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} in [{}])", self.field, join_values(&self.values))
    }
}

struct NotWithinPredicate {
    field: String,
    values: Vec<Value>,
}

impl PredicateProvider for NotWithinPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        Ok(!self.values.contains(&value))
    }
}

impl Display for NotWithinPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} not in [{}])", self.field, join_values(&self.values))
    }
}

struct AndPredicate {
    predicates: Vec<Predicate>,
}

impl PredicateProvider for AndPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        for predicate in &self.predicates {
            if !predicate.apply(entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Display for AndPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = String::with_capacity(self.predicates.len() * 16);
        for (i, predicate) in self.predicates.iter().enumerate() {
            parts.push_str(&format!("{}", predicate));
            if i < self.predicates.len() - 1 {
                parts.push_str(" && ");
            }
        }
        write!(f, "({})", parts)
    }
}

struct OrPredicate {
    predicates: Vec<Predicate>,
}

impl PredicateProvider for OrPredicate {
    #[inline]
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        for predicate in &self.predicates {
            if predicate.apply(entry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Display for OrPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = String::with_capacity(self.predicates.len() * 16);
        for (i, predicate) in self.predicates.iter().enumerate() {
            parts.push_str(&format!("{}", predicate));
            if i < self.predicates.len() - 1 {
                parts.push_str(" || ");
            }
        }
        write!(f, "({})", parts)
    }
}

struct ElemMatchPredicate {
    field: String,
    predicate: Predicate,
}

impl PredicateProvider for ElemMatchPredicate {
    fn apply(&self, entry: &Document) -> OlivineResult<bool> {
        let value = entry.get(&self.field)?;
        let elements = match value.as_array() {
            Some(elements) => elements,
            None => return Ok(false),
        };

        for element in elements {
            let matched = match element {
                Value::Document(document) => self.predicate.apply(document)?,
                scalar => {
                    let mut wrapper = Document::new();
                    wrapper.put(ELEMENT, scalar.clone())?;
                    self.predicate.apply(&wrapper)?
                }
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Display for ElemMatchPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(elemMatch {})", self.predicate)
    }
}
