//! Client-side property filters.
//!
//! A [`FilterPredicate`] is an immutable boolean tree over property
//! comparisons. The storage layer cannot push these down to the store, so the
//! scan pipeline evaluates them per decoded entity through a
//! [`FilterExecutor`].

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::{GraphError, Result};
use crate::model::Entity;

/// Comparison applied by a leaf predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOperator {
    /// `=`
    Equal,
    /// `≠`
    NotEqual,
    /// `>`
    Greater,
    /// `≥`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `≤`
    LessOrEqual,
}

impl CompareOperator {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            CompareOperator::Equal => ord == Ordering::Equal,
            CompareOperator::NotEqual => ord != Ordering::Equal,
            CompareOperator::Greater => ord == Ordering::Greater,
            CompareOperator::GreaterOrEqual => ord != Ordering::Less,
            CompareOperator::Less => ord == Ordering::Less,
            CompareOperator::LessOrEqual => ord != Ordering::Greater,
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareOperator::Equal | CompareOperator::NotEqual)
    }
}

/// Boolean connective of a composite predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    /// Both sides must hold.
    And,
    /// Either side must hold.
    Or,
}

/// Filter tree evaluated against an entity's properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FilterPredicate {
    /// `property OP value`; false when the property is absent.
    Compare {
        /// Property to read.
        #[serde(rename = "propertyKey")]
        property_key: String,
        /// Comparison operator.
        operator: CompareOperator,
        /// Right-hand operand.
        value: Value,
    },
    /// Full-match of a string property against a regular expression.
    Regex {
        /// Property to read.
        #[serde(rename = "propertyKey")]
        property_key: String,
        /// Pattern; must match the entire value.
        pattern: String,
    },
    /// Holds when the property is absent.
    IsNull {
        /// Property to read.
        #[serde(rename = "propertyKey")]
        property_key: String,
    },
    /// Holds when the property is present.
    IsNotNull {
        /// Property to read.
        #[serde(rename = "propertyKey")]
        property_key: String,
    },
    /// `left AND|OR right`.
    Composite {
        /// Left operand.
        left: Box<FilterPredicate>,
        /// Connective.
        operator: LogicalOperator,
        /// Right operand.
        right: Box<FilterPredicate>,
    },
}

fn compare(
    key: impl Into<String>,
    operator: CompareOperator,
    value: impl Into<Value>,
) -> FilterPredicate {
    FilterPredicate::Compare {
        property_key: key.into(),
        operator,
        value: value.into(),
    }
}

/// `key = value`
pub fn equal(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::Equal, value)
}

/// `key ≠ value`
pub fn not_equal(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::NotEqual, value)
}

/// `key > value`
pub fn greater(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::Greater, value)
}

/// `key ≥ value`
pub fn greater_or_equal(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::GreaterOrEqual, value)
}

/// `key < value`
pub fn less(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::Less, value)
}

/// `key ≤ value`
pub fn less_or_equal(key: impl Into<String>, value: impl Into<Value>) -> FilterPredicate {
    compare(key, CompareOperator::LessOrEqual, value)
}

/// `key` matches `pattern` in full.
pub fn regex(key: impl Into<String>, pattern: impl Into<String>) -> FilterPredicate {
    FilterPredicate::Regex {
        property_key: key.into(),
        pattern: pattern.into(),
    }
}

/// `key` is absent.
pub fn is_null(key: impl Into<String>) -> FilterPredicate {
    FilterPredicate::IsNull {
        property_key: key.into(),
    }
}

/// `key` is present.
pub fn is_not_null(key: impl Into<String>) -> FilterPredicate {
    FilterPredicate::IsNotNull {
        property_key: key.into(),
    }
}

/// `left AND right`
pub fn and(left: FilterPredicate, right: FilterPredicate) -> FilterPredicate {
    FilterPredicate::Composite {
        left: Box::new(left),
        operator: LogicalOperator::And,
        right: Box::new(right),
    }
}

/// `left OR right`
pub fn or(left: FilterPredicate, right: FilterPredicate) -> FilterPredicate {
    FilterPredicate::Composite {
        left: Box::new(left),
        operator: LogicalOperator::Or,
        right: Box::new(right),
    }
}

impl FilterPredicate {
    /// Every property key referenced by a leaf of this tree.
    pub fn property_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            FilterPredicate::Compare { property_key, .. }
            | FilterPredicate::Regex { property_key, .. }
            | FilterPredicate::IsNull { property_key }
            | FilterPredicate::IsNotNull { property_key } => {
                keys.insert(property_key.clone());
            }
            FilterPredicate::Composite { left, right, .. } => {
                left.collect_keys(keys);
                right.collect_keys(keys);
            }
        }
    }
}

/// Evaluates a [`FilterPredicate`] with its regular expressions compiled once.
#[derive(Clone, Debug)]
pub struct FilterExecutor {
    filter: FilterPredicate,
    patterns: HashMap<String, Regex>,
}

impl FilterExecutor {
    /// Compiles the patterns referenced by `filter`.
    pub fn new(filter: FilterPredicate) -> Result<Self> {
        let mut patterns = HashMap::new();
        compile_patterns(&filter, &mut patterns)?;
        Ok(Self { filter, patterns })
    }

    /// The wrapped predicate.
    pub fn filter(&self) -> &FilterPredicate {
        &self.filter
    }

    /// Evaluates the predicate against `target`.
    ///
    /// Ordering comparisons between values without a shared ordering are a
    /// caller error and surface as [`GraphError::InvalidArgument`].
    pub fn execute<E: Entity + ?Sized>(&self, target: &E) -> Result<bool> {
        self.evaluate(&self.filter, target)
    }

    fn evaluate<E: Entity + ?Sized>(
        &self,
        predicate: &FilterPredicate,
        target: &E,
    ) -> Result<bool> {
        match predicate {
            FilterPredicate::Compare {
                property_key,
                operator,
                value,
            } => {
                let Some(actual) = target.property_value(property_key) else {
                    return Ok(false);
                };
                match actual.compare(value) {
                    Some(ord) => Ok(operator.accepts(ord)),
                    None if operator.is_equality() => {
                        let equal = actual == value;
                        Ok(if *operator == CompareOperator::Equal {
                            equal
                        } else {
                            !equal
                        })
                    }
                    None => Err(GraphError::invalid(format!(
                        "property '{property_key}' ({}) cannot be ordered against {} operand",
                        actual.kind_name(),
                        value.kind_name()
                    ))),
                }
            }
            FilterPredicate::Regex {
                property_key,
                pattern,
            } => {
                let Some(actual) = target.property_value(property_key) else {
                    return Ok(false);
                };
                let Some(text) = actual.as_str() else {
                    return Ok(false);
                };
                let compiled = self.patterns.get(pattern).ok_or_else(|| {
                    GraphError::invalid(format!("pattern '{pattern}' was not compiled"))
                })?;
                Ok(compiled.is_match(text))
            }
            FilterPredicate::IsNull { property_key } => {
                Ok(target.property_value(property_key).is_none())
            }
            FilterPredicate::IsNotNull { property_key } => {
                Ok(target.property_value(property_key).is_some())
            }
            FilterPredicate::Composite {
                left,
                operator,
                right,
            } => {
                // both sides are always evaluated
                let left = self.evaluate(left, target)?;
                let right = self.evaluate(right, target)?;
                Ok(match operator {
                    LogicalOperator::And => left && right,
                    LogicalOperator::Or => left || right,
                })
            }
        }
    }
}

fn compile_patterns(predicate: &FilterPredicate, out: &mut HashMap<String, Regex>) -> Result<()> {
    match predicate {
        FilterPredicate::Regex { pattern, .. } => {
            if !out.contains_key(pattern) {
                let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                    GraphError::invalid(format!("invalid regex '{pattern}': {err}"))
                })?;
                out.insert(pattern.clone(), anchored);
            }
            Ok(())
        }
        FilterPredicate::Composite { left, right, .. } => {
            compile_patterns(left, out)?;
            compile_patterns(right, out)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use crate::query::value::properties;

    fn node() -> Node {
        Node::new(
            "n",
            "T",
            properties([
                ("prop1", Value::Int(5)),
                ("prop2", Value::from("1234567890")),
            ]),
        )
    }

    fn run(filter: FilterPredicate) -> bool {
        FilterExecutor::new(filter).unwrap().execute(&node()).unwrap()
    }

    #[test]
    fn leaf_comparisons() {
        assert!(run(equal("prop1", 5)));
        assert!(!run(greater("prop1", 5)));
        assert!(run(greater_or_equal("prop1", 5)));
        assert!(run(less("prop1", 6)));
        assert!(run(less_or_equal("prop1", 5.0)));
        assert!(run(not_equal("prop1", 4)));
    }

    #[test]
    fn regex_must_match_whole_value() {
        assert!(run(regex("prop2", "[0-9]+")));
        assert!(!run(regex("prop2", "[0-9]{3}")));
        assert!(!run(regex("prop1", ".*")));
    }

    #[test]
    fn null_checks() {
        assert!(run(is_null("prop3")));
        assert!(!run(is_not_null("prop3")));
        assert!(run(is_not_null("prop1")));
    }

    #[test]
    fn absent_property_fails_every_comparison() {
        assert!(!run(not_equal("prop3", 1)));
        assert!(!run(equal("prop3", Value::Null)));
    }

    #[test]
    fn composites() {
        assert!(run(and(equal("prop1", 5), equal("prop2", "1234567890"))));
        assert!(!run(or(equal("prop1", 3), equal("prop2", "abcdefg"))));
        assert!(run(or(equal("prop1", 3), is_null("prop9"))));
    }

    #[test]
    fn ordering_incomparable_kinds_is_rejected() {
        let executor = FilterExecutor::new(greater("prop2", 3)).unwrap();
        let err = executor.execute(&node()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
        assert!(!run(equal("prop2", 3)));
        assert!(run(not_equal("prop2", 3)));
    }

    #[test]
    fn invalid_regex_rejected_up_front() {
        assert!(FilterExecutor::new(regex("prop2", "([")).is_err());
    }

    #[test]
    fn key_extraction_walks_tree() {
        let filter = and(
            equal("a", 1),
            or(regex("b", "x"), and(is_null("c"), is_not_null("a"))),
        );
        let keys: Vec<_> = filter.property_keys().into_iter().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn serde_shape() {
        let json = r#"{"kind":"compare","propertyKey":"a","operator":"GREATER","value":3}"#;
        let parsed: FilterPredicate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, greater("a", 3));
    }
}
