//! Multi-key ordering of entities.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::model::Entity;

/// Sort direction of a single tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One `(key, direction)` tie-break.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortPredicate {
    /// Property to order by.
    pub property_key: String,
    /// Direction.
    pub direction: SortDirection,
}

/// Ascending tie-break on `key`.
pub fn asc(key: impl Into<String>) -> SortPredicate {
    SortPredicate {
        property_key: key.into(),
        direction: SortDirection::Asc,
    }
}

/// Descending tie-break on `key`.
pub fn desc(key: impl Into<String>) -> SortPredicate {
    SortPredicate {
        property_key: key.into(),
        direction: SortDirection::Desc,
    }
}

/// Keys referenced by a sort chain.
pub fn sort_keys(sorts: &[SortPredicate]) -> BTreeSet<String> {
    sorts.iter().map(|s| s.property_key.clone()).collect()
}

/// Compares entities through an ordered chain of tie-breaks.
///
/// Presence outranks direction: an entity that has a value for a key sorts
/// after one that lacks it, in both ASC and DESC. Likewise an orderable value
/// sorts after a list or map. Only two orderable values are compared through
/// [`Value::compare`], negated for DESC.
#[derive(Clone, Debug)]
pub struct SortComparator {
    sorts: Vec<SortPredicate>,
}

impl SortComparator {
    /// Creates a comparator over `sorts`.
    pub fn new(sorts: Vec<SortPredicate>) -> Self {
        Self { sorts }
    }

    /// Orders `left` relative to `right`.
    pub fn compare<E: Entity + ?Sized>(&self, left: &E, right: &E) -> Ordering {
        for sort in &self.sorts {
            let l = left.property_value(&sort.property_key);
            let r = right.property_value(&sort.property_key);
            let (l, r) = match (l, r) {
                (Some(_), None) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (None, None) => continue,
                (Some(l), Some(r)) => (l, r),
            };
            match (l.is_orderable(), r.is_orderable()) {
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (false, false) => continue,
                (true, true) => {}
            }
            let ord = order_values(l, r);
            if ord == Ordering::Equal {
                continue;
            }
            return match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
        }
        Ordering::Equal
    }
}

// Values of different kinds fall back to a fixed kind rank so that the
// comparator stays a total order.
fn order_values(left: &Value, right: &Value) -> Ordering {
    if let Some(ord) = left.compare(right) {
        return ord;
    }
    match (left, right) {
        // Only NaN reaches here: positive NaN above every number, negative
        // NaN below, as `f64::total_cmp` places them.
        (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        (Value::Float(nan), Value::Int(_)) => nan_rank(*nan),
        (Value::Int(_), Value::Float(nan)) => nan_rank(*nan).reverse(),
        _ => kind_rank(left).cmp(&kind_rank(right)),
    }
}

fn nan_rank(nan: f64) -> Ordering {
    if nan.is_sign_negative() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::List(_) => 4,
        Value::Map(_) => 5,
    }
}
