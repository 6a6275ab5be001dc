//! Sort stage.

use std::cmp::Ordering;

use super::fields::Queryable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// `desc` in any case is descending; anything else, including nothing,
    /// is ascending.
    pub fn parse(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.trim().eq_ignore_ascii_case("desc") => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }
}

/// A requested ordering: field name plus direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Build from an `order_by` value and an optional separate direction.
    ///
    /// `order_by` may carry the direction itself (`"createdTime desc"`); an
    /// explicit `direction` wins over the embedded one. Returns `None` when no
    /// field was given.
    pub fn parse(order_by: Option<&str>, direction: Option<&str>) -> Option<Self> {
        let order_by = order_by?.trim();
        if order_by.is_empty() {
            return None;
        }
        let (field, embedded) = match order_by.split_once(char::is_whitespace) {
            Some((field, rest)) => (field, Some(rest.trim())),
            None => (order_by, None),
        };
        Some(Self {
            field: field.to_string(),
            direction: SortDirection::parse(direction.or(embedded)),
        })
    }

    /// Whether `T` has the field; sorting by an unknown field is a no-op.
    pub fn resolves_for<T: Queryable>(&self) -> bool {
        T::accessor(&self.field).is_some()
    }
}

/// Stable in-place sort by `spec`. Unknown fields leave `records` untouched.
pub fn sort_records<T: Queryable>(records: &mut [T], spec: &SortSpec) {
    let Some(get) = T::accessor(&spec.field) else {
        return;
    };
    let compare = |a: &T, b: &T| -> Ordering { get(a).compare(&get(b)) };
    match spec.direction {
        SortDirection::Ascending => records.sort_by(compare),
        SortDirection::Descending => records.sort_by(|a, b| compare(b, a)),
    }
}
