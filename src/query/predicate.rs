//! Predicate evaluation over [`Queryable`] records.
//!
//! Negative operators are evaluated as `!positive`, so a clause and its
//! negation always partition a record set.

use chrono::{DateTime, Utc};

use super::fields::{FieldValue, Queryable};
use super::filter::{FilterClause, FilterOperator, FilterValue, Literal};
use crate::model::InstanceRecord;

impl FilterClause {
    /// Apply the field predicate. Inactive clauses and unknown fields match
    /// everything.
    pub fn matches<T: Queryable>(&self, record: &T) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(get) = T::accessor(&self.field_name) else {
            return true;
        };
        let value = get(record);
        let positive = self.matches_positive(&value);
        if self.operator.is_negative() { !positive } else { positive }
    }

    fn literals(&self) -> &[Literal] {
        match &self.value {
            FilterValue::One(literal) => std::slice::from_ref(literal),
            FilterValue::Many(literals) => literals,
        }
    }

    fn matches_positive(&self, value: &FieldValue<'_>) -> bool {
        match self.operator.positive() {
            FilterOperator::Equals => match &self.value {
                FilterValue::One(literal) => equals_literal(value, literal),
                FilterValue::Many(literals) => literals.iter().any(|l| equals_literal(value, l)),
            },
            FilterOperator::In => self.literals().iter().any(|l| equals_literal(value, l)),
            FilterOperator::StartsWith => {
                let haystack = value.render().to_lowercase();
                self.literals()
                    .iter()
                    .any(|l| haystack.starts_with(&literal_text(l).to_lowercase()))
            }
            FilterOperator::Contains => {
                let haystack = value.render().to_lowercase();
                self.literals()
                    .iter()
                    .any(|l| haystack.contains(&literal_text(l).to_lowercase()))
            }
            // `positive()` never returns a negative operator.
            _ => false,
        }
    }

    /// Runtime-status filter, independent of the field predicate.
    ///
    /// Orchestrations pass when their status was requested. Entities pass when
    /// `DurableEntities` was requested. With no statuses requested everything
    /// passes.
    pub fn matches_runtime_status(&self, record: &InstanceRecord) -> bool {
        if self.all_statuses() {
            return true;
        }
        if record.is_entity() {
            return self.wants_entities();
        }
        self.requested_statuses().contains(&record.runtime_status)
    }

    /// Inclusive time-range check.
    pub fn matches_time_range(&self, at: DateTime<Utc>) -> bool {
        self.time_from.map_or(true, |from| at >= from) && self.time_till.map_or(true, |till| at <= till)
    }
}

fn literal_text(literal: &Literal) -> &str {
    match literal {
        Literal::Null => "",
        Literal::Text(s) => s,
    }
}

/// Native comparison when the literal parses as the field's type, text
/// comparison otherwise. `null` matches absent and empty values.
fn equals_literal(value: &FieldValue<'_>, literal: &Literal) -> bool {
    let text = match literal {
        Literal::Null => return value.is_empty(),
        Literal::Text(s) => s.as_str(),
    };
    match value {
        FieldValue::Absent => text.is_empty(),
        FieldValue::Text(s) => *s == text,
        FieldValue::Integer(n) => match text.parse::<i64>() {
            Ok(parsed) => parsed == *n,
            Err(_) => value.render() == text,
        },
        FieldValue::Time(t) => match DateTime::parse_from_rfc3339(text) {
            Ok(parsed) => parsed.with_timezone(&Utc) == *t,
            Err(_) => value.render() == text,
        },
        FieldValue::Structured(s) => s == text,
    }
}
