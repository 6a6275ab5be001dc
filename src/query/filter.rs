//! Filter clauses and the filter expression parser.
//!
//! A filter string has one of these shapes (keywords are case-insensitive):
//!
//! ```text
//! <field> eq <value>              <field> ne <value>
//! startswith(<field>, <value>)    startswith(<field>, <value>) eq false
//! contains(<field>, <value>)      not contains(<field>, <value>)
//! <field> in (<v1>, <v2>, ...)    <field> not in ["v1", "v2"]
//! ```
//!
//! Values may be single- or double-quoted; the bare word `null` matches an
//! absent or empty field. Anything that does not parse, or names a field no
//! record type has, yields an inactive clause, so a typo in a UI filter box
//! degrades to "no filter". Known field names are stored in their canonical
//! spelling.
//!
//! The time range and the requested runtime statuses are not part of the
//! filter string; callers attach them with [`FilterClause::with_time_range`]
//! and [`FilterClause::with_runtime_statuses`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::fields::known_field;
use crate::model::{DURABLE_ENTITIES_STATUS, RuntimeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterOperator {
    #[default]
    Equals,
    NotEquals,
    StartsWith,
    NotStartsWith,
    Contains,
    NotContains,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            FilterOperator::NotEquals
                | FilterOperator::NotStartsWith
                | FilterOperator::NotContains
                | FilterOperator::NotIn
        )
    }

    /// The positive counterpart (identity for positive operators).
    pub fn positive(&self) -> FilterOperator {
        match self {
            FilterOperator::NotEquals => FilterOperator::Equals,
            FilterOperator::NotStartsWith => FilterOperator::StartsWith,
            FilterOperator::NotContains => FilterOperator::Contains,
            FilterOperator::NotIn => FilterOperator::In,
            other => *other,
        }
    }

    pub fn negate(&self) -> FilterOperator {
        match self {
            FilterOperator::Equals => FilterOperator::NotEquals,
            FilterOperator::NotEquals => FilterOperator::Equals,
            FilterOperator::StartsWith => FilterOperator::NotStartsWith,
            FilterOperator::NotStartsWith => FilterOperator::StartsWith,
            FilterOperator::Contains => FilterOperator::NotContains,
            FilterOperator::NotContains => FilterOperator::Contains,
            FilterOperator::In => FilterOperator::NotIn,
            FilterOperator::NotIn => FilterOperator::In,
        }
    }
}

/// One value on the right-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// The bare word `null`.
    Null,
    Text(String),
}

impl Literal {
    pub fn text(s: impl Into<String>) -> Self {
        Literal::Text(s.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    One(Literal),
    Many(Vec<Literal>),
}

impl Default for FilterValue {
    fn default() -> Self {
        FilterValue::One(Literal::Text(String::new()))
    }
}

/// A parsed filter plus the caller's time range and status selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterClause {
    /// Empty when no (valid) filter expression was supplied.
    pub field_name: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    pub time_from: Option<DateTime<Utc>>,
    pub time_till: Option<DateTime<Utc>>,
    /// Requested statuses, possibly including `DurableEntities`. `None` or
    /// empty means every status.
    pub runtime_statuses: Option<Vec<String>>,
}

impl FilterClause {
    /// Parse a filter expression. Never fails; see the module docs.
    pub fn parse(filter: &str) -> Self {
        let filter = filter.trim();
        if filter.is_empty() {
            return Self::default();
        }
        let Some((field_name, operator, value)) = parse_expression(filter) else {
            debug!(filter, "ignoring unparsable filter expression");
            return Self::default();
        };
        let Some(field_name) = known_field(&field_name) else {
            debug!(filter, field = %field_name, "ignoring filter on unknown field");
            return Self::default();
        };
        Self {
            field_name: field_name.to_string(),
            operator,
            value,
            ..Self::default()
        }
    }

    pub fn with_time_range(mut self, time_from: Option<DateTime<Utc>>, time_till: Option<DateTime<Utc>>) -> Self {
        self.time_from = time_from;
        self.time_till = time_till;
        self
    }

    pub fn with_runtime_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_statuses = Some(statuses.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a field predicate is in effect.
    pub fn is_active(&self) -> bool {
        !self.field_name.is_empty()
    }

    /// The same clause with the operator logically negated.
    pub fn negated(&self) -> Self {
        Self {
            operator: self.operator.negate(),
            ..self.clone()
        }
    }

    fn status_tokens(&self) -> impl Iterator<Item = &str> {
        self.runtime_statuses.iter().flatten().map(|s| s.trim())
    }

    /// No status selection at all: every record passes the status filter.
    pub fn all_statuses(&self) -> bool {
        self.status_tokens().next().is_none()
    }

    /// Whether entity records are wanted.
    pub fn wants_entities(&self) -> bool {
        self.all_statuses() || self.status_tokens().any(|s| s.eq_ignore_ascii_case(DURABLE_ENTITIES_STATUS))
    }

    /// Whether orchestration records are wanted, i.e. the selection names
    /// anything besides `DurableEntities`.
    pub fn wants_orchestrations(&self) -> bool {
        self.all_statuses() || self.status_tokens().any(|s| !s.eq_ignore_ascii_case(DURABLE_ENTITIES_STATUS))
    }

    /// The recognised orchestration statuses in the selection.
    pub fn requested_statuses(&self) -> Vec<RuntimeStatus> {
        let mut out = Vec::new();
        for status in self.status_tokens().filter_map(RuntimeStatus::parse) {
            if !out.contains(&status) {
                out.push(status);
            }
        }
        out
    }
}

// ===== Parser =====

type Parsed = (String, FilterOperator, FilterValue);

fn parse_expression(text: &str) -> Option<Parsed> {
    let text = text.trim();
    if let Some(rest) = strip_keyword(text, "not") {
        let inner = strip_outer_parens(rest);
        let (field, op, value) = parse_positive_or_negative(inner)?;
        return Some((field, op.negate(), value));
    }
    parse_positive_or_negative(text)
}

fn parse_positive_or_negative(text: &str) -> Option<Parsed> {
    parse_function(text, "startswith", FilterOperator::StartsWith)
        .or_else(|| parse_function(text, "contains", FilterOperator::Contains))
        .or_else(|| parse_in(text))
        .or_else(|| parse_binary(text))
}

/// `keyword` followed by whitespace or `(`; returns the remainder.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &text[keyword.len()..];
    let next = rest.chars().next()?;
    if next.is_whitespace() || next == '(' || next == '[' {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn strip_outer_parens(text: &str) -> &str {
    let text = text.trim();
    if text.starts_with('(') && closing_paren(text, 0) == Some(text.len() - 1) {
        text[1..text.len() - 1].trim()
    } else {
        text
    }
}

/// Byte index of the `)` closing the `(` at `open`, skipping quoted text.
fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Split on commas outside quotes and brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&text[start..idx]);
                    start = idx + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim_start()),
        None => (text, ""),
    }
}

/// Parse one literal: quoted text, the bare word `null`, or bare text.
fn parse_literal(raw: &str) -> Literal {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("null") {
        return Literal::Null;
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Literal::Text(raw[1..raw.len() - 1].replace("''", "'"));
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let text = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw[1..raw.len() - 1].to_string());
        return Literal::Text(text);
    }
    Literal::Text(raw.to_string())
}

/// `startswith(field, value)` / `contains(field, value)` with an optional
/// trailing `eq true|false` or `ne true|false`.
fn parse_function(text: &str, function: &str, op: FilterOperator) -> Option<Parsed> {
    let head = text.get(..function.len())?;
    if !head.eq_ignore_ascii_case(function) {
        return None;
    }
    let after = text[function.len()..].trim_start();
    let open = text.len() - after.len();
    if !after.starts_with('(') {
        return None;
    }
    let close = closing_paren(text, open)?;
    let args = split_top_level(&text[open + 1..close]);
    let [field, value] = args.as_slice() else {
        return None;
    };
    let field = field.trim();
    if !is_field_name(field) {
        return None;
    }
    let value = parse_literal(value);

    let negate = match trailing_boolean(&text[close + 1..])? {
        Trailing::None | Trailing::IsTrue => false,
        Trailing::IsFalse => true,
    };
    let op = if negate { op.negate() } else { op };
    Some((field.to_string(), op, FilterValue::One(value)))
}

enum Trailing {
    None,
    IsTrue,
    IsFalse,
}

fn trailing_boolean(text: &str) -> Option<Trailing> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Trailing::None);
    }
    let (op, rest) = split_first_word(text);
    let value = rest.trim();
    let truthy = if value.eq_ignore_ascii_case("true") {
        true
    } else if value.eq_ignore_ascii_case("false") {
        false
    } else {
        return None;
    };
    let holds = if op.eq_ignore_ascii_case("eq") {
        truthy
    } else if op.eq_ignore_ascii_case("ne") {
        !truthy
    } else {
        return None;
    };
    Some(if holds { Trailing::IsTrue } else { Trailing::IsFalse })
}

/// `field in (a, b)`, `field not in [..]`.
fn parse_in(text: &str) -> Option<Parsed> {
    let (field, rest) = split_first_word(text);
    if !is_field_name(field) {
        return None;
    }
    let (negated, rest) = match strip_keyword(rest, "not") {
        Some(after_not) => (true, after_not),
        None => (false, rest),
    };
    let list = strip_keyword(rest, "in")?.trim();
    let values = parse_list(list)?;
    let op = if negated { FilterOperator::NotIn } else { FilterOperator::In };
    Some((field.to_string(), op, FilterValue::Many(values)))
}

fn parse_list(list: &str) -> Option<Vec<Literal>> {
    if list.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(list) {
            return Some(
                items
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => Literal::Null,
                        Value::String(s) => Literal::Text(s.trim().to_string()),
                        other => Literal::Text(other.to_string()),
                    })
                    .collect(),
            );
        }
        let inner = list.strip_prefix('[')?.strip_suffix(']')?;
        return Some(split_list(inner));
    }
    if list.starts_with('(') {
        if closing_paren(list, 0) != Some(list.len() - 1) {
            return None;
        }
        return Some(split_list(&list[1..list.len() - 1]));
    }
    if list.is_empty() {
        return None;
    }
    Some(split_list(list))
}

fn split_list(inner: &str) -> Vec<Literal> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(inner)
        .into_iter()
        .map(|raw| match parse_literal(raw) {
            Literal::Text(s) => Literal::Text(s.trim().to_string()),
            Literal::Null => Literal::Null,
        })
        .collect()
}

/// `field eq value` / `field ne value`.
fn parse_binary(text: &str) -> Option<Parsed> {
    let (field, rest) = split_first_word(text);
    if !is_field_name(field) {
        return None;
    }
    let (op, value) = split_first_word(rest);
    let op = if op.eq_ignore_ascii_case("eq") {
        FilterOperator::Equals
    } else if op.eq_ignore_ascii_case("ne") {
        FilterOperator::NotEquals
    } else {
        return None;
    };
    if value.trim().is_empty() {
        return None;
    }
    Some((field.to_string(), op, FilterValue::One(parse_literal(value))))
}
