//! The invalidation rule condition grammar: `lhs OP rhs`, per spec §4.6 item 2.
//!
//! Narrowed from the teacher's `fraiseql_observers::condition::ConditionAst`
//! (no `&&`/`||` combinators — out of scope per spec §4.6, the rule's
//! pattern list already provides the fan-out the combinators would have).

use super::event::{value_to_display, Event};

/// A comparison operator recognized by the condition grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A parsed `lhs OP rhs` condition.
#[derive(Debug, Clone)]
pub struct Condition {
    lhs: String,
    op: Operator,
    rhs: Rhs,
}

#[derive(Debug, Clone)]
enum Rhs {
    Literal(String),
    EventField(String),
}

/// Parse `text` into a [`Condition`].
///
/// Recognizes the two-character operators (`!=`, `<=`, `>=`) before the
/// single-character ones so `<=` is never split into `<` followed by a
/// stray `=`.
#[must_use]
pub fn parse(text: &str) -> Option<Condition> {
    const OPERATORS: [(&str, Operator); 6] = [
        ("!=", Operator::Ne),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("=", Operator::Eq),
        ("<", Operator::Lt),
        (">", Operator::Gt),
    ];

    for (token, op) in OPERATORS {
        if let Some(idx) = text.find(token) {
            let lhs = text[..idx].trim().to_string();
            let rhs_text = text[idx + token.len()..].trim();
            if lhs.is_empty() || rhs_text.is_empty() {
                return None;
            }
            let rhs = parse_rhs(rhs_text);
            return Some(Condition { lhs, op, rhs });
        }
    }
    None
}

fn parse_rhs(text: &str) -> Rhs {
    if let Some(inner) = text.strip_prefix("${event.").and_then(|s| s.strip_suffix('}')) {
        return Rhs::EventField(inner.trim().to_string());
    }
    let unquoted = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(text);
    Rhs::Literal(unquoted.to_string())
}

impl Condition {
    /// Evaluate this condition against `event`'s payload.
    #[must_use]
    pub fn evaluate(&self, event: &Event) -> bool {
        let lhs_value = event.data.get(&self.lhs).map(value_to_display);
        let rhs_value = match &self.rhs {
            Rhs::Literal(text) => Some(text.clone()),
            Rhs::EventField(key) => event.data.get(key).map(value_to_display),
        };

        match (lhs_value, rhs_value) {
            (None, None) => matches!(self.op, Operator::Eq),
            (None, Some(rhs)) => compare_strings(self.op, "null", &rhs),
            (Some(lhs), None) => compare_strings(self.op, &lhs, "null"),
            (Some(lhs), Some(rhs)) => {
                if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
                    compare_numeric(self.op, l, r)
                } else {
                    compare_strings(self.op, &lhs, &rhs)
                }
            }
        }
    }
}

fn compare_numeric(op: Operator, lhs: f64, rhs: f64) -> bool {
    match op {
        Operator::Eq => (lhs - rhs).abs() < f64::EPSILON,
        Operator::Ne => (lhs - rhs).abs() >= f64::EPSILON,
        Operator::Lt => lhs < rhs,
        Operator::Le => lhs <= rhs,
        Operator::Gt => lhs > rhs,
        Operator::Ge => lhs >= rhs,
    }
}

fn compare_strings(op: Operator, lhs: &str, rhs: &str) -> bool {
    let lhs = lhs.trim().to_lowercase();
    let rhs = rhs.trim().to_lowercase();
    match op {
        Operator::Eq => lhs == rhs,
        Operator::Ne => lhs != rhs,
        Operator::Lt => lhs < rhs,
        Operator::Le => lhs <= rhs,
        Operator::Gt => lhs > rhs,
        Operator::Ge => lhs >= rhs,
    }
}

/// Evaluate `condition` against `event`; an empty or blank condition is
/// always true, per spec §4.6 item 2.
#[must_use]
pub fn evaluate_optional(condition: Option<&str>, event: &Event) -> bool {
    match condition.map(str::trim) {
        None | Some("") => true,
        Some(text) => parse(text).is_some_and(|c| c.evaluate(event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_condition_is_true() {
        let event = Event::new("x");
        assert!(evaluate_optional(None, &event));
        assert!(evaluate_optional(Some("  "), &event));
    }

    #[test]
    fn event_field_substitution_matches_literal_value() {
        let event = Event::new("user_update").with_field("value", "active");
        assert!(evaluate_optional(Some("value = ${event.value}"), &event));
    }

    #[test]
    fn numeric_comparison_when_both_sides_parse() {
        let event = Event::new("x").with_field("count", 10);
        assert!(evaluate_optional(Some("count > 5"), &event));
        assert!(!evaluate_optional(Some("count > 50"), &event));
    }

    #[test]
    fn string_comparison_is_case_insensitive_and_trimmed() {
        let event = Event::new("x").with_field("status", " Active ");
        assert!(evaluate_optional(Some("status = active"), &event));
    }

    #[test]
    fn le_and_ge_do_not_get_split_by_single_char_operators() {
        let event = Event::new("x").with_field("count", 5);
        assert!(evaluate_optional(Some("count <= 5"), &event));
        assert!(evaluate_optional(Some("count >= 5"), &event));
    }

    #[test]
    fn absent_field_equals_null() {
        let event = Event::new("x");
        assert!(evaluate_optional(Some("missing = null"), &event));
    }
}
