//! Rule predicates.
//!
//! A predicate is a tree of AND/OR/NOT nodes over leaf comparisons. Leaves
//! compare one subject field against a literal, or a timestamp field against
//! `now`. Field names are checked against the subject kind before any data is
//! looked at, so a typo surfaces as [`RuleErrorKind::UnknownField`] instead of
//! a rule that silently never fires.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::subject::{FieldType, Subject, SubjectKind, Value};
use crate::error::RuleErrorKind;
use crate::task::{Priority, TaskStatus};

/// Boolean condition over a subject's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    And {
        all: Vec<Predicate>,
    },
    Or {
        any: Vec<Predicate>,
    },
    Not {
        predicate: Box<Predicate>,
    },
    /// `field <op> value`
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    /// Timestamp field relative to the evaluation time
    Relative {
        field: String,
        op: RelativeOp,
        hours: f64,
    },
}

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Field equals one of the listed literals
    In,
    /// Tag set holds the literal, or text contains it
    Contains,
}

impl CompareOp {
    fn is_ordering(self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::Contains => "contains",
        };
        f.write_str(symbol)
    }
}

/// Relative-time operators. `hours` is the span on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeOp {
    /// `now <= t <= now + hours`
    WithinNext,
    /// `now - hours <= t <= now`
    WithinLast,
    /// `t < now - hours`
    OlderThan,
}

impl RelativeOp {
    fn holds(self, t: DateTime<Utc>, now: DateTime<Utc>, span: Duration) -> bool {
        match self {
            RelativeOp::WithinNext => t >= now && t - now <= span,
            RelativeOp::WithinLast => t <= now && now - t <= span,
            RelativeOp::OlderThan => now - t > span,
        }
    }
}

impl fmt::Display for RelativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeOp::WithinNext => f.write_str("within_next"),
            RelativeOp::WithinLast => f.write_str("within_last"),
            RelativeOp::OlderThan => f.write_str("older_than"),
        }
    }
}

/// Right-hand side of a comparison.
///
/// Priorities, statuses and timestamps (RFC 3339) are written as text and
/// interpreted according to the field they are compared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Literal>),
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::Number(f64::from(value))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<Priority> for Literal {
    fn from(value: Priority) -> Self {
        Literal::Text(value.to_string())
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(values: Vec<T>) -> Self {
        Literal::List(values.into_iter().map(Into::into).collect())
    }
}

impl Predicate {
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And {
            all: predicates.into_iter().collect(),
        }
    }

    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or {
            any: predicates.into_iter().collect(),
        }
    }

    pub fn negate(predicate: Predicate) -> Self {
        Predicate::Not {
            predicate: Box::new(predicate),
        }
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn relative(field: impl Into<String>, op: RelativeOp, hours: f64) -> Self {
        Predicate::Relative {
            field: field.into(),
            op,
            hours,
        }
    }

    /// Type-check every leaf against the fields of `kind`.
    pub fn check(&self, kind: SubjectKind) -> Result<(), RuleErrorKind> {
        match self {
            Predicate::And { all: children } | Predicate::Or { any: children } => {
                children.iter().try_for_each(|p| p.check(kind))
            }
            Predicate::Not { predicate } => predicate.check(kind),
            Predicate::Compare { field, op, value } => {
                let ty = field_type(kind, field)?;
                compare(field, *op, &ty.placeholder(), value).map(|_| ())
            }
            Predicate::Relative { field, op, hours } => {
                if field_type(kind, field)? != FieldType::Time {
                    return Err(RuleErrorKind::TypeMismatch {
                        field: field.clone(),
                        operator: op.to_string(),
                        message: "relative comparisons need a timestamp field".to_string(),
                    });
                }
                span(field, *hours).map(|_| ())
            }
        }
    }

    /// Evaluate against one subject at `now`.
    ///
    /// An unset optional field makes every leaf false except `ne`.
    pub fn evaluate(&self, subject: &Subject<'_>, now: DateTime<Utc>) -> Result<bool, RuleErrorKind> {
        match self {
            Predicate::And { all } => {
                for p in all {
                    if !p.evaluate(subject, now)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or { any } => {
                for p in any {
                    if p.evaluate(subject, now)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not { predicate } => Ok(!predicate.evaluate(subject, now)?),
            Predicate::Compare { field, op, value } => {
                let actual = resolve(subject, field)?;
                compare(field, *op, &actual, value)
            }
            Predicate::Relative { field, op, hours } => {
                let span = span(field, *hours)?;
                match resolve(subject, field)? {
                    Value::Time(t) => Ok(op.holds(t, now, span)),
                    Value::Null => Ok(false),
                    _ => Err(RuleErrorKind::TypeMismatch {
                        field: field.clone(),
                        operator: op.to_string(),
                        message: "relative comparisons need a timestamp field".to_string(),
                    }),
                }
            }
        }
    }
}

fn field_type(kind: SubjectKind, field: &str) -> Result<FieldType, RuleErrorKind> {
    FieldType::of(kind, field).ok_or_else(|| RuleErrorKind::UnknownField {
        field: field.to_string(),
        subject: kind.to_string(),
    })
}

fn resolve(subject: &Subject<'_>, field: &str) -> Result<Value, RuleErrorKind> {
    subject.value(field).ok_or_else(|| RuleErrorKind::UnknownField {
        field: field.to_string(),
        subject: subject.kind().to_string(),
    })
}

fn span(field: &str, hours: f64) -> Result<Duration, RuleErrorKind> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(RuleErrorKind::InvalidLiteral {
            field: field.to_string(),
            message: format!("{hours} is not a non-negative number of hours"),
        });
    }
    Ok(Duration::milliseconds((hours * 3_600_000.0).round() as i64))
}

fn mismatch(field: &str, op: CompareOp, message: impl Into<String>) -> RuleErrorKind {
    RuleErrorKind::TypeMismatch {
        field: field.to_string(),
        operator: op.to_string(),
        message: message.into(),
    }
}

fn compare(field: &str, op: CompareOp, actual: &Value, literal: &Literal) -> Result<bool, RuleErrorKind> {
    match op {
        CompareOp::In => {
            let Literal::List(items) = literal else {
                return Err(mismatch(field, op, "expects a list literal"));
            };
            let mut hit = false;
            for item in items {
                if matches!(item, Literal::List(_)) {
                    return Err(mismatch(field, op, "nested lists are not supported"));
                }
                hit |= ordering(field, op, actual, item)? == Some(Ordering::Equal);
            }
            Ok(hit)
        }
        CompareOp::Contains => match (actual, literal) {
            (Value::Tags(tags), Literal::Text(needle)) => Ok(tags.iter().any(|t| t == needle)),
            (Value::Text(text), Literal::Text(needle)) => Ok(text.contains(needle.as_str())),
            (Value::Null, Literal::Text(_)) => Ok(false),
            _ => Err(mismatch(field, op, "needs a tags or text field and a text literal")),
        },
        _ => {
            let ord = ordering(field, op, actual, literal)?;
            Ok(match (op, ord) {
                (CompareOp::Ne, None) => true,
                (_, None) => false,
                (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
                (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
                (CompareOp::Lt, Some(o)) => o == Ordering::Less,
                (CompareOp::Le, Some(o)) => o != Ordering::Greater,
                (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
                (CompareOp::Ge, Some(o)) => o != Ordering::Less,
                (CompareOp::In | CompareOp::Contains, Some(_)) => false,
            })
        }
    }
}

/// Order `actual` against a scalar literal. `None` when there is nothing to
/// compare (unset field, NaN).
fn ordering(
    field: &str,
    op: CompareOp,
    actual: &Value,
    literal: &Literal,
) -> Result<Option<Ordering>, RuleErrorKind> {
    let invalid = |message: String| RuleErrorKind::InvalidLiteral {
        field: field.to_string(),
        message,
    };

    let ord = match (actual, literal) {
        (_, Literal::List(_)) => return Err(mismatch(field, op, "list literals need 'in'")),
        (Value::Null, _) => return Ok(None),
        (Value::Bool(a), Literal::Bool(b)) if !op.is_ordering() => a.cmp(b),
        (Value::Number(a), Literal::Number(b)) => return Ok(a.partial_cmp(b)),
        (Value::Text(a), Literal::Text(b)) => a.as_str().cmp(b.as_str()),
        (Value::Priority(a), Literal::Text(b)) => a.cmp(&b.parse::<Priority>().map_err(invalid)?),
        (Value::Status(a), Literal::Text(b)) if !op.is_ordering() => {
            let b: TaskStatus = b.parse().map_err(invalid)?;
            if *a == b {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        (Value::Time(a), Literal::Text(b)) => {
            let b = DateTime::parse_from_rfc3339(b)
                .map_err(|e| invalid(format!("'{b}' is not an RFC 3339 timestamp: {e}")))?
                .with_timezone(&Utc);
            a.cmp(&b)
        }
        (Value::Tags(_), _) => return Err(mismatch(field, op, "tag sets support only 'contains'")),
        (value, literal) => {
            return Err(mismatch(
                field,
                op,
                format!("cannot compare {} with {}", value_kind(value), literal_kind(literal)),
            ))
        }
    };
    Ok(Some(ord))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::Text(_) => "text",
        Value::Priority(_) => "a priority",
        Value::Status(_) => "a status",
        Value::Time(_) => "a timestamp",
        Value::Tags(_) => "a tag set",
        Value::Null => "nothing",
    }
}

fn literal_kind(literal: &Literal) -> &'static str {
    match literal {
        Literal::Bool(_) => "a boolean literal",
        Literal::Number(_) => "a number literal",
        Literal::Text(_) => "a text literal",
        Literal::List(_) => "a list literal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Habit, Task};
    use chrono::TimeZone;
    use indoc::indoc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
    }

    fn due_within_day_and_high() -> Predicate {
        Predicate::all([
            Predicate::relative("due", RelativeOp::WithinNext, 24.0),
            Predicate::compare("priority", CompareOp::Ge, Priority::High),
        ])
    }

    #[test]
    fn due_within_and_priority() {
        let p = due_within_day_and_high();
        let soon = Task::new("t", "T", 30)
            .with_priority(Priority::High)
            .with_due(now() + Duration::hours(5));
        let later = soon.clone().with_due(now() + Duration::hours(30));
        let past = soon.clone().with_due(now() - Duration::hours(1));
        let low = soon.clone().with_priority(Priority::Low);

        assert!(p.evaluate(&Subject::Task(&soon), now()).unwrap());
        assert!(!p.evaluate(&Subject::Task(&later), now()).unwrap());
        assert!(!p.evaluate(&Subject::Task(&past), now()).unwrap());
        assert!(!p.evaluate(&Subject::Task(&low), now()).unwrap());
    }

    #[test]
    fn unset_due_never_matches_relative_leaf() {
        let task = Task::new("t", "T", 30);
        let p = Predicate::relative("due", RelativeOp::OlderThan, 0.0);
        assert!(!p.evaluate(&Subject::Task(&task), now()).unwrap());
        assert!(Predicate::negate(p).evaluate(&Subject::Task(&task), now()).unwrap());
    }

    #[test]
    fn overdue_uses_older_than_zero() {
        let task = Task::new("t", "T", 30).with_due(now() - Duration::minutes(1));
        let p = Predicate::relative("due", RelativeOp::OlderThan, 0.0);
        assert!(p.evaluate(&Subject::Task(&task), now()).unwrap());
    }

    #[test]
    fn unknown_field_is_reported_by_check_and_evaluate() {
        let p = Predicate::compare("deadline", CompareOp::Eq, "x");
        assert!(matches!(
            p.check(SubjectKind::Task),
            Err(RuleErrorKind::UnknownField { .. })
        ));
        let task = Task::new("t", "T", 30);
        assert!(p.evaluate(&Subject::Task(&task), now()).is_err());
    }

    #[test]
    fn check_catches_type_errors_without_data() {
        let bad = [
            Predicate::compare("completed_today", CompareOp::Gt, true),
            Predicate::compare("streak_days", CompareOp::Eq, "seven"),
            Predicate::compare("tags", CompareOp::Eq, "x"),
            Predicate::compare("streak_days", CompareOp::In, 3u32),
            Predicate::relative("name", RelativeOp::WithinNext, 1.0),
        ];
        for p in bad {
            assert!(
                matches!(p.check(SubjectKind::Habit), Err(RuleErrorKind::TypeMismatch { .. })),
                "{p:?}"
            );
        }
        let bad_priority = Predicate::compare("priority", CompareOp::Eq, "critical");
        assert!(matches!(
            bad_priority.check(SubjectKind::Task),
            Err(RuleErrorKind::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn membership_and_contains() {
        let mut habit = Habit::new("h", "Stretch");
        habit.category = Some("health".to_string());
        habit.tags.insert("morning".to_string());
        let subject = Subject::Habit(&habit);

        let in_list = Predicate::compare("category", CompareOp::In, vec!["health", "fitness"]);
        assert!(in_list.evaluate(&subject, now()).unwrap());

        let tagged = Predicate::compare("tags", CompareOp::Contains, "morning");
        assert!(tagged.evaluate(&subject, now()).unwrap());

        let name_has = Predicate::compare("name", CompareOp::Contains, "retch");
        assert!(name_has.evaluate(&subject, now()).unwrap());

        let either = Predicate::any([
            Predicate::compare("streak_days", CompareOp::Ge, 7u32),
            Predicate::compare("completed_today", CompareOp::Eq, false),
        ]);
        assert!(either.evaluate(&subject, now()).unwrap());
    }

    #[test]
    fn timestamps_compare_as_rfc3339_text() {
        let task = Task::new("t", "T", 30).with_due(now());
        let p = Predicate::compare("due", CompareOp::Lt, "2025-03-04T00:00:00Z");
        assert!(p.evaluate(&Subject::Task(&task), now()).unwrap());
        let bad = Predicate::compare("due", CompareOp::Lt, "tomorrow");
        assert!(matches!(
            bad.check(SubjectKind::Task),
            Err(RuleErrorKind::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn predicate_reads_from_toml() {
        let text = indoc! {r#"
            type = "and"

            [[all]]
            type = "relative"
            field = "due"
            op = "within_next"
            hours = 24

            [[all]]
            type = "compare"
            field = "priority"
            op = "ge"
            value = "high"
        "#};
        let parsed: Predicate = toml::from_str(text).unwrap();
        assert_eq!(parsed, due_within_day_and_high());
    }
}
