//! Subjects a rule can look at, and the fields each kind exposes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Goal, Habit, Priority, StateSnapshot, Task, TaskStatus};

/// Kind of record a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Task,
    Habit,
    Goal,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Task => write!(f, "task"),
            SubjectKind::Habit => write!(f, "habit"),
            SubjectKind::Goal => write!(f, "goal"),
        }
    }
}

/// Identifies one task, habit or goal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: String,
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Static type of a subject field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Number,
    Text,
    Priority,
    Status,
    Time,
    Tags,
}

impl FieldType {
    /// Look up the type of `field` on `kind`. `None` means no such field.
    pub fn of(kind: SubjectKind, field: &str) -> Option<Self> {
        use FieldType::*;
        let ty = match (kind, field) {
            (_, "id") | (_, "category") => Text,
            (_, "tags") => Tags,
            (SubjectKind::Task, "title") => Text,
            (SubjectKind::Task, "priority") => Priority,
            (SubjectKind::Task, "status") => Status,
            (SubjectKind::Task, "duration_minutes") => Number,
            (SubjectKind::Task, "due") => Time,
            (SubjectKind::Habit, "name") => Text,
            (SubjectKind::Habit, "streak_days") => Number,
            (SubjectKind::Habit, "completed_today") => Bool,
            (SubjectKind::Habit, "last_completed") => Time,
            (SubjectKind::Goal, "title") => Text,
            (SubjectKind::Goal, "progress") => Number,
            (SubjectKind::Goal, "target_date") => Time,
            _ => return None,
        };
        Some(ty)
    }

    /// A representative value, used to type-check predicates without data.
    pub(crate) fn placeholder(self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Number => Value::Number(0.0),
            FieldType::Text => Value::Text(String::new()),
            FieldType::Priority => Value::Priority(Priority::Low),
            FieldType::Status => Value::Status(TaskStatus::Pending),
            FieldType::Time => Value::Time(DateTime::<Utc>::default()),
            FieldType::Tags => Value::Tags(Vec::new()),
        }
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Priority(Priority),
    Status(TaskStatus),
    Time(DateTime<Utc>),
    Tags(Vec<String>),
    /// Optional field with no value
    Null,
}

impl Value {
    fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Priority(p) => p.to_string(),
            Value::Status(s) => s.to_string(),
            Value::Time(t) => t.to_rfc3339(),
            Value::Tags(tags) => tags.join(", "),
            Value::Null => String::new(),
        }
    }
}

/// Borrowed view of one record in a snapshot.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Task(&'a Task),
    Habit(&'a Habit),
    Goal(&'a Goal),
}

impl<'a> Subject<'a> {
    /// All subjects of `kind` in snapshot order.
    pub fn all_of(kind: SubjectKind, snapshot: &'a StateSnapshot) -> Vec<Subject<'a>> {
        match kind {
            SubjectKind::Task => snapshot.tasks.iter().map(Subject::Task).collect(),
            SubjectKind::Habit => snapshot.habits.iter().map(Subject::Habit).collect(),
            SubjectKind::Goal => snapshot.goals.iter().map(Subject::Goal).collect(),
        }
    }

    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Task(_) => SubjectKind::Task,
            Subject::Habit(_) => SubjectKind::Habit,
            Subject::Goal(_) => SubjectKind::Goal,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            Subject::Task(t) => &t.id,
            Subject::Habit(h) => &h.id,
            Subject::Goal(g) => &g.id,
        }
    }

    pub fn reference(&self) -> SubjectRef {
        SubjectRef {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    pub fn category(&self) -> Option<&'a str> {
        match self {
            Subject::Task(t) => t.category.as_deref(),
            Subject::Habit(h) => h.category.as_deref(),
            Subject::Goal(g) => g.category.as_deref(),
        }
    }

    /// Resolve a field by name. `None` if the kind has no such field.
    pub fn value(&self, field: &str) -> Option<Value> {
        let optional_text = |s: Option<&str>| s.map_or(Value::Null, |s| Value::Text(s.to_string()));
        let optional_time = |t: Option<DateTime<Utc>>| t.map_or(Value::Null, Value::Time);

        let value = match (self, field) {
            (_, "id") => Value::Text(self.id().to_string()),
            (_, "category") => optional_text(self.category()),
            (Subject::Task(t), "tags") => Value::Tags(t.tags.iter().cloned().collect()),
            (Subject::Habit(h), "tags") => Value::Tags(h.tags.iter().cloned().collect()),
            (Subject::Goal(g), "tags") => Value::Tags(g.tags.iter().cloned().collect()),

            (Subject::Task(t), "title") => Value::Text(t.title.clone()),
            (Subject::Task(t), "priority") => Value::Priority(t.priority),
            (Subject::Task(t), "status") => Value::Status(t.status),
            (Subject::Task(t), "duration_minutes") => Value::Number(f64::from(t.duration_minutes)),
            (Subject::Task(t), "due") => optional_time(t.due),

            (Subject::Habit(h), "name") => Value::Text(h.name.clone()),
            (Subject::Habit(h), "streak_days") => Value::Number(f64::from(h.streak_days)),
            (Subject::Habit(h), "completed_today") => Value::Bool(h.completed_today),
            (Subject::Habit(h), "last_completed") => optional_time(h.last_completed),

            (Subject::Goal(g), "title") => Value::Text(g.title.clone()),
            (Subject::Goal(g), "progress") => Value::Number(g.progress),
            (Subject::Goal(g), "target_date") => optional_time(g.target_date),
            _ => return None,
        };
        Some(value)
    }

    /// Every field rendered as text, for message templates and payloads.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let names: &[&str] = match self {
            Subject::Task(_) => &[
                "id",
                "title",
                "priority",
                "status",
                "duration_minutes",
                "due",
                "category",
                "tags",
            ],
            Subject::Habit(_) => &[
                "id",
                "name",
                "streak_days",
                "completed_today",
                "last_completed",
                "category",
                "tags",
            ],
            Subject::Goal(_) => &["id", "title", "progress", "target_date", "category", "tags"],
        };

        let mut fields = BTreeMap::new();
        for name in names {
            if let Some(value) = self.value(name) {
                fields.insert((*name).to_string(), value.render());
            }
        }
        if let Subject::Goal(g) = self {
            fields.insert(
                "progress_percent".to_string(),
                format!("{:.0}", g.progress * 100.0),
            );
        }
        fields
    }
}
