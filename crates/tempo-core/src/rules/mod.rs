//! Notification rules.
//!
//! Declarative rules over task, habit and goal state. The engine evaluates
//! them against a snapshot and emits notification candidates, honouring a
//! per-(workspace, rule, subject) cooldown.

pub mod cooldown;
pub mod defaults;
pub mod engine;
pub mod predicate;
pub mod rule;
pub mod store;
pub mod subject;

pub use cooldown::{CooldownKey, CooldownRecord, CooldownStore, ShardedCooldownStore};
pub use defaults::default_rules;
pub use engine::{Evaluation, RuleEngine};
pub use predicate::{CompareOp, Literal, Predicate, RelativeOp};
pub use rule::{render_template, NotificationRule, RuleAction};
pub use store::RuleStore;
pub use subject::{FieldType, Subject, SubjectKind, SubjectRef, Value};
