//! Domain services module

pub mod sla;
pub mod escalation;

pub use sla::{BreachDetector, BreachKind, DueDateCalculator, DueDates};
pub use escalation::EscalationRuleEvaluator;
