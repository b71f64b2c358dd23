//! # Seguridad: Control de Acceso por Red
//!
//! - `rule`: reglas CIDR y su comparación bit a bit
//! - `policy`: evaluación ordenada accept/reject con veredicto por defecto

pub mod policy;
pub mod rule;

pub use policy::{AccessPolicy, AccessVerdict, Decision, EvaluationOrder};
pub use rule::{NetworkRule, RuleError};
