//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Contadores de requests por código, latencia promedio y conexiones
//! activas, compartidos entre todos los workers.

pub mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};
