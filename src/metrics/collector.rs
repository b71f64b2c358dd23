//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Contadores del servidor que la página `/status` muestra.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Contador total de requests respondidos
    total_requests: u64,

    /// Requests por código de estado
    status_codes: BTreeMap<u16, u64>,

    /// Suma de latencias (microsegundos), para el promedio
    total_latency_us: u128,

    /// Conexiones atendidas en este momento
    active_connections: u64,
}

/// Copia de las métricas en un instante
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub average_latency_ms: f64,
    pub active_connections: u64,
    pub uptime: Duration,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    fn data(&self) -> std::sync::MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra un request respondido
    pub fn record_request(&self, status_code: u16, latency: Duration) {
        let mut data = self.data();
        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;
        data.total_latency_us += latency.as_micros();
    }

    /// Incrementa el contador de conexiones activas
    pub fn connection_opened(&self) {
        self.data().active_connections += 1;
    }

    /// Decrementa el contador de conexiones activas
    pub fn connection_closed(&self) {
        let mut data = self.data();
        data.active_connections = data.active_connections.saturating_sub(1);
    }

    /// Tiempo desde que arrancó el servidor
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();

        let average_latency_ms = if data.total_requests == 0 {
            0.0
        } else {
            data.total_latency_us as f64 / data.total_requests as f64 / 1000.0
        };

        MetricsSnapshot {
            total_requests: data.total_requests,
            status_codes: data.status_codes.clone(),
            average_latency_ms,
            active_connections: data.active_connections,
            uptime: self.uptime(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
