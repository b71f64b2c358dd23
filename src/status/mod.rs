//! # Página de Estado
//! src/status/mod.rs
//!
//! Genera el HTML de `GET /status`: memoria, disco, procesadores, sistema
//! operativo, procesos, uptime y contadores de requests.
//!
//! Lo que no se puede leer (por ejemplo `/proc` fuera de Linux) se muestra
//! como "no disponible" en vez de fallar.

use crate::files::html_escape;
use crate::metrics::MetricsCollector;
use std::fs;
use std::time::Duration;

/// Colaborador que el router consulta para `/status`
pub trait StatusReporter: Send + Sync {
    fn render_status(&self) -> String;
}

const UNAVAILABLE: &str = "no disponible";

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; background-color: #f5f5f5; }\n\
.container { background-color: white; padding: 30px; border-radius: 8px; }\n\
h1 { color: #333; border-bottom: 2px solid #4CAF50; padding-bottom: 10px; }\n\
.stat-item { margin: 15px 0; padding: 10px; background-color: #f9f9f9; border-left: 4px solid #4CAF50; }\n\
.stat-label { font-weight: bold; color: #555; }\n\
.stat-value { color: #2196F3; }\n";

/// Reporter con información del sistema y del servidor
#[derive(Clone)]
pub struct SystemStatus {
    metrics: MetricsCollector,
}

impl SystemStatus {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

impl StatusReporter for SystemStatus {
    fn render_status(&self) -> String {
        let snapshot = self.metrics.snapshot();
        let mut items: Vec<(&str, String)> = Vec::new();

        match meminfo() {
            Some((available, total)) => {
                items.push(("Memoria disponible", format_bytes(available)));
                items.push(("Memoria total", format_bytes(total)));
            }
            None => items.push(("Memoria", UNAVAILABLE.to_string())),
        }

        match disk_space("/") {
            Some((free, total)) => {
                items.push(("Espacio en disco disponible", format_bytes(free)));
                items.push(("Espacio en disco total", format_bytes(total)));
            }
            None => items.push(("Espacio en disco", UNAVAILABLE.to_string())),
        }

        let cpus = std::thread::available_parallelism()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| UNAVAILABLE.to_string());
        items.push(("Procesadores disponibles", cpus));
        items.push(("Sistema operativo", operating_system()));
        items.push((
            "Número de procesos",
            process_count()
                .map(|n| n.to_string())
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        ));
        items.push(("Uptime del servidor", format_uptime(snapshot.uptime)));
        items.push(("Requests atendidos", snapshot.total_requests.to_string()));
        items.push(("Conexiones activas", snapshot.active_connections.to_string()));
        items.push(("Latencia promedio", format!("{:.2} ms", snapshot.average_latency_ms)));

        let by_status = snapshot
            .status_codes
            .iter()
            .map(|(code, count)| format!("{}: {}", code, count))
            .collect::<Vec<_>>()
            .join(", ");
        if !by_status.is_empty() {
            items.push(("Respuestas por código", by_status));
        }

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<title>Estado del Servidor</title>\n");
        html.push_str(&format!("<style>\n{}</style>\n", STYLE));
        html.push_str("</head>\n<body>\n<div class='container'>\n<h1>Estado del Servidor MyWeb</h1>\n");
        for (label, value) in items {
            html.push_str(&format!(
                "<div class='stat-item'>\n<span class='stat-label'>{}:</span> <span class='stat-value'>{}</span>\n</div>\n",
                label,
                html_escape(&value)
            ));
        }
        html.push_str("</div>\n</body>\n</html>");
        html
    }
}

/// (MemAvailable, MemTotal) en bytes desde /proc/meminfo
fn meminfo() -> Option<(u64, u64)> {
    let text = fs::read_to_string("/proc/meminfo").ok()?;
    Some((
        meminfo_field(&text, "MemAvailable:")?,
        meminfo_field(&text, "MemTotal:")?,
    ))
}

fn meminfo_field(text: &str, key: &str) -> Option<u64> {
    let line = text.lines().find(|line| line.starts_with(key))?;
    let kb: u64 = line[key.len()..].split_whitespace().next()?.parse().ok()?;
    Some(kb * 1024)
}

/// (libre, total) en bytes del sistema de archivos de `path`
fn disk_space(path: &str) -> Option<(u64, u64)> {
    let stats = nix::sys::statvfs::statvfs(path).ok()?;
    let fragment = stats.fragment_size() as u64;
    Some((
        stats.blocks_available() as u64 * fragment,
        stats.blocks() as u64 * fragment,
    ))
}

fn operating_system() -> String {
    match fs::read_to_string("/proc/sys/kernel/osrelease") {
        Ok(release) => format!("{} {}", std::env::consts::OS, release.trim()),
        Err(_) => std::env::consts::OS.to_string(),
    }
}

/// Cuenta los directorios numéricos de /proc
fn process_count() -> Option<usize> {
    let entries = fs::read_dir("/proc").ok()?;
    Some(
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().bytes().all(|b| b.is_ascii_digit()))
            .count(),
    )
}

/// Formatea bytes con unidades binarias (1536 → "1.5 KB")
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    value /= 1024.0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, UNITS[unit])
}

/// Formatea un uptime con las dos unidades más grandes
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} día(s), {} hora(s)", days, hours % 24)
    } else if hours > 0 {
        format!("{} hora(s), {} minuto(s)", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{} minuto(s), {} segundo(s)", minutes, seconds % 60)
    } else {
        format!("{} segundo(s)", seconds)
    }
}
