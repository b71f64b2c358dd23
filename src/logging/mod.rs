//! # Logs de Acceso y de Errores
//! src/logging/mod.rs
//!
//! Dos destinos append-only compartidos por todos los workers:
//!
//! ```text
//! [19/Oct/2026:14:03:11 +0200] 192.168.1.5 - GET /index.html HTTP/1.1
//! [19/Oct/2026:14:03:12 +0200] ERROR: form program exited with status 1
//! ```
//!
//! Cada línea se escribe con un solo `write_all` mientras se tiene el
//! `Mutex` del archivo, así dos workers nunca intercalan líneas parciales.
//! Además cada entrada se emite como evento de `tracing`.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Destinos de log del servidor
#[derive(Debug, Default)]
pub struct Logger {
    access: Option<Mutex<File>>,
    error: Option<Mutex<File>>,
}

impl Logger {
    /// Logger sin archivos: solo emite eventos de `tracing`
    pub fn new() -> Self {
        Self::default()
    }

    /// Abre (en modo append) los archivos de log indicados
    ///
    /// Crea los directorios padre si no existen.
    pub fn open(access_log: Option<&Path>, error_log: Option<&Path>) -> io::Result<Self> {
        Ok(Self {
            access: access_log.map(open_append).transpose()?.map(Mutex::new),
            error: error_log.map(open_append).transpose()?.map(Mutex::new),
        })
    }

    /// Registra una línea en el log de acceso
    pub fn log_access(&self, message: &str) {
        tracing::info!(target: "myweb::access", "{}", message);
        let line = format!("[{}] {}\n", timestamp(), message);
        write_line(&self.access, &line);
    }

    /// Registra una línea en el log de errores
    pub fn log_error(&self, message: &str) {
        tracing::error!(target: "myweb::error", "{}", message);
        let line = format!("[{}] ERROR: {}\n", timestamp(), message);
        write_line(&self.error, &line);
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn write_line(sink: &Option<Mutex<File>>, line: &str) {
    let Some(sink) = sink else {
        return;
    };

    let mut file = sink.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
        // No hay otro lugar donde reportarlo
        tracing::warn!("no se pudo escribir en el log: {}", e);
    }
}

/// Inicializa el subscriber de `tracing` para el binario
///
/// El nivel se controla con `RUST_LOG`; por defecto `myweb=info`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myweb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
