//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones y las reparte a un pool fijo de workers
//! 3. Lee el request, aplica el control de acceso y lo enruta
//! 4. Escribe una sola respuesta y cierra la conexión

pub mod pool;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use pool::{PoolClosed, WorkerPool};
pub use tcp::{Server, ServerError, ShutdownHandle};
