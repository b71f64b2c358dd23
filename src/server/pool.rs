//! # Pool de Workers
//! src/server/pool.rs
//!
//! Número fijo de threads que atienden conexiones. El envío de trabajo usa
//! un canal síncrono de capacidad 0 (rendezvous):
//!
//! ```text
//! acceptor ──execute()──▶ [sync_channel(0)] ──▶ worker libre
//!            bloquea mientras no haya un worker esperando en recv()
//! ```
//!
//! Así no hay cola sin límite ni rechazos: con todos los workers ocupados,
//! el acceptor simplemente espera.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// El pool ya se cerró y no acepta trabajo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool is shut down")]
pub struct PoolClosed;

/// Pool de tamaño fijo con envío bloqueante
pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Crea el pool y arranca `size` workers
    ///
    /// `size` debe ser al menos 1 (lo garantiza `Config::validate`).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Job>(0);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn(move || Self::worker_loop(id, receiver))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!("no se pudo crear un worker: {}", e);
                    None
                }
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Loop principal del worker
    fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
        tracing::debug!("worker {} listo", id);

        loop {
            // El lock se suelta antes de ejecutar el trabajo
            let job = {
                let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                receiver.recv()
            };

            let Ok(job) = job else {
                break;
            };

            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
                tracing::error!("worker {}: panic en un trabajo: {}", id, panic_message(&*panic));
            }
        }

        tracing::debug!("worker {} terminado", id);
    }

    /// Entrega un trabajo a un worker libre, esperando si no hay ninguno
    pub fn execute<F>(&self, job: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| PoolClosed)
    }

    /// Número de workers vivos al crear el pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Cierra el pool y espera a que terminen los trabajos en curso
    pub fn join(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("un worker terminó con panic");
            }
        }
    }
}

/// Texto de un panic capturado con `catch_unwind`
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}
