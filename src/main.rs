//! # MyWeb - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor HTTP/1.1.
//!
//! SIGINT y SIGTERM se bloquean antes de crear cualquier thread (los
//! workers heredan la máscara) y se esperan en un thread dedicado que
//! dispara el shutdown cooperativo.

use myweb::config::Config;
use myweb::logging::init_tracing;
use myweb::server::{Server, ShutdownHandle};
use nix::sys::signal::{SigSet, Signal};
use std::thread;

fn main() {
    init_tracing();

    println!("=================================");
    println!("  MyWeb HTTP/1.1 Server");
    println!("=================================\n");

    let config = Config::new();

    if let Err(e) = config.validate() {
        eprintln!("💥 Configuración inválida: {}", e);
        std::process::exit(1);
    }

    println!("⚙️  Configuración:");
    config.print_summary();

    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    if let Err(e) = signals.thread_block() {
        eprintln!("💥 No se pudieron bloquear las señales: {}", e);
        std::process::exit(1);
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("💥 Error fatal: {}", e);
            std::process::exit(1);
        }
    };

    match server.shutdown_handle() {
        Ok(handle) => spawn_signal_waiter(signals, handle),
        Err(e) => tracing::warn!("sin manejo de señales: {}", e),
    }

    // Bloquea hasta el shutdown
    if let Err(e) = server.run() {
        eprintln!("💥 Error fatal: {}", e);
        std::process::exit(1);
    }
}

fn spawn_signal_waiter(signals: SigSet, handle: ShutdownHandle) {
    let spawned = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || match signals.wait() {
            Ok(signal) => {
                tracing::info!("señal {} recibida", signal);
                handle.shutdown();
            }
            Err(e) => tracing::error!("error esperando señales: {}", e),
        });

    if let Err(e) = spawned {
        tracing::warn!("sin manejo de señales: {}", e);
    }
}
