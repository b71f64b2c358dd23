//! # Servidor TCP
//! src/server/tcp.rs
//!
//! Acceptor y manejo de conexiones. Cada conexión aceptada se entrega al
//! [`WorkerPool`]; si todos los workers están ocupados, el acceptor espera.
//!
//! ```text
//! accept ─▶ pool ─▶ leer request ─▶ control de acceso ─▶ router ─▶ escribir respuesta ─▶ cerrar
//!                        │                  │
//!                   sin datos: cerrar    denegado: 403
//! ```
//!
//! Una conexión atiende un solo request y siempre se cierra al final, haya
//! fallado o no.

use super::pool::{panic_message, WorkerPool};
use crate::cgi::Dispatcher;
use crate::config::{Config, ConfigError};
use crate::files::Resolver;
use crate::http::{ParseOutcome, Request, Response, StatusCode};
use crate::logging::Logger;
use crate::metrics::MetricsCollector;
use crate::router::Router;
use crate::security::AccessPolicy;
use crate::status::SystemStatus;
use std::io::{self, BufReader};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errores al levantar el servidor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuración inválida: {0}")]
    Config(#[from] ConfigError),

    #[error("error de E/S: {0}")]
    Io(#[from] io::Error),
}

/// Estado compartido (solo lectura) por todos los workers
struct Context {
    policy: AccessPolicy,
    router: Router,
    log: Arc<Logger>,
    metrics: MetricsCollector,
}

impl Context {
    fn from_config(config: &Config) -> Result<Self, ServerError> {
        config.validate()?;
        let policy = config.access_policy()?;
        let log = Arc::new(Logger::open(
            config.access_log.as_deref(),
            config.error_log.as_deref(),
        )?);
        let metrics = MetricsCollector::new();

        let mut router = Router::new(
            Resolver::new(
                config.document_root.clone(),
                config.program_root.clone(),
                config.indexes,
            ),
            Dispatcher::new(config.program_root.clone()),
            Arc::clone(&log),
        );
        router.register_status(Arc::new(SystemStatus::new(metrics.clone())));

        Ok(Self {
            policy,
            router,
            log,
            metrics,
        })
    }
}

/// Servidor HTTP/1.1 con pool de workers acotado
pub struct Server {
    ctx: Arc<Context>,
    listener: TcpListener,
    pool: WorkerPool,
    stopping: Arc<AtomicBool>,
}

/// Permite detener un servidor que está en [`Server::run`] desde otro thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stopping: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Pide al acceptor que termine
    ///
    /// Marca el flag y abre una conexión local para despertar el `accept`
    /// bloqueado. Los requests en curso terminan normalmente.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = TcpStream::connect_timeout(&self.wake_addr, Duration::from_secs(1)) {
            tracing::warn!("no se pudo despertar al acceptor: {}", e);
        }
    }
}

impl Server {
    /// Valida la configuración, prepara los colaboradores y abre el socket
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let ctx = Context::from_config(&config)?;
        let listener = TcpListener::bind(config.address())?;
        let pool = WorkerPool::new(config.workers);

        tracing::info!(
            "escuchando en {} con {} workers",
            listener.local_addr()?,
            pool.size()
        );

        Ok(Self {
            ctx: Arc::new(ctx),
            listener,
            pool,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Dirección real del socket (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        let mut wake_addr = self.local_addr()?;
        // No se puede conectar a 0.0.0.0 / ::
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(match wake_addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }

        Ok(ShutdownHandle {
            stopping: Arc::clone(&self.stopping),
            wake_addr,
        })
    }

    /// Loop del acceptor; retorna cuando se pide el shutdown
    ///
    /// Antes de retornar espera a que los workers terminen lo que están
    /// atendiendo.
    pub fn run(mut self) -> io::Result<()> {
        for stream in self.listener.incoming() {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => {
                    let ctx = Arc::clone(&self.ctx);
                    if self.pool.execute(move || handle_connection(stream, &ctx)).is_err() {
                        self.ctx.log.log_error("el pool de workers se cerró");
                        break;
                    }
                }
                Err(e) => {
                    self.ctx.log.log_error(&format!("Error aceptando conexión: {}", e));
                }
            }
        }

        tracing::info!("deteniendo servidor, esperando conexiones en curso");
        self.pool.join();
        tracing::info!("servidor detenido");
        Ok(())
    }
}

/// Atiende una conexión completa y la cierra
///
/// Los errores de E/S y los panics solo afectan a esta conexión: se
/// registran en el log de errores y no se propagan.
fn handle_connection(stream: TcpStream, ctx: &Context) {
    ctx.metrics.connection_opened();

    let client = stream
        .peer_addr()
        .map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    match panic::catch_unwind(AssertUnwindSafe(|| serve(&stream, &client, ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => ctx.log.log_error(&format!("Error atendiendo a {}: {}", client, e)),
        Err(panic) => ctx.log.log_error(&format!(
            "Panic atendiendo a {}: {}",
            client,
            panic_message(&*panic)
        )),
    }

    let _ = stream.shutdown(Shutdown::Both);
    ctx.metrics.connection_closed();
}

fn serve(stream: &TcpStream, client: &str, ctx: &Context) -> io::Result<()> {
    let start = Instant::now();
    let mut reader = BufReader::new(stream);

    let (request_line, parsed) = match Request::read_from(&mut reader)? {
        ParseOutcome::NoRequest => return Ok(()),
        ParseOutcome::Request(request) => (request.request_line().to_string(), Ok(request)),
        ParseOutcome::Malformed {
            request_line,
            error,
        } => (request_line, Err(error)),
    };

    let response = if !ctx.policy.check(client, &ctx.log).is_allowed() {
        ctx.log
            .log_access(&format!("{} - FORBIDDEN - {}", client, request_line));
        Response::error(StatusCode::Forbidden)
    } else {
        ctx.log.log_access(&format!("{} - {}", client, request_line));
        match parsed {
            Ok(request) => {
                let request = request.read_body(&mut reader)?;
                ctx.router.route(&request)
            }
            Err(error) => {
                tracing::debug!("{} - request inválido: {}", client, error);
                Response::error(StatusCode::BadRequest)
            }
        }
    };

    ctx.metrics
        .record_request(response.status().as_u16(), start.elapsed());

    let mut writer = stream;
    response.write_to(&mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::thread;
    use tempfile::{tempdir, TempDir};

    fn ephemeral_listener() -> TcpListener {
        TcpListener::bind("127.0.0.1:0").expect("bind")
    }

    fn test_config(docs: &TempDir) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            document_root: docs.path().to_path_buf(),
            program_root: docs.path().join("programs"),
            workers: 2,
            ..Config::default()
        }
    }

    fn docs() -> TempDir {
        let docs = tempdir().unwrap();
        fs::write(docs.path().join("index.html"), "<h1>hola</h1>").unwrap();
        docs
    }

    /// Acepta una sola conexión, la atiende y retorna el texto recibido
    fn exchange(ctx: Context, raw: &[u8]) -> (String, Arc<Context>) {
        let listener = ephemeral_listener();
        let addr = listener.local_addr().unwrap();
        let ctx = Arc::new(ctx);

        let t = thread::spawn({
            let ctx = Arc::clone(&ctx);
            move || {
                let (stream, _) = listener.accept().unwrap();
                handle_connection(stream, &ctx);
            }
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(raw).unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        t.join().unwrap();

        (String::from_utf8_lossy(&buf).into_owned(), ctx)
    }

    #[test]
    fn test_handle_connection_get_ok() {
        let docs = docs();
        let ctx = Context::from_config(&test_config(&docs)).unwrap();

        let (text, ctx) = exchange(ctx, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 13\r\n"));
        assert!(text.ends_with("<h1>hola</h1>"));

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.active_connections, 0);
    }

    #[test]
    fn test_handle_connection_rejected_client() {
        let docs = docs();
        let mut config = test_config(&docs);
        config.reject_rules = vec!["127.0.0.0/8".to_string()];
        config.order = crate::config::OrderArg::Reject;
        let ctx = Context::from_config(&config).unwrap();

        let (text, _) = exchange(ctx, b"GET /index.html HTTP/1.1\r\n\r\n");

        assert!(text.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(!text.contains("hola"));
    }

    #[test]
    fn test_handle_connection_access_log_lines() {
        let docs = docs();
        let logs = tempdir().unwrap();
        let access = logs.path().join("access.log");
        let mut config = test_config(&docs);
        config.accept_rules = vec!["127.0.0.1".to_string()];
        config.access_log = Some(access.clone());
        let ctx = Context::from_config(&config).unwrap();

        let (text, _) = exchange(ctx, b"GET /index.html HTTP/1.1\r\n\r\n");
        assert!(text.starts_with("HTTP/1.1 200 OK"));

        let log = fs::read_to_string(&access).unwrap();
        assert!(log.contains("127.0.0.1 - ACCEPTED by rule: 127.0.0.1"));
        assert!(log.contains("127.0.0.1 - GET /index.html HTTP/1.1"));
    }

    #[test]
    fn test_handle_connection_parse_error() {
        let docs = docs();
        let ctx = Context::from_config(&test_config(&docs)).unwrap();

        // Un solo token en la request line
        let (text, _) = exchange(ctx, b"\x00\x01\x02\x03garbage\r\n\r\n");

        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_handle_connection_unsupported_method() {
        let docs = docs();
        let ctx = Context::from_config(&test_config(&docs)).unwrap();

        let (text, _) = exchange(ctx, b"DELETE /index.html HTTP/1.1\r\n\r\n");

        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }

    #[test]
    fn test_handler_panic_is_logged_and_connection_released() {
        let docs = docs();
        let logs = tempdir().unwrap();
        let error_log = logs.path().join("error.log");
        let mut config = test_config(&docs);
        config.error_log = Some(error_log.clone());
        let mut ctx = Context::from_config(&config).unwrap();
        ctx.router.register("/boom", |_req| panic!("handler exploded"));

        let (text, ctx) = exchange(ctx, b"GET /boom HTTP/1.1\r\n\r\n");

        assert!(text.is_empty());
        assert_eq!(ctx.metrics.snapshot().active_connections, 0);
        let log = fs::read_to_string(&error_log).unwrap();
        assert!(log.contains("Panic atendiendo a 127.0.0.1: handler exploded"));
    }

    #[test]
    fn test_handle_connection_peer_closed_immediately() {
        let docs = docs();
        let ctx = Arc::new(Context::from_config(&test_config(&docs)).unwrap());
        let listener = ephemeral_listener();
        let addr = listener.local_addr().unwrap();

        let t = thread::spawn({
            let ctx = Arc::clone(&ctx);
            move || {
                let (stream, _) = listener.accept().unwrap();
                handle_connection(stream, &ctx);
            }
        });

        // Conecta y cierra sin mandar datos: no hay respuesta
        drop(TcpStream::connect(addr).unwrap());
        t.join().unwrap();

        assert_eq!(ctx.metrics.snapshot().total_requests, 0);
    }

    #[test]
    fn test_bind_rejects_bad_rule() {
        let docs = docs();
        let mut config = test_config(&docs);
        config.accept_rules = vec!["10.0.0.0/33".to_string()];

        assert!(matches!(Server::bind(config), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_run_and_shutdown() {
        let docs = docs();
        let server = Server::bind(test_config(&docs)).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.shutdown_handle().unwrap();

        let t = thread::spawn(move || server.run());

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET /index.html HTTP/1.1\r\n\r\n").unwrap();
        let mut buf = String::new();
        client.read_to_string(&mut buf).unwrap();
        assert!(buf.starts_with("HTTP/1.1 200 OK"));

        handle.shutdown();
        t.join().unwrap().unwrap();
    }

    #[test]
    fn test_shutdown_handle_wakes_unspecified_host_on_loopback() {
        let docs = docs();
        let mut config = test_config(&docs);
        config.host = "0.0.0.0".to_string();
        let server = Server::bind(config).unwrap();

        let handle = server.shutdown_handle().unwrap();
        assert_eq!(handle.wake_addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(handle.wake_addr.port(), server.local_addr().unwrap().port());
    }
}
