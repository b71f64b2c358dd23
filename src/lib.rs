//! # MyWeb
//! src/lib.rs
//!
//! Servidor HTTP/1.1 mínimo con control de acceso por red, contenido
//! estático (con gzip para ciertos tipos), programas de formulario y una
//! página de estado.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: Parsing de requests y escritura de respuestas
//! - `config`: Configuración CLI / variables de entorno
//! - `server`: Acceptor, manejo de conexiones y pool de workers
//! - `router`: Decide qué colaborador atiende cada request
//! - `security`: Reglas CIDR y política de acceso
//! - `files`: Resolución de recursos estáticos y listados
//! - `cgi`: Ejecución de programas de formulario
//! - `logging`: Logs de acceso y de errores
//! - `metrics`: Contadores de requests
//! - `status`: Página `/status`
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use myweb::config::Config;
//! use myweb::server::Server;
//!
//! let config = Config::default();
//! let server = Server::bind(config).expect("Error al iniciar servidor");
//! server.run().expect("Error en el servidor");
//! ```

pub mod cgi;
pub mod config;
pub mod files;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod security;
pub mod server;
pub mod status;
