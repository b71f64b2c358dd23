//! # Módulo HTTP
//!
//! Implementa el subconjunto de HTTP/1.1 que usa el servidor, sin
//! librerías de alto nivel:
//!
//! - Parsing de requests línea por línea desde la conexión
//! - Escritura de responses con compresión gzip opcional
//! - Códigos de estado
//!
//! Cada conexión lleva exactamente un request y una respuesta; después se
//! cierra (sin keep-alive, sin pipelining, sin chunked).

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, ParseOutcome, Request};
pub use response::{Response, HTML_CONTENT_TYPE};
pub use status::StatusCode;
