//! # Construcción y Escritura de Respuestas HTTP
//!
//! Todas las respuestas del servidor (200/400/403/404/405/500) pasan por
//! [`Response::write_to`], que siempre emite los headers en el mismo orden:
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: image/png\r\n
//! Content-Encoding: gzip\r\n        (solo si se comprimió)
//! Content-Length: 1834\r\n          (longitud final, ya comprimida)
//! \r\n
//! <body>
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use myweb::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_content_type("text/plain; charset=utf-8")
//!     .with_body("Hello");
//!
//! let bytes = response.to_bytes().unwrap();
//! assert!(bytes.ends_with(b"\r\n\r\nHello"));
//! ```

use super::StatusCode;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Content-Type de las páginas generadas por el servidor
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Representa una respuesta HTTP completa, lista para escribirse una vez
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    content_type: String,

    /// Body sin comprimir
    body: Vec<u8>,

    /// Si es true, el writer comprime el body con gzip
    gzip: bool,
}

impl Response {
    /// Crea una respuesta vacía de tipo HTML
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: HTML_CONTENT_TYPE.to_string(),
            body: Vec::new(),
            gzip: false,
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Establece el cuerpo de la respuesta desde un string
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.as_bytes().to_vec();
        self
    }

    /// Establece el cuerpo de la respuesta desde bytes
    ///
    /// Útil para archivos binarios (imágenes, audio, pdf, etc.)
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Marca la respuesta para comprimirse con gzip al escribirse
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Página HTML de 200 OK
    pub fn html(body: &str) -> Self {
        Self::new(StatusCode::Ok).with_body(body)
    }

    /// Página HTML mínima para un código de error
    ///
    /// Nunca incluye detalles internos; esos van al log de errores.
    ///
    /// # Ejemplo
    /// ```
    /// use myweb::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound);
    /// assert_eq!(response.body(), b"<html><body><h1>404 Not Found</h1></body></html>");
    /// ```
    pub fn error(status: StatusCode) -> Self {
        let body = format!("<html><body><h1>{}</h1></body></html>", status);
        Self::new(status).with_body(&body)
    }

    /// Body final tal como viajará por el socket
    fn encoded_body(&self) -> io::Result<Vec<u8>> {
        if !self.gzip {
            return Ok(self.body.clone());
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.body)?;
        encoder.finish()
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket
    ///
    /// El `Content-Length` se calcula sobre el body final, después de la
    /// compresión.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let body = self.encoded_body()?;

        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\n",
            self.status, self.content_type
        );
        if self.gzip {
            head.push_str("Content-Encoding: gzip\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));

        let mut result = Vec::with_capacity(head.len() + body.len());
        result.extend_from_slice(head.as_bytes());
        result.extend_from_slice(&body);
        Ok(result)
    }

    /// Escribe la respuesta completa en la conexión
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Body sin comprimir
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_gzip(&self) -> bool {
        self.gzip
    }
}
