//! # Parsing de Requests HTTP/1.x
//! src/http/request.rs
//!
//! Parser línea por línea sobre cualquier `BufRead` (normalmente el
//! `TcpStream` del cliente envuelto en un `BufReader`).
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /cgi/submit HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! Content-Length: 15\r\n
//! \r\n
//! name=John%20Doe
//! ```
//!
//! ## Fases
//!
//! 1. **Request Line**: `METHOD SP TARGET SP VERSION` (la versión se ignora)
//! 2. **Headers**: `Name: Value` hasta la primera línea vacía
//! 3. **Body**: exactamente `Content-Length` bytes, leído aparte con
//!    [`Request::read_body`] una vez que el cliente pasó el control de acceso

use std::collections::HashMap;
use std::io::{self, BufRead, Read};
use thiserror::Error;

/// Tamaño máximo de la request line (y de cada header)
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// Tamaño máximo de todos los headers juntos
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Método HTTP del request
///
/// Solo GET y POST se atienden; cualquier otro token se conserva para
/// responder 405 en vez de tratarlo como error de parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    Other(String),
}

impl Method {
    fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            other => Method::Other(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::Other(token) => token,
        }
    }
}

/// Errores de protocolo del cliente
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// La request line no tiene al menos METHOD y TARGET
    #[error("invalid request line: {0:?}")]
    InvalidRequestLine(String),

    /// Content-Length no es un entero no negativo
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("request line longer than {0} bytes")]
    RequestLineTooLong(usize),

    #[error("header block larger than {0} bytes")]
    HeadersTooLarge(usize),
}

/// Resultado de intentar leer un request de una conexión
#[derive(Debug)]
pub enum ParseOutcome {
    /// Request line y headers válidos
    Request(Request),

    /// La conexión se cerró sin datos o la primera línea está vacía
    NoRequest,

    /// Hubo datos pero no forman un request utilizable
    Malformed {
        request_line: String,
        error: ParseError,
    },
}

/// Un request HTTP ya parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Primera línea tal cual llegó, para los logs
    request_line: String,

    /// Path sin la query (ej: "/cgi/submit")
    path: String,

    /// Target completo de la request line, con la query si la hay
    target: String,

    /// Todo lo que sigue al primer '?' (puede estar vacío)
    query: String,

    /// Headers con la clave en minúsculas; el último repetido gana
    headers: HashMap<String, String>,

    content_length: Option<usize>,

    body: Option<Vec<u8>>,
}

/// Resultado de leer una línea con límite de tamaño
enum Line {
    Eof,
    Complete { text: String, consumed: usize },
    /// Se llegó al límite sin ver `\n`; lleva el comienzo de la línea
    TooLong(String),
}

/// Lee una línea sin el terminador `\n` / `\r\n`
///
/// `limit` no cuenta el terminador. Nunca consume más de `limit + 2`
/// bytes del reader.
fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<Line> {
    let mut buf = Vec::new();
    let consumed = Read::take(&mut *reader, limit as u64 + 2).read_until(b'\n', &mut buf)?;
    if consumed == 0 {
        return Ok(Line::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > limit {
        buf.truncate(64);
        return Ok(Line::TooLong(String::from_utf8_lossy(&buf).into_owned()));
    }

    Ok(Line::Complete {
        text: String::from_utf8_lossy(&buf).into_owned(),
        consumed,
    })
}

impl Request {
    /// Lee request line y headers desde la conexión
    ///
    /// Los errores de E/S del socket se propagan; los problemas de
    /// protocolo se reportan como [`ParseOutcome::Malformed`].
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use myweb::http::{Method, ParseOutcome, Request};
    /// use std::io::Cursor;
    ///
    /// let mut raw = Cursor::new(&b"GET /form?name=ana HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
    /// let ParseOutcome::Request(request) = Request::read_from(&mut raw).unwrap() else {
    ///     panic!("expected a request");
    /// };
    ///
    /// assert_eq!(request.method(), &Method::GET);
    /// assert_eq!(request.path(), "/form");
    /// assert_eq!(request.query(), "name=ana");
    /// ```
    pub fn read_from<R: BufRead>(reader: &mut R) -> io::Result<ParseOutcome> {
        let request_line = match read_line(reader, MAX_LINE_BYTES)? {
            Line::Complete { text, .. } if !text.trim().is_empty() => text,
            Line::TooLong(request_line) => {
                return Ok(ParseOutcome::Malformed {
                    request_line,
                    error: ParseError::RequestLineTooLong(MAX_LINE_BYTES),
                })
            }
            _ => return Ok(ParseOutcome::NoRequest),
        };

        let headers = match Self::read_headers(reader)? {
            Ok(headers) => headers,
            Err(error) => return Ok(ParseOutcome::Malformed { request_line, error }),
        };

        let mut parts = request_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next()) {
            (Some(method), Some(target)) => (Method::from_token(method), target),
            _ => {
                return Ok(ParseOutcome::Malformed {
                    error: ParseError::InvalidRequestLine(request_line.clone()),
                    request_line,
                })
            }
        };

        let content_length = match headers.get("content-length") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(len) => Some(len),
                Err(_) => {
                    return Ok(ParseOutcome::Malformed {
                        error: ParseError::InvalidContentLength(value.clone()),
                        request_line,
                    })
                }
            },
            None => None,
        };

        // Solo el primer '?' separa path y query
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };
        let target = target.to_string();

        Ok(ParseOutcome::Request(Request {
            method,
            request_line,
            path,
            target,
            query,
            headers,
            content_length,
            body: None,
        }))
    }

    /// Parsea headers hasta la línea vacía
    ///
    /// Una línea sin `": "` se descarta sin más. Si el bloque completo
    /// supera [`MAX_HEADER_BYTES`] (o una línea supera [`MAX_LINE_BYTES`])
    /// se deja de leer.
    fn read_headers<R: BufRead>(
        reader: &mut R,
    ) -> io::Result<Result<HashMap<String, String>, ParseError>> {
        let mut headers = HashMap::new();
        let mut total = 0;

        loop {
            let line = match read_line(reader, MAX_LINE_BYTES)? {
                Line::Eof => break,
                Line::TooLong(_) => return Ok(Err(ParseError::HeadersTooLarge(MAX_HEADER_BYTES))),
                Line::Complete { text, consumed } => {
                    total += consumed;
                    text
                }
            };

            if total > MAX_HEADER_BYTES {
                return Ok(Err(ParseError::HeadersTooLarge(MAX_HEADER_BYTES)));
            }
            if line.is_empty() {
                break;
            }

            if let Some((name, value)) = line.split_once(": ") {
                headers.insert(name.to_ascii_lowercase(), value.to_string());
            }
        }

        Ok(Ok(headers))
    }

    /// Lee el body declarado por `Content-Length` (solo en POST)
    ///
    /// Sigue leyendo hasta completar la longitud declarada o hasta que el
    /// cliente cierre; si cierra antes, el body queda con lo recibido.
    pub fn read_body<R: Read>(mut self, reader: &mut R) -> io::Result<Self> {
        if self.method != Method::POST {
            return Ok(self);
        }

        if let Some(len) = self.content_length {
            let mut body = Vec::new();
            reader.take(len as u64).read_to_end(&mut body)?;
            if body.len() < len {
                tracing::warn!("body truncado: {} de {} bytes", body.len(), len);
            }
            self.body = Some(body);
        }

        Ok(self)
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request line original (ej: "GET / HTTP/1.1")
    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    /// Obtiene el path del request, sin query
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Target tal cual llegó (ej: "/status?x=1")
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Query string cruda, vacía si no había '?'
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Obtiene un header; el nombre no distingue mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Obtiene todos los headers (claves en minúsculas)
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Longitud declarada del body, si el cliente la envió
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Body leído por [`Request::read_body`]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Verifica si el cliente acepta respuestas comprimidas con gzip
    pub fn accepts_gzip(&self) -> bool {
        self.header("accept-encoding")
            .map(|value| value.contains("gzip"))
            .unwrap_or(false)
    }
}
