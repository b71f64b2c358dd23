//! # Archivos Estáticos
//!
//! Resolución de paths contra el document root, tablas de tipos MIME y
//! extensiones comprimibles, y listados de directorio.

pub mod resolver;

pub use resolver::{content_type_for, html_escape, is_compressible, safe_join, Resolver, ServedResource};
