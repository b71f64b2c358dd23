//! # Resolución de Recursos
//! src/files/resolver.rs
//!
//! Decide qué hay detrás de un path pedido por GET:
//!
//! ```text
//! "/"                       → "/index.html"
//! segmento ".."             → Forbidden
//! archivo regular           → StaticFile (tipo por extensión, gzip opcional)
//! directorio                → Directory (si hay listado) o Forbidden
//! nada + datos de formulario → DynamicProgram (si existe el ejecutable)
//! nada                      → Missing
//! ```
//!
//! Nada se cachea: cada request vuelve a leer el disco.

use crate::cgi;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extensiones que se comprimen si el cliente acepta gzip
///
/// `html`, `txt`, `css` y `js` quedan fuera a propósito.
pub const COMPRESSIBLE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "mp3", "wav", "mp4", "pdf"];

/// Content-Type para extensiones desconocidas
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Tabla fija de tipos MIME por extensión (en minúsculas)
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "pdf" => "application/pdf",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub fn is_compressible(extension: &str) -> bool {
    COMPRESSIBLE_EXTENSIONS.contains(&extension)
}

/// Extensión en minúsculas, o "" si no tiene
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Une un path de URL a una raíz sin permitir salir de ella
///
/// Retorna `None` si algún segmento es `..`.
pub fn safe_join(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();

    for segment in url_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\0') => return None,
            s => joined.push(s),
        }
    }

    Some(joined)
}

/// Lo que se va a servir para un path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedResource {
    /// Archivo regular del document root
    StaticFile {
        body: Vec<u8>,
        content_type: &'static str,
        /// Extensión comprimible y el cliente acepta gzip
        compressible: bool,
    },

    /// Listado HTML de un directorio
    Directory(String),

    /// Directorio sin listado habilitado, o path con `..`
    Forbidden,

    /// Ejecutable del program root que atenderá el formulario
    DynamicProgram(PathBuf),

    /// No hay nada en el path
    Missing,
}

/// Resolver de paths contra el document root
#[derive(Debug, Clone)]
pub struct Resolver {
    document_root: PathBuf,
    program_root: PathBuf,
    directory_listing: bool,
}

impl Resolver {
    pub fn new(document_root: impl Into<PathBuf>, program_root: impl Into<PathBuf>, directory_listing: bool) -> Self {
        Self {
            document_root: document_root.into(),
            program_root: program_root.into(),
            directory_listing,
        }
    }

    /// Resuelve un path de GET
    ///
    /// * `form_data` - query string; si no está vacía y no hay archivo,
    ///   se busca un programa en el program root
    /// * `accepts_gzip` - el cliente envió `Accept-Encoding` con "gzip"
    ///
    /// Solo falla si el archivo existe pero no se puede leer.
    pub fn resolve(&self, path: &str, form_data: &str, accepts_gzip: bool) -> io::Result<ServedResource> {
        let path = if path == "/" { "/index.html" } else { path };

        let Some(fs_path) = safe_join(&self.document_root, path) else {
            return Ok(ServedResource::Forbidden);
        };

        if fs_path.is_file() {
            let body = fs::read(&fs_path)?;
            let extension = extension_of(&fs_path);

            return Ok(ServedResource::StaticFile {
                body,
                content_type: content_type_for(&extension),
                compressible: accepts_gzip && is_compressible(&extension),
            });
        }

        if fs_path.is_dir() {
            if !self.directory_listing {
                return Ok(ServedResource::Forbidden);
            }
            return Ok(ServedResource::Directory(directory_listing(&fs_path, path)?));
        }

        if !form_data.is_empty() {
            if let Some(program) = cgi::find_program(&self.program_root, path) {
                return Ok(ServedResource::DynamicProgram(program));
            }
        }

        Ok(ServedResource::Missing)
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn directory_listing(&self) -> bool {
        self.directory_listing
    }
}

/// Escapa texto para insertarlo en HTML
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Genera el listado HTML de un directorio, ordenado por nombre
///
/// Los subdirectorios llevan `/` al final.
fn directory_listing(dir: &Path, url_path: &str) -> io::Result<String> {
    let mut entries: Vec<(String, bool)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path().is_dir()))
        .collect();
    // Se ordena por nombre; el `/` de los directorios se agrega después
    entries.sort();

    let base = if url_path.ends_with('/') {
        url_path.to_string()
    } else {
        format!("{}/", url_path)
    };
    let title = html_escape(url_path);

    let mut html = format!(
        "<!DOCTYPE html><html><head><title>Index of {0}</title></head><body><h1>Index of {0}</h1><hr><pre>",
        title
    );
    for (name, is_dir) in &entries {
        let suffix = if *is_dir { "/" } else { "" };
        let escaped = html_escape(&format!("{}{}", name, suffix));
        html.push_str(&format!(
            "<a href=\"{}{}\">{}</a>\n",
            html_escape(&base),
            escaped,
            escaped
        ));
    }
    html.push_str("</pre><hr></body></html>");

    Ok(html)
}
