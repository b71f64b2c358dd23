//! # Programas de Formulario
//! src/cgi/mod.rs
//!
//! Los formularios (query string de un GET sin archivo, o body de un POST)
//! se entregan a un ejecutable del *program root*, que es un directorio
//! distinto del document root:
//!
//! ```text
//! POST /cgi/submit   body: name=John%20Doe&age=41
//!   → <program_root>/cgi/submit   con env  name="John Doe"  age="41"
//!   → stdout completo = body HTML de la respuesta 200
//! ```
//!
//! Cualquier fallo del programa (no arranca, termina con error o por señal)
//! se registra en el log de errores y el cliente recibe un 500 sin detalles.

use crate::files::safe_join;
use crate::http::{Response, StatusCode};
use crate::logging::Logger;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// Errores al despachar un formulario
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No hay ejecutable para el path
    #[error("no form program for {0}")]
    NotFound(String),

    /// El path intenta salir del program root
    #[error("path escapes program root: {0}")]
    Forbidden(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
}

impl DispatchError {
    /// Código HTTP que ve el cliente
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound(_) => StatusCode::NotFound,
            DispatchError::Forbidden(_) => StatusCode::Forbidden,
            DispatchError::Spawn { .. } | DispatchError::Failed { .. } => StatusCode::InternalServerError,
        }
    }
}

/// Busca un archivo regular ejecutable bajo `root`
pub fn find_program(root: &Path, url_path: &str) -> Option<PathBuf> {
    let candidate = safe_join(root, url_path)?;
    let metadata = candidate.metadata().ok()?;

    if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
        Some(candidate)
    } else {
        None
    }
}

/// Decodifica `k1=v1&k2=v2` (percent-encoding y '+' como espacio)
///
/// Los pares sin '=' se ignoran. También los que no pueden ser nombres de
/// variable de entorno (vacíos, con '=' o con NUL).
///
/// # Ejemplo
/// ```
/// use myweb::cgi::parse_form;
///
/// let fields = parse_form("name=John%20Doe&flag&city=S%C3%A3o+Paulo");
/// assert_eq!(fields, vec![
///     ("name".to_string(), "John Doe".to_string()),
///     ("city".to_string(), "São Paulo".to_string()),
/// ]);
/// ```
pub fn parse_form(data: &str) -> Vec<(String, String)> {
    data.split('&')
        .filter(|pair| pair.contains('='))
        .filter_map(|pair| url::form_urlencoded::parse(pair.as_bytes()).next())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .filter(|(key, value)| !key.is_empty() && !key.contains(['=', '\0']) && !value.contains('\0'))
        .collect()
}

/// Despachador de formularios hacia el program root
#[derive(Debug, Clone)]
pub struct Dispatcher {
    program_root: PathBuf,
}

impl Dispatcher {
    pub fn new(program_root: impl Into<PathBuf>) -> Self {
        Self {
            program_root: program_root.into(),
        }
    }

    pub fn program_root(&self) -> &Path {
        &self.program_root
    }

    /// Ubica el ejecutable para un path
    pub fn locate(&self, url_path: &str) -> Result<PathBuf, DispatchError> {
        if safe_join(&self.program_root, url_path).is_none() {
            return Err(DispatchError::Forbidden(url_path.to_string()));
        }
        find_program(&self.program_root, url_path).ok_or_else(|| DispatchError::NotFound(url_path.to_string()))
    }

    /// Ejecuta un programa con los campos del formulario como entorno
    ///
    /// Espera a que termine y retorna todo su stdout.
    pub fn execute(&self, program: &Path, form_data: &str) -> Result<String, DispatchError> {
        let output = Command::new(program)
            .envs(parse_form(form_data))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DispatchError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(DispatchError::Failed {
                program: program.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Ubica y ejecuta el programa de `url_path`, y arma la respuesta
    pub fn dispatch(&self, url_path: &str, form_data: &str, log: &Logger) -> Response {
        let result = self
            .locate(url_path)
            .and_then(|program| self.execute(&program, form_data));
        Self::into_response(result, log)
    }

    /// Ejecuta un programa ya ubicado y arma la respuesta
    pub fn run(&self, program: &Path, form_data: &str, log: &Logger) -> Response {
        Self::into_response(self.execute(program, form_data), log)
    }

    fn into_response(result: Result<String, DispatchError>, log: &Logger) -> Response {
        match result {
            Ok(output) => Response::html(&output),
            Err(e) => {
                if e.status().is_server_error() {
                    log.log_error(&format!("Error ejecutando formulario: {}", e));
                }
                Response::error(e.status())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_parse_form_repeated_key_keeps_both_in_order() {
        let fields = parse_form("a=1&a=2");
        assert_eq!(fields, vec![("a".into(), "1".into()), ("a".into(), "2".into())]);
    }

    #[test]
    fn test_parse_form_empty() {
        assert!(parse_form("").is_empty());
    }

    #[test]
    fn test_parse_form_skips_bad_names() {
        let fields = parse_form("=x&a%3Db=1&ok=%00&good=1");
        assert_eq!(fields, vec![("good".into(), "1".into())]);
    }

    #[test]
    fn test_find_program_requires_exec_bit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain"), "data").unwrap();
        script(&dir, "exec", "true");

        assert!(find_program(dir.path(), "/plain").is_none());
        assert!(find_program(dir.path(), "/exec").is_some());
        assert!(find_program(dir.path(), "/").is_none());
    }

    #[test]
    fn test_dispatch_sets_environment() {
        let dir = tempdir().unwrap();
        script(&dir, "cgi/submit", "printf 'Hola %s' \"$name\"");

        let dispatcher = Dispatcher::new(dir.path());
        let response = dispatcher.dispatch("/cgi/submit", "name=John%20Doe", &Logger::new());

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body(), b"Hola John Doe");
    }

    #[test]
    fn test_repeated_field_last_value_wins() {
        let dir = tempdir().unwrap();
        script(&dir, "pick", "printf '%s' \"$color\"");

        let output = Dispatcher::new(dir.path())
            .execute(&dir.path().join("pick"), "color=red&color=blue")
            .unwrap();
        assert_eq!(output, "blue");
    }

    #[test]
    fn test_empty_form_runs_program() {
        let dir = tempdir().unwrap();
        script(&dir, "hello", "echo hello");

        let response = Dispatcher::new(dir.path()).dispatch("/hello", "", &Logger::new());
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body(), b"hello\n");
    }

    #[test]
    fn test_missing_program_is_404() {
        let dir = tempdir().unwrap();
        let response = Dispatcher::new(dir.path()).dispatch("/nothing", "a=1", &Logger::new());
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_traversal_is_403() {
        let dir = tempdir().unwrap();
        let response = Dispatcher::new(dir.path()).dispatch("/../bin/sh", "", &Logger::new());
        assert_eq!(response.status(), StatusCode::Forbidden);
    }

    #[test]
    fn test_failing_program_is_500_and_logged() {
        let dir = tempdir().unwrap();
        script(&dir, "boom", "echo 'secret detail' >&2; exit 3");

        let logs = tempdir().unwrap();
        let error_log = logs.path().join("error.log");
        let logger = Logger::open(None, Some(&error_log)).unwrap();

        let response = Dispatcher::new(dir.path()).dispatch("/boom", "", &logger);

        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert!(!String::from_utf8_lossy(response.body()).contains("secret detail"));
        assert!(fs::read_to_string(&error_log).unwrap().contains("secret detail"));
    }

    #[test]
    fn test_unspawnable_program_is_500() {
        let dir = tempdir().unwrap();
        // Ejecutable sin intérprete válido
        let path = dir.path().join("broken");
        fs::write(&path, "#!/nonexistent/interpreter\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let result = Dispatcher::new(dir.path()).execute(&path, "");
        assert!(matches!(result, Err(DispatchError::Spawn { .. })));
    }
}
