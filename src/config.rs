//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración inmutable construida una sola vez al arrancar, desde
//! argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./myweb --port 8080 \
//!   --document-root /var/www \
//!   --indexes \
//!   --reject 192.168.1.0/24 --accept 192.168.1.10 \
//!   --order accept --default accept \
//!   --access-log /tmp/var/log/myweb/access.log
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! MYWEB_PORT=8080 MYWEB_DOCUMENT_ROOT=/var/www ./myweb
//! ```

use crate::security::{AccessPolicy, AccessVerdict, EvaluationOrder, NetworkRule, RuleError};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

/// Errores de configuración: siempre fatales al arrancar
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("{0}")]
    Invalid(String),
}

/// Qué lista de reglas se revisa primero
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Accept,
    Reject,
}

/// Veredicto cuando ninguna regla coincide
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DefaultArg {
    Accept,
    Reject,
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "myweb")]
#[command(about = "Servidor HTTP/1.1 con control de acceso por red")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "MYWEB_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "MYWEB_HOST")]
    pub host: String,

    /// Directorio con el contenido estático
    #[arg(long, default_value = ".", env = "MYWEB_DOCUMENT_ROOT")]
    pub document_root: PathBuf,

    /// Directorio con los programas de formulario
    #[arg(long, default_value = "/tmp/usr/local/lib/myweb", env = "MYWEB_PROGRAM_ROOT")]
    pub program_root: PathBuf,

    /// Habilita el listado de directorios
    #[arg(long)]
    pub indexes: bool,

    /// Red aceptada (CIDR o IP), se puede repetir
    #[arg(long = "accept", value_name = "CIDR")]
    pub accept_rules: Vec<String>,

    /// Red rechazada (CIDR o IP), se puede repetir
    #[arg(long = "reject", value_name = "CIDR")]
    pub reject_rules: Vec<String>,

    /// Lista que se revisa primero
    #[arg(long, value_enum, default_value = "accept")]
    pub order: OrderArg,

    /// Veredicto si ninguna regla coincide
    #[arg(long = "default", value_enum, default_value = "accept")]
    pub default_policy: DefaultArg,

    /// Archivo del log de acceso
    #[arg(long, env = "MYWEB_ACCESS_LOG")]
    pub access_log: Option<PathBuf>,

    /// Archivo del log de errores
    #[arg(long, env = "MYWEB_ERROR_LOG")]
    pub error_log: Option<PathBuf>,

    /// Número de workers (conexiones atendidas a la vez)
    #[arg(short, long, default_value = "10", env = "MYWEB_WORKERS")]
    pub workers: usize,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use myweb::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Valida la configuración, incluidas las reglas de red
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be >= 1".to_string()));
        }
        if self.document_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("document root must not be empty".to_string()));
        }
        if self.program_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("program root must not be empty".to_string()));
        }

        self.access_policy()?;
        Ok(())
    }

    /// Construye la política de acceso a partir de las reglas
    ///
    /// Una regla mal escrita es un error de configuración.
    pub fn access_policy(&self) -> Result<AccessPolicy, ConfigError> {
        let parse_all = |rules: &[String]| -> Result<Vec<NetworkRule>, RuleError> {
            rules.iter().map(|rule| rule.parse()).collect()
        };

        let order = match self.order {
            OrderArg::Accept => EvaluationOrder::AcceptFirst,
            OrderArg::Reject => EvaluationOrder::RejectFirst,
        };
        let default = match self.default_policy {
            DefaultArg::Accept => AccessVerdict::Allow,
            DefaultArg::Reject => AccessVerdict::Deny,
        };

        Ok(AccessPolicy::new(
            parse_all(&self.accept_rules)?,
            parse_all(&self.reject_rules)?,
            order,
            default,
        ))
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("🌐 Network:");
        println!("   Address:       {}", self.address());
        println!("   Workers:       {}", self.workers);
        println!();
        println!("📁 Content:");
        println!("   DocumentRoot:  {}", self.document_root.display());
        println!("   ProgramRoot:   {}", self.program_root.display());
        println!("   Indexes:       {}", if self.indexes { "on" } else { "off" });
        println!();
        println!("🛡  Security:");
        println!("   Order:         {:?} first", self.order);
        println!("   Default:       {:?}", self.default_policy);
        println!("   Accept:        {}", self.accept_rules.join(", "));
        println!("   Reject:        {}", self.reject_rules.join(", "));
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            document_root: PathBuf::from("."),
            program_root: PathBuf::from("/tmp/usr/local/lib/myweb"),
            indexes: false,
            accept_rules: Vec::new(),
            reject_rules: Vec::new(),
            order: OrderArg::Accept,
            default_policy: DefaultArg::Accept,
            access_log: None,
            error_log: None,
            workers: 10,
        }
    }
}
