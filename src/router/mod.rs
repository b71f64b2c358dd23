//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Decide qué respuesta corresponde a un request que ya pasó el control
//! de acceso.
//!
//! ## Arquitectura
//!
//! ```text
//! GET  ruta registrada (ej: /status)  → handler
//! GET  otro path                      → Resolver → archivo / listado / programa / 404
//! POST path                           → Dispatcher (body = datos del formulario)
//! otro método                         → 405
//! ```

use crate::cgi::Dispatcher;
use crate::files::{Resolver, ServedResource};
use crate::http::{Method, Request, Response, StatusCode};
use crate::logging::Logger;
use crate::status::StatusReporter;
use std::sync::Arc;

/// Tipo de función handler
///
/// Un handler recibe un Request y retorna una Response
pub type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

/// Router que mapea requests a respuestas
pub struct Router {
    /// Rutas GET exactas, revisadas antes que el sistema de archivos
    routes: Vec<(String, Handler)>,
    resolver: Resolver,
    dispatcher: Dispatcher,
    log: Arc<Logger>,
}

impl Router {
    /// Crea un router sin rutas registradas
    pub fn new(resolver: Resolver, dispatcher: Dispatcher, log: Arc<Logger>) -> Self {
        Self {
            routes: Vec::new(),
            resolver,
            dispatcher,
            log,
        }
    }

    /// Registra una ruta GET con su handler
    ///
    /// # Ejemplo
    /// ```
    /// use myweb::cgi::Dispatcher;
    /// use myweb::files::Resolver;
    /// use myweb::http::Response;
    /// use myweb::logging::Logger;
    /// use myweb::router::Router;
    /// use std::sync::Arc;
    ///
    /// let mut router = Router::new(
    ///     Resolver::new("/srv/www", "/srv/cgi", false),
    ///     Dispatcher::new("/srv/cgi"),
    ///     Arc::new(Logger::new()),
    /// );
    /// router.register("/ping", |_req| Response::html("pong"));
    /// ```
    pub fn register<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.routes.push((path.to_string(), Box::new(handler)));
    }

    /// Registra `/status` con el reporter dado
    pub fn register_status(&mut self, reporter: Arc<dyn StatusReporter>) {
        self.register("/status", move |_req| Response::html(&reporter.render_status()));
    }

    /// Encuentra y ejecuta la acción apropiada para un request
    ///
    /// Siempre produce una respuesta; los errores internos se registran
    /// en el log de errores y se responden con 500.
    pub fn route(&self, request: &Request) -> Response {
        match request.method() {
            Method::GET => self.handle_get(request),
            Method::POST => self.handle_post(request),
            Method::Other(_) => Response::error(StatusCode::MethodNotAllowed),
        }
    }

    fn handle_get(&self, request: &Request) -> Response {
        let path = request.path();

        // Las rutas registradas comparan el target completo: "/status?x=1"
        // no es "/status" y sigue al sistema de archivos
        if let Some((_, handler)) = self.routes.iter().find(|(route, _)| route == request.target()) {
            return handler(request);
        }

        let resource = match self.resolver.resolve(path, request.query(), request.accepts_gzip()) {
            Ok(resource) => resource,
            Err(e) => {
                self.log.log_error(&format!("Error leyendo {}: {}", path, e));
                return Response::error(StatusCode::InternalServerError);
            }
        };

        match resource {
            ServedResource::StaticFile {
                body,
                content_type,
                compressible,
            } => Response::new(StatusCode::Ok)
                .with_content_type(content_type)
                .with_body_bytes(body)
                .with_gzip(compressible),
            ServedResource::Directory(listing) => Response::html(&listing),
            ServedResource::Forbidden => Response::error(StatusCode::Forbidden),
            ServedResource::DynamicProgram(program) => {
                self.dispatcher.run(&program, request.query(), &self.log)
            }
            ServedResource::Missing => Response::error(StatusCode::NotFound),
        }
    }

    /// POST siempre va al programa; sin Content-Length es 400
    fn handle_post(&self, request: &Request) -> Response {
        match request.body() {
            Some(body) => {
                let form_data = String::from_utf8_lossy(body);
                self.dispatcher.dispatch(request.path(), &form_data, &self.log)
            }
            None => Response::error(StatusCode::BadRequest),
        }
    }
}
