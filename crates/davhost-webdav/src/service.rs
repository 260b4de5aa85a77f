//! Per-request handling: authentication, logging and WebDAV dispatch.

use crate::auth::{AuthOutcome, Authenticator, client_address};
use dav_server::body::Body;
use dav_server::localfs::LocalFs;
use dav_server::memls::MemLs;
use dav_server::{DavConfig, DavHandler};
use davhost_core::{DEFAULT_PREFIX, ServerConfig};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, WWW_AUTHENTICATE};
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Challenge sent with every 401 response.
pub(crate) const BASIC_CHALLENGE: &str = "Basic realm=\"Restricted\"";

/// Shared state for every connection of one server instance.
#[derive(Clone)]
pub(crate) struct RequestContext {
    dav: Arc<DavHandler>,
    auth: Arc<Authenticator>,
    behind_proxy: bool,
    debug: bool,
}

impl RequestContext {
    pub(crate) fn new(config: &ServerConfig) -> Self {
        let mut builder = DavHandler::builder()
            .filesystem(LocalFs::new(config.root_directory(), false, false, false))
            .locksystem(MemLs::new())
            .autoindex(true);
        if config.path_prefix() != DEFAULT_PREFIX {
            builder = builder.strip_prefix(config.path_prefix());
        }

        Self {
            dav: Arc::new(builder.build_handler()),
            auth: Arc::new(Authenticator::new(config.auth())),
            behind_proxy: config.behind_proxy(),
            debug: config.debug(),
        }
    }

    pub(crate) async fn handle(&self, req: Request<Incoming>, peer: SocketAddr) -> Response<Body> {
        let client = client_address(req.headers(), peer, self.behind_proxy);
        if self.debug {
            info!(
                client = %client,
                method = %req.method(),
                uri = %req.uri(),
                "WebDAV request"
            );
        }

        let principal = match self.auth.check(req.headers()) {
            AuthOutcome::Anonymous => None,
            AuthOutcome::Authorized(username) => Some(username),
            AuthOutcome::Missing => {
                if self.debug {
                    info!(client = %client, "Request without credentials");
                }
                return unauthorized();
            }
            AuthOutcome::Denied { username } => {
                info!(client = %client, username = %username, "Authentication failed");
                return unauthorized();
            }
        };

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let mut dav_config = DavConfig::new();
        if let Some(username) = &principal {
            dav_config = dav_config.principal(username.clone());
        }
        let response = self.dav.handle_with(dav_config, req).await;

        if logs_response(self.debug, method.as_str()) {
            info!(
                client = %client,
                user = principal.as_deref().unwrap_or("-"),
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                "WebDAV request"
            );
        }

        response
    }
}

/// Debug instances log every response, others only the ones that changed state.
fn logs_response(debug: bool, method: &str) -> bool {
    debug || is_mutating(method)
}

fn is_mutating(method: &str) -> bool {
    !matches!(method, "GET" | "HEAD" | "OPTIONS" | "PROPFIND")
}

fn unauthorized() -> Response<Body> {
    let mut response = Response::new(Body::from("Unauthorized".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
    response
}
