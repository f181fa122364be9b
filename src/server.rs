use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn};

use crate::error::{ServeError, TailError};
use crate::follow::follow_page;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatus};
use crate::logger::Logger;
use crate::mime::Mime;
use crate::resolve::{ResolvedPath, resolve};
use crate::tail::TailSession;

/// Query selecting the live viewer page.
pub const FOLLOW_QUERY: &str = "follow";
/// Query selecting the event stream the viewer subscribes to.
pub const STREAM_QUERY: &str = "sse";

/// How long a client may take to send its request head.
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(30);

/// What a request asks for, picked by its query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The file itself.
    Static,
    /// The HTML viewer that tails the file.
    Follow,
    /// The event stream behind the viewer.
    Stream,
}

impl View {
    pub fn from_query(query: Option<&str>) -> Result<Self, ServeError> {
        match query {
            None | Some("") => Ok(Self::Static),
            Some(FOLLOW_QUERY) => Ok(Self::Follow),
            Some(STREAM_QUERY) => Ok(Self::Stream),
            Some(other) => Err(ServeError::UnknownDiscriminator(other.to_string())),
        }
    }
}

/// Status and body size of a finished response, for the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Served {
    status: HttpStatus,
    body_bytes: u64,
}

impl Served {
    const fn new(status: HttpStatus, body_bytes: u64) -> Self {
        Self { status, body_bytes }
    }
}

struct Context<T> {
    root_dir: PathBuf,
    logger: T,
}

pub struct HttpFileServer<T: Logger> {
    listener: TcpListener,
    context: Arc<Context<T>>,
}

impl<T: Logger + Send + Sync + 'static> HttpFileServer<T> {
    /// Binds the listener. `root_dir` is canonicalized once here; every
    /// request path is checked against that.
    pub fn bind(host: &str, port: u16, root_dir: &Path, logger: T) -> io::Result<Self> {
        let socket_addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "Failed to resolve address")
            })?;

        Ok(Self {
            listener: TcpListener::bind(socket_addr)?,
            context: Arc::new(Context {
                root_dir: root_dir.canonicalize()?,
                logger,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn root_dir(&self) -> &Path {
        &self.context.root_dir
    }

    /// Accepts connections forever, one thread each. A tail stream holds its
    /// thread until the client leaves and never delays other connections.
    pub fn run(&self) {
        for (id, stream) in self.listener.incoming().enumerate() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let context = Arc::clone(&self.context);
            let spawned = thread::Builder::new()
                .name(format!("conn-{id}"))
                .spawn(move || context.handle_connection(&stream));
            if let Err(e) = spawned {
                error!(error = %e, "failed to spawn connection thread");
            }
        }
    }
}

impl<T: Logger> Context<T> {
    fn handle_connection(&self, stream: &TcpStream) {
        let peer_addr = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
        let _span = info_span!("conn", peer = %peer_addr).entered();

        if let Err(e) = stream.set_read_timeout(Some(REQUEST_HEAD_TIMEOUT)) {
            warn!(error = %e, "failed to set read timeout");
        }

        let request = match HttpRequest::from_stream(stream) {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "rejecting unparsable request");
                let _ = HttpResponse::empty(HttpStatus::from(&e)).write_to(stream);
                return;
            }
        };

        info!("{} {}", request.method, request.uri);
        let served = self.process_request(&request, stream);

        let _ = self
            .logger
            .write_request_log(&request, served.status, served.body_bytes, &peer_addr)
            .inspect_err(|e| warn!(error = %e, "failed to write request log"));
    }

    fn process_request(&self, request: &HttpRequest, stream: &TcpStream) -> Served {
        if request.method != HttpMethod::Get {
            return send_empty(stream, HttpStatus::MethodNotAllowed);
        }

        let (raw_path, query) = request.path_and_query();

        // match the request URI to actual file paths
        let resolved = match resolve(raw_path, &self.root_dir) {
            Ok(resolved) => resolved,
            Err(e) => return reject(stream, &e),
        };
        let view = match View::from_query(query) {
            Ok(view) => view,
            Err(e) => return reject(stream, &e),
        };

        let mime = Mime::from_path(&resolved.absolute);
        debug!(path = %resolved.relative.display(), mime = mime.as_str(), ?view, "resolved");

        match view {
            View::Static => serve_static(stream, &resolved, mime),
            View::Follow => serve_follow(stream, raw_path),
            View::Stream => serve_stream(stream, &resolved, mime),
        }
    }
}

fn reject(stream: &TcpStream, e: &ServeError) -> Served {
    match e {
        ServeError::PathEscape { .. } => error!("{e}"),
        ServeError::NotFound { .. } => debug!("{e}"),
        ServeError::Io(_) => error!("{e}"),
        ServeError::InvalidUri | ServeError::UnknownDiscriminator(_) => warn!("{e}"),
    }
    send_empty(stream, HttpStatus::from(e))
}

fn send_empty(stream: &TcpStream, status: HttpStatus) -> Served {
    if let Err(e) = HttpResponse::empty(status).write_to(stream) {
        warn!(error = %e, "connection aborted");
    }
    Served::new(status, 0)
}

fn open(resolved: &ResolvedPath) -> Result<(File, u64), ServeError> {
    let file = File::open(&resolved.absolute)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

/// Sends the whole file. The length is fixed when the file is opened; bytes
/// appended while copying are left for the next request.
fn serve_static(stream: &TcpStream, resolved: &ResolvedPath, mime: Mime) -> Served {
    let (file, len) = match open(resolved) {
        Ok(opened) => opened,
        Err(e) => return reject(stream, &e),
    };

    let mut headers = HttpHeaders::new();
    headers.insert("Content-Type".to_string(), mime.as_str().to_string());
    headers.insert("Content-Length".to_string(), len.to_string());

    let mut writer = stream;
    if let Err(e) = HttpResponse::head_only(HttpStatus::Ok, headers).write_to(&mut writer) {
        warn!(error = %e, "connection aborted");
        return Served::new(HttpStatus::Ok, 0);
    }

    let copied = io::copy(&mut file.take(len), &mut writer)
        .and_then(|copied| writer.flush().map(|()| copied));
    match copied {
        Ok(copied) => Served::new(HttpStatus::Ok, copied),
        Err(e) => {
            warn!(path = %resolved.relative.display(), error = %e, "connection aborted");
            Served::new(HttpStatus::Ok, 0)
        }
    }
}

fn serve_follow(stream: &TcpStream, raw_path: &str) -> Served {
    let mut headers = HttpHeaders::new();
    headers.insert("Content-Type".to_string(), Mime::Html.as_str().to_string());

    let body = follow_page(raw_path).into_bytes();
    let response = HttpResponse::new(HttpStatus::Ok, Some(headers), Some(body));
    match response.write_to(stream) {
        Ok(()) => Served::new(HttpStatus::Ok, response.body_len() as u64),
        Err(e) => {
            warn!(error = %e, "connection aborted");
            Served::new(HttpStatus::Ok, 0)
        }
    }
}

/// Holds the connection and streams appended content until the client
/// disconnects or the file becomes unreadable.
fn serve_stream(stream: &TcpStream, resolved: &ResolvedPath, mime: Mime) -> Served {
    let file = match File::open(&resolved.absolute) {
        Ok(file) => file,
        Err(e) => return reject(stream, &ServeError::from(e)),
    };

    let mut headers = HttpHeaders::new();
    headers.insert("Content-Type".to_string(), "text/event-stream".to_string());
    headers.insert("Cache-Control".to_string(), "no-cache".to_string());

    if let Err(e) = HttpResponse::head_only(HttpStatus::Ok, headers).write_to(stream) {
        warn!(error = %e, "connection aborted");
        return Served::new(HttpStatus::Ok, 0);
    }
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "failed to disable nagle");
    }

    let path = resolved.relative.display().to_string();
    info!(%path, "tail started");

    let mut bytes_sent = 0;
    let result = TailSession::start(file, stream, mime, Instant::now()).and_then(|mut session| {
        let result = session.run();
        bytes_sent = session.bytes_sent();
        result
    });

    match result {
        Ok(()) => info!(%path, "tail ended"),
        Err(TailError::Disconnected(e)) => warn!(%path, error = %e, "connection aborted"),
        Err(e @ TailError::Read(_)) => error!(%path, "{e}"),
    }

    Served::new(HttpStatus::Ok, bytes_sent)
}
