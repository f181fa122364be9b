//! Static file server with a live tail view.
//!
//! `GET /path` serves a file, `GET /path?follow` serves a page that shows
//! the file growing in real time, fed by `GET /path?sse`.

#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod event;
pub mod follow;
pub mod http;
pub mod logger;
pub mod mime;
pub mod resolve;
pub mod server;
pub mod tail;

pub use error::{ServeError, TailError};
pub use http::{HttpRequest, HttpResponse, HttpStatus};
pub use logger::{FileLogger, Logger, TracingLogger};
pub use server::{HttpFileServer, View};
