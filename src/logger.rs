use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use jiff::Zoned;
use tracing::info;

use crate::http::{HttpRequest, HttpStatus};

enum LogFormat {
    Combined,
}

#[allow(clippy::too_many_arguments)]
impl LogFormat {
    fn format(
        &self,
        remote_addr: &str,
        remote_user: &str,
        time_local: &str,
        request_line: &str,
        status: u16,
        body_bytes_sent: u64,
        referer: &str,
        user_agent: &str,
    ) -> String {
        match self {
            Self::Combined => format!(
                "{remote_addr} - {remote_user} [{time_local}] \"{request_line}\" {status} {body_bytes_sent} \"{referer}\" \"{user_agent}\"",
            ),
        }
    }
}

/// Access log sink. One call per finished response; for tail streams that
/// is when the client goes away.
pub trait Logger {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        status: HttpStatus,
        body_bytes_sent: u64,
        remote_addr: &str,
    ) -> io::Result<()>;
}

impl<L: Logger + ?Sized> Logger for Box<L> {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        status: HttpStatus,
        body_bytes_sent: u64,
        remote_addr: &str,
    ) -> io::Result<()> {
        (**self).write_request_log(request, status, body_bytes_sent, remote_addr)
    }
}

// logs conform to the same format as Nginxs standard combined logs
fn combined_line(
    request: &HttpRequest,
    status: HttpStatus,
    body_bytes_sent: u64,
    remote_addr: &str,
) -> String {
    // TODO: Properly obtain remote user
    let remote_user = "-";
    let time_local = Zoned::now().strftime("%d/%b/%Y:%H:%M:%S %z").to_string();
    let request_line = format!("{} {} {}", request.method, request.uri, request.version);
    let referer = request.header("Referer").unwrap_or("-");
    let user_agent = request.header("User-Agent").unwrap_or("-");

    LogFormat::Combined.format(
        remote_addr,
        remote_user,
        &time_local,
        &request_line,
        status.code(),
        body_bytes_sent,
        referer,
        user_agent,
    )
}

/// Appends combined log lines to a file.
pub struct FileLogger {
    writer: Mutex<BufWriter<File>>,
}

impl FileLogger {
    pub fn open(log_path: &Path) -> io::Result<Self> {
        let log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(log_file)),
        })
    }
}

impl Logger for FileLogger {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        status: HttpStatus,
        body_bytes_sent: u64,
        remote_addr: &str,
    ) -> io::Result<()> {
        let log_line = combined_line(request, status, body_bytes_sent, remote_addr) + "\n";

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(log_line.as_bytes())?;
        writer.flush()
    }
}

/// Emits combined log lines as `tracing` events under the `access` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        status: HttpStatus,
        body_bytes_sent: u64,
        remote_addr: &str,
    ) -> io::Result<()> {
        let line = combined_line(request, status, body_bytes_sent, remote_addr);
        info!(target: "access", "{line}");
        Ok(())
    }
}
