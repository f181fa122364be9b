//! Just enough HTTP/1.x to read a `GET` request head and write a response
//! head. One request per connection; every response closes it.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;

use thiserror::Error;

const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    HTTP1_0,
    HTTP1_1,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = match self {
            Self::HTTP1_0 => "HTTP/1.0",
            Self::HTTP1_1 => "HTTP/1.1",
        };
        write!(f, "{version}")
    }
}

impl FromStr for HttpVersion {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP/1.0" => Ok(Self::HTTP1_0),
            "HTTP/1.1" => Ok(Self::HTTP1_1),
            _ => Err(ParseRequestError::UnsupportedHttpVersion),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
        };
        write!(f, "{method}")
    }
}

impl FromStr for HttpMethod {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "PATCH" => Ok(Self::Patch),
            _ => Err(ParseRequestError::InvalidMethod),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    BadRequest,
    Forbidden,
    HttpVersionNotSupported,
    InternalServerError,
    MethodNotAllowed,
    NotFound,
    Ok,
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_text = match self {
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
            Self::InternalServerError => "Internal Server Error",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::NotFound => "Not Found",
            Self::Ok => "OK",
        };
        write!(f, "{status_text}")
    }
}

impl From<&ParseRequestError> for HttpStatus {
    fn from(error: &ParseRequestError) -> Self {
        match error {
            ParseRequestError::UnsupportedHttpVersion => Self::HttpVersionNotSupported,
            ParseRequestError::MalformedRequest(_) | ParseRequestError::InvalidMethod => {
                Self::BadRequest
            }
            ParseRequestError::Io(_) => Self::InternalServerError,
        }
    }
}

impl HttpStatus {
    pub const fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::HttpVersionNotSupported => 505,
            Self::InternalServerError => 500,
            Self::MethodNotAllowed => 405,
            Self::NotFound => 404,
            Self::Ok => 200,
        }
    }
}

/// HTTP headers defined as a type alias to `HashMap<String, String>`
pub type HttpHeaders = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ParseRequestError {
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid method")]
    InvalidMethod,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Raw request target, still percent-encoded and including the query.
    pub uri: String,
    pub version: HttpVersion,
    pub headers: HttpHeaders,
}

impl HttpRequest {
    /// Reads the request line and headers. `Ok(None)` means the peer closed
    /// the connection without sending anything.
    pub fn from_stream<R: Read>(stream: R) -> Result<Option<Self>, ParseRequestError> {
        let mut lines = BufReader::new(stream).lines();

        let Some(request_line) = lines.next().transpose()? else {
            return Ok(None);
        };

        let [method_str, target, version_str] = request_line
            .split_whitespace()
            .collect::<Vec<&str>>()
            .try_into()
            .map_err(|_| {
                ParseRequestError::MalformedRequest(format!(
                    "Malformed request line: {}",
                    request_line.trim_end()
                ))
            })?;

        let method = method_str.parse()?;
        let version = version_str.parse()?;
        let headers = Self::parse_headers(&mut lines)?;

        Ok(Some(Self {
            method,
            uri: target.to_string(),
            version,
            headers,
        }))
    }

    fn parse_headers<I>(lines: &mut I) -> Result<HttpHeaders, ParseRequestError>
    where
        I: Iterator<Item = io::Result<String>>,
    {
        let mut headers = HttpHeaders::new();

        for line in lines {
            let line = line?;
            let line = line.trim_end_matches('\r');

            // end of headers
            if line.is_empty() {
                return Ok(headers);
            }

            if headers.len() == MAX_HEADERS {
                return Err(ParseRequestError::MalformedRequest(
                    "Too many headers".to_string(),
                ));
            }

            let (field_name, field_value) = line
                .split_once(':')
                .map(|(f1, f2)| (f1.trim(), f2.trim()))
                .ok_or_else(|| {
                    ParseRequestError::MalformedRequest(format!("Malformed header: {line}"))
                })?;

            // TODO: repeated fields overwrite each other instead of being
            // combined as rfc9110 section 5.3 describes.
            headers.insert(field_name.to_owned(), field_value.to_owned());
        }

        // peer hung up in the middle of the header block
        Err(ParseRequestError::MalformedRequest(
            "Unterminated header block".to_string(),
        ))
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field_name, _)| field_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The target split at the first `?`. The query is `None` when there is
    /// no `?` at all.
    pub fn path_and_query(&self) -> (&str, Option<&str>) {
        match self.uri.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.uri.as_str(), None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatus,
    pub headers: HttpHeaders,
    pub body: Option<Vec<u8>>,
}

impl HttpResponse {
    pub fn new(status: HttpStatus, headers: Option<HttpHeaders>, body: Option<Vec<u8>>) -> Self {
        let mut headers = headers.unwrap_or_default();

        // add default headers
        headers
            .entry("Connection".to_string())
            .or_insert_with(|| "close".to_string());

        if let Some(ref body) = body {
            headers
                .entry("Content-Length".to_string())
                .or_insert_with(|| body.len().to_string());
            headers
                .entry("Content-Type".to_string())
                .or_insert_with(|| "text/plain".to_string());
        }

        Self {
            version: HttpVersion::HTTP1_1,
            status,
            headers,
            body,
        }
    }

    /// A response without a body, announced as such.
    pub fn empty(status: HttpStatus) -> Self {
        let mut headers = HttpHeaders::new();
        headers.insert("Content-Length".to_string(), "0".to_string());
        Self::new(status, Some(headers), None)
    }

    /// A response head whose body is written separately by the caller, such
    /// as a copied file or an event stream.
    pub fn head_only(status: HttpStatus, headers: HttpHeaders) -> Self {
        Self::new(status, Some(headers), None)
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.to_string().as_bytes())?;
        if let Some(body) = &self.body {
            writer.write_all(body)?;
        }
        writer.flush()
    }
}

/// Formats the status line and headers, including the blank line that ends
/// them. The body is not part of the text form.
impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // status line
        write!(f, "{} {} {}\r\n", self.version, self.status.code(), self.status)?;

        // headers
        for (field_name, field_value) in &self.headers {
            write!(f, "{field_name}: {field_value}\r\n")?;
        }

        // empty line
        f.write_str("\r\n")
    }
}
