use std::path::Path;
use std::str::FromStr;

/// taken from <https://developer.mozilla.org/en-US/docs/Web/HTTP/Guides/MIME_types/Common_types/>
/// NOTE: not exhaustive. Anything missing is served as [`Mime::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mime {
    GZip,
    Json,
    JsonLd,
    Binary,
    Pdf,
    Wasm,
    Xml,
    Zip,
    Gif,
    Icon,
    Jpeg,
    Png,
    Svg,
    Webp,
    ICalendar,
    Css,
    Csv,
    Html,
    JavaScript,
    Markdown,
    PlainText,
}

impl Mime {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GZip => "application/gzip",
            Self::Json => "application/json",
            Self::JsonLd => "application/ld+json",
            Self::Binary => "application/octet-stream",
            Self::Pdf => "application/pdf",
            Self::Wasm => "application/wasm",
            Self::Xml => "application/xml",
            Self::Zip => "application/zip",
            Self::Gif => "image/gif",
            Self::Icon => "image/vnd.microsoft.icon",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Webp => "image/webp",
            Self::ICalendar => "text/calendar",
            Self::Css => "text/css",
            Self::Csv => "text/csv",
            Self::Html => "text/html",
            Self::JavaScript => "text/javascript",
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
        }
    }

    /// Infers the type from the file extension, falling back to
    /// [`Mime::Binary`] when there is none or it is not known.
    pub fn from_path(path: &Path) -> Self {
        // handle the case where there might be no extension or invalid UTF-8
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.to_ascii_lowercase().parse().ok())
            .unwrap_or(Self::Binary)
    }

    /// HTML brings its own document structure; everything else gets escaped
    /// and wrapped when tailed.
    pub const fn is_html(self) -> bool {
        matches!(self, Self::Html)
    }
}

impl FromStr for Mime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gz" => Ok(Self::GZip),
            "json" => Ok(Self::Json),
            "jsonld" => Ok(Self::JsonLd),
            "bin" => Ok(Self::Binary),
            "pdf" => Ok(Self::Pdf),
            "wasm" => Ok(Self::Wasm),
            "xml" => Ok(Self::Xml),
            "zip" => Ok(Self::Zip),
            "gif" => Ok(Self::Gif),
            "ico" => Ok(Self::Icon),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "webp" => Ok(Self::Webp),
            "ics" => Ok(Self::ICalendar),
            "css" => Ok(Self::Css),
            "csv" => Ok(Self::Csv),
            "html" | "htm" => Ok(Self::Html),
            "js" | "mjs" => Ok(Self::JavaScript),
            "md" => Ok(Self::Markdown),
            "txt" | "log" | "text" => Ok(Self::PlainText),
            _ => Err(format!("Unknown file extension: {s}")),
        }
    }
}
