//! Server-sent event encoding for tail sessions.

use serde_json::Value;

/// Event name for every content update.
pub const APPEND_EVENT: &str = "append";

/// SSE comment line. Parsers drop it, proxies see traffic.
pub const KEEP_ALIVE: &[u8] = b": keep alive\n\n";

/// Sent once before any text content so that plain text keeps its line
/// breaks and whitespace when written into the page.
pub const PREFORMATTED_OPEN: &str = "<pre>";

/// One `append` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    payload: String,
}

impl UpdateEvent {
    /// Payload inserted into the page as-is. Used for HTML files and the
    /// `<pre>` bootstrap.
    pub fn markup(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload from plain text, escaped so the browser shows it literally.
    pub fn text(text: &str) -> Self {
        Self {
            payload: html_escape(text),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// `event: append\ndata: "<json string>"\n\n`. JSON escapes every line
    /// break, so the data field is always a single line.
    pub fn to_wire(&self) -> String {
        let data = Value::String(self.payload.clone());
        format!("event: {APPEND_EVENT}\ndata: {data}\n\n")
    }
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_unescape(s: &str) -> String {
        s.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&amp;", "&")
    }

    fn data_field(wire: &str) -> String {
        let data = wire
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("data line");
        serde_json::from_str(data).expect("json string")
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("hello"), "hello");
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("\"it's\""), "&quot;it&#x27;s&quot;");
    }

    #[test]
    fn text_event_wire_format() {
        let event = UpdateEvent::text("<b>hi</b>\n");
        assert_eq!(event.payload(), "&lt;b&gt;hi&lt;/b&gt;\n");
        assert_eq!(
            event.to_wire(),
            "event: append\ndata: \"&lt;b&gt;hi&lt;/b&gt;\\n\"\n\n"
        );
    }

    #[test]
    fn bootstrap_wire_format() {
        assert_eq!(
            UpdateEvent::markup(PREFORMATTED_OPEN).to_wire(),
            "event: append\ndata: \"<pre>\"\n\n"
        );
    }

    #[test]
    fn payload_stays_on_one_line() {
        let text = "line one\r\nline two\n\u{0}\u{1b}[31m\t\"q\" & <tag>\u{2028}end";
        let wire = UpdateEvent::text(text).to_wire();

        assert_eq!(wire.matches('\n').count(), 3);
        assert!(!wire.contains('\r'));
        assert_eq!(html_unescape(&data_field(&wire)), text);
    }

    #[test]
    fn markup_is_not_escaped() {
        let wire = UpdateEvent::markup("<p class=\"x\">hi</p>").to_wire();
        assert_eq!(data_field(&wire), "<p class=\"x\">hi</p>");
    }
}
