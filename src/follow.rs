//! The viewer page for `?follow`.
//!
//! The page subscribes to the `?sse` stream of the same file and writes each
//! `append` payload to the end of the document. It keeps scrolling to the
//! bottom until the user scrolls up, and starts again once they scroll back
//! down to the end.

use serde_json::Value;

use crate::server::STREAM_QUERY;

const STREAM_URL_MARKER: &str = "__STREAM_URL__";

const FOLLOW_PAGE: &str = r#"<!DOCTYPE html>
<script>
  let lastScrollY = window.scrollY;
  let following = true;
  let scrollListenerAttached = false;

  function onScroll() {
    if (window.scrollY < lastScrollY) {
      following = false;
    } else if (window.innerHeight + window.scrollY >= document.body.offsetHeight) {
      following = true;
    }
    lastScrollY = window.scrollY;
  }

  const source = new EventSource(__STREAM_URL__);
  source.addEventListener('append', function (e) {
    document.write(JSON.parse(e.data));
    // the first write replaces the document, so listen only after it
    if (!scrollListenerAttached) {
      window.addEventListener('scroll', onScroll);
      scrollListenerAttached = true;
    }
    if (following) {
      window.scrollTo(0, document.body.scrollHeight);
    }
  });
  source.onerror = function (err) {
    console.log('error', err);
    source.close();
  };
</script>
"#;

/// Builds the viewer for the file at `raw_path`, the request path exactly as
/// the client sent it.
pub fn follow_page(raw_path: &str) -> String {
    let stream_url = format!("{raw_path}?{STREAM_QUERY}");
    FOLLOW_PAGE.replace(STREAM_URL_MARKER, &script_string_literal(&stream_url))
}

/// A JSON string literal that is also safe inside a `<script>` element:
/// `<`, `>` and `&` only occur inside JSON strings and are replaced by their
/// `\u` escapes, so the literal can't end the element early.
fn script_string_literal(s: &str) -> String {
    Value::String(s.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_subscribes_to_stream_of_same_path() {
        let page = follow_page("/logs/app.log");
        assert!(page.contains(r#"new EventSource("/logs/app.log?sse")"#));
        assert!(!page.contains(STREAM_URL_MARKER));
        assert!(page.contains("addEventListener('append'"));
        assert!(page.contains("source.close()"));
    }

    #[test]
    fn percent_encoding_is_kept() {
        let page = follow_page("/my%20log.txt");
        assert!(page.contains(r#"new EventSource("/my%20log.txt?sse")"#));
    }

    #[test]
    fn path_cannot_break_out_of_the_script() {
        let page = follow_page(r#"/x"</script><script>alert(1)//"#);

        assert_eq!(page.matches("</script>").count(), 1);
        assert!(page.contains(r#"new EventSource("/x\"\u003c/script\u003e\u003cscript\u003ealert(1)//?sse")"#));
    }

    #[test]
    fn literal_decodes_back_to_the_url() {
        let literal = script_string_literal("/a&b<c>.txt?sse");
        let decoded: String = serde_json::from_str(&literal).expect("json");
        assert_eq!(decoded, "/a&b<c>.txt?sse");
    }
}
