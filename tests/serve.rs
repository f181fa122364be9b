use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tailserve::{HttpFileServer, TracingLogger};
use tempfile::TempDir;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn start(root: &Path) -> SocketAddr {
    let server = HttpFileServer::bind("127.0.0.1", 0, root, TracingLogger).expect("bind");
    let addr = server.local_addr().expect("local addr");
    thread::spawn(move || server.run());
    addr
}

fn fixture() -> (TempDir, SocketAddr) {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("www");
    fs::create_dir(&root).expect("mkdir root");
    fs::write(root.join("log.txt"), "hello").expect("write");
    fs::write(root.join("page.html"), "<h1>title</h1>").expect("write");
    fs::create_dir(root.join("logs")).expect("mkdir");
    fs::write(dir.path().join("secret.txt"), "do not serve").expect("write");
    let addr = start(&root);
    (dir, addr)
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).expect("timeout");
    stream
}

fn read_head<R: BufRead>(reader: &mut R) -> (u16, HashMap<String, String>) {
    let mut status_line = String::new();
    reader.read_line(&mut status_line).expect("status line");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status code");

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            return (status, headers);
        }
        let (name, value) = line.split_once(':').expect("header");
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }
}

fn request(addr: SocketAddr, raw: &str) -> Response {
    let mut stream = connect(addr);
    stream.write_all(raw.as_bytes()).expect("send");

    let mut reader = BufReader::new(stream);
    let (status, headers) = read_head(&mut reader);
    let mut body = Vec::new();
    reader.read_to_end(&mut body).expect("body");
    Response { status, headers, body }
}

fn get(addr: SocketAddr, target: &str) -> Response {
    request(addr, &format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
}

/// Next `data:` payload, skipping event names, blank lines and keep-alives.
fn next_payload<R: BufRead>(reader: &mut R) -> String {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).expect("event line");
        assert!(n > 0, "stream closed");
        if let Some(data) = line.trim_end_matches('\n').strip_prefix("data: ") {
            return serde_json::from_str(data).expect("json payload");
        }
    }
}

fn open_stream(addr: SocketAddr, path: &str) -> BufReader<TcpStream> {
    let mut stream = connect(addr);
    write!(stream, "GET {path}?sse HTTP/1.1\r\nHost: localhost\r\n\r\n").expect("send");
    BufReader::new(stream)
}

#[test]
fn serves_file_contents() {
    let (_dir, addr) = fixture();

    let response = get(addr, "/log.txt");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello");
    assert_eq!(response.headers.get("content-type").map(String::as_str), Some("text/plain"));
    assert_eq!(response.headers.get("content-length").map(String::as_str), Some("5"));
}

#[test]
fn accepts_http_1_0() {
    let (_dir, addr) = fixture();

    let response = request(addr, "GET /page.html HTTP/1.0\r\n\r\n");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<h1>title</h1>");
    assert_eq!(response.headers.get("content-type").map(String::as_str), Some("text/html"));
}

#[test]
fn missing_files_and_directories_are_404() {
    let (_dir, addr) = fixture();

    for target in ["/missing.txt", "/logs", "/logs/", "/"] {
        let response = get(addr, target);
        assert_eq!(response.status, 404, "{target}");
        assert!(response.body.is_empty(), "{target}");
    }
}

#[test]
fn paths_outside_root_are_rejected_without_body() {
    let (_dir, addr) = fixture();

    for target in [
        "/../secret.txt",
        "/%2e%2e/secret.txt",
        "/logs/../../secret.txt",
        "/logs/%2E%2E%2F%2E%2E%2Fsecret.txt",
        "/../secret.txt?follow",
        "/../secret.txt?sse",
    ] {
        let response = get(addr, target);
        assert_eq!(response.status, 403, "{target}");
        assert!(response.body.is_empty(), "{target}");
    }
}

#[test]
fn follow_serves_viewer_page() {
    let (_dir, addr) = fixture();

    let response = get(addr, "/log.txt?follow");
    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("content-type").map(String::as_str), Some("text/html"));
    let page = String::from_utf8(response.body).expect("utf8 page");
    assert!(page.contains(r#"new EventSource("/log.txt?sse")"#));
}

#[test]
fn unknown_query_and_methods_are_rejected() {
    let (_dir, addr) = fixture();

    let response = get(addr, "/log.txt?tail");
    assert_eq!(response.status, 400);
    assert!(response.body.is_empty());

    let response = request(addr, "POST /log.txt HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(response.status, 405);

    let response = request(addr, "GET /log.txt HTTP/2.0\r\n\r\n");
    assert_eq!(response.status, 505);
}

#[test]
fn stream_delivers_existing_and_appended_text_escaped() {
    let (dir, addr) = fixture();
    let path = dir.path().join("www").join("log.txt");

    let mut reader = open_stream(addr, "/log.txt");
    let (status, headers) = read_head(&mut reader);
    assert_eq!(status, 200);
    assert_eq!(headers.get("content-type").map(String::as_str), Some("text/event-stream"));
    assert_eq!(headers.get("cache-control").map(String::as_str), Some("no-cache"));

    assert_eq!(next_payload(&mut reader), "<pre>");
    assert_eq!(next_payload(&mut reader), "hello");

    let mut file = OpenOptions::new().append(true).open(&path).expect("open");
    file.write_all(b"<b>hi</b>\n").expect("append");

    let expected = "&lt;b&gt;hi&lt;/b&gt;\n";
    let mut received = String::new();
    while received.len() < expected.len() {
        received.push_str(&next_payload(&mut reader));
    }
    assert_eq!(received, expected);
}

#[test]
fn stream_of_html_is_not_wrapped_or_escaped() {
    let (_dir, addr) = fixture();

    let mut reader = open_stream(addr, "/page.html");
    let (status, _) = read_head(&mut reader);
    assert_eq!(status, 200);
    assert_eq!(next_payload(&mut reader), "<h1>title</h1>");
}

#[test]
fn open_stream_does_not_block_other_requests() {
    let (_dir, addr) = fixture();

    let mut reader = open_stream(addr, "/log.txt");
    read_head(&mut reader);
    assert_eq!(next_payload(&mut reader), "<pre>");

    let response = get(addr, "/page.html");
    assert_eq!(response.status, 200);

    // a second viewer on the same file gets its own cursor from the start
    let mut other = open_stream(addr, "/log.txt");
    read_head(&mut other);
    assert_eq!(next_payload(&mut other), "<pre>");
    assert_eq!(next_payload(&mut other), "hello");

    drop(reader);
    let response = get(addr, "/log.txt");
    assert_eq!(response.body, b"hello");
}
