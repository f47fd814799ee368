//! Minimal HTTP response bytes. Nothing here parses requests.

/// Body served by the listener bound to `port`.
pub fn port_body(port: u16) -> String {
    format!("Hello from nanoapp on port {}!\n", port)
}

/// A complete `200 OK` plain-text response. `Content-Length` is the byte
/// length of `body`, not its character count.
pub fn http_ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}
