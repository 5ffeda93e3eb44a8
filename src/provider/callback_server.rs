//! Local HTTP callback server for the interactive OAuth flow.
//!
//! A temporary localhost server that receives the OAuth redirect, shows the
//! user a small confirmation page, and hands the full callback URL back to
//! the provider.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, info};

/// The port used for the OAuth callback server.
pub const CALLBACK_PORT: u16 = 29127;

/// The full redirect URI for OAuth.
pub fn redirect_uri() -> String {
    format!("http://localhost:{}/callback", CALLBACK_PORT)
}

/// Result from the callback server.
pub enum CallbackResult {
    /// Successfully received a callback; carries the full URL.
    Success(String),
    /// Server was cancelled.
    Cancelled,
    /// Error occurred.
    Error(String),
}

/// Start the callback server and wait for a single OAuth callback.
///
/// Blocking; intended to run on a dedicated thread. The server shuts down
/// after receiving the callback or on a message from `cancel_rx`.
pub fn start_callback_server(cancel_rx: mpsc::Receiver<()>) -> CallbackResult {
    let addr = format!("127.0.0.1:{}", CALLBACK_PORT);

    let listener = match TcpListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind callback server to {}: {}", addr, e);
            return CallbackResult::Error(format!("Failed to start server: {}", e));
        }
    };

    // Non-blocking accept so cancellation can be checked between attempts
    if let Err(e) = listener.set_nonblocking(true) {
        error!("Failed to set non-blocking mode: {}", e);
        return CallbackResult::Error(format!("Server configuration error: {}", e));
    }

    info!("OAuth callback server listening on {}", addr);

    loop {
        match cancel_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                info!("Callback server cancelled");
                return CallbackResult::Cancelled;
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                debug!("Connection from {}", peer_addr);
                match handle_connection(stream) {
                    Some(url) => {
                        info!("OAuth callback received");
                        return CallbackResult::Success(url);
                    }
                    None => {
                        // Not a valid callback request, keep listening
                        continue;
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                return CallbackResult::Error(format!("Connection error: {}", e));
            }
        }
    }
}

/// Handle an incoming HTTP connection.
///
/// Returns Some(url) if this was a valid OAuth callback, None otherwise.
fn handle_connection(mut stream: TcpStream) -> Option<String> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let mut buffer = [0; 4096];
    let bytes_read = match stream.read(&mut buffer) {
        Ok(n) => n,
        Err(e) => {
            debug!("Failed to read request: {}", e);
            return None;
        }
    };

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    debug!("Received request: {}", request.lines().next().unwrap_or(""));

    let request_line = request.lines().next()?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();

    if parts.len() < 2 {
        send_plain_response(&mut stream, 400, "Bad Request");
        return None;
    }

    let method = parts[0];
    let path = parts[1];

    // Only GET /callback is a valid redirect target
    if method != "GET" {
        send_plain_response(&mut stream, 405, "Method Not Allowed");
        return None;
    }

    if !path.starts_with("/callback") {
        send_plain_response(&mut stream, 404, "Not Found");
        return None;
    }

    if path.contains("error=") {
        let description = extract_error_description(path);
        send_html_page(&mut stream, "Sign-in failed", &description);
        // Still hand back the URL so the provider can classify the error
        return Some(format!("http://localhost:{}{}", CALLBACK_PORT, path));
    }

    if !path.contains("code=") {
        send_plain_response(&mut stream, 400, "Missing authorization code");
        return None;
    }

    send_html_page(
        &mut stream,
        "Sign-in complete",
        "You are signed in. You can close this tab and return to the terminal.",
    );

    Some(format!("http://localhost:{}{}", CALLBACK_PORT, path))
}

/// Pull a human-readable description out of an error callback path.
fn extract_error_description(path: &str) -> String {
    if let Some(start) = path.find("error_description=") {
        let start = start + "error_description=".len();
        let end = path[start..]
            .find('&')
            .map(|i| start + i)
            .unwrap_or(path.len());
        urlencoding::decode(&path[start..end])
            .unwrap_or_else(|_| "Authentication failed".into())
            .to_string()
    } else {
        "Authentication was cancelled or failed.".to_string()
    }
}

/// Send a minimal HTML confirmation page.
fn send_html_page(stream: &mut TcpStream, title: &str, message: &str) {
    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>{title}</title>\n\
         <style>body {{ font-family: sans-serif; margin: 4rem auto; max-width: 32rem; }}</style>\n\
         </head>\n<body>\n<h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>"
    );

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        html.len(),
        html
    );

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Send a plain-text response.
fn send_plain_response(stream: &mut TcpStream, status: u16, message: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        message,
        message.len(),
        message
    );

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri() {
        assert_eq!(redirect_uri(), "http://localhost:29127/callback");
    }

    #[test]
    fn test_extract_error_description() {
        let path = "/callback?error=access_denied&error_description=User%20cancelled&state=x";
        assert_eq!(extract_error_description(path), "User cancelled");

        let path = "/callback?error=access_denied";
        assert_eq!(
            extract_error_description(path),
            "Authentication was cancelled or failed."
        );
    }
}
