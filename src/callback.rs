//! Local redirect listener for the OAuth authorization-code flow.
//!
//! [`AuthorizationSession`] is the state machine of a single login and is
//! driven purely by request targets; [`CallbackListener`] feeds it from a
//! TCP socket until the session closes.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

use crate::error::AuthError;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Elfsquad CLI</title>
<style>body{font-family:system-ui;display:flex;align-items:center;justify-content:center;height:100vh;margin:0}</style></head>
<body><div><h1>Logged in!</h1><p>You can close this tab now and return to the terminal.</p></div></body></html>"#;

const FAILURE_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Elfsquad CLI</title>
<style>body{font-family:system-ui;display:flex;align-items:center;justify-content:center;height:100vh;margin:0}</style></head>
<body><div><h1>Login failed</h1><p>Check the terminal for details and run <code>elfsquad login</code> again.</p></div></body></html>"#;

const NO_CODE_NOTICE: &str = "Waiting for the Elfsquad login redirect. No authorization code in this request.";

/// Largest request head we bother reading; the redirect is a single GET.
const MAX_REQUEST_HEAD: usize = 8 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Listening,
    CodeReceived,
    Exchanging,
    Persisted,
    Failed,
}

/// HTTP reply the listener writes back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl CallbackReply {
    fn html(body: &str) -> Self {
        CallbackReply {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn text(status: u16, body: &str) -> Self {
        CallbackReply {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn to_http(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            400 => "Bad Request",
            _ => "Gone",
        };
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            reason,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

/// One login attempt: accepts at most one authorization code.
#[derive(Debug)]
pub struct AuthorizationSession {
    expected_state: String,
    state: SessionState,
    error: Option<AuthError>,
}

impl AuthorizationSession {
    pub fn new(expected_state: impl Into<String>) -> Self {
        AuthorizationSession {
            expected_state: expected_state.into(),
            state: SessionState::Listening,
            error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Persisted | SessionState::Failed)
    }

    /// Process one inbound request target such as `/?code=abc&state=xyz`.
    ///
    /// `complete` exchanges and persists the code; it is called at most once
    /// over the lifetime of the session. Requests without a code leave the
    /// session listening.
    pub fn handle<F>(&mut self, target: &str, complete: F) -> CallbackReply
    where
        F: FnOnce(&str) -> Result<(), AuthError>,
    {
        if self.is_closed() {
            return CallbackReply::text(410, "This login session has already finished.");
        }

        let params = query_params(target);
        let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
            if let Some(error) = params.get("error") {
                let reason = params
                    .get("error_description")
                    .map(|d| format!("{error}: {d}"))
                    .unwrap_or_else(|| error.clone());
                return self.fail(AuthError::AuthorizationDenied(reason));
            }
            debug!(request = target, "callback request without code ignored");
            return CallbackReply::text(200, NO_CODE_NOTICE);
        };

        self.state = SessionState::CodeReceived;
        if params.get("state").map(String::as_str) != Some(self.expected_state.as_str()) {
            return self.fail(AuthError::StateMismatch);
        }

        self.state = SessionState::Exchanging;
        match complete(code.as_str()) {
            Ok(()) => {
                self.state = SessionState::Persisted;
                CallbackReply::html(SUCCESS_HTML)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: AuthError) -> CallbackReply {
        warn!(error = ?error, "login callback failed");
        self.state = SessionState::Failed;
        self.error = Some(error);
        CallbackReply::html(FAILURE_HTML)
    }

    /// Outcome of the session once the listener has stopped.
    pub fn finish(self) -> Result<(), AuthError> {
        match (self.state, self.error) {
            (SessionState::Persisted, _) => Ok(()),
            (_, Some(error)) => Err(error),
            _ => Err(AuthError::CallbackAborted),
        }
    }
}

fn query_params(target: &str) -> HashMap<String, String> {
    let Ok(base) = Url::parse("http://localhost/") else {
        return HashMap::new();
    };
    match base.join(target) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => HashMap::new(),
    }
}

/// Blocking single-session HTTP listener bound to localhost.
///
/// The redirect URI names `localhost`, which a resolver may map to either
/// loopback address, so the listener accepts on `127.0.0.1` and, when the
/// host has IPv6, on `[::1]` with the same port.
pub struct CallbackListener {
    listeners: Vec<TcpListener>,
    timeout: Option<Duration>,
}

impl CallbackListener {
    pub fn bind(port: u16, timeout: Option<Duration>) -> Result<Self, AuthError> {
        let v4 = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).map_err(|source| AuthError::Bind { port, source })?;
        let port = v4.local_addr()?.port();
        let mut listeners = vec![v4];

        match TcpListener::bind((Ipv6Addr::LOCALHOST, port)) {
            Ok(v6) => listeners.push(v6),
            Err(e) => debug!(port, error = %e, "IPv6 loopback unavailable, listening on IPv4 only"),
        }
        for listener in &listeners {
            listener.set_nonblocking(true)?;
        }
        Ok(CallbackListener { listeners, timeout })
    }

    pub fn port(&self) -> std::io::Result<u16> {
        Ok(self.listeners[0].local_addr()?.port())
    }

    /// Whether the `[::1]` listener could be bound.
    pub fn has_ipv6(&self) -> bool {
        self.listeners.len() > 1
    }

    /// Serve requests until the session closes, then drop the sockets.
    pub fn serve<F>(self, mut session: AuthorizationSession, mut complete: F) -> Result<(), AuthError>
    where
        F: FnMut(&str) -> Result<(), AuthError>,
    {
        let started = Instant::now();

        while !session.is_closed() {
            if let Some(timeout) = self.timeout {
                if started.elapsed() > timeout {
                    return Err(AuthError::CallbackTimeout(timeout.as_secs()));
                }
            }

            let mut idle = true;
            for listener in &self.listeners {
                if session.is_closed() {
                    break;
                }
                match listener.accept() {
                    Ok((mut stream, addr)) => {
                        idle = false;
                        debug!(%addr, "callback connection");
                        let reply = match read_request_target(&mut stream) {
                            Some(target) => session.handle(&target, &mut complete),
                            None => CallbackReply::text(400, "Bad request"),
                        };
                        if let Err(e) = stream.write_all(reply.to_http().as_bytes()).and_then(|_| stream.flush()) {
                            debug!(error = %e, "could not write callback reply");
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if idle {
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        session.finish()
    }
}

/// Read the request head and return the target of the request line.
fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;

    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }

    let head = String::from_utf8_lossy(&head);
    // e.g. "GET /?code=abc&state=xyz HTTP/1.1"
    let target = head.lines().next()?.split_whitespace().nth(1)?;
    Some(target.to_string())
}
