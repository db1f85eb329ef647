//! Interactive login driven by a scripted "browser" hitting the local listener.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use elfsquad_cli::api::ApiClient;
use elfsquad_cli::callback::{AuthorizationSession, CallbackListener};
use elfsquad_cli::config::Config;
use elfsquad_cli::error::AuthError;
use elfsquad_cli::token::{AccessTokenSource, TokenService};
use mockito::{Matcher, Server};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// Send one GET and return the raw HTTP response.
fn get(port: u16, target: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    write!(stream, "GET {target} HTTP/1.1\r\nHost: localhost:{port}\r\n\r\n")?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

#[test]
fn login_exchanges_one_code_and_persists_the_record() {
    //* Given
    let mut server = Server::new();
    let exchange = server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "one-time-code".into()),
            Matcher::UrlEncoded("client_id".into(), "elfsquad-cli".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"new-access","refresh_token":"new-refresh","expires_in":3600}"#)
        .expect(1)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::with_base_urls(&server.url(), &server.url());
    config.credentials_dir = dir.path().to_path_buf();
    config.callback_port = free_port();
    config.login_timeout = Some(Duration::from_secs(30));
    let port = config.callback_port;
    let api = ApiClient::new(&config).unwrap();
    let service = TokenService::new(config, api);

    //* When
    let mut browser = None;
    service
        .login(|url| {
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            browser = Some(thread::spawn(move || {
                let favicon = get(port, "/favicon.ico").unwrap();
                let callback = get(port, &format!("/?code=one-time-code&state={state}")).unwrap();
                (favicon, callback)
            }));
        })
        .unwrap();
    let (favicon, callback) = browser.unwrap().join().unwrap();

    //* Then
    exchange.assert();
    assert!(favicon.starts_with("HTTP/1.1 200 OK"));
    assert!(favicon.contains("No authorization code"));
    assert!(callback.contains("Logged in!"));
    assert_eq!(service.access_token().unwrap().as_deref(), Some("new-access"));
    // The listener is gone once the session closed.
    assert!(get(port, "/?code=again").is_err());
}

#[test]
fn listener_ignores_codeless_requests_and_closes_after_one_code() {
    //* Given
    let listener = CallbackListener::bind(0, Some(Duration::from_secs(30))).unwrap();
    let port = listener.port().unwrap();
    let exchanges = AtomicUsize::new(0);

    let browser = thread::spawn(move || {
        let first = get(port, "/").unwrap();
        let second = get(port, "/?code=abc&state=s1").unwrap();
        (first, second)
    });

    //* When
    let outcome = listener.serve(AuthorizationSession::new("s1"), |code| {
        assert_eq!(code, "abc");
        exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    //* Then
    let (first, second) = browser.join().unwrap();
    assert!(outcome.is_ok());
    assert_eq!(exchanges.load(Ordering::SeqCst), 1);
    assert!(first.contains("No authorization code"));
    assert!(second.contains("Logged in!"));
    assert!(get(port, "/?code=late&state=s1").is_err());
}

#[test]
fn failed_exchange_ends_the_session() {
    let listener = CallbackListener::bind(0, Some(Duration::from_secs(30))).unwrap();
    let port = listener.port().unwrap();
    let browser = thread::spawn(move || get(port, "/?code=abc&state=s1").unwrap());

    let outcome = listener.serve(AuthorizationSession::new("s1"), |_| {
        Err(AuthError::MissingRefreshToken)
    });

    assert!(browser.join().unwrap().contains("Login failed"));
    assert!(matches!(outcome, Err(AuthError::MissingRefreshToken)));
}

#[test]
fn listener_times_out_without_redirect() {
    let listener = CallbackListener::bind(0, Some(Duration::from_millis(300))).unwrap();

    let outcome = listener.serve(AuthorizationSession::new("s1"), |_| Ok(()));

    assert!(matches!(outcome, Err(AuthError::CallbackTimeout(_))));
}

#[test]
fn listener_accepts_redirect_over_ipv6_loopback() {
    //* Given
    let listener = CallbackListener::bind(0, Some(Duration::from_secs(30))).unwrap();
    if !listener.has_ipv6() {
        // Host without an IPv6 loopback; the IPv4 listener alone is all there is.
        return;
    }
    let port = listener.port().unwrap();
    let browser = thread::spawn(move || {
        let mut stream = TcpStream::connect(("::1", port)).unwrap();
        write!(stream, "GET /?code=v6-code&state=s1 HTTP/1.1\r\nHost: localhost:{port}\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    });

    //* When
    let mut received = Vec::new();
    let outcome = listener.serve(AuthorizationSession::new("s1"), |code| {
        received.push(code.to_string());
        Ok(())
    });

    //* Then
    assert!(outcome.is_ok());
    assert_eq!(received, vec!["v6-code".to_string()]);
    assert!(browser.join().unwrap().contains("Logged in!"));
}
