//! Google sign-in exchanged for a Firebase credential.
//!
//! The browser leg uses a loopback redirect: we listen on `127.0.0.1:<port>`,
//! send the user to Google, and receive the authorization code on the
//! listener. The code becomes a Google ID token, which Identity Toolkit turns
//! into the Firebase session the database accepts.

use crate::config::{FirebaseConfig, GoogleConfig};
use crate::error::AuthError;
use chrono::{DateTime, Duration, Local, Utc};
use log::{info, warn};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration as StdDuration;

const OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SIGN_IN_WITH_IDP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const SIGN_IN_WINDOW_MINUTES: i64 = 10;
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// The signed-in user, identified by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    email: String,
}

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Firebase ID token plus what is needed to renew it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(60)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub credential: Credential,
}

#[derive(Clone, Debug)]
pub struct SignInDisplay {
    pub auth_url: String,
    pub listen_addr: String,
    pub expires_at: DateTime<Local>,
}

#[derive(Debug)]
pub struct SignInFlow {
    pub display: SignInDisplay,
    listener: TcpListener,
    state: String,
    redirect_uri: String,
    cancelled: Arc<AtomicBool>,
}

impl SignInFlow {
    /// Handle that stops the background poll once set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleTokenError {
    error: String,
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    email: Option<String>,
    need_confirmation: Option<bool>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct FirebaseErrorEnvelope {
    error: FirebaseErrorBody,
}

#[derive(Deserialize)]
struct FirebaseErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

pub fn start_sign_in(
    google: &GoogleConfig,
    firebase: &FirebaseConfig,
) -> Result<SignInFlow, AuthError> {
    if google.client_id.trim().is_empty() || google.client_secret.trim().is_empty() {
        return Err(AuthError::Config(
            "Google client_id/client_secret required in config.toml".to_string(),
        ));
    }
    if firebase.api_key.trim().is_empty() {
        return Err(AuthError::Config(
            "Firebase api_key required in config.toml".to_string(),
        ));
    }

    let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| AuthError::Provider(e.to_string()))?;
    let addr = listener
        .local_addr()
        .map_err(|e| AuthError::Provider(e.to_string()))?;
    let redirect_uri = format!("http://{addr}");
    let state = generate_state();
    let auth_url = authorization_url(&google.client_id, &redirect_uri, &state)?;

    info!("event=sign_in_started module=identity listen_addr={addr}");

    Ok(SignInFlow {
        display: SignInDisplay {
            auth_url,
            listen_addr: addr.to_string(),
            expires_at: Local::now() + Duration::minutes(SIGN_IN_WINDOW_MINUTES),
        },
        listener,
        state,
        redirect_uri,
        cancelled: Arc::new(AtomicBool::new(false)),
    })
}

/// Waits for the browser redirect on a background thread and completes the
/// token exchange there. Exactly one result is sent.
pub fn spawn_sign_in(
    google: GoogleConfig,
    firebase: FirebaseConfig,
    flow: SignInFlow,
) -> Receiver<Result<Session, AuthError>> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let result = wait_for_redirect(&google, &firebase, &flow);
        match &result {
            Ok(session) => info!(
                "event=sign_in_finished module=identity status=ok email_domain={}",
                email_domain(session.principal.email())
            ),
            Err(err) => warn!("event=sign_in_finished module=identity status=error error={err}"),
        }
        let _ = tx.send(result);
    });

    rx
}

fn wait_for_redirect(
    google: &GoogleConfig,
    firebase: &FirebaseConfig,
    flow: &SignInFlow,
) -> Result<Session, AuthError> {
    flow.listener
        .set_nonblocking(true)
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    loop {
        if flow.cancelled.load(Ordering::Relaxed) {
            return Err(AuthError::Cancelled);
        }
        if Local::now() >= flow.display.expires_at {
            return Err(AuthError::Expired);
        }

        match flow.listener.accept() {
            Ok((mut stream, _addr)) => {
                return handle_redirect(google, firebase, flow, &mut stream);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(StdDuration::from_millis(200));
            }
            Err(err) => return Err(AuthError::Provider(err.to_string())),
        }
    }
}

fn handle_redirect(
    google: &GoogleConfig,
    firebase: &FirebaseConfig,
    flow: &SignInFlow,
    stream: &mut TcpStream,
) -> Result<Session, AuthError> {
    stream
        .set_nonblocking(false)
        .and_then(|_| stream.set_read_timeout(Some(StdDuration::from_secs(2))))
        .map_err(|e| AuthError::Provider(e.to_string()))?;

    let mut request_line = String::new();
    BufReader::new(&*stream)
        .read_line(&mut request_line)
        .map_err(|e| AuthError::Provider(e.to_string()))?;
    let params = redirect_params(&request_line);

    let outcome = check_redirect(&params, &flow.state).and_then(|code| {
        let client = http_client(firebase)?;
        let google_id_token = exchange_code(&client, google, &code, &flow.redirect_uri)?;
        sign_in_with_idp(&client, firebase, &google_id_token, &flow.redirect_uri)
    });

    let page = match &outcome {
        Ok(_) => "Signed in. You can close this tab and return to the terminal.".to_string(),
        Err(err) => format!("Sign-in failed: {}", err.user_message()),
    };
    let _ = respond_with_message(stream, &page);
    outcome
}

fn check_redirect(params: &HashMap<String, String>, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = params.get("error") {
        if error == "access_denied" {
            return Err(AuthError::Cancelled);
        }
        let desc = params
            .get("error_description")
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        return Err(AuthError::Provider(format!("Google auth failed: {error}{desc}")));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => Ok(code.clone()),
        _ => Err(AuthError::MissingToken),
    }
}

fn exchange_code(
    client: &Client,
    google: &GoogleConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<String, AuthError> {
    let resp = client
        .post(OAUTH_TOKEN_URL)
        .form(&[
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        let summary = match serde_json::from_str::<GoogleTokenError>(&body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{desc} ({})", err.error),
                None => err.error,
            },
            Err(_) => format!("HTTP {status}"),
        };
        return Err(AuthError::Provider(format!("Token exchange failed: {summary}")));
    }

    let token: GoogleTokenResponse =
        serde_json::from_str(&body).map_err(|e| AuthError::Provider(e.to_string()))?;
    google_id_token(token)
}

fn google_id_token(token: GoogleTokenResponse) -> Result<String, AuthError> {
    match token.id_token {
        Some(id_token) if !id_token.trim().is_empty() => Ok(id_token),
        _ => {
            warn!("event=token_missing module=identity source=google");
            Err(AuthError::MissingToken)
        }
    }
}

fn sign_in_with_idp(
    client: &Client,
    firebase: &FirebaseConfig,
    google_id_token: &str,
    request_uri: &str,
) -> Result<Session, AuthError> {
    let resp = client
        .post(SIGN_IN_WITH_IDP_URL)
        .query(&[("key", firebase.api_key.as_str())])
        .json(&json!({
            "postBody": format!("id_token={google_id_token}&providerId=google.com"),
            "requestUri": request_uri,
            "returnSecureToken": true,
            "returnIdpCredential": true,
        }))
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        return Err(match serde_json::from_str::<FirebaseErrorEnvelope>(&body) {
            Ok(envelope) => AuthError::from_provider_code(&envelope.error.message),
            Err(_) => AuthError::Provider(format!("Firebase sign-in failed: HTTP {status}")),
        });
    }

    let parsed: IdpResponse =
        serde_json::from_str(&body).map_err(|e| AuthError::Provider(e.to_string()))?;
    session_from_idp(parsed, Utc::now())
}

fn session_from_idp(resp: IdpResponse, now: DateTime<Utc>) -> Result<Session, AuthError> {
    if resp.need_confirmation.unwrap_or(false) {
        return Err(AuthError::CredentialConflict);
    }
    if let Some(message) = resp.error_message {
        return Err(AuthError::from_provider_code(&message));
    }

    let id_token = resp
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let refresh_token = resp
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let email = resp
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or(AuthError::MissingEmail)?;

    Ok(Session {
        principal: Principal::new(email),
        credential: Credential {
            id_token,
            refresh_token,
            expires_at: now + Duration::seconds(lifetime_seconds(resp.expires_in.as_deref())),
        },
    })
}

/// Trades the refresh token for a new Firebase ID token.
pub fn refresh_credential(
    client: &Client,
    api_key: &str,
    credential: &Credential,
) -> Result<Credential, AuthError> {
    let resp = client
        .post(SECURE_TOKEN_URL)
        .query(&[("key", api_key)])
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", credential.refresh_token.as_str()),
        ])
        .send()?;

    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        return Err(match serde_json::from_str::<FirebaseErrorEnvelope>(&body) {
            Ok(envelope) => AuthError::Provider(envelope.error.message),
            Err(_) => AuthError::Provider(format!("Token refresh failed: HTTP {status}")),
        });
    }

    let refreshed: RefreshResponse =
        serde_json::from_str(&body).map_err(|e| AuthError::Provider(e.to_string()))?;
    info!("event=credential_refreshed module=identity");
    Ok(Credential {
        id_token: refreshed.id_token,
        refresh_token: refreshed.refresh_token,
        expires_at: Utc::now() + Duration::seconds(lifetime_seconds(refreshed.expires_in.as_deref())),
    })
}

pub fn http_client(firebase: &FirebaseConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(StdDuration::from_secs(firebase.timeout_seconds.max(5)))
        .build()
}

fn authorization_url(client_id: &str, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
    Url::parse_with_params(
        OAUTH_AUTH_URL,
        [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("prompt", "select_account"),
            ("state", state),
        ],
    )
    .map(|url| url.to_string())
    .map_err(|e| AuthError::Provider(e.to_string()))
}

/// Query parameters from an HTTP request line such as `GET /?code=x HTTP/1.1`.
fn redirect_params(request_line: &str) -> HashMap<String, String> {
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    Url::parse(&format!("http://localhost{target}"))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

fn lifetime_seconds(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS)
}

fn respond_with_message(stream: &mut TcpStream, message: &str) -> io::Result<()> {
    let body = format!("{message}\n");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())
}

fn generate_state() -> String {
    use rand::{Rng, distributions::Alphanumeric};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idp(json: &str) -> IdpResponse {
        serde_json::from_str(json).expect("valid idp json")
    }

    #[test]
    fn redirect_params_decode_query() {
        let params = redirect_params("GET /?code=4%2F0Ab&state=xyz&scope=email+openid HTTP/1.1\r\n");
        assert_eq!(params.get("code").map(String::as_str), Some("4/0Ab"));
        assert_eq!(params.get("state").map(String::as_str), Some("xyz"));
        assert_eq!(params.get("scope").map(String::as_str), Some("email openid"));
    }

    #[test]
    fn redirect_checks_state_and_denial() {
        let mut params = HashMap::new();
        params.insert("error".to_string(), "access_denied".to_string());
        assert!(matches!(check_redirect(&params, "s"), Err(AuthError::Cancelled)));

        let mut params = HashMap::new();
        params.insert("code".to_string(), "abc".to_string());
        params.insert("state".to_string(), "other".to_string());
        assert!(matches!(check_redirect(&params, "s"), Err(AuthError::StateMismatch)));

        params.insert("state".to_string(), "s".to_string());
        assert_eq!(check_redirect(&params, "s").expect("code"), "abc");
    }

    #[test]
    fn google_response_without_id_token_is_terminal() {
        let token = GoogleTokenResponse { id_token: None };
        assert!(matches!(google_id_token(token), Err(AuthError::MissingToken)));
        let token = GoogleTokenResponse {
            id_token: Some("  ".to_string()),
        };
        assert!(matches!(google_id_token(token), Err(AuthError::MissingToken)));
    }

    #[test]
    fn idp_response_becomes_session() {
        let now = Utc::now();
        let session = session_from_idp(
            idp(r#"{"idToken":"fb","refreshToken":"rt","expiresIn":"1800","email":"a.b@example.com","localId":"u1"}"#),
            now,
        )
        .expect("session");
        assert_eq!(session.principal.email(), "a.b@example.com");
        assert_eq!(session.credential.id_token, "fb");
        assert_eq!(session.credential.expires_at, now + Duration::seconds(1800));
    }

    #[test]
    fn idp_response_failures_are_categorized() {
        let now = Utc::now();
        assert!(matches!(
            session_from_idp(idp(r#"{"needConfirmation":true,"email":"a@b.c"}"#), now),
            Err(AuthError::CredentialConflict)
        ));
        assert!(matches!(
            session_from_idp(idp(r#"{"refreshToken":"rt","email":"a@b.c"}"#), now),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            session_from_idp(idp(r#"{"idToken":"fb","refreshToken":"rt"}"#), now),
            Err(AuthError::MissingEmail)
        ));
    }

    #[test]
    fn authorization_url_carries_state_and_loopback() {
        let url = authorization_url("cid", "http://127.0.0.1:5555", "st").expect("url");
        let parsed = Url::parse(&url).expect("parse");
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:5555");
        assert_eq!(params["state"], "st");
        assert_eq!(params["prompt"], "select_account");
    }

    #[test]
    fn credential_expiry_window() {
        let now = Utc::now();
        let credential = Credential {
            id_token: String::new(),
            refresh_token: String::new(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(credential.expires_soon(now));
        assert!(!credential.expires_soon(now - Duration::seconds(120)));
    }
}
