use super::{TreeStore, split_path};
use crate::config::FirebaseConfig;
use crate::error::StoreError;
use crate::identity::{self, Credential, Session};
use chrono::Utc;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Firebase Realtime Database over its REST surface.
pub struct RealtimeStore {
    client: Client,
    base: Url,
    api_key: String,
    credential: Mutex<Credential>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

impl RealtimeStore {
    pub fn new(config: &FirebaseConfig, session: &Session) -> Result<Self, StoreError> {
        let url = config.database_url.trim();
        if url.is_empty() {
            return Err(StoreError::Config(
                "Firebase database_url required in config.toml".to_string(),
            ));
        }
        let base = Url::parse(url)
            .map_err(|e| StoreError::Config(format!("Invalid database_url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Config(format!("Invalid database_url: {url}")));
        }

        Ok(Self {
            client: identity::http_client(config)?,
            base,
            api_key: config.api_key.clone(),
            credential: Mutex::new(session.credential.clone()),
        })
    }

    fn node_url(&self, path: &str) -> Result<Url, StoreError> {
        node_url(&self.base, path)
    }

    /// Current ID token, renewed first when it is about to lapse.
    fn id_token(&self) -> Result<String, StoreError> {
        let mut credential = self
            .credential
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if credential.expires_soon(Utc::now()) {
            *credential = identity::refresh_credential(&self.client, &self.api_key, &credential)
                .map_err(|e| StoreError::Session(e.to_string()))?;
        }
        Ok(credential.id_token.clone())
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let token = self.id_token()?;
        let resp = request.query(&[("auth", token.as_str())]).send()?;
        check_status(resp)
    }
}

impl TreeStore for RealtimeStore {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let url = self.node_url(path)?;
        debug!("event=store_request module=store method=GET path={path}");
        let value: Value = self.send(self.client.get(url))?.json()?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let url = self.node_url(path)?;
        debug!("event=store_request module=store method=POST path={path}");
        let created: PushResponse = self.send(self.client.post(url).json(value))?.json()?;
        Ok(created.name)
    }

    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let url = self.node_url(path)?;
        debug!("event=store_request module=store method=PATCH path={path}");
        self.send(self.client.patch(url).json(fields))?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let url = self.node_url(path)?;
        debug!("event=store_request module=store method=DELETE path={path}");
        self.send(self.client.delete(url))?;
        Ok(())
    }
}

/// `https://<db>/todos/key` -> `https://<db>/todos/key.json`
fn node_url(base: &Url, path: &str) -> Result<Url, StoreError> {
    let segments = split_path(path)?;
    let mut url = base.clone();
    {
        let mut parts = url
            .path_segments_mut()
            .map_err(|_| StoreError::InvalidPath(path.to_string()))?;
        parts.pop_if_empty();
        let last = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            if index == last {
                parts.push(&format!("{segment}.json"));
            } else {
                parts.push(segment);
            }
        }
    }
    Ok(url)
}

fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let message = error_message(status, &body);
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        Err(StoreError::PermissionDenied(message))
    } else {
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body.trim()) {
        Ok(parsed) => parsed.error,
        Err(_) => {
            let mut text = body.trim().replace(['\n', '\r'], " ");
            if text.is_empty() {
                return status.to_string();
            }
            if text.len() > 200 {
                let mut cut = 200;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_url_appends_json_suffix_to_last_segment() {
        let base = Url::parse("https://demo-default-rtdb.firebaseio.com/").expect("base");
        let url = node_url(&base, "todos/a@b,com/-Nabc").expect("url");
        assert_eq!(
            url.as_str(),
            "https://demo-default-rtdb.firebaseio.com/todos/a@b,com/-Nabc.json"
        );

        let base = Url::parse("https://demo.firebaseio.com").expect("base");
        let url = node_url(&base, "todos/a@b,com").expect("url");
        assert_eq!(url.path(), "/todos/a@b,com.json");
    }

    #[test]
    fn node_url_rejects_bad_keys() {
        let base = Url::parse("https://demo.firebaseio.com").expect("base");
        assert!(matches!(
            node_url(&base, "todos/a@b.com"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn error_message_prefers_database_error_field() {
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, r#"{ "error" : "Permission denied" }"#),
            "Permission denied"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, ""),
            StatusCode::BAD_GATEWAY.to_string()
        );
        assert_eq!(error_message(StatusCode::BAD_REQUEST, "oops\nbad"), "oops bad");
    }
}
