/// JSON-over-HTTP implementation of the notes service
use super::NotesService;
use crate::error::{NotesError, Result};
use crate::models::{
    Discussion, Note, NotePayload, NoteResponse, NoteUpdate, PollRequest, PollResponse, PolledNotes,
};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

pub const LAST_FETCHED_AT_HEADER: &str = "X-Last-Fetched-At";
pub const POLL_INTERVAL_HEADER: &str = "Poll-Interval";

struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    fn into_status_error(self) -> NotesError {
        NotesError::Status {
            status: self.status.as_u16(),
            body: String::from_utf8_lossy(&self.body).into_owned(),
        }
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Notes service backed by a hyper client
#[derive(Clone)]
pub struct HttpNotesService {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
}

impl HttpNotesService {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint; absolute `http://` endpoints are used as given
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, String)],
    ) -> Result<RawResponse> {
        let url = self.url(endpoint);
        let uri: Uri = url
            .parse()
            .map_err(|e| NotesError::Http(format!("Invalid URL {}: {}", url, e)))?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest");
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| NotesError::Http(format!("Failed to build request: {}", e)))?;

        debug!("{} {}", method, url);
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| NotesError::Http(format!("{} {} failed: {}", method, url, e)))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| NotesError::Http(format!("Failed to read response body: {}", e)))?
            .to_bytes();

        debug!("{} {} -> {}", method, url, parts.status);
        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<RawResponse> {
        let body = serde_json::to_vec(body)?;
        self.send(method, endpoint, Some(body), &[]).await
    }

    /// Create and reply answer 422 with a JSON body when validation fails
    fn note_response(raw: RawResponse) -> Result<NoteResponse> {
        if raw.status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Ok(parsed) = raw.json::<NoteResponse>() {
                return Ok(parsed);
            }
        }
        raw.error_for_status()?.json()
    }
}

fn parse_poll_interval(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(POLL_INTERVAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}

#[async_trait]
impl NotesService for HttpNotesService {
    async fn fetch_notes(&self, path: &str) -> Result<Vec<Discussion>> {
        self.send(Method::GET, path, None, &[])
            .await?
            .error_for_status()?
            .json()
    }

    async fn delete_note(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, None, &[])
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn update_note(&self, endpoint: &str, note: &NoteUpdate) -> Result<Note> {
        self.send_json(Method::PUT, endpoint, note)
            .await?
            .error_for_status()?
            .json()
    }

    async fn reply_to_discussion(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        let raw = self.send_json(Method::POST, endpoint, data).await?;
        Self::note_response(raw)
    }

    async fn create_new_note(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        let raw = self.send_json(Method::POST, endpoint, data).await?;
        Self::note_response(raw)
    }

    async fn toggle_award(&self, endpoint: &str, name: &str) -> Result<serde_json::Value> {
        let raw = self
            .send_json(Method::POST, endpoint, &serde_json::json!({ "name": name }))
            .await?
            .error_for_status()?;
        if raw.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        raw.json()
    }

    async fn poll(&self, request: &PollRequest) -> Result<PolledNotes> {
        let headers: Vec<(&str, String)> = request
            .last_fetched_at
            .map(|ts| vec![(LAST_FETCHED_AT_HEADER, ts.to_string())])
            .unwrap_or_default();
        let raw = self
            .send(Method::GET, &request.endpoint, None, &headers)
            .await?
            .error_for_status()?;
        let response: PollResponse = raw.json()?;
        Ok(PolledNotes {
            response,
            poll_interval: parse_poll_interval(&raw.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_url_joining() {
        let service = HttpNotesService::new("http://localhost:3000/");
        assert_eq!(service.base_url(), "http://localhost:3000");
        assert_eq!(service.url("/notes"), "http://localhost:3000/notes");
        assert_eq!(service.url("notes/1"), "http://localhost:3000/notes/1");
        assert_eq!(service.url("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_poll_interval_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_poll_interval(&headers), None);
        headers.insert(POLL_INTERVAL_HEADER, HeaderValue::from_static("15000"));
        assert_eq!(parse_poll_interval(&headers), Some(15000));
        headers.insert(POLL_INTERVAL_HEADER, HeaderValue::from_static("-1"));
        assert_eq!(parse_poll_interval(&headers), Some(-1));
        headers.insert(POLL_INTERVAL_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(parse_poll_interval(&headers), None);
    }
}
