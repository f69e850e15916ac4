//! HTTP dispatcher for the WebClipper service.
//!
//! # Design
//! `JoplinApi` holds the immutable connection settings and a `Transport`.
//! Every endpoint method funnels through `query`, which is split the same way
//! as the rest of the crate: `build_query` turns `(method, endpoint, payload)`
//! into an `HttpRequest` without touching the network, and `dispatch` checks
//! the cancellation token, logs, and hands the request to the transport.
//!
//! Allow-list enforcement happens before `build_query` can run at all:
//! `HttpMethod` and `Endpoint` are closed enums, and the string-typed
//! `query_raw` must parse into them first.
//!
//! get/delete carry the payload as query parameters, post/put as a JSON body.
//! The token is added as a query parameter on every request regardless of
//! method.

use std::io::Read;

use tracing::{debug, trace, Span};
use ureq::unversioned::multipart::{Form, Part};
use url::Url;

use crate::cancel::CancelToken;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::payload::{query_pairs, Payload};
use crate::transport::UreqTransport;

/// Literal body the WebClipper service answers `GET /ping/` with.
pub const PING_REPLY: &str = "JoplinClipperServer";

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug)]
pub struct JoplinApi<T = UreqTransport> {
    config: ClientConfig,
    base: Url,
    transport: T,
    cancel: CancelToken,
    span: Span,
}

impl JoplinApi<UreqTransport> {
    /// Client backed by a blocking `ureq` agent honouring `config.timeout`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> JoplinApi<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let base = Url::parse(&config.host)?;
        if base.cannot_be_a_base() {
            return Err(ApiError::invalid(format!("host {:?} cannot be a base url", config.host)));
        }
        let span = tracing::info_span!("joplin_api", host = %config.host);
        Ok(Self {
            config,
            base,
            transport,
            cancel: CancelToken::new(),
            span,
        })
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Log every dispatch under `span` instead of the default `joplin_api` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the request `query` would send, without sending it.
    pub fn build_query(
        &self,
        method: HttpMethod,
        endpoint: &Endpoint,
        payload: &Payload,
    ) -> Result<HttpRequest> {
        let mut url = self.endpoint_url(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.config.token);
            if !method.carries_body() {
                for (key, value) in query_pairs(payload) {
                    query.append_pair(&key, &value);
                }
            }
        }

        let (headers, body) = if method.carries_body() {
            let body = serde_json::to_vec(payload)?;
            (vec![("content-type".to_string(), JSON.to_string())], Some(body))
        } else {
            (Vec::new(), None)
        };

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Build a `multipart/form-data` upload to `POST resources/`.
    pub fn build_upload(&self, file_name: &str, data: &[u8], props: &Payload) -> Result<HttpRequest> {
        let mut url = self.endpoint_url(&Endpoint::Resources)?;
        url.query_pairs_mut().append_pair("token", &self.config.token);

        let props = serde_json::to_string(props)?;
        let file = Part::bytes(data)
            .file_name(file_name)
            .mime_str(OCTET_STREAM)
            .map_err(|e| ApiError::Encoding(e.into()))?;
        let mut form = Form::new().part("data", file).text("props", &props);
        let content_type = format!("multipart/form-data; boundary={}", form.boundary());
        let mut body = Vec::new();
        form.read_to_end(&mut body)
            .map_err(|e| ApiError::Encoding(e.into()))?;

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("content-type".to_string(), content_type)],
            body: Some(body),
        })
    }

    /// Send one request and return the response untouched.
    pub fn query(&self, method: HttpMethod, endpoint: &Endpoint, payload: &Payload) -> Result<HttpResponse> {
        let request = self.build_query(method, endpoint, payload)?;
        self.dispatch(endpoint, request)
    }

    /// String-typed `query`. `verb` and `path` are validated against the
    /// allow-list before anything is built or sent.
    pub fn query_raw(&self, verb: &str, path: &str, payload: &Payload) -> Result<HttpResponse> {
        let method: HttpMethod = verb.parse()?;
        let endpoint: Endpoint = path.parse()?;
        self.query(method, &endpoint, payload)
    }

    pub(crate) fn upload(&self, file_name: &str, data: &[u8], props: &Payload) -> Result<HttpResponse> {
        let request = self.build_upload(file_name, data, props)?;
        self.dispatch(&Endpoint::Resources, request)
    }

    /// Check the service is up: `GET ping/` must answer `JoplinClipperServer`.
    pub fn ping(&self) -> Result<HttpResponse> {
        let response = self.query(HttpMethod::Get, &Endpoint::Ping, &Payload::new())?;
        if response.body != PING_REPLY.as_bytes() {
            return Err(ApiError::ServiceUnavailable(format!(
                "unexpected ping reply {:?}; check \"Tools > Web Clipper options\" that the service is enabled",
                response.text()
            )));
        }
        Ok(response)
    }

    fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url> {
        endpoint.validate()?;
        let mut url = self.base.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::invalid("host cannot carry a path"))?
            .pop_if_empty()
            .extend(endpoint.segments());
        Ok(url)
    }

    fn dispatch(&self, endpoint: &Endpoint, request: HttpRequest) -> Result<HttpResponse> {
        self.cancel.check()?;
        let method = request.method;
        // The url carries the token; only the path is logged.
        debug!(parent: &self.span, %method, path = %endpoint, "dispatching request");
        let response = self.transport.execute(request).map_err(ApiError::Transport)?;
        trace!(parent: &self.span, %method, path = %endpoint, status = response.status, "response received");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::payload::to_payload;
    use crate::testing::{LogCapture, RecordingTransport};

    fn client() -> JoplinApi<RecordingTransport> {
        let config = ClientConfig::new("secret");
        JoplinApi::with_transport(config, RecordingTransport::ok("")).unwrap()
    }

    fn payload(value: serde_json::Value) -> Payload {
        to_payload(&value).unwrap()
    }

    #[test]
    fn get_puts_token_and_payload_in_query() {
        let req = client()
            .build_query(HttpMethod::Get, &Endpoint::Notes, &payload(json!({"fields": "id,title"})))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://127.0.0.1:41184/notes/?token=secret&fields=id%2Ctitle"
        );
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn delete_puts_payload_in_query() {
        let req = client()
            .build_query(
                HttpMethod::Delete,
                &Endpoint::Folder("f1".into()),
                &payload(json!({"permanent": 1})),
            )
            .unwrap();
        assert_eq!(req.url, "http://127.0.0.1:41184/folders/f1?token=secret&permanent=1");
        assert!(req.body.is_none());
    }

    #[test]
    fn post_and_put_send_identical_json_bodies() {
        let data = payload(json!({"title": "T", "body": "B"}));
        let c = client();
        let post = c.build_query(HttpMethod::Post, &Endpoint::Notes, &data).unwrap();
        let put = c
            .build_query(HttpMethod::Put, &Endpoint::Note("n1".into()), &data)
            .unwrap();

        assert_eq!(post.url, "http://127.0.0.1:41184/notes/?token=secret");
        assert_eq!(put.url, "http://127.0.0.1:41184/notes/n1?token=secret");
        assert_eq!(post.header("content-type"), Some(JSON));
        assert_eq!(put.header("content-type"), Some(JSON));
        assert_eq!(post.body, put.body);

        let body: serde_json::Value = serde_json::from_slice(post.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"title": "T", "body": "B"}));
    }

    #[test]
    fn token_is_percent_encoded() {
        let config = ClientConfig::new("a b&c");
        let c = JoplinApi::with_transport(config, RecordingTransport::ok("")).unwrap();
        let req = c.build_query(HttpMethod::Get, &Endpoint::Ping, &Payload::new()).unwrap();
        assert_eq!(req.url, "http://127.0.0.1:41184/ping/?token=a+b%26c");
    }

    #[test]
    fn ids_are_escaped_as_path_segments() {
        let req = client()
            .build_query(HttpMethod::Get, &Endpoint::Note("a/b".into()), &Payload::new())
            .unwrap();
        assert_eq!(req.url, "http://127.0.0.1:41184/notes/a%2Fb?token=secret");
    }

    #[test]
    fn host_with_path_prefix_is_kept() {
        let config = ClientConfig::new("t").with_host("http://localhost:8080/joplin/");
        let c = JoplinApi::with_transport(config, RecordingTransport::ok("")).unwrap();
        let req = c
            .build_query(HttpMethod::Get, &Endpoint::TagNotes("t1".into()), &Payload::new())
            .unwrap();
        assert_eq!(req.url, "http://localhost:8080/joplin/tags/t1/notes?token=t");
    }

    #[test]
    fn invalid_host_is_rejected() {
        let config = ClientConfig::new("t").with_host("not a url");
        let err = JoplinApi::with_transport(config, RecordingTransport::ok("")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn unsupported_verbs_send_nothing() {
        let c = client();
        for verb in ["patch", "head", "options", "connect", "trace", "fetch"] {
            let err = c.query_raw(verb, "notes", &Payload::new()).unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{verb}");
        }
        assert_eq!(c.transport().calls(), 0);
    }

    #[test]
    fn unknown_paths_send_nothing() {
        let c = client();
        for path in ["notestag/", "tasks", "search", "notes/a/b/c", "", "pings"] {
            let err = c.query_raw("get", path, &Payload::new()).unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{path}");
        }
        assert_eq!(c.transport().calls(), 0);
    }

    #[test]
    fn query_raw_dispatches_once() {
        let c = client();
        c.query_raw("GET", "folders/abc/notes", &Payload::new()).unwrap();
        let sent = c.transport().requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://127.0.0.1:41184/folders/abc/notes?token=secret");
    }

    #[test]
    fn response_is_returned_untouched() {
        let config = ClientConfig::new("t");
        let transport = RecordingTransport::new(404, r#"{"error":"Not Found"}"#);
        let c = JoplinApi::with_transport(config, transport).unwrap();
        let response = c
            .query(HttpMethod::Get, &Endpoint::Note("missing".into()), &Payload::new())
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.text(), r#"{"error":"Not Found"}"#);
    }

    #[test]
    fn transport_failure_propagates() {
        let config = ClientConfig::new("t");
        let c = JoplinApi::with_transport(config, RecordingTransport::failing("connection refused")).unwrap();
        let err = c.query(HttpMethod::Get, &Endpoint::Notes, &Payload::new()).unwrap_err();
        match err {
            ApiError::Transport(source) => assert_eq!(source.to_string(), "connection refused"),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(c.transport().calls(), 1);
    }

    #[test]
    fn ping_accepts_exact_reply() {
        let config = ClientConfig::new("t");
        let c = JoplinApi::with_transport(config, RecordingTransport::ok(PING_REPLY)).unwrap();
        let response = c.ping().unwrap();
        assert_eq!(response.text(), PING_REPLY);
        assert!(c.transport().requests()[0].url.contains("/ping/?token=t"));
    }

    #[test]
    fn ping_rejects_any_other_reply() {
        for body in ["", "joplinclipperserver", "JoplinClipperServer\n", "<html>"] {
            let config = ClientConfig::new("t");
            let c = JoplinApi::with_transport(config, RecordingTransport::ok(body)).unwrap();
            let err = c.ping().unwrap_err();
            assert!(matches!(err, ApiError::ServiceUnavailable(_)), "{body:?}");
        }
    }

    #[test]
    fn cancelled_token_sends_nothing() {
        let cancel = CancelToken::new();
        let c = client().with_cancel(cancel.clone());
        cancel.cancel();
        let err = c.query(HttpMethod::Get, &Endpoint::Notes, &Payload::new()).unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(c.transport().calls(), 0);
    }

    #[test]
    fn upload_is_multipart_with_props() {
        let data = b"\x89PNG\x00\xff";
        let req = client()
            .build_upload("café.png", data, &payload(json!({"title": "cactus"})))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://127.0.0.1:41184/resources/?token=secret");
        let content_type = req.header("content-type").unwrap();
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap();

        let body = req.body.as_deref().unwrap();
        let text = String::from_utf8_lossy(body).into_owned();
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert!(text.contains(r#"name="data"; filename="café.png""#));
        assert!(text.contains("Content-Type: application/octet-stream"));
        assert!(text.contains(r#"name="props""#));
        assert!(text.contains(r#"{"title":"cactus"}"#));
        assert!(body.windows(data.len()).any(|w| w == data));
    }

    #[test]
    fn token_never_reaches_logs() {
        let logs = LogCapture::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            let config = ClientConfig::new("s3cr3t-token");
            let c = JoplinApi::with_transport(config, RecordingTransport::ok(PING_REPLY)).unwrap();
            c.ping().unwrap();
            c.query(HttpMethod::Get, &Endpoint::Note("n1".into()), &payload(json!({"fields": "id"})))
                .unwrap();
            c.query(HttpMethod::Post, &Endpoint::Notes, &payload(json!({"title": "T"})))
                .unwrap();
            c.build_upload("a.txt", b"x", &Payload::new()).unwrap();
        });

        let output = logs.contents();
        assert!(output.contains("dispatching request"), "{output}");
        assert!(output.contains("notes/n1"), "{output}");
        assert!(!output.contains("s3cr3t-token"), "{output}");
    }

    #[test]
    fn empty_and_dot_ids_are_rejected_before_building() {
        let c = client();
        for endpoint in [
            Endpoint::Note(String::new()),
            Endpoint::NoteTags("..".into()),
            Endpoint::TagNote {
                tag_id: "..".into(),
                note_id: "..".into(),
            },
        ] {
            let err = c.build_query(HttpMethod::Get, &endpoint, &Payload::new()).unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{endpoint:?}");
        }
        let err = c.query_raw("delete", "tags/../notes/..", &Payload::new()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert_eq!(c.transport().calls(), 0);
    }
}
