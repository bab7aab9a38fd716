//! Cloudflare Workers KV adapter.
//!
//! Implements the `vanity-core` AliasStore over the KV REST API: a metadata
//! read to resolve the owner and a multipart value write to claim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use vanity_core::{
    config::Config,
    domain::{Alias, OwnerId, PublicUserId},
    errors::{Error, StoreError},
    ports::AliasStore,
    Result,
};

#[derive(Clone)]
pub struct KvConfig {
    /// Base of the metadata endpoint, ending in `/`.
    pub metadata_url: String,
    /// Base of the values endpoint, ending in `/`.
    pub values_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl From<&Config> for KvConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            metadata_url: cfg.kv_metadata_url(),
            values_url: cfg.kv_values_url(),
            api_token: cfg.kv_api_token.clone(),
            timeout: cfg.kv_http_timeout,
        }
    }
}

#[derive(Clone)]
pub struct CloudflareKv {
    cfg: KvConfig,
    http: reqwest::Client,
}

impl CloudflareKv {
    pub fn new(cfg: KvConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::External(format!("kv http client build error: {e}")))?;
        Ok(Self { cfg, http })
    }

    fn bearer(&self) -> &str {
        let token = self.cfg.api_token.trim();
        token.strip_prefix("Bearer ").unwrap_or(token)
    }

    fn metadata_url(&self, alias: &Alias) -> String {
        format!("{}{}", self.cfg.metadata_url, alias)
    }

    fn value_url(&self, alias: &Alias) -> String {
        format!("{}{}", self.cfg.values_url, alias)
    }
}

#[async_trait]
impl AliasStore for CloudflareKv {
    async fn resolve_owner(&self, alias: &Alias) -> std::result::Result<Option<OwnerId>, StoreError> {
        let resp = self
            .http
            .get(self.metadata_url(alias))
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| StoreError::Transient(format!("kv metadata request error: {e}")))?;

        let status = resp.status();
        debug!(alias = %alias, status = status.as_u16(), "kv metadata response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Transient(format!(
                "kv metadata returned {status}: {}",
                truncate(&body)
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Transient(format!("kv metadata body error: {e}")))?;
        decode_owner(&body)
    }

    async fn write_claim(
        &self,
        alias: &Alias,
        public_id: &PublicUserId,
        owner: OwnerId,
    ) -> std::result::Result<(), StoreError> {
        let form = reqwest::multipart::Form::new()
            .text("value", public_id.to_string())
            .text("metadata", owner_metadata(owner));

        let resp = self
            .http
            .put(self.value_url(alias))
            .bearer_auth(self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Claim(format!("kv value request error: {e}")))?;

        let status = resp.status();
        debug!(alias = %alias, status = status.as_u16(), "kv value response");

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Claim(format!(
                "kv value write returned {status}: {}",
                truncate(&body)
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct MetadataResponse {
    result: OwnerMetadata,
}

#[derive(Deserialize)]
struct OwnerMetadata {
    id: serde_json::Value,
}

/// Decode `{"result":{"id":"<owner>"}}` from a 200 response.
///
/// The key exists, so a missing or null owner is a decode failure, never "unclaimed".
fn decode_owner(body: &[u8]) -> std::result::Result<Option<OwnerId>, StoreError> {
    let meta = serde_json::from_slice::<MetadataResponse>(body)
        .map_err(|e| StoreError::Transient(format!("kv metadata decode error: {e}")))?
        .result;

    let owner = match &meta.id {
        serde_json::Value::String(s) => s.parse::<OwnerId>().ok(),
        serde_json::Value::Number(n) => n.as_u64().map(OwnerId),
        _ => None,
    };
    owner.map(Some).ok_or_else(|| {
        StoreError::Transient(format!("kv metadata has invalid owner id: {}", meta.id))
    })
}

/// Ownership metadata stored next to the value: `{"id":"<owner>"}`.
fn owner_metadata(owner: OwnerId) -> String {
    serde_json::json!({ "id": owner.to_string() }).to_string()
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use vanity_core::{
        claim::{ClaimHandler, ClaimOutcome, FailedStage, DEFAULT_LOOKUP_BASE_URL},
        ports::ClaimResponder,
    };

    use super::*;

    #[derive(Debug)]
    struct Captured {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: String,
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn read_more(sock: &mut TcpStream, buf: &mut Vec<u8>) {
        let mut chunk = [0u8; 4096];
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed connection early");
        buf.extend_from_slice(&chunk[..n]);
    }

    async fn read_request(sock: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let header_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
            read_more(sock, &mut buf).await;
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap().split(' ');
        let method = request_line.next().unwrap().to_string();
        let path = request_line.next().unwrap().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        if let Some(len) = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            while buf.len() < header_end + len {
                read_more(sock, &mut buf).await;
            }
        } else if headers
            .get("transfer-encoding")
            .is_some_and(|v| v.contains("chunked"))
        {
            while !buf.ends_with(b"0\r\n\r\n") {
                read_more(sock, &mut buf).await;
            }
        }

        Captured {
            method,
            path,
            headers,
            body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
        }
    }

    /// Serve one canned response per connection, in order.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut sock).await);
                let resp = format!(
                    "HTTP/1.1 {status} STATUS\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(resp.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
            seen
        });
        (format!("http://{addr}"), handle)
    }

    fn client(base: &str, token: &str) -> CloudflareKv {
        CloudflareKv::new(KvConfig {
            metadata_url: format!("{base}/metadata/"),
            values_url: format!("{base}/values/"),
            api_token: token.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn alias(s: &str) -> Alias {
        Alias::try_from(s).unwrap()
    }

    #[test]
    fn decodes_string_and_numeric_owner_ids() {
        assert_eq!(
            decode_owner(br#"{"success":true,"result":{"id":"999"}}"#).unwrap(),
            Some(OwnerId(999))
        );
        assert_eq!(
            decode_owner(br#"{"result":{"id":123456789}}"#).unwrap(),
            Some(OwnerId(123456789))
        );
    }

    #[test]
    fn rejects_undecodable_metadata() {
        assert!(matches!(
            decode_owner(b"not json"),
            Err(StoreError::Transient(_))
        ));
        assert!(matches!(
            decode_owner(br#"{"result":{"id":"abc"}}"#),
            Err(StoreError::Transient(_))
        ));
        assert!(matches!(
            decode_owner(br#"{"result":{}}"#),
            Err(StoreError::Transient(_))
        ));
    }

    #[test]
    fn existing_key_without_owner_is_not_unclaimed() {
        for body in [
            r#"{"success":true,"result":null}"#,
            r#"{"success":true}"#,
            r#"{"result":{"id":null}}"#,
        ] {
            assert!(
                matches!(decode_owner(body.as_bytes()), Err(StoreError::Transient(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn metadata_embeds_owner_as_string() {
        assert_eq!(owner_metadata(OwnerId(123456789)), r#"{"id":"123456789"}"#);
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(client("http://x", "Bearer abc").bearer(), "abc");
        assert_eq!(client("http://x", "abc").bearer(), "abc");
    }

    #[tokio::test]
    async fn missing_key_resolves_to_no_owner() {
        let (base, server) = serve(vec![(404, r#"{"success":false}"#)]).await;
        let owner = client(&base, "tok")
            .resolve_owner(&alias("abc123"))
            .await
            .unwrap();
        assert_eq!(owner, None);

        let seen = server.await.unwrap();
        assert_eq!(seen[0].method, "GET");
        assert_eq!(seen[0].path, "/metadata/abc123");
        assert_eq!(seen[0].headers["authorization"], "Bearer tok");
    }

    #[tokio::test]
    async fn existing_key_resolves_to_owner() {
        let (base, server) = serve(vec![(200, r#"{"result":{"id":"999"}}"#)]).await;
        let owner = client(&base, "tok")
            .resolve_owner(&alias("taken1"))
            .await
            .unwrap();
        assert_eq!(owner, Some(OwnerId(999)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unexpected_status_is_transient() {
        let (base, server) = serve(vec![(500, "oops")]).await;
        let err = client(&base, "tok")
            .resolve_owner(&alias("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transient(ref m) if m.contains("500")));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn write_sends_value_and_metadata_fields() {
        let (base, server) = serve(vec![(200, r#"{"success":true}"#)]).await;
        client(&base, "tok")
            .write_claim(
                &alias("abc123"),
                &PublicUserId::try_from("deadbeef").unwrap(),
                OwnerId(123456789),
            )
            .await
            .unwrap();

        let seen = server.await.unwrap();
        let req = &seen[0];
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, "/values/abc123");
        assert_eq!(req.headers["authorization"], "Bearer tok");
        assert!(req.headers["content-type"].starts_with("multipart/form-data; boundary="));
        assert!(req.body.contains("name=\"value\"\r\n\r\ndeadbeef\r\n"));
        assert!(req
            .body
            .contains("name=\"metadata\"\r\n\r\n{\"id\":\"123456789\"}\r\n"));
    }

    #[tokio::test]
    async fn non_ok_write_is_a_claim_error() {
        let (base, server) = serve(vec![(403, r#"{"success":false}"#)]).await;
        let err = client(&base, "tok")
            .write_claim(
                &alias("abc"),
                &PublicUserId::try_from("ab").unwrap(),
                OwnerId(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Claim(_)));
        server.await.unwrap();
    }

    #[derive(Default)]
    struct RecordingResponder {
        acks: Mutex<usize>,
        replies: Mutex<Vec<ClaimOutcome>>,
    }

    #[async_trait]
    impl ClaimResponder for RecordingResponder {
        async fn acknowledge(&self) -> Result<()> {
            *self.acks.lock().unwrap() += 1;
            Ok(())
        }

        async fn reply(&self, outcome: &ClaimOutcome) -> Result<()> {
            self.replies.lock().unwrap().push(outcome.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn unclaimed_alias_is_claimed_over_http() {
        let (base, server) = serve(vec![(404, "{}"), (200, r#"{"success":true}"#)]).await;
        let handler = ClaimHandler::new(Arc::new(client(&base, "tok")), DEFAULT_LOOKUP_BASE_URL);
        let responder = RecordingResponder::default();

        let out = handler
            .handle("deadbeef", "abc123", OwnerId(123456789), &responder)
            .await;

        match &out {
            ClaimOutcome::Claimed {
                alias, public_id, ..
            } => {
                assert_eq!(alias.as_str(), "abc123");
                assert_eq!(public_id.as_str(), "deadbeef");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].method, "PUT");
        assert!(seen[1].body.contains("{\"id\":\"123456789\"}"));
        assert_eq!(*responder.acks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn taken_alias_skips_the_write_over_http() {
        let (base, server) = serve(vec![(200, r#"{"result":{"id":"999"}}"#)]).await;
        let handler = ClaimHandler::new(Arc::new(client(&base, "tok")), DEFAULT_LOOKUP_BASE_URL);
        let responder = RecordingResponder::default();

        let out = handler
            .handle("deadbeef", "taken1", OwnerId(123456789), &responder)
            .await;

        assert!(matches!(out, ClaimOutcome::Conflict { owner: OwnerId(999), .. }));
        // Only the metadata read reached the server.
        assert_eq!(server.await.unwrap().len(), 1);
        assert_eq!(responder.replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ownerless_metadata_never_overwrites_the_key() {
        let (base, server) = serve(vec![(200, r#"{"success":true,"result":null}"#)]).await;
        let handler = ClaimHandler::new(Arc::new(client(&base, "tok")), DEFAULT_LOOKUP_BASE_URL);
        let responder = RecordingResponder::default();

        let out = handler
            .handle("deadbeef", "taken1", OwnerId(123456789), &responder)
            .await;

        assert!(matches!(
            out,
            ClaimOutcome::Failed {
                stage: FailedStage::Resolve,
                ..
            }
        ));
        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "GET");
    }
}
