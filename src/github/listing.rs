use bytes::{Buf, Bytes};
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::{Deserializer, SeqAccess, Visitor};
use std::fmt;
use std::io::{self, Read};
use tokio::sync::mpsc;

use super::GithubClient;
use crate::error::{GatewayError, GatewayResult};

/// Seed of the version scan; a listing whose names never exceed it has no version
pub const NO_VERSION: &str = "0";

/// Largest listing body read before giving up
pub const MAX_LISTING_BYTES: u64 = 4 * 1024 * 1024;

const CHANNEL_DEPTH: usize = 4;

/// One element of a contents listing; other fields are ignored
#[derive(Deserialize)]
struct ContentItem {
    name: String,
}

/// Visits a JSON array element by element, keeping only the greatest name
struct LatestName;

impl<'de> Visitor<'de> for LatestName {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of objects with a `name` field")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<String, A::Error> {
        let mut latest = NO_VERSION.to_string();
        while let Some(item) = seq.next_element::<ContentItem>()? {
            if item.name > latest {
                latest = item.name;
            }
        }
        Ok(latest)
    }
}

/// Byte-wise greatest `name` of a listing, `None` when nothing beats [`NO_VERSION`].
///
/// The body is consumed as it is read; only the current maximum is kept.
pub fn latest_version_from<R: Read>(body: R) -> Result<Option<String>, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_reader(body);
    let latest = deserializer.deserialize_seq(LatestName)?;
    deserializer.end()?;

    Ok((latest != NO_VERSION).then_some(latest))
}

/// Blocking reader over body chunks handed over by an async task.
///
/// Must be read from a blocking thread (`spawn_blocking`); the end of the
/// channel is the end of the body.
pub struct ChunkReader {
    rx: mpsc::Receiver<Bytes>,
    current: Bytes,
}

impl ChunkReader {
    pub fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

impl GithubClient {
    /// Latest version published under `<category>/<dependency_path>`.
    ///
    /// A missing directory (404) is reported the same way as an empty one.
    /// The listing is decoded while it downloads, up to [`MAX_LISTING_BYTES`].
    #[tracing::instrument(skip(self))]
    pub async fn resolve_latest(
        &self,
        category: &str,
        dependency_path: &str,
    ) -> GatewayResult<Option<String>> {
        let response = self.get(&self.listing_url(category, dependency_path)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(GatewayError::Upstream(format!(
                    "listing answered {status}"
                )));
            }
            _ => {}
        }

        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let decoder = tokio::task::spawn_blocking(move || latest_version_from(ChunkReader::new(rx)));

        let mut body = response.bytes_stream();
        let mut received = 0u64;
        let mut fed = Ok(());
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    fed = Err(GatewayError::UpstreamUnavailable(e));
                    break;
                }
            };
            received += chunk.len() as u64;
            if received > MAX_LISTING_BYTES {
                fed = Err(GatewayError::Upstream(format!(
                    "listing larger than {MAX_LISTING_BYTES} bytes"
                )));
                break;
            }
            // Decoder finished early (complete array or bad JSON)
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        drop(tx);

        let decoded = decoder
            .await
            .map_err(|e| GatewayError::Upstream(format!("listing decoder failed: {e}")))?;
        fed?;
        let latest = decoded.map_err(|e| GatewayError::Upstream(e.to_string()))?;

        tracing::debug!(received, latest = latest.as_deref().unwrap_or(NO_VERSION), "resolved version");
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latest_version_in(body: &[u8]) -> Result<Option<String>, serde_json::Error> {
        latest_version_from(body)
    }

    #[test]
    fn picks_bytewise_greatest_name() {
        let body = br#"[
            {"name": "1.0.0", "type": "dir"},
            {"name": "1.10.0", "type": "dir"},
            {"name": "1.9.0", "type": "dir"},
            {"name": "maven-metadata.xml", "type": "file"}
        ]"#;
        // Byte-wise, not semantic: "m" sorts after any digit
        assert_eq!(latest_version_in(body).unwrap().as_deref(), Some("maven-metadata.xml"));

        let body = br#"[{"name": "1.0.0"}, {"name": "1.10.0"}, {"name": "1.9.0"}]"#;
        assert_eq!(latest_version_in(body).unwrap().as_deref(), Some("1.9.0"));
    }

    #[test]
    fn empty_listing_has_no_version() {
        assert_eq!(latest_version_in(b"[]").unwrap(), None);
        assert_eq!(latest_version_in(br#"[{"name": "0"}]"#).unwrap(), None);
    }

    #[test]
    fn names_below_the_seed_are_ignored() {
        assert_eq!(latest_version_in(br#"[{"name": "-rc"}]"#).unwrap(), None);
    }

    #[test]
    fn malformed_listings_are_errors() {
        assert!(latest_version_in(br#"{"message": "Not Found"}"#).is_err());
        assert!(latest_version_in(br#"[{"path": "1.0.0"}]"#).is_err());
        assert!(latest_version_in(br#"["1.0.0"]"#).is_err());
        assert!(latest_version_in(br#"[{"name": "1.0.0"}"#).is_err());
        assert!(latest_version_in(br#"[] trailing"#).is_err());
    }

    #[test]
    fn decodes_a_listing_delivered_in_pieces() {
        let body = br#"[{"name": "1.0.0", "type": "dir"}, {"name": "1.2.0", "type": "dir"}, {"name": "1.10.0"}]"#;
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

        // Split inside keys, values and between elements
        let feeder = std::thread::spawn(move || {
            for piece in body.chunks(7) {
                tx.blocking_send(Bytes::copy_from_slice(piece)).unwrap();
            }
        });

        let latest = latest_version_from(ChunkReader::new(rx)).unwrap();
        feeder.join().unwrap();
        assert_eq!(latest.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        tx.try_send(Bytes::from_static(br#"[{"name": "1.0.0"}, {"na"#)).unwrap();
        drop(tx);

        assert!(latest_version_from(ChunkReader::new(rx)).is_err());
    }
}
