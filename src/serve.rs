//! Entry Server: answers a request for one archive entry.
//!
//! The decompressed entry is never buffered whole. A blocking worker reads it
//! in chunks and hands them to the response body through a small channel; the
//! worker owns the archive's [`TransientBlob`], so the blob lives exactly as
//! long as the transfer does. When the client goes away the channel closes,
//! the worker stops at its next send and the blob is deleted.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use mime::Mime;
use std::io::{self, Read};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

use crate::config::ConditionalPolicy;
use crate::error::{GatewayError, GatewayResult};
use crate::io::TransientBlob;
use crate::zip::{ArchiveEntry, ArchiveIndex, EntryReader, ZipParser};

const CHUNK_SIZE: usize = 32 * 1024;
const CHANNEL_DEPTH: usize = 4;

/// Serve `inner_path` out of the archive held by `blob`.
///
/// Answers 304 when the entry was not modified after `if_modified_since`,
/// otherwise 200 with the entry streamed as the body.
pub async fn serve_entry(
    blob: TransientBlob,
    index: &ArchiveIndex,
    inner_path: &str,
    if_modified_since: Option<&HeaderValue>,
    policy: ConditionalPolicy,
) -> GatewayResult<Response> {
    let entry = index
        .get(inner_path)
        .ok_or_else(|| GatewayError::EntryNotFound(inner_path.to_string()))?;

    if let Some(since) = parse_if_modified_since(if_modified_since, policy)? {
        if !modified_after(entry, since) {
            tracing::debug!(path = inner_path, "entry not modified");
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let data_offset = ZipParser::new(&blob).data_offset(entry).await?;
    let reader = EntryReader::open(blob, entry, data_offset)?;

    let content_type = content_type_for(inner_path);
    let last_modified = http_date(entry.modified_at);

    tracing::debug!(
        path = inner_path,
        size = entry.uncompressed_size,
        %content_type,
        "streaming entry"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::LAST_MODIFIED, last_modified),
        ],
        stream_entry(reader),
    )
        .into_response())
}

/// Read `If-Modified-Since` according to `policy`.
///
/// `Strict` accepts only the RFC 1123 layout `Mon, 02 Jan 2006 15:04:05 MST`.
/// `Lenient` also takes the obsolete RFC 850 and asctime forms, and treats
/// anything unparseable as absent.
pub fn parse_if_modified_since(
    value: Option<&HeaderValue>,
    policy: ConditionalPolicy,
) -> GatewayResult<Option<DateTime<Utc>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let raw = value.to_str().ok();

    match policy {
        ConditionalPolicy::Strict => raw
            .and_then(parse_rfc1123)
            .map(Some)
            .ok_or_else(|| {
                GatewayError::ConditionalHeaderParse(
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            }),
        ConditionalPolicy::Lenient => {
            let parsed = raw.and_then(|s| {
                parse_rfc1123(s)
                    .or_else(|| httpdate::parse_http_date(s).ok().map(DateTime::<Utc>::from))
            });
            if parsed.is_none() {
                tracing::debug!(header = ?value, "ignoring malformed If-Modified-Since");
            }
            Ok(parsed)
        }
    }
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// `Ddd, DD Mon YYYY HH:MM:SS ZONE`. The weekday must be a valid name but is
/// not checked against the date; any alphabetic zone abbreviation reads as UTC.
fn parse_rfc1123(raw: &str) -> Option<DateTime<Utc>> {
    let (weekday, rest) = raw.split_once(", ")?;
    if !WEEKDAYS.contains(&weekday) {
        return None;
    }

    let (stamp, zone) = rest.rsplit_once(' ')?;
    if !(3..=5).contains(&zone.len()) || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    NaiveDateTime::parse_from_str(stamp, "%d %b %Y %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether `entry` changed strictly after `since`, at whole-second precision
fn modified_after(entry: &ArchiveEntry, since: DateTime<Utc>) -> bool {
    entry.modified_at.timestamp() > since.timestamp()
}

/// RFC 1123 rendering, e.g. `Fri, 01 Jan 2021 00:00:00 GMT`
pub fn http_date(at: DateTime<Utc>) -> String {
    let secs = u64::try_from(at.timestamp()).unwrap_or(0);
    httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

/// MIME type from the file name's extension; `text/plain` when there is none
/// or it is not recognized
pub fn content_type_for(path: &str) -> Mime {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name[idx + 1..].to_ascii_lowercase(),
        _ => return mime::TEXT_PLAIN,
    };

    match extension.as_str() {
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" | "mjs" => mime::TEXT_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "xml" => mime::TEXT_XML,
        "txt" | "list" => mime::TEXT_PLAIN,
        "csv" => mime::TEXT_CSV,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "svg" => mime::IMAGE_SVG,
        "bmp" => mime::IMAGE_BMP,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "zip" => "application/zip".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "jar" => "application/java-archive"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::TEXT_PLAIN,
    }
}

/// Body fed by a blocking worker that owns `reader` (and with it the blob)
fn stream_entry(reader: EntryReader) -> Body {
    let (tx, mut rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);
    tokio::task::spawn_blocking(move || pump(reader, tx));
    Body::from_stream(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}

fn pump(mut reader: EntryReader, tx: mpsc::Sender<io::Result<Bytes>>) {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    tracing::debug!("client went away, abandoning entry");
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(error = %e, "entry stream failed");
                // Receiver may already be gone; nothing left to tell
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn detects_content_types() {
        assert_eq!(content_type_for("index.html"), mime::TEXT_HTML);
        assert_eq!(content_type_for("org/example/package-list"), mime::TEXT_PLAIN);
        assert_eq!(content_type_for("stylesheet.CSS"), mime::TEXT_CSS);
        assert_eq!(content_type_for("resources/glass.png"), mime::IMAGE_PNG);
        assert_eq!(content_type_for("dir.v1/README"), mime::TEXT_PLAIN);
        assert_eq!(content_type_for(".hidden"), mime::TEXT_PLAIN);
        assert_eq!(content_type_for("data.unknownext"), mime::TEXT_PLAIN);
        assert_eq!(content_type_for("index.html").to_string(), "text/html");
    }

    #[test]
    fn formats_last_modified_as_rfc1123() {
        let at = DateTime::parse_from_rfc3339("2021-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(http_date(at), "Fri, 01 Jan 2021 00:00:00 GMT");
    }

    #[test]
    fn parses_conditional_header() {
        let parsed = parse_if_modified_since(
            Some(&header("Fri, 01 Jan 2021 00:00:00 GMT")),
            ConditionalPolicy::Strict,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.to_rfc3339(), "2021-01-01T00:00:00+00:00");

        assert!(
            parse_if_modified_since(None, ConditionalPolicy::Strict)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_conditional_header_follows_policy() {
        let bad = header("yesterday at noon");

        let err = parse_if_modified_since(Some(&bad), ConditionalPolicy::Strict).unwrap_err();
        assert!(matches!(err, GatewayError::ConditionalHeaderParse(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(
            parse_if_modified_since(Some(&bad), ConditionalPolicy::Lenient)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn strict_policy_takes_only_the_rfc1123_layout() {
        let strict = |raw: &str| parse_if_modified_since(Some(&header(raw)), ConditionalPolicy::Strict);
        let new_year = "2021-01-01T00:00:00+00:00";

        // Zone abbreviations read as UTC; the weekday is not checked against the date
        for raw in [
            "Fri, 01 Jan 2021 00:00:00 GMT",
            "Fri, 01 Jan 2021 00:00:00 UTC",
            "Sat, 01 Jan 2021 00:00:00 GMT",
        ] {
            assert_eq!(strict(raw).unwrap().unwrap().to_rfc3339(), new_year, "{raw}");
        }

        for raw in [
            "Friday, 01-Jan-21 00:00:00 GMT",
            "Fri Jan  1 00:00:00 2021",
            "Fri, 01 Jan 2021 00:00:00",
            "Fri, 01 Jan 2021 00:00:00 +0000",
            "Fry, 01 Jan 2021 00:00:00 GMT",
            "Fri, 32 Jan 2021 00:00:00 GMT",
        ] {
            assert!(
                matches!(strict(raw), Err(GatewayError::ConditionalHeaderParse(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn lenient_policy_also_takes_obsolete_forms() {
        for raw in ["Friday, 01-Jan-21 00:00:00 GMT", "Fri Jan  1 00:00:00 2021"] {
            let parsed = parse_if_modified_since(Some(&header(raw)), ConditionalPolicy::Lenient)
                .unwrap()
                .unwrap();
            assert_eq!(parsed.to_rfc3339(), "2021-01-01T00:00:00+00:00", "{raw}");
        }
    }

    #[tokio::test]
    async fn pump_stops_and_releases_the_blob_when_the_body_is_dropped() {
        use crate::zip::test_support::build_archive;

        let data = vec![b'x'; CHANNEL_DEPTH * CHUNK_SIZE * 8];
        let bytes = build_archive(&[("big.bin", data.as_slice(), ::zip::CompressionMethod::Stored)]);

        let dir = tempfile::tempdir().unwrap();
        let mut blob = TransientBlob::create_in(dir.path(), "entrepot").unwrap();
        blob.append(&bytes).unwrap();
        blob.seal().unwrap();
        let path = blob.path().to_path_buf();

        let index = ArchiveIndex::build(&blob).await.unwrap();
        let entry = index.get("big.bin").unwrap().clone();
        let offset = ZipParser::new(&blob).data_offset(&entry).await.unwrap();
        let reader = EntryReader::open(blob, &entry, offset).unwrap();

        let (tx, mut rx) = mpsc::channel(CHANNEL_DEPTH);
        let worker = tokio::task::spawn_blocking(move || pump(reader, tx));

        let first = rx.recv().await.unwrap().unwrap();
        assert!(!first.is_empty());
        drop(rx);

        // The entry is far larger than the channel can hold, so the worker
        // only returns because its send failed
        worker.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn pump_ends_the_body_with_the_read_error() {
        use crate::zip::test_support::build_archive;

        let mut bytes = build_archive(&[("index.html", b"hello".as_slice(), ::zip::CompressionMethod::Stored)]);
        let at = bytes.windows(5).position(|w| w == b"hello").unwrap();
        bytes[at] = b'j';

        let dir = tempfile::tempdir().unwrap();
        let mut blob = TransientBlob::create_in(dir.path(), "entrepot").unwrap();
        blob.append(&bytes).unwrap();
        blob.seal().unwrap();

        let index = ArchiveIndex::build(&blob).await.unwrap();
        let entry = index.get("index.html").unwrap().clone();
        let offset = ZipParser::new(&blob).data_offset(&entry).await.unwrap();
        let reader = EntryReader::open(blob, &entry, offset).unwrap();

        let (tx, mut rx) = mpsc::channel(CHANNEL_DEPTH);
        tokio::task::spawn_blocking(move || pump(reader, tx))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap().as_ref(), b"jello");
        let err = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(rx.recv().await.is_none());
    }
}
