use crate::*;

use h2push::{compress, PushRequest, PushState};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderValue;

const TEXT_48: &str = "klajsdlkfjalksdjflaksjdflaksjdfkjasldkfjaklsjdf\n";

/// A request with neither body nor file still opens and ends a stream.
#[tokio::test]
async fn test_empty_push_is_still_sent() -> Result<()> {
    let mut s = Session::new(PushConfig::default());
    let handle = s.coordinator.push(&s.ctx, PushRequest::new("/")).await;

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.path, "/");
    assert_eq!(pushed.headers[CONTENT_LENGTH], "0");
    assert!(pushed.headers.get(CONTENT_ENCODING).is_none());
    assert!(pushed.read_body().await.is_empty());

    assert_eq!(handle.wait().await.state, PushState::Finished);
    assert!(s.drain_errors().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_text_above_threshold_is_gzipped() -> Result<()> {
    let mut s = Session::new(config_with_threshold("1"));
    assert_eq!(TEXT_48.len(), 48);

    let req = PushRequest::new("/")
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body(TEXT_48);
    let handle = s.coordinator.push(&s.ctx, req).await;
    assert!(handle.is_compressed());

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.headers[CONTENT_ENCODING], "gzip");
    assert!(pushed.headers.get(CONTENT_LENGTH).is_none());

    let body = pushed.read_body().await;
    assert_eq!(gunzip(&body)?, TEXT_48.as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_text_at_threshold_is_sent_plain() -> Result<()> {
    let mut s = Session::new(config_with_threshold("48b"));
    let req = PushRequest::new("/")
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body(TEXT_48);
    let _handle = s.coordinator.push(&s.ctx, req).await;

    let mut pushed = s.accept().await?;
    assert!(pushed.headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(pushed.headers[CONTENT_LENGTH], "48");
    assert_eq!(&pushed.read_body().await[..], TEXT_48.as_bytes());
    Ok(())
}

/// Non-compressible types carry their exact byte length.
#[tokio::test]
async fn test_image_body_is_not_gzipped() -> Result<()> {
    let mut s = Session::new(config_with_threshold("1"));
    let png = vec![0x89u8; 4096];
    let req = PushRequest::new("/x.png")
        .header(CONTENT_TYPE, HeaderValue::from_static("image/png"))
        .body(png.clone());
    let _handle = s.coordinator.push(&s.ctx, req).await;

    let mut pushed = s.accept().await?;
    assert!(pushed.headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(pushed.headers[CONTENT_LENGTH], "4096");
    assert_eq!(&pushed.read_body().await[..], &png[..]);
    Ok(())
}

#[tokio::test]
async fn test_utf8_length_counts_bytes() -> Result<()> {
    let mut s = Session::new(PushConfig::default());
    let text = "héllo wörld";
    let req = PushRequest::new("/greeting")
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .body(text.to_string());
    let _handle = s.coordinator.push(&s.ctx, req).await;

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.headers[CONTENT_LENGTH], text.len().to_string().as_str());
    assert_eq!(&pushed.read_body().await[..], text.as_bytes());
    Ok(())
}

/// An already-gzipped buffer passes through untouched.
#[tokio::test]
async fn test_existing_encoding_is_forwarded() -> Result<()> {
    let mut s = Session::new(config_with_threshold("1"));
    let gzipped = compress::gzip(b"lol", 6)?;
    let req = PushRequest::new("/")
        .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .header(CONTENT_ENCODING, HeaderValue::from_static("gzip"))
        .body(gzipped.clone());
    let handle = s.coordinator.push(&s.ctx, req).await;
    assert!(!handle.is_compressed());

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.headers[CONTENT_ENCODING], "gzip");
    let body = pushed.read_body().await;
    assert_eq!(&body[..], &gzipped[..], "payload must not be re-encoded");
    assert_eq!(gunzip(&body)?, b"lol");
    Ok(())
}

#[tokio::test]
async fn test_content_type_inferred_from_path() -> Result<()> {
    let mut s = Session::new(PushConfig::default());
    let handle = s
        .coordinator
        .push(&s.ctx, PushRequest::new("/some.txt").body("lol"))
        .await;
    assert_eq!(handle.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(&pushed.read_body().await[..], b"lol");
    Ok(())
}

/// Inferred text types compress, and the compressed push has no length.
#[tokio::test]
async fn test_inferred_text_drops_content_length() -> Result<()> {
    let mut s = Session::new(PushConfig::default());
    let body = "a".repeat(2048);
    let req = PushRequest::new("/something.txt")
        .header(CONTENT_LENGTH, HeaderValue::from_static("2048"))
        .body(body.clone());
    let _handle = s.coordinator.push(&s.ctx, req).await;

    let mut pushed = s.accept().await?;
    assert_eq!(pushed.headers[CONTENT_ENCODING], "gzip");
    assert!(pushed.headers.get(CONTENT_LENGTH).is_none());
    assert_eq!(gunzip(&pushed.read_body().await)?, body.as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_unknown_extension_stays_untyped_and_plain() -> Result<()> {
    let mut s = Session::new(config_with_threshold("1"));
    let body = vec![b'z'; 2048];
    let handle = s
        .coordinator
        .push(&s.ctx, PushRequest::new("/blob").body(body.clone()))
        .await;
    assert!(handle.headers().get(CONTENT_TYPE).is_none());
    assert!(!handle.is_compressed());

    let mut pushed = s.accept().await?;
    assert_eq!(&pushed.read_body().await[..], &body[..]);
    Ok(())
}

#[tokio::test]
async fn test_custom_filter_overrides_default() -> Result<()> {
    init_tracing();
    let (transport, mut peer) = MemoryTransport::pair(PEER_BUFFER);
    let connection = Connection::new();
    let (sink, _errors) = ErrorSink::channel();
    let ctx = PushContext::new(transport, connection.watch(), sink);

    let coordinator = PushCoordinator::with_filter(
        config_with_threshold("1"),
        Arc::new(|ct: &str| ct.starts_with("image/")),
    );
    let req = PushRequest::new("/x.png")
        .header(CONTENT_TYPE, HeaderValue::from_static("image/png"))
        .body(vec![1u8; 512]);
    let handle = coordinator.push(&ctx, req).await;
    assert!(handle.is_compressed());

    let mut pushed = peer.next_push().await.context("no push")?;
    pushed.acknowledge();
    assert_eq!(gunzip(&pushed.read_body().await)?, vec![1u8; 512]);
    Ok(())
}
