//! HTTP-level tests for the embedding providers against a local mock server.

#![cfg(all(feature = "openai", feature = "gemini"))]

use docqa_rag::gemini::GeminiEmbeddingProvider;
use docqa_rag::openai::OpenAIEmbeddingProvider;
use docqa_rag::{EmbeddingProvider, RagError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Spawn a minimal HTTP server that answers each connection with the next
/// canned body and status. Returns the base URL.
async fn spawn_mock_server(responses: Vec<(u16, &'static str)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (reader, mut writer) = stream.split();
                let mut buf_reader = BufReader::new(reader);
                let mut line = String::new();
                let mut content_length: usize = 0;
                loop {
                    line.clear();
                    buf_reader.read_line(&mut line).await.unwrap_or(0);
                    if line == "\r\n" || line == "\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_lowercase();
                    if lower.starts_with("content-length:") {
                        content_length =
                            lower.trim_start_matches("content-length:").trim().parse().unwrap_or(0);
                    }
                }
                let mut request_body = vec![0u8; content_length];
                buf_reader.read_exact(&mut request_body).await.ok();

                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                writer.write_all(response.as_bytes()).await.ok();
            });
        }
    });

    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn openai_reorders_data_by_index() {
    let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
    let base = spawn_mock_server(vec![(200, body)]).await;
    let provider = OpenAIEmbeddingProvider::new("sk").unwrap().with_base_url(base);

    let vectors = provider.embed_batch(&["first", "second"]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn openai_server_error_is_unavailable() {
    let body = r#"{"error":{"message":"overloaded"}}"#;
    let base = spawn_mock_server(vec![(503, body)]).await;
    let provider = OpenAIEmbeddingProvider::new("sk").unwrap().with_base_url(base);

    let err = provider.embed("text").await.unwrap_err();
    assert!(matches!(err, RagError::BackendUnavailable { .. }));
    assert!(err.to_string().contains("overloaded"));
}

#[tokio::test]
async fn openai_bad_key_is_rejected_not_retryable() {
    let body = r#"{"error":{"message":"Incorrect API key provided"}}"#;
    let base = spawn_mock_server(vec![(401, body)]).await;
    let provider = OpenAIEmbeddingProvider::new("sk").unwrap().with_base_url(base);

    let err = provider.embed("text").await.unwrap_err();
    assert!(matches!(err, RagError::RequestRejected { status: 401, .. }));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Incorrect API key"));
}

#[tokio::test]
async fn openai_rate_limit_stays_retryable() {
    let body = r#"{"error":{"message":"slow down"}}"#;
    let base = spawn_mock_server(vec![(429, body)]).await;
    let provider = OpenAIEmbeddingProvider::new("sk").unwrap().with_base_url(base);

    let err = provider.embed("text").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn gemini_bad_request_is_rejected_not_retryable() {
    let body = r#"{"error":{"code":400,"message":"model not found"}}"#;
    let base = spawn_mock_server(vec![(400, body)]).await;
    let provider = GeminiEmbeddingProvider::new("key").unwrap().with_base_url(base);

    let err = provider.embed_batch(&["a"]).await.unwrap_err();
    assert!(matches!(err, RagError::RequestRejected { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn gemini_parses_batch_embeddings() {
    let body = r#"{"embeddings":[{"values":[0.5,0.5]},{"values":[1.0,0.0]}]}"#;
    let base = spawn_mock_server(vec![(200, body)]).await;
    let provider = GeminiEmbeddingProvider::new("key").unwrap().with_base_url(base);

    let vectors = provider.embed_batch(&["a", "b"]).await.unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1], vec![1.0, 0.0]);
}

#[tokio::test]
async fn gemini_malformed_body_is_invalid_embedding() {
    let base = spawn_mock_server(vec![(200, "not json")]).await;
    let provider = GeminiEmbeddingProvider::new("key").unwrap().with_base_url(base);

    let err = provider.embed_query("q").await.unwrap_err();
    assert!(matches!(err, RagError::InvalidEmbedding { .. }));
}
