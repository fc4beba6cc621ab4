//! Streaming helpers for iterating Qdrant scroll endpoints without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::client::QdrantService;
use super::types::{QdrantError, ScrollResponse};

const DEFAULT_SCROLL_LIMIT: usize = 512;

/// Stream Qdrant payloads for a collection using the scroll API.
///
/// Points without a payload are skipped.
pub fn stream_payloads<'a>(
    service: &'a QdrantService,
    collection: &'a str,
    with_payload: Value,
) -> impl Stream<Item = Result<Map<String, Value>, QdrantError>> + 'a {
    try_stream! {
        let mut offset: Option<Value> = None;
        let payload_template = with_payload;

        loop {
            let body = json!({
                "with_payload": payload_template.clone(),
                "with_vector": false,
                "limit": DEFAULT_SCROLL_LIMIT,
                "offset": offset.clone().unwrap_or(Value::Null),
            });

            let response = service
                .request(Method::POST, &format!("collections/{collection}/points/scroll"))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let ScrollResponse { result } = response.json().await?;
                for point in result.points {
                    if let Some(payload) = point.payload {
                        yield payload;
                    }
                }

                match result.next_page_offset {
                    Some(next) => offset = Some(next),
                    None => break,
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = collection, status = %status, "Failed to scroll payloads via stream");
                Err(QdrantError::UnexpectedStatus { status, body })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, stream::StreamExt};
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn stream_payloads_collects_multiple_pages() {
        let server = MockServer::start_async().await;
        let config = crate::config::Config::from_lookup(|key| {
            (key == "QDRANT_URL").then(|| server.base_url())
        })
        .expect("config");
        let service = QdrantService::new(&config).expect("client");

        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/scroll")
                    .body_contains("\"offset\":null");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "a", "payload": { "page": 0, "source": "brief.pdf" } }
                        ],
                        "next_page_offset": { "offset": 1 }
                    }
                }));
            })
            .await;

        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/scroll")
                    .body_contains("\"offset\":{\"offset\":1}");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "b", "payload": { "page": 1, "source": "brief.pdf" } },
                            { "id": "c" }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let stream = stream_payloads(&service, "demo", json!(["page", "source"]));
        pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.expect("payload"));
        }

        first.assert();
        second.assert();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("page").and_then(Value::as_u64), Some(0));
        assert_eq!(items[1].get("page").and_then(Value::as_u64), Some(1));
    }
}
