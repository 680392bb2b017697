use crate::api::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// HTTP handler for GET /api/events (SSE endpoint)
///
/// Streams a `status` event every time any target's status is written,
/// whether by a poll tick or by a user command. The stream ends when the
/// controller is asked to stop, so open panels never hold up shutdown.
pub(crate) async fn stream_status_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Status event subscriber connected");
    let mut rx = state.controller.subscribe();
    let mut stop = state.controller.stop_signal();

    let stream = stream! {
        loop {
            if *stop.borrow() {
                break;
            }

            let received = tokio::select! {
                received = rx.recv() => received,
                changed = stop.changed() => match changed {
                    Ok(()) => continue,
                    // A dropped sender means the controller is gone as well
                    Err(_) => break,
                },
            };

            match received {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok(Event::default().event("status").data(json));
                    }
                    Err(e) => {
                        error!("Failed to serialize status event: {}", e);
                    }
                },
                // A slow client only misses intermediate states; the next write catches it up
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status event subscriber lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Status event stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use crate::api::{create_router, serve_until};
    use crate::control::Controller;
    use crate::dispatcher::Dispatcher;
    use crate::registry::test_registry;
    use crate::transport::testing::ScriptedTransport;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_write_is_streamed() {
        let controller = Arc::new(Controller::new(
            Arc::new(test_registry(5)),
            Dispatcher::new(Arc::new(ScriptedTransport::new("Camera Stream: Running"))),
        ));
        let app = create_router(Arc::clone(&controller), &[], None);

        let response = app
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        controller
            .trigger_command("cam", crate::protocol::Verb::Start)
            .unwrap()
            .await
            .unwrap();

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();

        assert!(text.starts_with("event: status"), "{text}");
        assert!(text.contains(r#""status":"Camera Stream: Running""#), "{text}");
        assert!(text.contains(r#""category":"running""#), "{text}");
    }

    #[tokio::test]
    async fn test_stream_ends_after_stop_request() {
        let controller = Arc::new(Controller::new(
            Arc::new(test_registry(5)),
            Dispatcher::new(Arc::new(ScriptedTransport::new("Running"))),
        ));
        let app = create_router(Arc::clone(&controller), &[], None);

        let response = app
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        controller.request_stop();

        let mut body = response.into_body().into_data_stream();
        let end = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("event stream stayed open after stop");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_with_open_event_stream() {
        let transport = Arc::new(ScriptedTransport::new("Camera Stream: Running"));
        let controller = Arc::new(Controller::new(
            Arc::new(test_registry(1)),
            Dispatcher::new(transport.clone()),
        ));
        controller.start_polling();

        let router = create_router(Arc::clone(&controller), &[], None);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (trigger, signal) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(
            listener,
            router,
            Arc::clone(&controller),
            async move {
                let _ = signal.await;
            },
        ));

        // A panel holding the event stream open
        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /api/events HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 1024];
        let n = client.read(&mut buf).await.unwrap();
        let head = String::from_utf8_lossy(&buf[..n]);
        assert!(head.starts_with("HTTP/1.1 200"), "{head}");

        trigger.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .expect("server kept running with an event client connected")
            .unwrap()
            .unwrap();

        assert_eq!(controller.active_pollers(), 0);
        let polls = transport.sent().len();
        assert!(polls >= 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(transport.sent().len(), polls);
        assert!(transport.sent().iter().all(|r| r.message.starts_with("status:")));
    }
}
