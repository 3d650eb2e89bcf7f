use std::sync::{Arc, Mutex};
use std::time::Duration;

use evidence_engine::{MonitorEvent, MonitorSink, ProgressStream, StreamSettings};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl TestSink {
    fn take(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn count(&self, predicate: impl Fn(&MonitorEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl MonitorSink for TestSink {
    fn emit(&self, event: MonitorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn fast_settings() -> StreamSettings {
    StreamSettings {
        retry: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(2),
    }
}

fn stream_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/jobs/stream/proj-7", server.uri())).unwrap()
}

const EVENTS: &str = concat!(
    ": connected\n\n",
    "data: {\"processing\": 1, \"pending\": 2, \"current_processing\": ",
    "{\"document_id\": \"f1\", \"current_page\": 2, \"total_pages\": 5}}\n\n",
    "event: heartbeat\ndata: ping\n\n",
    "data: {\"completed\": 2, \"failed\": 1}\n\n",
    "data: {\"completed\": 2, \"failed\": 1}\n\n",
);

#[tokio::test]
async fn forwards_snapshots_and_completes_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/stream/proj-7"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(EVENTS, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(TestSink::default());
    let mut stream = ProgressStream::new(stream_url(&server), fast_settings(), sink.clone());
    stream.connect();
    stream.connect();
    tokio::time::timeout(Duration::from_secs(5), stream.closed())
        .await
        .expect("stream finished");

    let events = sink.take();
    assert_eq!(events.len(), 3, "{events:?}");
    match &events[0] {
        MonitorEvent::Snapshot(snapshot) => {
            assert_eq!(snapshot.counts.active(), 3);
            let current = snapshot.currently_processing.as_ref().expect("current");
            assert_eq!(current.unit_progress().percent(), Some(40));
        }
        other => panic!("expected snapshot, got {other:?}"),
    }
    assert!(matches!(&events[1], MonitorEvent::Snapshot(s) if s.is_terminal()));
    match &events[2] {
        MonitorEvent::Completed(snapshot) => {
            assert_eq!(snapshot.summary().to_string(), "2 completed, 1 failed");
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(!stream.is_connected());
}

#[tokio::test]
async fn transport_errors_are_reported_and_retried_until_disconnect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/stream/proj-7"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = Arc::new(TestSink::default());
    let mut stream = ProgressStream::new(stream_url(&server), fast_settings(), sink.clone());
    stream.connect();

    let errors = |event: &MonitorEvent| matches!(event, MonitorEvent::TransportError(_));
    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.count(errors) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream kept retrying");
    assert!(stream.is_connected());

    stream.disconnect();
    stream.disconnect();
    assert!(!stream.is_connected());

    let seen = sink.count(errors);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.count(errors), seen);
    assert_eq!(sink.count(|event| event.is_final()), 0);
}

#[tokio::test]
async fn disconnect_without_connect_is_safe() {
    let sink = Arc::new(TestSink::default());
    let url = Url::parse("http://127.0.0.1:9/jobs/stream/none").unwrap();
    let mut stream = ProgressStream::new(url, fast_settings(), sink.clone());

    stream.disconnect();
    assert!(!stream.is_connected());
    assert!(sink.take().is_empty());
}
