// End-to-end tests for the ingest / render / dump loop
//
// The NATS transport needs a live broker, so these drive the same loop
// through the in-process QueueTransport.

use chrono::Local;
use radarview::dump::{read_dump, DumpSink};
use radarview::event::{MessageDecoder, RawMessage};
use radarview::ingest::{DeliveryLoop, IngestionHandler};
use radarview::render::{FieldTransform, HeadlessSurface, RenderLoop, TickOutcome};
use radarview::shutdown::ShutdownSignal;
use radarview::state::EntityStore;
use radarview::transport::{QueueTransport, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Test harness ──────────────────────────────────────────────────────────────

struct Harness {
    _dir: TempDir,
    store: Arc<EntityStore>,
    sink: Arc<DumpSink>,
    shutdown: ShutdownSignal,
    render: RenderLoop<QueueTransport>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(EntityStore::new());
    let sink = Arc::new(DumpSink::open(dir.path(), Local::now()).unwrap());
    let shutdown = ShutdownSignal::new();

    let mut transport = QueueTransport::new();
    transport.subscribe("radar_debug").unwrap();
    transport.subscribe("radar_raw").unwrap();

    let ingest = IngestionHandler::new(
        MessageDecoder::new("radar_debug"),
        Arc::clone(&store),
        Arc::clone(&sink),
        1000,
    );

    let render = RenderLoop::new(
        Arc::clone(&store),
        Arc::clone(&sink),
        ingest,
        transport,
        FieldTransform::new((28.0, 15.0), (1400, 750)),
        Duration::ZERO,
        shutdown.clone(),
    );

    Harness {
        _dir: dir,
        store,
        sink,
        shutdown,
        render,
    }
}

impl Harness {
    fn deliver(&mut self, topic: &str, payload: &str) {
        self.render
            .transport_mut()
            .push(RawMessage::now(topic, payload.as_bytes().to_vec()));
        assert_eq!(
            self.render.tick(&mut HeadlessSurface).unwrap(),
            TickOutcome::Continue
        );
    }

    /// Stop the loop the way Ctrl-C does, then read the dump back
    fn stop(mut self) -> (Arc<EntityStore>, Vec<radarview::dump::DumpRecord>) {
        self.shutdown.request();
        assert_eq!(
            self.render.tick(&mut HeadlessSurface).unwrap(),
            TickOutcome::Exit
        );
        let records = read_dump(self.sink.path()).unwrap();
        (self.store, records)
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_two_reports_for_same_entity() {
    let mut h = harness();

    h.deliver("radar_debug", r#"{"pos":[1.0,2.0],"id":3,"msg":"ok"}"#);
    h.deliver("radar_debug", r#"{"pos":[1.5,2.0],"id":3,"msg":"moved"}"#);

    let (store, records) = h.stop();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, 3);
    assert_eq!(snapshot[0].position, (1.5, 2.0));
    assert_eq!(snapshot[0].label, "moved");

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].payload,
        br#"{"pos":[1.0,2.0],"id":3,"msg":"ok"}"#.to_vec()
    );
    assert_eq!(
        records[1].payload,
        br#"{"pos":[1.5,2.0],"id":3,"msg":"moved"}"#.to_vec()
    );
}

#[test]
fn test_malformed_report_logged_only() {
    let mut h = harness();

    h.deliver("radar_debug", r#"{"pos":[1.0,2.0],"msg":"no id"}"#);

    let (store, records) = h.stop();
    assert!(store.is_empty());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "radar_debug");
}

#[test]
fn test_other_topic_logged_only() {
    let mut h = harness();

    h.deliver("radar_raw", r#"{"pos":[1.0,2.0],"id":3,"msg":"ok"}"#);

    let (store, records) = h.stop();
    assert!(store.is_empty());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "radar_raw");
}

#[test]
fn test_dump_preserves_arrival_order_across_topics() {
    let mut h = harness();

    for i in 0..20 {
        let topic = if i % 3 == 0 { "radar_raw" } else { "radar_debug" };
        h.deliver(
            topic,
            &format!(r#"{{"pos":[{}.0,1.0],"id":{},"msg":"m{}"}}"#, i, i, i),
        );
    }

    let (store, records) = h.stop();
    assert_eq!(records.len(), 20);
    for (i, record) in records.iter().enumerate() {
        let expected = format!(r#"{{"pos":[{}.0,1.0],"id":{},"msg":"m{}"}}"#, i, i, i);
        assert_eq!(record.payload, expected.into_bytes());
    }
    // Every id not divisible by 3 was on the draw topic
    assert_eq!(store.len(), 13);
}

#[test]
fn test_messages_after_shutdown_are_not_dumped() {
    let mut h = harness();
    h.deliver("radar_debug", r#"{"pos":[1.0,2.0],"id":1,"msg":"a"}"#);

    h.shutdown.request();
    h.render
        .transport_mut()
        .push(RawMessage::now("radar_debug", b"late".to_vec()));
    assert_eq!(
        h.render.tick(&mut HeadlessSurface).unwrap(),
        TickOutcome::Exit
    );

    let records = read_dump(h.sink.path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(h.render.transport_mut().pending(), 1);
}

#[test]
fn test_delivery_thread_works_without_frames() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(EntityStore::new());
    let sink = Arc::new(DumpSink::open(dir.path(), Local::now()).unwrap());
    let shutdown = ShutdownSignal::new();

    let mut transport = QueueTransport::new();
    transport.subscribe("radar_debug").unwrap();
    transport.push(RawMessage::now(
        "radar_debug",
        br#"{"pos":[1.0,2.0],"id":1,"msg":"a"}"#.to_vec(),
    ));
    transport.push(RawMessage::now(
        "radar_debug",
        b"{\n  \"pos\": [3.0, 4.0],\n  \"id\": 2,\n  \"msg\": \"b\"\n}".to_vec(),
    ));

    let ingest = IngestionHandler::new(
        MessageDecoder::new("radar_debug"),
        Arc::clone(&store),
        Arc::clone(&sink),
        1000,
    );
    let mut delivery = DeliveryLoop::new(
        transport,
        ingest,
        Arc::clone(&sink),
        Duration::from_millis(1),
        shutdown.clone(),
    );

    // Nothing draws; the wake callback is the only sign of life
    let wakes = Arc::new(AtomicUsize::new(0));
    let worker = {
        let wakes = Arc::clone(&wakes);
        thread::spawn(move || {
            delivery.run(&|| {
                wakes.fetch_add(1, Ordering::SeqCst);
            })
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while store.len() < 2 {
        assert!(Instant::now() < deadline, "delivery thread never ingested");
        thread::sleep(Duration::from_millis(1));
    }
    assert!(wakes.load(Ordering::SeqCst) >= 1);

    // Ctrl-C only sets the flag; the delivery thread closes the dump
    shutdown.request();
    worker.join().unwrap().unwrap();

    assert!(sink.is_closed());
    let records = read_dump(sink.path()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(store.get(2).unwrap().position, (3.0, 4.0));
}
