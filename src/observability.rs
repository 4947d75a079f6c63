use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatsync.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatsync.client.request_errors");
pub(crate) static CLIENT_UNAUTHORIZED: Counter = Counter::new("chatsync.client.unauthorized");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatsync.client.request_duration_seconds");

pub(crate) static STREAM_FRAMES: Counter = Counter::new("chatsync.stream.frames");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("chatsync.stream.malformed");
pub(crate) static STREAM_OVERSIZED: Counter = Counter::new("chatsync.stream.oversized");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatsync.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("chatsync.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("chatsync.stream.duration_seconds");

pub(crate) static SEND_STARTED: Counter = Counter::new("chatsync.send.started");
pub(crate) static SEND_COMPLETED: Counter = Counter::new("chatsync.send.completed");
pub(crate) static SEND_FAILED: Counter = Counter::new("chatsync.send.failed");
pub(crate) static SEND_CANCELLED: Counter = Counter::new("chatsync.send.cancelled");
pub(crate) static SEND_STALLED: Counter = Counter::new("chatsync.send.stalled");
pub(crate) static SEND_REJECTED_BUSY: Counter = Counter::new("chatsync.send.rejected_busy");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UNAUTHORIZED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_OVERSIZED);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SEND_STARTED);
    collector.register_counter(&SEND_COMPLETED);
    collector.register_counter(&SEND_FAILED);
    collector.register_counter(&SEND_CANCELLED);
    collector.register_counter(&SEND_STALLED);
    collector.register_counter(&SEND_REJECTED_BUSY);
}
