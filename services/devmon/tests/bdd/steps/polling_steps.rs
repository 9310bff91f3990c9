//! BDD step definitions for polling cycles, routing and delivery

use std::sync::Arc;

use cucumber::{then, when};
use devmon::channel::Channel;
use devmon::config::ChannelKind;
use devmon::dispatcher::NotificationDispatcher;
use devmon::fetcher::HttpStateFetcher;
use devmon::io::HttpClient;
use devmon::monitor::{CycleOutcome, DeviceMonitor};

use crate::world::{channel_kind, DevmonWorld, RecordingChannel};

fn ensure_monitor(world: &mut DevmonWorld) {
    if world.monitor.is_some() {
        return;
    }

    world.channels = [ChannelKind::SendGrid, ChannelKind::Twilio, ChannelKind::Smtp]
        .into_iter()
        .map(|kind| {
            Arc::new(RecordingChannel::new(
                kind,
                !world.failing_channels.contains(&kind),
            ))
        })
        .collect();
    let channels: Vec<Arc<dyn Channel>> = world
        .channels
        .iter()
        .map(|c| Arc::clone(c) as Arc<dyn Channel>)
        .collect();

    let device = world.device_mut().clone();
    let http: Arc<dyn HttpClient> = world.http.clone();
    let fetcher = HttpStateFetcher::new(&device, http);

    world.monitor = Some(DeviceMonitor::new(
        device,
        Arc::new(fetcher),
        Arc::new(NotificationDispatcher::new(channels)),
        Arc::new(world.config.groups.clone()),
    ));
}

// --- When steps ---

#[when(expr = "the device is polled {int} time(s)")]
async fn device_is_polled(world: &mut DevmonWorld, times: usize) {
    ensure_monitor(world);
    let monitor = world.monitor.as_mut().expect("monitor");
    for _ in 0..times {
        let outcome = monitor.poll_once().await;
        world.outcomes.push(outcome);
    }
}

// --- Then steps ---

#[then(expr = "the first cycle only records a baseline")]
fn first_cycle_is_baseline(world: &mut DevmonWorld) {
    assert_eq!(world.outcomes.first(), Some(&CycleOutcome::Baseline));
}

#[then(expr = "cycle {int} fails to fetch")]
fn cycle_fails_to_fetch(world: &mut DevmonWorld, cycle: usize) {
    assert_eq!(
        world.outcomes.get(cycle - 1),
        Some(&CycleOutcome::FetchFailed),
        "outcomes: {:?}",
        world.outcomes
    );
}

#[then(expr = "cycle {int} detects no change")]
fn cycle_detects_no_change(world: &mut DevmonWorld, cycle: usize) {
    assert_eq!(
        world.outcomes.get(cycle - 1),
        Some(&CycleOutcome::Unchanged),
        "outcomes: {:?}",
        world.outcomes
    );
}

#[then(expr = "cycle {int} detects changes to {string}")]
fn cycle_detects_changes(world: &mut DevmonWorld, cycle: usize, fields: String) {
    let expected: Vec<&str> = fields.split(',').map(str::trim).collect();
    match world.outcomes.get(cycle - 1) {
        Some(CycleOutcome::Changed { changes, .. }) => {
            let actual: Vec<&str> = changes.keys().map(String::as_str).collect();
            assert_eq!(actual, expected);
        }
        other => panic!("expected cycle {} to detect changes, got {:?}", cycle, other),
    }
}

#[then(expr = "{int} notification(s) should be delivered")]
fn notifications_delivered(world: &mut DevmonWorld, count: usize) {
    let delivered: usize = world.channels.iter().map(|c| c.successful()).sum();
    assert_eq!(delivered, count);
}

#[then(expr = "{int} delivery attempt(s) should have been made")]
fn delivery_attempts(world: &mut DevmonWorld, count: usize) {
    let attempts: usize = world.channels.iter().map(|c| c.attempts()).sum();
    assert_eq!(attempts, count);
}

#[then(expr = "{word} {string} should receive a message containing {string}")]
fn recipient_receives(world: &mut DevmonWorld, channel: String, address: String, text: String) {
    let kind = channel_kind(&channel);
    let digests = world.channel(kind).delivered_to(&address);
    assert_eq!(digests.len(), 1, "expected one message to {}", address);

    let body = match kind {
        ChannelKind::Twilio => &digests[0].sms,
        ChannelKind::SendGrid | ChannelKind::Smtp => &digests[0].text,
    };
    assert!(body.contains(&text), "{:?} does not contain {:?}", body, text);
}

#[then(expr = "{word} {string} should receive nothing")]
fn recipient_receives_nothing(world: &mut DevmonWorld, channel: String, address: String) {
    let digests = world.channel(channel_kind(&channel)).delivered_to(&address);
    assert!(digests.is_empty(), "unexpected messages: {:?}", digests);
}

#[then(expr = "the poll counters should be total {int}, changed {int}, unchanged {int}")]
fn poll_counters(world: &mut DevmonWorld, total: u64, changed: u64, unchanged: u64) {
    let stats = world.monitor.as_ref().expect("monitor").stats();
    assert_eq!(stats.polls_total, total, "total");
    assert_eq!(stats.polls_changed, changed, "changed");
    assert_eq!(stats.polls_unchanged, unchanged, "unchanged");
}

#[then(expr = "the fetch error count should be {int}")]
fn fetch_error_count(world: &mut DevmonWorld, count: u64) {
    let stats = world.monitor.as_ref().expect("monitor").stats();
    assert_eq!(stats.fetch_errors, count);
}

#[then(expr = "the baseline should have {string} set to {string}")]
fn baseline_has(world: &mut DevmonWorld, field: String, value: String) {
    let baseline = world
        .monitor
        .as_ref()
        .expect("monitor")
        .baseline()
        .expect("no baseline recorded");
    assert_eq!(baseline.get(&field), Some(&value));
}

#[then(expr = "the device should have been fetched from {string}")]
fn fetched_from(world: &mut DevmonWorld, url: String) {
    let requests = world.http.requests.lock().unwrap();
    assert!(
        requests.iter().all(|r| *r == url),
        "requests: {:?}",
        *requests
    );
    assert!(!requests.is_empty());
}
