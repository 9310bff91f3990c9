//! BDD step definitions for the devmon builder and lifecycle

use std::sync::Arc;

use cucumber::{given, then, when};
use devmon::channel::Channel;
use devmon::config::{Config, DashboardConfig};
use devmon::io::HttpClient;
use devmon::DevmonBuilder;
use tokio_util::sync::CancellationToken;

use crate::world::DevmonWorld;

fn build_devmon_builder(world: &mut DevmonWorld) -> DevmonBuilder {
    let config = Config {
        dashboard: DashboardConfig {
            enabled: false,
            ..DashboardConfig::default()
        },
        ..world.config.clone()
    };

    let http: Arc<dyn HttpClient> = world.http.clone();
    let mut builder = DevmonBuilder::new(config)
        .with_http_client(http)
        .with_channels(Vec::<Arc<dyn Channel>>::new());

    if let Some(cancel) = world.lifecycle_cancel.take() {
        builder = builder.with_cancellation_token(cancel);
    }

    builder
}

// --- Given steps ---

#[given("an empty devmon config")]
fn empty_devmon_config(world: &mut DevmonWorld) {
    world.config = Config::default();
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut DevmonWorld) {
    let token = CancellationToken::new();
    token.cancel();
    world.lifecycle_cancel = Some(token);
}

// --- When steps ---

#[when("devmon is built")]
async fn devmon_is_built(world: &mut DevmonWorld) {
    let builder = build_devmon_builder(world);
    match builder.build().await {
        Ok(devmon) => {
            world.lifecycle_build_succeeded = Some(true);
            world.lifecycle_board_len = Some(devmon.status_board().len());
        }
        Err(_) => world.lifecycle_build_succeeded = Some(false),
    }
}

#[when("devmon is built and started")]
async fn devmon_is_built_and_started(world: &mut DevmonWorld) {
    let builder = build_devmon_builder(world);
    match builder.build().await {
        Ok(devmon) => {
            world.lifecycle_build_succeeded = Some(true);
            world.lifecycle_board_len = Some(devmon.status_board().len());
            world.lifecycle_start_succeeded = Some(devmon.start().await.is_ok());
        }
        Err(_) => {
            world.lifecycle_build_succeeded = Some(false);
            world.lifecycle_start_succeeded = Some(false);
        }
    }
}

// --- Then steps ---

#[then("the build should succeed")]
fn build_should_succeed(world: &mut DevmonWorld) {
    assert_eq!(
        world.lifecycle_build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
}

#[then("the lifecycle should complete successfully")]
fn lifecycle_should_complete(world: &mut DevmonWorld) {
    assert_eq!(
        world.lifecycle_build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
    assert_eq!(
        world.lifecycle_start_succeeded,
        Some(true),
        "Expected start to succeed"
    );
}

#[then(expr = "{int} device(s) should be monitored")]
fn devices_monitored(world: &mut DevmonWorld, count: usize) {
    assert_eq!(world.lifecycle_board_len, Some(count));
}
