//! BDD step definitions for device, field and group configuration

use cucumber::given;
use devmon::config::{DeviceConfig, FieldConfig, GroupConfig, NotificationMethodConfig};

use crate::world::{channel_kind, DevmonWorld};

fn device(name: &str, enabled: bool) -> DeviceConfig {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "enabled": enabled,
        "address": "10.0.0.5",
        "resource_path": "state.xml",
    }))
    .expect("device config")
}

fn add_field(world: &mut DevmonWorld, field: &str, group: &str, enabled: bool) {
    world.device_mut().fields.push(FieldConfig {
        name: field.to_string(),
        enabled,
        group: group.to_string(),
    });
}

fn group_mut<'a>(world: &'a mut DevmonWorld, group: &str) -> &'a mut GroupConfig {
    world
        .config
        .groups
        .entry(group.to_string())
        .or_insert_with(|| GroupConfig {
            enabled: true,
            notification_methods: Vec::new(),
        })
}

fn add_method(world: &mut DevmonWorld, group: &str, channel: &str, address: &str, enabled: bool) {
    group_mut(world, group)
        .notification_methods
        .push(NotificationMethodConfig {
            kind: channel_kind(channel),
            address: address.to_string(),
            enabled,
        });
}

#[given(expr = "a device {string}")]
fn a_device(world: &mut DevmonWorld, name: String) {
    world.config.devices.push(device(&name, true));
}

#[given(expr = "a disabled device {string}")]
fn a_disabled_device(world: &mut DevmonWorld, name: String) {
    world.config.devices.push(device(&name, false));
}

#[given(expr = "field {string} belongs to group {string}")]
fn field_in_group(world: &mut DevmonWorld, field: String, group: String) {
    add_field(world, &field, &group, true);
}

#[given(expr = "disabled field {string} belongs to group {string}")]
fn disabled_field_in_group(world: &mut DevmonWorld, field: String, group: String) {
    add_field(world, &field, &group, false);
}

#[given(expr = "group {string} notifies {word} {string}")]
fn group_notifies(world: &mut DevmonWorld, group: String, channel: String, address: String) {
    add_method(world, &group, &channel, &address, true);
}

#[given(expr = "group {string} has a disabled {word} method for {string}")]
fn group_has_disabled_method(
    world: &mut DevmonWorld,
    group: String,
    channel: String,
    address: String,
) {
    add_method(world, &group, &channel, &address, false);
}

#[given(expr = "group {string} is disabled")]
fn group_is_disabled(world: &mut DevmonWorld, group: String) {
    group_mut(world, &group).enabled = false;
}

#[given(expr = "the {word} channel is failing")]
fn channel_is_failing(world: &mut DevmonWorld, channel: String) {
    world.failing_channels.push(channel_kind(&channel));
}

#[given(expr = "the device reports {string}")]
fn device_reports(world: &mut DevmonWorld, body: String) {
    world.http.push(200, &body);
}

#[given(expr = "the device answers with HTTP status {int}")]
fn device_answers_with_status(world: &mut DevmonWorld, status: u16) {
    world.http.push(status, "Internal Server Error");
}
