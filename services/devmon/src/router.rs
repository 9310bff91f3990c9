//! Resolving changed fields to notification recipients

use crate::config::{ChannelKind, DeviceConfig, GroupTable};
use crate::diff::ChangeSet;

/// One destination that must receive this cycle's digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub kind: ChannelKind,
    pub address: String,
    /// Changed fields whose group subscribed this recipient
    pub triggered_by: Vec<String>,
}

/// Walk field → group → notification method for every enabled field that changed.
///
/// A recipient reached through several fields or groups appears once, in the
/// order it was first reached. Unknown groups, disabled groups and disabled
/// methods are skipped without error.
pub fn resolve(device: &DeviceConfig, changes: &ChangeSet, groups: &GroupTable) -> Vec<Recipient> {
    let mut recipients: Vec<Recipient> = Vec::new();

    for field in device.fields.iter().filter(|f| f.enabled) {
        if !changes.contains_key(&field.name) {
            continue;
        }

        let Some(group) = groups.get(&field.group) else {
            tracing::debug!(
                "Field '{}' of '{}' refers to unknown group '{}'",
                field.name,
                device.name,
                field.group
            );
            continue;
        };
        if !group.enabled {
            tracing::debug!(
                "Group '{}' is disabled, skipping field '{}' of '{}'",
                field.group,
                field.name,
                device.name
            );
            continue;
        }

        for method in group.notification_methods.iter().filter(|m| m.enabled) {
            match recipients
                .iter_mut()
                .find(|r| r.kind == method.kind && r.address == method.address)
            {
                Some(existing) => {
                    if !existing.triggered_by.contains(&field.name) {
                        existing.triggered_by.push(field.name.clone());
                    }
                }
                None => recipients.push(Recipient {
                    kind: method.kind,
                    address: method.address.clone(),
                    triggered_by: vec![field.name.clone()],
                }),
            }
        }
    }

    recipients
}
