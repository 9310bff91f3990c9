//! Rendering a change-set into notification bodies

use std::fmt::Write as _;

use crate::config::DeviceConfig;
use crate::diff::ChangeSet;

/// All views of one cycle's changes for one device, rendered once and shared by every recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub device_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub sms: String,
}

impl Digest {
    pub fn render(device: &DeviceConfig, changes: &ChangeSet) -> Self {
        Self {
            device_name: device.name.clone(),
            subject: format!("Device {} state changed", device.identity()),
            text: render_text(&device.name, changes),
            html: render_html(&device.name, changes),
            sms: render_sms(&device.name, changes),
        }
    }
}

/// Title framed by dashed rules, then one `field: value` line per change
pub fn render_text(device_name: &str, changes: &ChangeSet) -> String {
    let lines: Vec<String> = changes
        .iter()
        .map(|(field, value)| format!("{}: {}", field, value))
        .collect();
    let width = lines
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(device_name.chars().count()))
        .max()
        .unwrap_or(0);
    let rule = "-".repeat(width);

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{}", device_name);
    let _ = writeln!(out, "{}", rule);
    for line in &lines {
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Compact body for SMS
pub fn render_sms(device_name: &str, changes: &ChangeSet) -> String {
    let mut out = format!("State Changed\n{}", device_name);
    for (field, value) in changes {
        let _ = write!(out, "\n{}: {}", field, value);
    }
    out
}

/// Two-column table with the device name as a spanning header
pub fn render_html(device_name: &str, changes: &ChangeSet) -> String {
    let rows: String = changes
        .iter()
        .map(|(field, value)| {
            format!(
                r#"<tr><td style="padding: 3pt;">{}</td><td style="padding: 3pt; background: #808080; color: #ffffff;">{}</td></tr>"#,
                escape_html(field),
                escape_html(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: Verdana, sans-serif;">
<table border="1" cellpadding="0" style="margin: 0 auto; border-collapse: collapse; background: #3b5fa6; color: #ffffff;">
<thead><tr><th colspan="2" style="padding: 3pt; background: #7799ee; color: #000000; font-size: 18pt;">{title}</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
</body>
</html>
"#,
        title = escape_html(device_name),
        rows = rows,
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
