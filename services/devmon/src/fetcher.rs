//! Fetching and parsing a device's XML state document

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::DeviceConfig;
use crate::diff::StateSnapshot;
use crate::io::HttpClient;
use crate::DevmonError;

/// Source of state snapshots for one device
#[async_trait]
pub trait StateFetcher: Send + Sync {
    /// Fetch one snapshot. Every error means "no snapshot this cycle".
    async fn fetch(&self) -> crate::Result<StateSnapshot>;
}

/// Fetches the state document over HTTP(S)
pub struct HttpStateFetcher {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpStateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStateFetcher")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpStateFetcher {
    pub fn new(device: &DeviceConfig, http: Arc<dyn HttpClient>) -> Self {
        let url = device.request_url();
        tracing::debug!("Created state fetcher for '{}' at {}", device.name, url);
        Self { url, http }
    }
}

#[async_trait]
impl StateFetcher for HttpStateFetcher {
    async fn fetch(&self) -> crate::Result<StateSnapshot> {
        let response = self.http.get(&self.url).await?;
        if !response.is_success() {
            return Err(DevmonError::Status {
                url: self.url.clone(),
                status: response.status,
            });
        }
        parse_state_document(&response.body)
    }
}

/// Parse `<root><field>value</field>...</root>` into a snapshot.
///
/// Only immediate children of the root that contain text (or nothing) become
/// fields; children with nested elements are skipped.
pub fn parse_state_document(xml: &str) -> crate::Result<StateSnapshot> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut snapshot = StateSnapshot::new();
    let mut depth = 0usize;
    let mut root_seen = false;
    // Name, accumulated text, and whether a nested element was seen
    let mut field: Option<(String, String, bool)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            DevmonError::Parse(format!(
                "at position {}: {}",
                reader.error_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                match depth {
                    0 if root_seen => {
                        return Err(DevmonError::Parse("multiple root elements".to_string()))
                    }
                    0 => root_seen = true,
                    1 => field = Some((element_name(e.name().as_ref())?, String::new(), false)),
                    _ => {
                        if let Some((_, _, nested)) = field.as_mut() {
                            *nested = true;
                        }
                    }
                }
                depth += 1;
            }
            Event::Empty(e) => match depth {
                0 if root_seen => {
                    return Err(DevmonError::Parse("multiple root elements".to_string()))
                }
                0 => root_seen = true,
                1 => {
                    snapshot.insert(element_name(e.name().as_ref())?, String::new());
                }
                _ => {
                    if let Some((_, _, nested)) = field.as_mut() {
                        *nested = true;
                    }
                }
            },
            Event::Text(e) if depth == 2 => {
                let text = e
                    .unescape()
                    .map_err(|e| DevmonError::Parse(e.to_string()))?;
                if let Some((_, value, _)) = field.as_mut() {
                    value.push_str(&text);
                }
            }
            Event::CData(e) if depth == 2 => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| DevmonError::Parse(e.to_string()))?;
                if let Some((_, value, _)) = field.as_mut() {
                    value.push_str(text);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    if let Some((name, value, nested)) = field.take() {
                        if !nested {
                            snapshot.insert(name, value);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(DevmonError::Parse("no root element".to_string()));
    }
    if depth != 0 {
        return Err(DevmonError::Parse("unexpected end of document".to_string()));
    }
    Ok(snapshot)
}

fn element_name(raw: &[u8]) -> crate::Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| DevmonError::Parse(format!("element name is not UTF-8: {}", e)))
}
