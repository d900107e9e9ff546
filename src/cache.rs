use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::stream::SharedBuffer;

/// A buffer together with the device id its channels are keyed by.
#[derive(Clone)]
pub struct BufferSource {
    pub device_id: String,
    pub buffer: SharedBuffer,
}

impl BufferSource {
    pub fn new(device_id: impl Into<String>, buffer: SharedBuffer) -> Self {
        Self {
            device_id: device_id.into(),
            buffer,
        }
    }
}

pub fn channel_key(device_id: &str, column: &str) -> String {
    format!("{} {}", device_id, column)
}

/// Most recent sample per channel, keyed `"<device_id> <column>"`.
#[derive(Debug, Default)]
pub struct LastValues {
    values: RwLock<HashMap<String, String>>,
}

impl LastValues {
    /// Rereads the last row of every buffer.
    pub async fn refresh(&self, sources: &[BufferSource]) {
        for source in sources {
            let buffer = source.buffer.lock().await;
            let sample = buffer.last_sample();
            if sample.is_empty() {
                continue;
            }
            let mut values = self.values.write().await;
            for (column, value) in sample {
                values.insert(channel_key(&source.device_id, column), value.to_string());
            }
        }
    }

    pub async fn get(&self, channel: &str) -> Option<String> {
        self.values.read().await.get(channel).cloned()
    }

    pub async fn channel_count(&self) -> usize {
        self.values.read().await.len()
    }
}
