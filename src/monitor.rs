use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{channel_key, BufferSource, LastValues};
use crate::proto::Result;

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// A column to report, with its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub label: String,
    pub column: String,
}

impl Channel {
    pub fn new(label: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            column: column.into(),
        }
    }
}

/// L1 RMS voltage and current plus total apparent power.
pub fn default_channels() -> Vec<Channel> {
    vec![
        Channel::new("L1 RMS Voltage", "L1_RMS mV"),
        Channel::new("L1 RMS Current", "L1_RMS mA"),
        Channel::new("Total Apparent Power", "Tot_PApp mVA"),
    ]
}

/// One report line for `device_id`, or `None` while none of its
/// channels has a value yet.
pub async fn report_line(
    device_id: &str,
    cache: &LastValues,
    channels: &[Channel],
) -> Option<String> {
    let mut fields = Vec::with_capacity(channels.len());
    let mut any = false;
    for channel in channels {
        let value = cache
            .get(&channel_key(device_id, &channel.column))
            .await
            .filter(|v| !v.is_empty());
        any |= value.is_some();
        fields.push(format!(
            "{}: {}",
            channel.label,
            value.as_deref().unwrap_or("None")
        ));
    }
    any.then(|| format!("{} {}", device_id, fields.join(", ")))
}

/// Background task printing the latest readings of every device.
pub struct Monitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Monitor {
    pub fn spawn(
        sources: Vec<BufferSource>,
        cache: Arc<LastValues>,
        channels: Vec<Channel>,
        period: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                cache.refresh(&sources).await;
                println!("[{}]", Local::now().format("%H:%M:%S"));
                for source in &sources {
                    if let Some(line) = report_line(&source.device_id, &cache, &channels).await {
                        println!("{}", line);
                    }
                }
                println!();
            }
            debug!("monitor stopped");
        });
        Self { cancel, handle }
    }

    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.handle.await?;
        Ok(())
    }
}
