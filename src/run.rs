use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::cache::{BufferSource, LastValues};
use crate::config::StreamPlan;
use crate::device::PowerModule;
use crate::export::write_csv;
use crate::monitor::{Channel, Monitor};
use crate::proto::response::StreamStatus;
use crate::proto::Result;

async fn start_all(modules: &mut [PowerModule], plan: &StreamPlan) -> Result<()> {
    for module in modules.iter_mut() {
        println!(
            "\nSetting QIS resampling to {} on module: {}",
            plan.resample,
            module.address()
        );
        module.resample(plan.resample).await?;

        println!("Started Recording on module: {}\n", module.address());
        module.start_stream(Some(plan.duration)).await?;
    }
    Ok(())
}

async fn wait(duration: Duration) {
    println!("\nWait for {} seconds...\n", duration.as_secs_f64());
    sleep(duration).await;
}

/// Prints how the stream of `module` ended.
pub async fn check_stream_status(module: &PowerModule) -> Result<StreamStatus> {
    println!("Checking the stream is running (all data has been captured)");
    let status = module.stream_status().await?;
    if status.is_overrun() {
        warn!(address = %module.address(), status = status.raw(), "stream overrun");
    }
    println!("\t{}", status);
    Ok(status)
}

/// Streams every module for the planned duration, then writes one CSV
/// file per module into `output_dir`.
pub async fn multi_stream(
    modules: &mut [PowerModule],
    plan: &StreamPlan,
    output_dir: &Path,
) -> Result<()> {
    println!("\n Simple Multi Device Streaming Example \n");

    start_all(modules, plan).await?;
    wait(plan.duration).await;

    for module in modules.iter_mut() {
        println!("\nStopping the stream on module: {}", module.address());
        module.stop_stream().await?;

        check_stream_status(module).await?;

        println!("\nProcessing Stream Data for Module: {}", module.device_id());
        let buffer = module.buffer();
        let path = write_csv(output_dir, module.device_id(), &*buffer.lock().await).await?;
        println!("QIS Stream Data Saved to CSV File: {}\n", path.display());
    }
    Ok(())
}

/// Streams every module while a background monitor prints the latest
/// readings. Returns the cache as it stood after the final refresh.
pub async fn live_monitoring(
    modules: &mut [PowerModule],
    plan: &StreamPlan,
    channels: &[Channel],
    period: Duration,
) -> Result<Arc<LastValues>> {
    println!("\n Multi Device Live Monitoring Example \n");

    start_all(modules, plan).await?;

    let sources: Vec<BufferSource> = modules
        .iter()
        .map(|m| BufferSource::new(m.device_id(), m.buffer()))
        .collect();
    let cache = Arc::new(LastValues::default());
    let monitor = Monitor::spawn(sources.clone(), cache.clone(), channels.to_vec(), period);

    wait(plan.duration).await;

    monitor.stop().await?;

    for module in modules.iter_mut() {
        println!("\nStopping the stream on module: {}", module.address());
        module.stop_stream().await?;

        cache.refresh(&sources).await;

        check_stream_status(module).await?;
    }
    Ok(cache)
}
