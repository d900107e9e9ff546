//!
//! This library drives several Quarch power modules through a local
//! QIS instance: connect, resample, stream into per-module buffers and
//! report the latest readings.
//!
//! <br>
//!
//! # Details
//!
//! - QIS has to be reachable on `127.0.0.1:9722`, or be startable with
//!   `java -jar qis.jar`.
//!
//! - Basic setup and streaming
//!
//!   ```no_run
//!   use qis_multistream::{PowerModule, ResampleInterval};
//!   use std::time::Duration;
//!
//!   #[tokio::main]
//!   async fn main() -> qis_multistream::Result<()> {
//!       let address = "TCP:QTL2789-01-001".parse()?;
//!       let mut module =
//!           PowerModule::connect("127.0.0.1:9722", address, Duration::from_secs(30)).await?;
//!       module.resample(ResampleInterval::from_millis(1)).await?;
//!       module.start_stream(Some(Duration::from_secs(5))).await?;
//!       tokio::time::sleep(Duration::from_secs(5)).await;
//!       module.stop_stream().await?;
//!       eprintln!("{} rows", module.buffer().lock().await.row_count());
//!       Ok(())
//!   }
//!   ```
//!

pub mod address;
pub mod cache;
pub mod config;
pub mod device;
pub mod export;
pub mod interval;
pub mod monitor;
pub mod proto;
pub mod qis;
pub mod run;
pub mod stream;

pub use address::ModuleAddress;
pub use device::PowerModule;
pub use interval::ResampleInterval;
pub use proto::{QisError, Result};
