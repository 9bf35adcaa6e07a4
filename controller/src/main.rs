mod controller;
mod gpio;
mod host;
#[cfg(feature = "rpi")]
mod rpi;
mod sensor;
mod service;
mod store;
mod supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
