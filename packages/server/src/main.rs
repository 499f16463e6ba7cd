#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resonance API server binary.
//!
//! Configuration is read from the environment (`BIND_ADDR`, `PORT`,
//! `CAMPAIGN_DATA_PATH`, `ARTIFACTS_DIR`, API keys). Pass `--interactive`
//! to be prompted for the bind address and port instead.

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if std::env::args().any(|a| a == "--interactive") {
        return resonance_server::interactive::run().await;
    }
    resonance_server::run_server().await
}
