//! Interactive mode for the server.
//!
//! Prompts for the bind address, port and campaign CSV before starting
//! the server.

use dialoguer::{Confirm, Input};

/// Runs the server in interactive mode, prompting for configuration.
///
/// Sets `BIND_ADDR`, `PORT` and (when given) `CAMPAIGN_DATA_PATH`, then
/// delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Resonance Server");
    println!();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default("0.0.0.0".to_string())
        .interact_text()
        .unwrap_or_else(|_| "0.0.0.0".to_string());

    let port_str: String = Input::new()
        .with_prompt("Port")
        .default("8080".to_string())
        .interact_text()
        .unwrap_or_else(|_| "8080".to_string());

    let data_path: String = Input::new()
        .with_prompt("Campaign CSV (blank for none)")
        .default(std::env::var("CAMPAIGN_DATA_PATH").unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .unwrap_or_default();

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port_str);
        if !data_path.trim().is_empty() {
            std::env::set_var("CAMPAIGN_DATA_PATH", data_path.trim());
        }
    }

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port_str}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
