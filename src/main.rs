use anyhow::Context;
use mixlink::console::{self, ConsoleInput};
use mixlink::{init_logging, link_settings, Config, SerialManager, BUILD_DATE, VERSION};
use std::io::{self, BufRead};

fn load_config() -> Config {
    let Some(path) = console::config_path(std::env::var(console::CONFIG_ENV).ok()) else {
        return Config::default();
    };
    match Config::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("MixLink {} (built {})", VERSION, BUILD_DATE);

    let config = load_config();
    let mut manager = SerialManager::system(link_settings(&config.connection));

    if std::env::args().nth(1).as_deref() == Some("ports") {
        for port in manager.list_available_ports() {
            println!("{}", port.label());
        }
        return Ok(());
    }

    manager.add_fn_listener(|event| println!("{}", event));

    match config.connection.preferred_port() {
        Some(port) => manager.connect(port),
        None => manager.connect_auto(),
    }
    .context("Failed to connect to the MASTER")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        match console::parse_line(&line) {
            ConsoleInput::Quit => break,
            ConsoleInput::Blank => continue,
            ConsoleInput::Send(text) => {
                if let Err(e) = manager.send_raw(text) {
                    tracing::debug!("Command not sent: {}", e);
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}
