//! MASTER port auto-detection
//!
//! Clone boards often sit behind CH340/CH341 USB bridges that expose no
//! usable device identity, so detection is a case-insensitive substring match
//! over the port's description and product strings. The first matching port
//! in enumeration order wins; if nothing matches, the first enumerated port is
//! used. Two adapters sharing a chipset are indistinguishable here.

use super::serial::SerialPortInfo;

/// Pick the port most likely to be the MASTER
///
/// Returns `None` only when `ports` is empty.
pub fn detect_port<S: AsRef<str>>(ports: &[SerialPortInfo], keywords: &[S]) -> Option<SerialPortInfo> {
    let Some(first) = ports.first() else {
        tracing::warn!("No COM ports found");
        return None;
    };

    for port in ports {
        tracing::debug!("Found port: {} - {}", port.port_name, port.description);
        if matches_keywords(port, keywords) {
            tracing::info!("Detected Arduino Mega on port: {}", port.port_name);
            return Some(port.clone());
        }
    }

    tracing::warn!(
        "No Arduino Mega specifically detected, using first available port: {}",
        first.port_name
    );
    Some(first.clone())
}

/// Whether any keyword occurs in the port's description or product string
pub fn matches_keywords<S: AsRef<str>>(port: &SerialPortInfo, keywords: &[S]) -> bool {
    let description = port.description.to_lowercase();
    let product = port.product.as_deref().unwrap_or_default().to_lowercase();

    keywords.iter().any(|keyword| {
        let keyword = keyword.as_ref().to_lowercase();
        !keyword.is_empty() && (description.contains(&keyword) || product.contains(&keyword))
    })
}
