//! Nearest-endpoint discovery.
//!
//! One GET against the public NDN-FCH service, optionally narrowed by the
//! caller's position. Discovery failure is never an enrollment failure: the
//! caller keeps whatever host it had, and we only log what went wrong.

use reqwest::Client;

/// The fixed NDN-FCH discovery service.
pub const DISCOVERY_SERVICE: &str = "https://ndn-fch.named-data.net/";

/// Optional position hint for the discovery query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoHint {
    pub lat: f64,
    pub lon: f64,
}

/// Ask the discovery service for the closest testbed host.
///
/// Returns `None` on a non-success status or transport failure (logged as a
/// warning). No retries; a single attempt per call.
pub async fn discover(http: &Client, hint: Option<GeoHint>) -> Option<String> {
    discover_at(http, DISCOVERY_SERVICE, hint).await
}

async fn discover_at(http: &Client, base: &str, hint: Option<GeoHint>) -> Option<String> {
    let url = discovery_url(base, hint);
    let response = match http.get(&url).send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(error = %error, "Could not reach the discovery service");
            return None;
        }
    };
    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "Discovery service returned an error");
        return None;
    }
    match response.text().await {
        Ok(body) => {
            let host = body.trim();
            if host.is_empty() {
                tracing::warn!("Discovery service returned an empty host");
                None
            } else {
                tracing::info!(host = %host, "Discovered testbed endpoint");
                Some(host.to_string())
            }
        }
        Err(error) => {
            tracing::warn!(error = %error, "Could not read the discovery response");
            None
        }
    }
}

fn discovery_url(base: &str, hint: Option<GeoHint>) -> String {
    match hint {
        Some(GeoHint { lat, lon }) => format!("{base}?lat={lat}&lon={lon}"),
        None => base.to_string(),
    }
}
