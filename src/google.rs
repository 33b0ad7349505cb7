use crate::errors::AppError;
use crate::models::GeoLocation;
use crate::sources::{ElevationProvider, Geocoder, StreetImageryProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Deserialize)]
struct GoogleEnvelope<T> {
    status: String,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    elevation: f64,
}

/// Google Maps Platform client: geocoding, elevation and Street View.
#[derive(Clone)]
pub struct GoogleMapsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Google client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Calls a JSON endpoint and returns its results.
    ///
    /// `ZERO_RESULTS` is an empty list; any other non-`OK` status means the
    /// service did not answer usefully.
    async fn get_results<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("key", self.api_key.as_str()));

        let url = reqwest::Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), &query)
            .map_err(|e| AppError::InternalError(format!("Failed to build Google URL: {}", e)))?;

        // Redact key from logs to prevent credential exposure
        tracing::debug!("Google API URL: {}/{}?...&key=[REDACTED]", self.base_url, endpoint);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Google request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Google {} returned {}: {}",
                endpoint, status, error_text
            )));
        }

        let envelope: GoogleEnvelope<T> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Google response: {}", e))
        })?;

        match envelope.status.as_str() {
            "OK" => Ok(envelope.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(AppError::ExternalApiError(format!(
                "Google {} status {}: {}",
                endpoint,
                other,
                envelope.error_message.unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    async fn resolve(&self, address: &str) -> Result<Option<GeoLocation>, AppError> {
        tracing::info!("Geocoding via Google: {}", address);

        let results: Vec<GeocodeResult> = self
            .get_results("geocode/json", &[("address", address), ("region", "it")])
            .await?;

        Ok(results.into_iter().next().map(|r| {
            GeoLocation::new(
                r.geometry.location.lat,
                r.geometry.location.lng,
                r.formatted_address,
                "google",
            )
        }))
    }
}

#[async_trait]
impl ElevationProvider for GoogleMapsClient {
    async fn elevation_at(&self, lat: f64, lng: f64) -> Result<Option<f64>, AppError> {
        let location = format!("{},{}", lat, lng);
        let results: Vec<ElevationResult> = self
            .get_results("elevation/json", &[("locations", location.as_str())])
            .await?;

        Ok(results.first().map(|r| r.elevation))
    }
}

impl StreetImageryProvider for GoogleMapsClient {
    /// Street View Static URL. Built per request and never stored.
    fn image_url_at(&self, lat: f64, lng: f64) -> String {
        let location = format!("{},{}", lat, lng);
        let base = format!("{}/streetview", self.base_url);
        let params = [
            ("size", "600x300"),
            ("location", location.as_str()),
            ("key", self.api_key.as_str()),
            ("fov", "90"),
            ("pitch", "0"),
        ];

        match reqwest::Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => format!(
                "{}?size=600x300&location={}&key={}&fov=90&pitch=0",
                base, location, self.api_key
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_street_view_url() {
        let client = GoogleMapsClient::new(DEFAULT_GOOGLE_MAPS_BASE_URL.to_string(), "k3y".to_string())
            .unwrap();
        let url = client.image_url_at(45.5, 9.25);

        assert!(url.starts_with("https://maps.googleapis.com/maps/api/streetview?"));
        assert!(url.contains("size=600x300"));
        assert!(url.contains("location=45.5%2C9.25"));
        assert!(url.contains("fov=90"));
        assert!(url.contains("pitch=0"));
        assert!(url.contains("key=k3y"));
    }
}
