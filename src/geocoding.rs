use crate::cache_store::CacheStore;
use crate::errors::{AppError, ResultExt};
use crate::models::GeoLocation;
use crate::rate_limiter::RateLimitQueue;
use crate::sources::Geocoder;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = "CatnatPrefill/1.0";

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Nominatim geocoder restricted to Italian results.
///
/// Requests go through a dedicated one-per-second queue, as the public
/// instance's usage policy requires.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    queue: RateLimitQueue,
}

impl NominatimGeocoder {
    pub fn new(base_url: String, queue: RateLimitQueue) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Nominatim client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            queue,
        })
    }

    async fn search(client: Client, url: reqwest::Url) -> Result<Vec<NominatimPlace>, AppError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Nominatim request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Nominatim returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Nominatim response: {}", e))
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoLocation>, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", "it"),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build Nominatim URL: {}", e)))?;

        tracing::info!("Geocoding via Nominatim: {}", address);

        let client = self.client.clone();
        let places = self
            .queue
            .submit(move || Self::search(client, url))
            .await??;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let (lat, lng) = match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
            (Ok(lat), Ok(lng)) => (lat, lng),
            _ => {
                return Err(AppError::ExternalApiError(format!(
                    "Nominatim returned non-numeric coordinates: {}, {}",
                    place.lat, place.lon
                )))
            }
        };

        Ok(Some(GeoLocation::new(lat, lng, place.display_name, "nominatim")))
    }
}

/// Non-expiring geocoding cache in front of a provider.
///
/// Keyed by the raw address, so one provider call per distinct address for
/// the lifetime of the store. Misses are not cached.
#[derive(Clone)]
pub struct CachedGeocoder {
    inner: Arc<dyn Geocoder>,
    store: Arc<dyn CacheStore>,
}

impl CachedGeocoder {
    pub fn new(inner: Arc<dyn Geocoder>, store: Arc<dyn CacheStore>) -> Self {
        Self { inner, store }
    }
}

/// Addresses must be non-empty and already trimmed.
pub fn validate_address(address: &str) -> Result<(), AppError> {
    if address.trim().is_empty() {
        return Err(AppError::BadRequest("Address cannot be empty".to_string()));
    }
    if address.trim() != address {
        return Err(AppError::BadRequest(
            "Address must not have leading or trailing whitespace".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl Geocoder for CachedGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoLocation>, AppError> {
        validate_address(address)?;

        if let Some(cached) = self
            .store
            .get_geocode(address)
            .await
            .context("Failed to read geocoding cache")?
        {
            tracing::debug!("Geocoding cache hit: {}", address);
            return Ok(Some(cached));
        }

        let Some(geo) = self.inner.resolve(address).await? else {
            tracing::info!("No geocoding match for: {}", address);
            return Ok(None);
        };

        self.store
            .put_geocode(address, &geo)
            .await
            .context("Failed to store geocoding result")?;

        Ok(Some(geo))
    }
}
