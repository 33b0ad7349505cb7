use crate::circuit_breaker::{create_upstream_circuit_breaker, UpstreamBreaker};
use crate::errors::AppError;
use crate::sources::MapDataSource;
use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Default search radius for the building footprint query.
pub const FOOTPRINT_RADIUS_M: u32 = 50;

/// Buildings and building relations within `radius` meters, with their
/// member nodes so the ring can be assembled.
pub fn building_footprint_query(lat: f64, lng: f64, radius: u32) -> String {
    format!(
        "[out:json][timeout:25];\n\
         (\n  \
         way(around:{radius},{lat},{lng})[\"building\"];\n  \
         relation(around:{radius},{lat},{lng})[\"building\"];\n\
         );\n\
         out body;\n\
         >;\n\
         out skel qt;"
    )
}

/// Waterways, water relations and water bodies within `radius` meters,
/// reduced to their centers.
pub fn waterway_query(lat: f64, lng: f64, radius: u32) -> String {
    format!(
        "[out:json][timeout:25];\n\
         (\n  \
         way(around:{radius},{lat},{lng})[\"waterway\"];\n  \
         relation(around:{radius},{lat},{lng})[\"water\"];\n  \
         way(around:{radius},{lat},{lng})[\"natural\"=\"water\"];\n\
         );\n\
         out center;"
    )
}

/// Client for an Overpass API interpreter endpoint.
///
/// Calls go through a circuit breaker; while it is open the client answers
/// with `ExternalApiError` without touching the network.
#[derive(Clone)]
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    breaker: UpstreamBreaker,
}

impl OverpassClient {
    pub fn new(endpoint: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Overpass client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            breaker: create_upstream_circuit_breaker(),
        })
    }

    async fn post_query(&self, query: &str) -> Result<Value, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(query.to_string())
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Overpass request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Overpass returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Overpass response: {}", e))
        })
    }
}

#[async_trait]
impl MapDataSource for OverpassClient {
    async fn query_features(&self, query: &str) -> Result<Value, AppError> {
        tracing::info!("Querying Overpass: {}", self.endpoint);

        match self.breaker.call(self.post_query(query)).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => {
                tracing::warn!("Overpass query failed: {}", e);
                Err(e)
            }
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Overpass circuit open, rejecting query");
                Err(AppError::ExternalApiError(
                    "Overpass circuit breaker is open".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_query_shape() {
        let q = building_footprint_query(45.4642, 9.19, FOOTPRINT_RADIUS_M);
        assert!(q.starts_with("[out:json][timeout:25];"));
        assert!(q.contains("way(around:50,45.4642,9.19)[\"building\"];"));
        assert!(q.contains("relation(around:50,45.4642,9.19)[\"building\"];"));
        assert!(q.ends_with("out body;\n>;\nout skel qt;"));
    }

    #[test]
    fn test_waterway_query_shape() {
        let q = waterway_query(45.0, 9.5, 1000);
        assert!(q.contains("way(around:1000,45,9.5)[\"waterway\"];"));
        assert!(q.contains("relation(around:1000,45,9.5)[\"water\"];"));
        assert!(q.contains("[\"natural\"=\"water\"]"));
        assert!(q.ends_with("out center;"));
    }

    #[test]
    fn test_queries_are_deterministic() {
        assert_eq!(
            building_footprint_query(45.1, 9.2, 50),
            building_footprint_query(45.1, 9.2, 50)
        );
    }
}
