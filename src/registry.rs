use crate::confidence::{Confidence, SourceInfo};
use crate::errors::AppError;
use crate::models::CompanyData;
use crate::sources::CompanyRegistry;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const MOCK_SEED: &str = include_str!("../seed/mock_companies.json");

/// Company fields as delivered by a registry, before provenance is attached.
#[derive(Debug, Clone, Deserialize)]
struct RegistryRecord {
    piva: String,
    legal_name: String,
    street: String,
    cap: String,
    municipality: String,
    province: String,
    ateco: String,
    estimated_revenue: Option<f64>,
    estimated_employees: Option<u32>,
}

impl RegistryRecord {
    /// Full postal address: `"{street}, {cap} {municipality} ({province})"`.
    fn full_address(&self) -> String {
        format!(
            "{}, {} {} ({})",
            self.street, self.cap, self.municipality, self.province
        )
    }

    fn into_company(self, source: &str, method: &str, note: &str) -> CompanyData {
        let optional_field = |present: bool| {
            if present {
                SourceInfo::new(source, method, Confidence::High)
            } else {
                SourceInfo::new(source, "not_available", Confidence::Low)
                    .with_note("Value not available")
            }
        };

        let mut sources = BTreeMap::new();
        sources.insert(
            "base".to_string(),
            SourceInfo::new(source, method, Confidence::High).with_note(note),
        );
        sources.insert(
            "revenue".to_string(),
            optional_field(self.estimated_revenue.is_some()),
        );
        sources.insert(
            "employees".to_string(),
            optional_field(self.estimated_employees.is_some()),
        );

        CompanyData {
            address: self.full_address(),
            piva: self.piva,
            legal_name: self.legal_name,
            cap: self.cap,
            municipality: self.municipality,
            ateco: self.ateco,
            estimated_revenue: self.estimated_revenue,
            estimated_employees: self.estimated_employees,
            sources,
        }
    }
}

/// Registry backed by the embedded demo dataset.
pub struct MockRegistry {
    companies: HashMap<String, RegistryRecord>,
}

impl MockRegistry {
    pub fn new() -> Result<Self, AppError> {
        Self::from_json(MOCK_SEED)
    }

    pub fn from_json(seed: &str) -> Result<Self, AppError> {
        let records: Vec<RegistryRecord> = serde_json::from_str(seed).map_err(|e| {
            AppError::InternalError(format!("Invalid mock company seed: {}", e))
        })?;

        tracing::info!("Mock registry loaded with {} companies", records.len());
        Ok(Self {
            companies: records.into_iter().map(|r| (r.piva.clone(), r)).collect(),
        })
    }
}

#[async_trait]
impl CompanyRegistry for MockRegistry {
    async fn lookup(&self, piva: &str) -> Result<Option<CompanyData>, AppError> {
        Ok(self
            .companies
            .get(piva)
            .cloned()
            .map(|r| r.into_company("MockBI", "mock_database", "Demo database record")))
    }
}

#[derive(Debug, Deserialize)]
struct CervedAddress {
    street: String,
    postal_code: String,
    municipality: String,
    province: String,
}

#[derive(Debug, Deserialize)]
struct CervedCompany {
    vat_number: String,
    company_name: String,
    address: CervedAddress,
    ateco_code: String,
    revenue: Option<f64>,
    employees: Option<u32>,
}

impl From<CervedCompany> for RegistryRecord {
    fn from(c: CervedCompany) -> Self {
        Self {
            piva: c.vat_number,
            legal_name: c.company_name,
            street: c.address.street,
            cap: c.address.postal_code,
            municipality: c.address.municipality,
            province: c.address.province,
            ateco: c.ateco_code,
            estimated_revenue: c.revenue,
            estimated_employees: c.employees,
        }
    }
}

/// Client for a Cerved-style business information API.
#[derive(Clone)]
pub struct CervedRegistry {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CervedRegistry {
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create registry client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CompanyRegistry for CervedRegistry {
    async fn lookup(&self, piva: &str) -> Result<Option<CompanyData>, AppError> {
        let url = format!("{}/companies/{}", self.base_url, piva);
        tracing::info!("Fetching company {} from registry: {}", piva, url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Registry request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Registry returned {}: {}",
                status, error_text
            )));
        }

        let company: CervedCompany = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse registry response: {}", e))
        })?;

        Ok(Some(RegistryRecord::from(company).into_company(
            "Cerved",
            "registry_api",
            "Business registry record",
        )))
    }
}
