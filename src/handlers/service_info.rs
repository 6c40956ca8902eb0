use crate::types::{Endpoint, HtsgetCapabilities, Organization, ServiceInfo, ServiceType};
use axum::Json;

fn service_info(endpoint: Endpoint) -> ServiceInfo {
    ServiceInfo {
        id: format!("org.ga4gh.htsget-refserver.{}", endpoint.name()),
        name: "htsget reference server".to_string(),
        r#type: ServiceType {
            group: "org.ga4gh".to_string(),
            artifact: "htsget".to_string(),
            version: "1.3.0".to_string(),
        },
        description: Some(format!(
            "htsget {} server backed by samtools and bcftools",
            endpoint.name()
        )),
        organization: Organization {
            name: "GA4GH".to_string(),
            url: "https://ga4gh.org".to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        htsget: HtsgetCapabilities {
            datatype: endpoint.name().to_string(),
            formats: endpoint.formats().to_vec(),
            fields_parameter_effective: endpoint.supports_field_filtering(),
            tags_parameters_effective: endpoint.supports_field_filtering(),
        },
    }
}

pub async fn reads_service_info() -> Json<ServiceInfo> {
    Json(service_info(Endpoint::Reads))
}

pub async fn variants_service_info() -> Json<ServiceInfo> {
    Json(service_info(Endpoint::Variants))
}
