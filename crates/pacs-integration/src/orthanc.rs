//! Orthanc 影像归档客户端
//!
//! 工作列表通过 Orthanc 的工作列表目录投递（每个检查号一个 `.wl` 文件），
//! 检查、序列、实例通过 REST 接口查询。

use async_trait::async_trait;
use pacs_core::{
    ArchiveInstance, ArchiveSeries, ArchiveStudy, HealthCheck, Order, PacsError, ResolutionOutcome,
};
use pacs_dicom::WorklistWriter;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::archive::ArchiveClient;

/// Orthanc 客户端
#[derive(Debug, Clone)]
pub struct OrthancClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    worklists: WorklistWriter,
}

impl OrthancClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<(String, String)>,
        request_timeout: Duration,
        worklists: WorklistWriter,
    ) -> pacs_core::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PacsError::Config(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            worklists,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ResolutionOutcome> {
        let response = self
            .get(path)
            .send()
            .await
            .map_err(|e| ResolutionOutcome::Transport(format!("GET {}: {}", path, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolutionOutcome::NotFoundYet(format!("GET {} returned 404", path)));
        }
        if !status.is_success() {
            return Err(ResolutionOutcome::Transport(format!("GET {} returned {}", path, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolutionOutcome::Transport(format!("GET {}: {}", path, e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| ResolutionOutcome::ParseError(format!("GET {}: {}", path, e)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct OrthancTags {
    #[serde(rename = "StudyInstanceUID")]
    study_instance_uid: Option<String>,
    #[serde(rename = "AccessionNumber")]
    accession_number: Option<String>,
    #[serde(rename = "PatientID")]
    patient_id: Option<String>,
    #[serde(rename = "PatientName")]
    patient_name: Option<String>,
    #[serde(rename = "Modality")]
    modality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrthancStudy {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "MainDicomTags", default)]
    main_dicom_tags: OrthancTags,
    #[serde(rename = "PatientMainDicomTags", default)]
    patient_main_dicom_tags: OrthancTags,
}

/// 子资源列表既可能是展开的对象，也可能只是ID
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrthancResource {
    Id(String),
    Expanded {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "MainDicomTags", default)]
        main_dicom_tags: OrthancTags,
    },
}

impl OrthancResource {
    fn into_parts(self) -> (String, OrthancTags) {
        match self {
            OrthancResource::Id(id) => (id, OrthancTags::default()),
            OrthancResource::Expanded { id, main_dicom_tags } => (id, main_dicom_tags),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<OrthancStudy> for ArchiveStudy {
    fn from(study: OrthancStudy) -> Self {
        ArchiveStudy {
            id: study.id,
            study_instance_uid: non_empty(study.main_dicom_tags.study_instance_uid),
            accession_number: non_empty(study.main_dicom_tags.accession_number),
            patient_id: non_empty(study.patient_main_dicom_tags.patient_id),
            patient_name: non_empty(study.patient_main_dicom_tags.patient_name),
        }
    }
}

#[async_trait]
impl ArchiveClient for OrthancClient {
    async fn send(&self, order: &Order) -> pacs_core::Result<()> {
        let writer = self.worklists.clone();
        let order = order.clone();
        let path = tokio::task::spawn_blocking(move || writer.write(&order))
            .await
            .map_err(|e| PacsError::Internal(format!("工作列表写入任务失败: {}", e)))??;

        info!("Worklist delivered: {}", path.display());
        Ok(())
    }

    async fn list_studies(&self) -> Result<Vec<ArchiveStudy>, ResolutionOutcome> {
        let studies: Vec<OrthancStudy> = self.get_json("/studies?expand").await?;
        debug!("Archive lists {} studies", studies.len());
        Ok(studies.into_iter().map(ArchiveStudy::from).collect())
    }

    async fn list_series(&self, study_id: &str) -> Result<Vec<ArchiveSeries>, ResolutionOutcome> {
        let series: Vec<OrthancResource> = self
            .get_json(&format!("/studies/{}/series", study_id))
            .await?;
        Ok(series
            .into_iter()
            .map(|resource| {
                let (id, tags) = resource.into_parts();
                ArchiveSeries {
                    id,
                    modality: non_empty(tags.modality),
                }
            })
            .collect())
    }

    async fn list_instances(&self, series_id: &str) -> Result<Vec<ArchiveInstance>, ResolutionOutcome> {
        let instances: Vec<OrthancResource> = self
            .get_json(&format!("/series/{}/instances", series_id))
            .await?;
        Ok(instances
            .into_iter()
            .map(|resource| ArchiveInstance {
                id: resource.into_parts().0,
            })
            .collect())
    }

    async fn fetch_content(&self, instance_id: &str) -> Result<serde_json::Value, ResolutionOutcome> {
        self.get_json(&format!("/instances/{}/tags", instance_id)).await
    }
}

#[async_trait]
impl HealthCheck for OrthancClient {
    fn name(&self) -> &str {
        "archive"
    }

    async fn is_reachable(&self) -> bool {
        match self.get("/system").send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::text_report_tags;
    use crate::sr::extract_report_text;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::{NaiveDate, NaiveTime};
    use pacs_core::{OrderRequest, PatientIdentity, Sex};
    use pacs_dicom::WorklistDefaults;
    use serde_json::json;

    async fn series(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "S1" => Json(json!([
                { "ID": "SE-CT", "MainDicomTags": { "Modality": "CT" } },
                { "ID": "SE-SR", "MainDicomTags": { "Modality": "SR" } }
            ]))
            .into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn instances(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "SE-SR" => Json(json!(["I1"])).into_response(),
            "BROKEN" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn tags(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "I1" => Json(text_report_tags("Normal findings.")).into_response(),
            "GARBLED" => "<html>oops</html>".into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn system(headers: HeaderMap) -> Response {
        // "orthanc:orthanc"
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Basic b3J0aGFuYzpvcnRoYW5j") => Json(json!({ "Version": "1.12.1" })).into_response(),
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    async fn spawn_archive() -> String {
        let app = Router::new()
            .route("/system", get(system))
            .route(
                "/studies",
                get(|| async {
                    Json(json!([{
                        "ID": "S1",
                        "MainDicomTags": {
                            "StudyInstanceUID": "1.2.840.99.1",
                            "AccessionNumber": "CTPR2024011500012024011509"
                        },
                        "PatientMainDicomTags": {
                            "PatientID": "PR202401150001",
                            "PatientName": "BUDI SANTOSO"
                        }
                    }]))
                }),
            )
            .route("/studies/:id/series", get(series))
            .route("/series/:id/instances", get(instances))
            .route("/instances/:id/tags", get(tags));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: &str, dir: &std::path::Path) -> OrthancClient {
        OrthancClient::new(
            base_url,
            Some(("orthanc".to_string(), "orthanc".to_string())),
            Duration::from_secs(3),
            WorklistWriter::new(dir, WorklistDefaults::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_studies_reads_main_tags() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&spawn_archive().await, dir.path());

        let studies = client.list_studies().await.unwrap();
        assert_eq!(studies.len(), 1);
        assert_eq!(studies[0].id, "S1");
        assert_eq!(studies[0].study_instance_uid.as_deref(), Some("1.2.840.99.1"));
        assert_eq!(studies[0].patient_id.as_deref(), Some("PR202401150001"));
    }

    #[tokio::test]
    async fn test_series_instances_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&spawn_archive().await, dir.path());

        let series = client.list_series("S1").await.unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[1].has_modality("SR"));

        let instances = client.list_instances("SE-SR").await.unwrap();
        assert_eq!(instances[0].id, "I1");

        let tags = client.fetch_content("I1").await.unwrap();
        assert_eq!(extract_report_text(&tags).unwrap(), "Normal findings.");
    }

    #[tokio::test]
    async fn test_status_codes_map_to_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&spawn_archive().await, dir.path());

        assert!(client.list_series("MISSING").await.unwrap_err().is_not_found_yet());
        assert!(matches!(
            client.list_instances("BROKEN").await.unwrap_err(),
            ResolutionOutcome::Transport(_)
        ));
        assert!(matches!(
            client.fetch_content("GARBLED").await.unwrap_err(),
            ResolutionOutcome::ParseError(_)
        ));
    }

    #[tokio::test]
    async fn test_reachability_uses_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_archive().await;

        assert!(client(&base, dir.path()).is_reachable().await);

        let anonymous = OrthancClient::new(
            base.as_str(),
            None,
            Duration::from_secs(3),
            WorklistWriter::new(dir.path(), WorklistDefaults::default()),
        )
        .unwrap();
        assert!(!anonymous.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unreachable_archive_is_transport() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("http://127.0.0.1:1", dir.path());

        assert!(matches!(
            client.list_studies().await.unwrap_err(),
            ResolutionOutcome::Transport(_)
        ));
        assert!(!client.is_reachable().await);
    }

    #[tokio::test]
    async fn test_send_writes_worklist_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = client("http://127.0.0.1:1", dir.path());
        let order = Order::from_request(OrderRequest {
            order_id: "PR202401150001".to_string(),
            patient: PatientIdentity {
                medical_record_number: "000123".to_string(),
                name: "BUDI SANTOSO".to_string(),
                birth_date: None,
                sex: Sex::Male,
            },
            procedure_code: "RAD001".to_string(),
            procedure_description: "THORAX PA".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        });

        client.send(&order).await.unwrap();
        assert!(dir
            .path()
            .join(format!("{}.wl", order.accession_number))
            .exists());
    }
}
