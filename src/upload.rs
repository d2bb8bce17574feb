//! Hands confirmed crops to the analysis backend.

use reqwest::blocking::{Client, multipart};
use serde::Deserialize;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::export::UploadPayload;

/// Field names expected by the `/analyze` endpoint.
const IMAGE_FIELD: &str = "image";
const TEST_TYPE_FIELD: &str = "test_type";

pub trait Uploader: Send + Sync {
    fn submit(&self, payload: UploadPayload) -> Result<AnalysisResponse, UploadError>;
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisResponse {
    pub success: Option<bool>,
    pub test_type: Option<String>,
    pub result: Option<String>,
    pub diagnosis: Option<String>,
    pub interpretation: Option<String>,
    pub message: Option<String>,
    pub recommendation: Option<String>,
    pub estimated_ph: Option<f64>,
    pub error: Option<String>,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl AnalysisResponse {
    pub fn from_json(body: &str) -> Result<Self, UploadError> {
        let raw: serde_json::Value =
            serde_json::from_str(body).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        if !raw.is_object() {
            return Err(UploadError::InvalidResponse(format!("expected a JSON object, got {raw}")));
        }
        let mut response: Self = serde_json::from_value(raw.clone())
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        response.raw = raw;
        Ok(response)
    }

    /// A response without `success: true` that carries an error is a rejection.
    pub fn into_result(self) -> Result<Self, UploadError> {
        match (&self.success, &self.error) {
            (Some(true), _) | (_, None) => Ok(self),
            (_, Some(error)) => Err(UploadError::Rejected(error.clone())),
        }
    }

    pub fn headline(&self) -> String {
        self.result
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| self.raw.to_string())
    }

    pub fn explanation(&self) -> String {
        self.diagnosis
            .clone()
            .or_else(|| self.interpretation.clone())
            .unwrap_or_else(|| "Analysis completed successfully.".to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultTone {
    Positive,
    Negative,
    Invalid,
    Neutral,
}

/// Display-ready digest of an analysis response.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSummary {
    pub title: String,
    pub details: Vec<String>,
    pub tone: ResultTone,
}

impl ResultSummary {
    pub fn from_response(test_type: &str, response: &AnalysisResponse) -> Self {
        let test_type = response.test_type.as_deref().unwrap_or(test_type);
        let mut details = Vec::new();

        let (title, tone) = match test_type {
            "fob" => {
                let result = response.headline();
                let lowered = result.to_lowercase();
                details.push(format!("Result: {result}"));
                if lowered.contains("negative") {
                    ("FOB Test: NEGATIVE".to_string(), ResultTone::Negative)
                } else if lowered.contains("positive") {
                    ("FOB Test: POSITIVE".to_string(), ResultTone::Positive)
                } else {
                    ("FOB Test: INVALID".to_string(), ResultTone::Invalid)
                }
            }
            "ph" => {
                match response.estimated_ph {
                    Some(ph) => details.push(format!("Estimated pH: {ph:.1}")),
                    None => details.push(response.headline()),
                }
                ("pH Test Results".to_string(), ResultTone::Neutral)
            }
            other => {
                details.push(response.headline());
                (format!("{} Results", other.to_uppercase()), ResultTone::Neutral)
            }
        };

        details.push(response.explanation());
        if let Some(recommendation) = &response.recommendation {
            details.push(recommendation.clone());
        }

        Self { title, details, tone }
    }
}

pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Uploader for HttpUploader {
    fn submit(&self, payload: UploadPayload) -> Result<AnalysisResponse, UploadError> {
        let (bytes, mime, file_name, test_type) = payload.into_parts();
        let size = bytes.len();

        let image = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = multipart::Form::new()
            .part(IMAGE_FIELD, image)
            .text(TEST_TYPE_FIELD, test_type.clone());

        log::info!("uploading {size} byte crop ({test_type}) to {}", self.endpoint);
        let response = self.client.post(&self.endpoint).multipart(form).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let message = AnalysisResponse::from_json(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        "Unknown error".to_string()
                    } else {
                        body.trim().to_string()
                    }
                });
            log::error!("analysis request failed with {status}: {message}");
            return Err(UploadError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = AnalysisResponse::from_json(&body)?.into_result()?;
        log::info!("analysis finished: {}", parsed.headline());
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::CroppedImage;
    use crate::export::Exporter;
    use image::RgbaImage;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn payload(test_type: &str) -> UploadPayload {
        Exporter::default()
            .payload(&CroppedImage::new(RgbaImage::new(12, 12)), test_type)
            .unwrap()
    }

    fn uploader_for(base_url: String) -> HttpUploader {
        HttpUploader::new(&UploadConfig {
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    /// Accepts one request, answers it with `status` and `body`, and hands back the raw
    /// request text.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body_bytes = vec![0; content_length];
            reader.read_exact(&mut body_bytes).unwrap();
            request.push_str(&String::from_utf8_lossy(&body_bytes));

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader.get_mut().write_all(response.as_bytes()).unwrap();
            request
        });
        (base_url, handle)
    }

    #[test]
    fn submit_posts_one_multipart_form_to_analyze() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"success": true, "test_type": "ph", "result": "pH 4.5", "estimated_ph": 4.5}"#,
        );
        let response = uploader_for(base_url).submit(payload("ph")).unwrap();
        assert_eq!(response.headline(), "pH 4.5");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /analyze HTTP/1.1\r\n"), "{request}");
        assert_eq!(request.matches("POST ").count(), 1);

        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert!(lower.contains(r#"content-disposition: form-data; name="image"; filename="cropped.png""#));
        assert!(lower.contains("content-type: image/png"));
        assert!(lower.contains(r#"content-disposition: form-data; name="test_type""#));
        assert!(request.contains("\r\n\r\nph\r\n"));
        assert!(request.contains("PNG"));
    }

    #[test]
    fn error_status_carries_the_server_message() {
        let (base_url, server) = serve_once("400 Bad Request", r#"{"error": "Invalid test type"}"#);
        let err = uploader_for(base_url).submit(payload("urinalysis")).unwrap_err();
        match err {
            UploadError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid test type");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(server.join().unwrap().contains("urinalysis"));
    }

    #[test]
    fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = uploader_for(base_url).submit(payload("ph")).unwrap_err();
        assert!(matches!(err, UploadError::Unreachable(_)), "{err:?}");
    }

    #[test]
    fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(3));
            drop(stream);
        });

        let uploader = HttpUploader::new(&UploadConfig {
            base_url,
            timeout: Duration::from_millis(300),
        })
        .unwrap();
        let err = uploader.submit(payload("fob")).unwrap_err();
        assert!(matches!(err, UploadError::Timeout), "{err:?}");
    }

    #[test]
    fn parses_ph_response() {
        let body = r#"{
            "success": true,
            "test_type": "ph",
            "result": "pH 4.2 - Normal",
            "pH": 4.2,
            "estimated_ph": 4.2,
            "diagnosis": "Normal - Healthy vaginal pH range.",
            "recommendation": "Continue maintaining good hygiene practices.",
            "analysis_id": "abc"
        }"#;
        let response = AnalysisResponse::from_json(body).unwrap().into_result().unwrap();
        assert_eq!(response.headline(), "pH 4.2 - Normal");
        assert_eq!(response.estimated_ph, Some(4.2));

        let summary = ResultSummary::from_response("ph", &response);
        assert_eq!(summary.title, "pH Test Results");
        assert_eq!(summary.details[0], "Estimated pH: 4.2");
        assert_eq!(summary.details.len(), 3);
    }

    #[test]
    fn error_without_success_is_rejected() {
        let response = AnalysisResponse::from_json(r#"{"error": "Invalid test type"}"#).unwrap();
        match response.into_result() {
            Err(UploadError::Rejected(message)) => assert_eq!(message, "Invalid test type"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn headline_falls_back_to_message_then_raw() {
        let with_message = AnalysisResponse::from_json(r#"{"message": "done"}"#).unwrap();
        assert_eq!(with_message.headline(), "done");
        assert_eq!(with_message.explanation(), "Analysis completed successfully.");

        let bare = AnalysisResponse::from_json(r#"{"pads_detected": 3}"#).unwrap();
        assert_eq!(bare.headline(), r#"{"pads_detected":3}"#);
    }

    #[test]
    fn interpretation_backs_up_diagnosis() {
        let response =
            AnalysisResponse::from_json(r#"{"success": true, "interpretation": "looks fine"}"#).unwrap();
        assert_eq!(response.explanation(), "looks fine");
    }

    #[test]
    fn non_object_body_is_invalid() {
        assert!(matches!(
            AnalysisResponse::from_json("[1, 2]"),
            Err(UploadError::InvalidResponse(_))
        ));
        assert!(matches!(
            AnalysisResponse::from_json("<html>"),
            Err(UploadError::InvalidResponse(_))
        ));
    }

    #[test]
    fn fob_results_are_classified() {
        let fob = |result: &str| AnalysisResponse {
            result: Some(result.to_string()),
            ..Default::default()
        };
        assert_eq!(ResultSummary::from_response("fob", &fob("positive")).tone, ResultTone::Positive);
        assert_eq!(ResultSummary::from_response("fob", &fob("Negative")).tone, ResultTone::Negative);
        assert_eq!(ResultSummary::from_response("fob", &fob("unclear")).tone, ResultTone::Invalid);
    }

    #[test]
    fn uploader_targets_analyze_endpoint() {
        let config = UploadConfig {
            base_url: "http://localhost:5000/".to_string(),
            ..Default::default()
        };
        let uploader = HttpUploader::new(&config).unwrap();
        assert_eq!(uploader.endpoint(), "http://localhost:5000/analyze");
    }
}
