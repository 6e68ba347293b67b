//! Wire types for the KIE Veo API.
//!
//! Field names follow the provider's camelCase JSON verbatim.

use serde::{Deserialize, Serialize};

/// Veo model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KieModel {
    #[serde(rename = "veo3")]
    Veo3,
    #[default]
    #[serde(rename = "veo3_fast")]
    Veo3Fast,
}

/// How the generation is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationType {
    Text2Video,
    FirstAndLastFrames2Video,
    Reference2Video,
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "Auto")]
    Auto,
}

/// Parameters for a generation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    pub model: KieModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_type: Option<GenerationType>,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<u32>,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub enable_translation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

impl GenerateVideoParams {
    /// Create params with the provider defaults (fast model, 16:9,
    /// translation enabled).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image_urls: None,
            model: KieModel::default(),
            generation_type: None,
            aspect_ratio: AspectRatio::default(),
            seeds: None,
            callback_url: None,
            enable_translation: true,
            watermark: None,
        }
    }
}

/// Parameters for an extension request chained to a prior task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendVideoParams {
    pub task_id: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    #[serde(rename = "callBackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Envelope for generate/extend responses.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<GenerateData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateData {
    pub task_id: String,
}

impl GenerateResponse {
    /// Task id when the provider accepted the job.
    pub fn task_id(&self) -> Option<&str> {
        if self.code == 200 {
            self.data.as_ref().map(|d| d.task_id.as_str())
        } else {
            None
        }
    }
}

/// Envelope for record-info responses.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInfoResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<RecordInfo>,
}

/// Task status snapshot from the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub response: Option<RecordResult>,
    /// 0 = pending, 1 = success, 2/3 = failed
    #[serde(default)]
    pub success_flag: Option<i64>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub fallback_flag: bool,
    #[serde(default)]
    pub complete_time: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

/// Result payload nested in a successful record-info response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResult {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub result_urls: Option<Vec<String>>,
    #[serde(default)]
    pub origin_urls: Option<Vec<String>>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Interpreted tri-state completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failed,
    Unknown,
}

impl RecordInfo {
    /// Interpret the provider's numeric completion flag.
    pub fn state(&self) -> TaskState {
        match self.success_flag {
            Some(0) => TaskState::Pending,
            Some(1) => TaskState::Success,
            Some(2) | Some(3) => TaskState::Failed,
            _ => TaskState::Unknown,
        }
    }

    /// First delivered result URL, if any.
    pub fn first_result_url(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.result_urls.as_ref())
            .and_then(|urls| urls.first())
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Envelope for the 1080p upgrade endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Hd1080pResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Hd1080pData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hd1080pData {
    #[serde(default)]
    pub result_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_params_wire_shape() {
        let mut params = GenerateVideoParams::new("a cat surfing");
        params.callback_url = Some("https://app.example.com/api/kie/veo/callback".into());
        let value = serde_json::to_value(&params).unwrap();

        assert_eq!(value["model"], "veo3_fast");
        assert_eq!(value["aspectRatio"], "16:9");
        assert_eq!(value["enableTranslation"], true);
        assert_eq!(
            value["callBackUrl"],
            "https://app.example.com/api/kie/veo/callback"
        );
        assert!(value.get("seeds").is_none());
        assert!(value.get("imageUrls").is_none());
    }

    #[test]
    fn test_record_info_states() {
        let mut info: RecordInfo = serde_json::from_value(json!({
            "taskId": "t1",
            "successFlag": 0
        }))
        .unwrap();
        assert_eq!(info.state(), TaskState::Pending);

        info.success_flag = Some(1);
        assert_eq!(info.state(), TaskState::Success);
        info.success_flag = Some(3);
        assert_eq!(info.state(), TaskState::Failed);
        info.success_flag = None;
        assert_eq!(info.state(), TaskState::Unknown);
    }

    #[test]
    fn test_record_info_first_result_url() {
        let info: RecordInfo = serde_json::from_value(json!({
            "taskId": "t1",
            "successFlag": 1,
            "fallbackFlag": true,
            "response": {
                "taskId": "t1",
                "resultUrls": ["https://cdn/a.mp4", "https://cdn/b.mp4"],
                "resolution": "720p"
            }
        }))
        .unwrap();

        assert!(info.fallback_flag);
        assert_eq!(info.first_result_url(), Some("https://cdn/a.mp4"));
    }
}
