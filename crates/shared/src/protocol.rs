use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{AreaStat, ClassMask, ImageId, Label, ModelInfo, ModelKey, TestImage, TopClass};

/// `null` and a missing field both decode to an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestImagesResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<TestImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictByIdRequest {
    pub image_id: ImageId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub model_key: ModelKey,
    pub model_hf_id: String,
    pub inference_ms: f64,
    pub original_url: String,
    pub overlay_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<Label>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub top_classes: Vec<TopClass>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub area_stats: Vec<AreaStat>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub class_masks: Vec<ClassMask>,
    pub width: u32,
    pub height: u32,
}

impl PredictResponse {
    pub fn mask_by_url(&self, mask_url: &str) -> Option<&ClassMask> {
        self.class_masks.iter().find(|mask| mask.mask_url == mask_url)
    }

    pub fn mask_by_label(&self, label: &str) -> Option<&ClassMask> {
        self.class_masks
            .iter()
            .find(|mask| mask.label.eq_ignore_ascii_case(label))
    }
}

/// Statistics forwarded to the description service. Image references never
/// leave the client through this request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub top_classes: Vec<TopClass>,
    pub area_stats: Vec<AreaStat>,
    pub inference_ms: f64,
}

impl From<&PredictResponse> for DescribeRequest {
    fn from(result: &PredictResponse) -> Self {
        Self {
            top_classes: result.top_classes.clone(),
            area_stats: result.area_stats.clone(),
            inference_ms: result.inference_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub summary_ja: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cautions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prediction() -> PredictResponse {
        serde_json::from_value(serde_json::json!({
            "model_key": "ade20k_official",
            "model_hf_id": "facebook/mask2former-swin-large-ade-semantic",
            "inference_ms": 812.5,
            "original_url": "/static/results/orig_1.png",
            "overlay_url": "/static/results/overlay_1.png",
            "labels": [{"class_id": 0, "label": "wall"}],
            "top_classes": [{"class_id": 0, "label": "wall", "confidence": 0.91}],
            "area_stats": [{"class_id": 0, "label": "wall", "area_ratio": 64.2}],
            "class_masks": [{"class_id": 0, "label": "wall", "mask_url": "/static/results/mask_wall.png"}],
            "width": 640,
            "height": 480
        }))
        .expect("decode prediction")
    }

    #[test]
    fn null_catalog_lists_decode_as_empty() {
        let models: ModelsResponse = serde_json::from_str(r#"{"models":null}"#).expect("decode");
        assert!(models.models.is_empty());

        let images: TestImagesResponse = serde_json::from_str("{}").expect("decode");
        assert!(images.images.is_empty());
    }

    #[test]
    fn describe_request_excludes_image_references() {
        let request = DescribeRequest::from(&sample_prediction());
        let encoded = serde_json::to_value(&request).expect("encode");
        let object = encoded.as_object().expect("object");

        assert_eq!(object.len(), 3);
        assert!(object.contains_key("top_classes"));
        assert!(object.contains_key("area_stats"));
        assert_eq!(object["inference_ms"], serde_json::json!(812.5));
        assert!(!encoded.to_string().contains("/static/results"));
    }

    #[test]
    fn mask_lookup_by_url_and_label() {
        let result = sample_prediction();
        assert!(result.mask_by_url("/static/results/mask_wall.png").is_some());
        assert!(result.mask_by_url("/static/results/mask_floor.png").is_none());
        assert_eq!(
            result.mask_by_label("WALL").map(|mask| mask.class_id),
            Some(0)
        );
    }
}
