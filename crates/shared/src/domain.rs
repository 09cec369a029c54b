use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id_newtype!(ImageId);
string_id_newtype!(ModelKey);

/// Model key the backend uses for the official ADE20K checkpoint. Uploads are
/// always predicted with this model.
pub const MODEL_KEY_ADE20K: &str = "ade20k_official";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_key: ModelKey,
    pub hf_id: String,
    pub label_space: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestImage {
    pub id: ImageId,
    pub name: String,
    pub thumbnail_url: String,
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub class_id: i64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopClass {
    pub class_id: i64,
    pub label: String,
    pub confidence: f64,
}

impl TopClass {
    pub fn confidence_percent(&self) -> f64 {
        self.confidence * 100.0
    }
}

/// `area_ratio` is already expressed as a percentage of the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaStat {
    pub class_id: i64,
    pub label: String,
    pub area_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMask {
    pub class_id: i64,
    pub label: String,
    pub mask_url: String,
}
