use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the backend. FastAPI style: `detail` is usually a
/// string but validation failures carry an array of objects instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<&str> {
        self.detail
            .as_ref()
            .and_then(Value::as_str)
            .filter(|detail| !detail.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_used() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"model unavailable"}"#).expect("decode");
        assert_eq!(body.detail_message(), Some("model unavailable"));
    }

    #[test]
    fn non_string_detail_is_ignored() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"detail":[{"loc":["body","image_id"],"msg":"field required"}]}"#,
        )
        .expect("decode");
        assert_eq!(body.detail_message(), None);

        let body: ErrorBody = serde_json::from_str(r#"{"detail":""}"#).expect("decode");
        assert_eq!(body.detail_message(), None);
    }
}
