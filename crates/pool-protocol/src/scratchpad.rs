use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetFullScratchpad {
    pub id: String,
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullScratchpad {
    pub status: String,
    #[serde(default)]
    pub scratchpad_hex: Words,
    pub hi: Option<HeightInfo>,
}

impl FullScratchpad {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn full_scratchpad() {
        let response: FullScratchpad = serde_json::from_value(json!({
            "status": "OK",
            "scratchpad_hex": "01".repeat(64),
            "hi": {"height": 100, "block_id": "aa".repeat(32)},
        }))
        .unwrap();

        assert!(response.is_ok());
        assert_eq!(response.scratchpad_hex.len(), 8);
        assert_eq!(response.hi.unwrap().height, 100);
    }

    #[test]
    fn error_status() {
        let response: FullScratchpad =
            serde_json::from_value(json!({"status": "Busy", "hi": null})).unwrap();
        assert!(!response.is_ok());
        assert!(response.scratchpad_hex.is_empty());
    }
}
