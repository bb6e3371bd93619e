use super::*;

/// `getjob` params. `hi` tells the pool where our scratchpad stands so it can send the
/// addendums we are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi: Option<HeightInfo>,
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn without_height() {
        assert_eq!(
            serde_json::to_value(GetJob {
                id: "abc".into(),
                hi: None
            })
            .unwrap(),
            json!({"id": "abc"})
        );
    }

    #[test]
    fn with_height() {
        let getjob = GetJob {
            id: "abc".into(),
            hi: Some(HeightInfo {
                height: 9,
                block_id: Hash32::ZERO,
            }),
        };

        assert_eq!(
            serde_json::to_value(&getjob).unwrap(),
            json!({"id": "abc", "hi": {"height": 9, "block_id": "00".repeat(32)}})
        );
    }
}
