use super::*;

pub type Result<T = (), E = ProtocolError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProtocolError {
    #[snafu(display("invalid {field} hex: {source}"))]
    Hex {
        field: &'static str,
        source: hex::FromHexError,
    },

    #[snafu(display("{field} must be {expected} bytes, got {actual}"))]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[snafu(display(
        "blob is {len} bytes, expected 0 or {MIN_BLOB_SIZE}..={MAX_BLOB_SIZE}"
    ))]
    BlobSize { len: usize },

    #[snafu(display("word stream hex length {len} is not a multiple of 64"))]
    WordAlignment { len: usize },

    #[snafu(display("height info must carry a positive height"))]
    ZeroHeight,
}

/// Pools report errors either as a bare string or as `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: Option<i64>,
    pub message: String,
}

impl RpcError {
    pub const UNAUTHENTICATED: &'static str = "Unauthenticated";

    pub const SHARE_REJECTIONS: [&'static str; 4] = [
        "Low difficulty share",
        "Block expired",
        "Invalid job id",
        "Duplicate share",
    ];

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.message == Self::UNAUTHENTICATED
    }

    pub fn is_share_rejection(&self) -> bool {
        Self::SHARE_REJECTIONS.contains(&self.message.as_str())
    }
}

impl Serialize for RpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.code {
            Some(code) => serde_json::json!({ "code": code, "message": self.message })
                .serialize(serializer),
            None => serializer.serialize_str(&self.message),
        }
    }
}

impl<'de> Deserialize<'de> for RpcError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Plain(String),
            Object {
                code: Option<i64>,
                message: String,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Plain(message) => Self {
                code: None,
                message,
            },
            Raw::Object { code, message } => Self { code, message },
        })
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "pool error {code}: {}", self.message),
            None => write!(f, "pool error: {}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn string_error() {
        let error: RpcError = serde_json::from_str(r#""Unauthenticated""#).unwrap();
        assert_eq!(error, RpcError::new("Unauthenticated"));
        assert!(error.is_unauthenticated());
        assert_eq!(serde_json::to_string(&error).unwrap(), r#""Unauthenticated""#);
    }

    #[test]
    fn object_error() {
        let error: RpcError =
            serde_json::from_str(r#"{"code":-1,"message":"Low difficulty share"}"#).unwrap();
        assert_eq!(error.code, Some(-1));
        assert!(error.is_share_rejection());
        assert!(!error.is_unauthenticated());
        assert_eq!(error.to_string(), "pool error -1: Low difficulty share");
    }

    #[test]
    fn other_errors_are_not_rejections() {
        assert!(!RpcError::new("Internal error").is_share_rejection());
        assert!(RpcError::new("Duplicate share").is_share_rejection());
        assert!(RpcError::new("Block expired").is_share_rejection());
    }
}
