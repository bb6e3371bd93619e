use super::*;

/// Hashing template. Empty blobs are legal and mean the job only carries addendums.
#[derive(Debug, Clone, PartialEq, Eq, Default, DeserializeFromStr, SerializeDisplay)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        ensure!(
            len == 0 || (MIN_BLOB_SIZE..=MAX_BLOB_SIZE).contains(&len),
            error::BlobSizeSnafu { len }
        );
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares everything except the nonce field.
    pub fn same_template(&self, other: &[u8]) -> bool {
        let nonce = NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE;

        self.0.len() == other.len()
            && self
                .0
                .iter()
                .zip(other)
                .enumerate()
                .all(|(i, (a, b))| nonce.contains(&i) || a == b)
    }

    /// The nonce field as submitted to the pool. Empty for an empty blob.
    pub fn nonce_hex(&self) -> String {
        self.0
            .get(NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE)
            .map(hex::encode)
            .unwrap_or_default()
    }
}

impl FromStr for Blob {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(hex::decode(s).context(error::HexSnafu { field: "blob" })?)
    }
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}
