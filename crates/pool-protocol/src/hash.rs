use super::*;

/// A 32-byte block identifier as carried in `block_id` and `prev_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, DeserializeFromStr, SerializeDisplay)]
pub struct Hash32([u8; 32]);

impl Hash32 {
    pub const ZERO: Self = Self([0; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Hash32> for [u8; 32] {
    fn from(hash: Hash32) -> Self {
        hash.0
    }
}

impl FromStr for Hash32 {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).context(error::HexSnafu { field: "hash" })?;

        let actual = bytes.len();

        let bytes: [u8; 32] = bytes.try_into().map_err(|_| ProtocolError::Length {
            field: "hash",
            expected: 32,
            actual,
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let s = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let hash = s.parse::<Hash32>().unwrap();
        assert_eq!(hash.as_bytes()[1], 0x11);
        assert_eq!(hash.to_string(), s);
        assert_eq!(serde_json::to_string(&hash).unwrap(), format!("\"{s}\""));
    }

    #[test]
    fn wrong_length() {
        assert_eq!(
            "abcd".parse::<Hash32>().unwrap_err().to_string(),
            "hash must be 32 bytes, got 2"
        );
    }

    #[test]
    fn bad_hex() {
        assert!(
            "zz".parse::<Hash32>()
                .unwrap_err()
                .to_string()
                .contains("Invalid character")
        );
    }
}
