use super::*;

/// Hex encoded stream of little-endian `u64` words, always a whole number of quads.
#[derive(Debug, Clone, PartialEq, Eq, Default, DeserializeFromStr, SerializeDisplay)]
pub struct Words(Vec<u64>);

impl Words {
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u64>> for Words {
    fn from(words: Vec<u64>) -> Self {
        Self(words)
    }
}

impl FromStr for Words {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(
            s.len() % (QUAD_WORDS * 16) == 0,
            error::WordAlignmentSnafu { len: s.len() }
        );

        let bytes = hex::decode(s).context(error::HexSnafu { field: "word stream" })?;

        Ok(Self(bytes.chunks_exact(8).map(LittleEndian::read_u64).collect()))
    }
}

impl fmt::Display for Words {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut bytes = vec![0; self.0.len() * 8];
        LittleEndian::write_u64_into(&self.0, &mut bytes);
        f.write_str(&hex::encode(bytes))
    }
}
