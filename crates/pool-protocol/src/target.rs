use super::*;

/// Share target: four little-endian bytes compared against the top word of the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, DeserializeFromStr, SerializeDisplay)]
pub struct Target(u32);

impl Target {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u32::MAX);

    pub fn is_met_by(self, hash: &[u8; 32]) -> bool {
        LittleEndian::read_u32(&hash[28..32]) <= self.0
    }

    pub fn difficulty(self) -> f64 {
        f64::from(u32::MAX) / f64::from(self.0)
    }
}

impl From<u32> for Target {
    fn from(target: u32) -> Self {
        Self(target)
    }
}

impl From<Target> for u32 {
    fn from(target: Target) -> Self {
        target.0
    }
}

impl FromStr for Target {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).context(error::HexSnafu { field: "target" })?;

        ensure!(
            bytes.len() == 4,
            error::LengthSnafu {
                field: "target",
                expected: 4usize,
                actual: bytes.len(),
            }
        );

        Ok(Self(LittleEndian::read_u32(&bytes)))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_le_bytes()))
    }
}
