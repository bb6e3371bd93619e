use super::*;

/// `{"height": N, "block_id": hex32}` as sent with addendums and full scratchpads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHeightInfo")]
pub struct HeightInfo {
    pub height: u64,
    pub block_id: Hash32,
}

#[derive(Deserialize)]
struct RawHeightInfo {
    height: u64,
    block_id: Hash32,
}

impl TryFrom<RawHeightInfo> for HeightInfo {
    type Error = ProtocolError;

    fn try_from(raw: RawHeightInfo) -> Result<Self> {
        ensure!(raw.height > 0, error::ZeroHeightSnafu);

        Ok(Self {
            height: raw.height,
            block_id: raw.block_id,
        })
    }
}
