use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submit {
    pub id: String,
    pub job_id: String,
    pub nonce: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub status: String,
}

impl SubmitResult {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}
