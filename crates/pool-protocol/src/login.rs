use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub login: String,
    pub pass: String,
    pub agent: String,
}

/// The pool hands back a session id that every later request must echo in `params.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobTemplate>,
}

impl LoginResult {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}
