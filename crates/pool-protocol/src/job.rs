use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub job_id: String,
    #[serde(default)]
    pub blob: Blob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(
        default,
        deserialize_with = "Addendum::deserialize_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub addms: Vec<Addendum>,
}
