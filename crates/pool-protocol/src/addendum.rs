use super::*;

/// One incremental scratchpad patch, chained to its predecessor by `prev_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addendum {
    pub hi: HeightInfo,
    pub prev_id: Hash32,
    pub addm: Words,
}

impl Addendum {
    /// Decodes a job's `addms` array. Entries without `hi` carry nothing to apply and are
    /// dropped.
    pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<Addendum>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(values) = Option::<Vec<Value>>::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };

        values
            .into_iter()
            .filter(|value| value.get("hi").is_some_and(|hi| !hi.is_null()))
            .map(|value| serde_json::from_value(value).map_err(de::Error::custom))
            .collect()
    }
}
