use {
    byteorder::{ByteOrder, LittleEndian},
    derive_more::Display,
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
    },
    serde_json::Value,
    serde_with::{DeserializeFromStr, SerializeDisplay},
    snafu::{ResultExt, Snafu, ensure},
    std::{
        fmt::{self, Formatter},
        str::FromStr,
    },
};

pub use {
    addendum::Addendum,
    blob::Blob,
    error::{ProtocolError, Result, RpcError},
    getjob::GetJob,
    hash::Hash32,
    height_info::HeightInfo,
    job::JobTemplate,
    login::{Login, LoginResult},
    message::{Id, Message},
    scratchpad::{FullScratchpad, GetFullScratchpad},
    submit::{Submit, SubmitResult},
    target::Target,
    words::Words,
};

mod addendum;
mod blob;
mod error;
mod getjob;
mod hash;
mod height_info;
mod job;
mod login;
mod message;
mod scratchpad;
mod submit;
mod target;
mod words;

/// Byte offset of the nonce field inside a job blob.
pub const NONCE_OFFSET: usize = 1;

/// Width of the nonce field. Workers only ever write the low four bytes.
pub const NONCE_SIZE: usize = 8;

pub const MIN_BLOB_SIZE: usize = 40;
pub const MAX_BLOB_SIZE: usize = 128;

/// Patches mix and grow the scratchpad in groups of this many words.
pub const QUAD_WORDS: usize = 4;

pub const STATUS_OK: &str = "OK";

pub const METHOD_LOGIN: &str = "login";
pub const METHOD_GETJOB: &str = "getjob";
pub const METHOD_GETFULLSCRATCHPAD: &str = "getfullscratchpad";
pub const METHOD_SUBMIT: &str = "submit";
pub const METHOD_JOB: &str = "job";
