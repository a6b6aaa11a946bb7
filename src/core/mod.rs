pub mod encrypt;
pub mod etl;
pub mod matcher;
pub mod retry;
pub mod shard;
pub mod similarity;

pub use crate::domain::model::{AccountRecord, EncryptedRecord, RunReport};
pub use crate::domain::ports::{AccountEncryptor, Pipeline, Storage};
pub use crate::utils::error::Result;
