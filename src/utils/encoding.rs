use serde::{Deserialize, Serialize};
use std::fmt;

/// Text encoding of the delimited files on disk.
///
/// Latin-1 maps every byte to the code point of the same value, so decoding
/// never fails. Characters above U+00FF cannot be represented and are
/// written as `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    #[serde(alias = "iso-8859-1")]
    Latin1,
    #[serde(alias = "utf-8")]
    Utf8,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Latin1 => write!(f, "latin1"),
            TextEncoding::Utf8 => write!(f, "utf8"),
        }
    }
}
