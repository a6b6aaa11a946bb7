use serde::{Deserialize, Serialize};

/// Column names shared by the matcher output and the encryption input.
pub const ACCOUNT_COLUMN: &str = "cuenta";
pub const NAME_COLUMN: &str = "nombre";
pub const NATIONAL_ID_COLUMN: &str = "dni";
pub const CLIENT_CODE_COLUMN: &str = "cod";
pub const ENCRYPTED_ACCOUNT_COLUMN: &str = "cuenta_encriptada";
pub const ERROR_COLUMN: &str = "error";

pub const ACCOUNT_HEADER: [&str; 4] = [
    ACCOUNT_COLUMN,
    NAME_COLUMN,
    NATIONAL_ID_COLUMN,
    CLIENT_CODE_COLUMN,
];

pub const ENCRYPTED_HEADER: [&str; 6] = [
    ACCOUNT_COLUMN,
    ENCRYPTED_ACCOUNT_COLUMN,
    NAME_COLUMN,
    NATIONAL_ID_COLUMN,
    CLIENT_CODE_COLUMN,
    ERROR_COLUMN,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account: String,
    pub name: String,
    pub national_id: String,
    pub client_code: String,
}

impl AccountRecord {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.account.clone(),
            self.name.clone(),
            self.national_id.clone(),
            self.client_code.clone(),
        ]
    }
}

/// Outcome of one encryption call chain. `error` is set only when every
/// attempt failed, in which case `encrypted_account` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub record: AccountRecord,
    pub encrypted_account: String,
    pub error: Option<String>,
    pub attempts: u32,
}

impl EncryptedRecord {
    pub fn succeeded(record: AccountRecord, encrypted_account: String, attempts: u32) -> Self {
        Self {
            record,
            encrypted_account,
            error: None,
            attempts,
        }
    }

    pub fn failed(record: AccountRecord, error: String, attempts: u32) -> Self {
        let error = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        };
        Self {
            record,
            encrypted_account: String::new(),
            error: Some(error),
            attempts,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.record.account.clone(),
            self.encrypted_account.clone(),
            self.record.name.clone(),
            self.record.national_id.clone(),
            self.record.client_code.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// What a finished job reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub job: String,
    pub outputs: Vec<String>,
    pub records: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.records - self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AccountRecord {
        AccountRecord {
            account: "0012345".to_string(),
            name: "PEREZ JUAN".to_string(),
            national_id: "30111222".to_string(),
            client_code: "07".to_string(),
        }
    }

    #[test]
    fn test_failed_record_has_error_and_no_value() {
        let out = EncryptedRecord::failed(record(), String::new(), 4);
        assert!(out.is_error());
        assert!(out.encrypted_account.is_empty());
        assert_eq!(out.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_encrypted_row_column_order() {
        let out = EncryptedRecord::succeeded(record(), "XyZ==".to_string(), 1);
        assert_eq!(
            out.to_row(),
            vec!["0012345", "XyZ==", "PEREZ JUAN", "30111222", "07", ""]
        );
    }
}
