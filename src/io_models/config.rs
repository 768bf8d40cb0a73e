use crate::constants::CREDENTIAL_PLACEHOLDER_PREFIX;
use crate::models::Account;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

static ACCOUNT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("account id pattern is valid"));

/// On-disk shape of the account registry document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsDocument {
    pub accounts: BTreeMap<String, AccountEntry>,
    #[serde(default)]
    pub user_settings: UserSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub user_regions: Vec<String>,
    #[serde(default)]
    pub allowed_instance_types: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file `{path}` cannot be read: {source}")]
    Missing {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration file `{path}` is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration contains no account with usable credentials")]
    NoValidAccounts,
    #[error("No account named `{0}` in the registry")]
    AccountNotFound(String),
}

/// Credential registry: resolves logical account names to signing material
/// and enumerates valid accounts and default regions. Read-only after load.
#[derive(Debug, Clone)]
pub struct CredentialRegistry {
    accounts: Vec<Account>,
    default_regions: Vec<String>,
    allowed_instance_types: Vec<String>,
}

impl CredentialRegistry {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Missing {
            path: path.display().to_string(),
            source,
        })?;
        let document: AccountsDocument = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_document(document)
    }

    pub fn from_document(document: AccountsDocument) -> Result<Self, ConfigError> {
        let mut accounts = Vec::with_capacity(document.accounts.len());
        for (name, entry) in document.accounts {
            let account = Account {
                name: name.clone(),
                id: entry.account_id,
                email: entry.email,
                access_key: entry.access_key,
                secret_key: entry.secret_key,
                default_regions: document.user_settings.user_regions.clone(),
            };

            if !account.has_usable_credentials(CREDENTIAL_PLACEHOLDER_PREFIX) {
                warn!("account `{name}` has placeholder or empty credentials, skipping it");
                continue;
            }
            if !ACCOUNT_ID_RE.is_match(&account.id) {
                warn!("account `{name}` has a non 12-digit account id `{}`", account.id);
            }

            accounts.push(account);
        }

        if accounts.is_empty() {
            return Err(ConfigError::NoValidAccounts);
        }

        Ok(CredentialRegistry {
            accounts,
            default_regions: document.user_settings.user_regions,
            allowed_instance_types: document.user_settings.allowed_instance_types,
        })
    }

    pub fn list_accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn resolve(&self, account_name: &str) -> Result<&Account, ConfigError> {
        self.accounts
            .iter()
            .find(|a| a.name == account_name)
            .ok_or_else(|| ConfigError::AccountNotFound(account_name.to_string()))
    }

    pub fn default_regions(&self) -> &[String] {
        &self.default_regions
    }

    pub fn allowed_instance_types(&self) -> &[String] {
        &self.allowed_instance_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
    {
      "accounts": {
        "sandbox": {
          "account_id": "123456789012",
          "email": "sandbox@example.com",
          "access_key": "AKIA0000000000000001",
          "secret_key": "abcd1234"
        },
        "staging": {
          "account_id": "210987654321",
          "email": "staging@example.com",
          "access_key": "ADD_ACCESS_KEY_HERE",
          "secret_key": "ADD_SECRET_KEY_HERE"
        },
        "empty": {
          "account_id": "111122223333",
          "email": "empty@example.com",
          "access_key": "",
          "secret_key": ""
        }
      },
      "user_settings": {
        "user_regions": ["us-east-1", "eu-west-1"],
        "allowed_instance_types": ["t3.medium", "c6a.large"]
      }
    }
    "#;

    #[test]
    fn test_placeholder_and_empty_accounts_are_filtered() {
        // setup:
        let document: AccountsDocument = serde_json::from_str(SAMPLE).unwrap();

        // execute:
        let registry = CredentialRegistry::from_document(document).unwrap();

        // verify:
        assert_eq!(registry.list_accounts().len(), 1);
        assert_eq!(registry.list_accounts()[0].name, "sandbox");
        assert_eq!(registry.default_regions(), &["us-east-1", "eu-west-1"]);
        assert_eq!(registry.allowed_instance_types(), &["t3.medium", "c6a.large"]);
    }

    #[test]
    fn test_resolve() {
        let document: AccountsDocument = serde_json::from_str(SAMPLE).unwrap();
        let registry = CredentialRegistry::from_document(document).unwrap();

        assert!(registry.resolve("sandbox").is_ok());
        assert!(matches!(
            registry.resolve("nope"),
            Err(ConfigError::AccountNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_all_placeholder_accounts_is_fatal() {
        let document: AccountsDocument = serde_json::from_str(
            r#"{"accounts": {"a": {"account_id": "1", "access_key": "ADD_ME", "secret_key": "x"}}}"#,
        )
        .unwrap();

        assert!(matches!(
            CredentialRegistry::from_document(document),
            Err(ConfigError::NoValidAccounts)
        ));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = CredentialRegistry::load(Path::new("/nonexistent/accounts.json"));
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = CredentialRegistry::load(file.path());
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }
}
