//! # Accounts
//!
//! Customer accounts as seen by the checkout pipeline. An account with a
//! company affiliation is invoiced later instead of paying at checkout.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};

/// Contact and shipping fields, saved on the account and copied onto orders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
}

impl ShippingDetails {
    /// Reject details with any blank required field
    pub fn validate(&self) -> ShopResult<()> {
        let fields = [
            ("name", &self.name),
            ("phone_number", &self.phone_number),
            ("street_address", &self.street_address),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
        ];

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ShopError::InvalidRequest(format!(
                "shipping field '{}' is required",
                field
            ))),
            None => Ok(()),
        }
    }
}

/// A customer account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Identity-provider account ID
    pub id: String,

    /// Company the account belongs to (invoiced accounts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<u32>,

    /// Saved contact/shipping profile
    #[serde(flatten)]
    pub profile: ShippingDetails,
}

impl Account {
    /// Create a retail account (pays at checkout)
    pub fn customer(id: impl Into<String>, profile: ShippingDetails) -> Self {
        Self {
            id: id.into(),
            company_id: None,
            profile,
        }
    }

    /// Create an account affiliated with a company (invoiced)
    pub fn company(id: impl Into<String>, company_id: u32, profile: ShippingDetails) -> Self {
        Self {
            id: id.into(),
            company_id: Some(company_id),
            profile,
        }
    }

    /// Company accounts defer payment; a company id of 0 counts as none.
    pub fn is_deferred(&self) -> bool {
        self.company_id.unwrap_or(0) != 0
    }

    /// Load a list of accounts from a TOML document with `[[accounts]]` tables
    pub fn list_from_toml(toml_str: &str) -> Result<Vec<Account>, toml::de::Error> {
        #[derive(Deserialize)]
        struct AccountList {
            #[serde(default)]
            accounts: Vec<Account>,
        }

        toml::from_str::<AccountList>(toml_str).map(|list| list.accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ShippingDetails {
        ShippingDetails {
            name: "Ana Horvat".into(),
            phone_number: "+385 1 555 0100".into(),
            street_address: "Ilica 1".into(),
            city: "Zagreb".into(),
            state: "Grad Zagreb".into(),
            postal_code: "10000".into(),
        }
    }

    #[test]
    fn test_deferred_accounts() {
        assert!(!Account::customer("u1", profile()).is_deferred());
        assert!(Account::company("u2", 7, profile()).is_deferred());
        assert!(!Account::company("u3", 0, profile()).is_deferred());
    }

    #[test]
    fn test_validate_shipping() {
        assert!(profile().validate().is_ok());

        let mut missing_city = profile();
        missing_city.city = "  ".into();
        let err = missing_city.validate().unwrap_err();
        assert!(err.to_string().contains("city"));
    }

    #[test]
    fn test_accounts_from_toml() {
        let accounts = Account::list_from_toml(
            r#"
            [[accounts]]
            id = "retail"
            name = "Ana Horvat"
            city = "Zagreb"

            [[accounts]]
            id = "corp"
            company_id = 7
            name = "Ivo Kovac"
            "#,
        )
        .unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].profile.city, "Zagreb");
        assert!(!accounts[0].is_deferred());
        assert!(accounts[1].is_deferred());
    }
}
