use std::fmt;

/// Account id, application id and shared secret. Fixed for the life of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    account: String,
    app_id: String,
    secret: String,
}

impl Credentials {
    pub fn new(
        account: impl Into<String>,
        app_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            app_id: app_id.into(),
            secret: secret.into(),
        }
    }

    /// Subdomain of business.ru the account lives on.
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// `https://{account}.business.ru/api/rest/`
    pub fn default_base_url(&self) -> String {
        format!("https://{}.business.ru/api/rest/", self.account)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("app_id", &self.app_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
