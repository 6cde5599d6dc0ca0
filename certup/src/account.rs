use rcgen::KeyPair;

/// Registration handle assigned by the CA when an account is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    account_id: String,
}

impl Registration {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    /// The account URL assigned by the CA.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

/// Account state carried through one issuance run.
///
/// Pairs the contact email with the managed private key and, once the CA
/// accepted the registration, the registration handle. Nothing in here is
/// persisted; the key comes from the secret store and the rest is rebuilt
/// every run.
pub struct Account {
    email: String,
    key: KeyPair,
    registration: Option<Registration>,
}

impl Account {
    pub fn new(email: impl Into<String>, key: KeyPair) -> Self {
        Self {
            email: email.into(),
            key,
            registration: None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The managed private key. Signs the CSR and is uploaded next to the
    /// issued certificate.
    pub fn private_key(&self) -> &KeyPair {
        &self.key
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    /// Attach the registration handle. Called once per run, after the CA
    /// accepted the registration.
    pub fn set_registration(&mut self, registration: Registration) {
        self.registration = Some(registration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_email_key_and_registration() {
        let key = KeyPair::generate().unwrap();
        let key_pem = key.serialize_pem();
        let mut account = Account::new("admin@example.com", key);
        assert_eq!(account.email(), "admin@example.com");
        assert_eq!(account.private_key().serialize_pem(), key_pem);
        assert!(account.registration().is_none());

        account.set_registration(Registration::new("https://acme.test/acct/1"));
        let registration = account.registration().expect("registration not set");
        assert_eq!(registration.account_id(), "https://acme.test/acct/1");
    }
}
