use serde::Deserialize;
use serde::Serialize;

use kite_core::DisplayParams;
use kite_core::View;

use crate::error::IdentityError;

pub const SIGN_IN: &str = "sign_in";
pub const SIGN_OUT: &str = "sign_out";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn named(display_name: &str) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            username: None,
        }
    }

    /// Display name, then username, then `User`.
    pub fn label(&self) -> &str {
        [self.display_name.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or("User")
    }
}

/// Sign-in state for the host surface. Purely cosmetic: nothing in the
/// protocol depends on it.
pub trait IdentityProvider {
    fn is_authenticated(&self) -> bool;
    fn current_user(&self) -> Option<UserIdentity>;
    fn sign_in(&mut self) -> Result<UserIdentity, IdentityError>;
    fn sign_out(&mut self) -> Result<(), IdentityError>;
}

/// Signs in as a fixed local account.
#[derive(Debug, Clone, Default)]
pub struct LocalIdentity {
    account: Option<UserIdentity>,
    signed_in: bool,
}

impl LocalIdentity {
    pub fn new(account: Option<UserIdentity>) -> Self {
        Self {
            account,
            signed_in: false,
        }
    }

    /// Uses the login name of the current OS user, if any.
    pub fn from_env() -> Self {
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.trim().is_empty());
        Self::new(username.map(|username| UserIdentity {
            display_name: None,
            username: Some(username),
        }))
    }
}

impl IdentityProvider for LocalIdentity {
    fn is_authenticated(&self) -> bool {
        self.signed_in && self.account.is_some()
    }

    fn current_user(&self) -> Option<UserIdentity> {
        if self.signed_in {
            self.account.clone()
        } else {
            None
        }
    }

    fn sign_in(&mut self) -> Result<UserIdentity, IdentityError> {
        let account = self.account.clone().ok_or(IdentityError::NoAccount)?;
        self.signed_in = true;
        tracing::info!(user = account.label(), "signed in");
        Ok(account)
    }

    fn sign_out(&mut self) -> Result<(), IdentityError> {
        if !self.signed_in {
            return Err(IdentityError::NotSignedIn);
        }
        self.signed_in = false;
        Ok(())
    }
}

fn initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|ch| ch.to_uppercase().collect())
        .unwrap_or_default()
}

pub fn auth_badge(provider: &dyn IdentityProvider, display: &DisplayParams) -> View {
    match provider.current_user() {
        Some(user) if provider.is_authenticated() => {
            let name = user.label();
            View::new("auth", name)
                .accent(&display.theme_color)
                .badge(initial(name))
                .button("Sign Out", SIGN_OUT)
        }
        _ => View::new("auth", "Sign In")
            .accent(&display.theme_color)
            .button("Sign In", SIGN_IN),
    }
}
