use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::model::UserId;
use crate::validation::{Email, Password};

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&Password> for Secret {
    fn from(password: &Password) -> Self {
        Self(password.expose().to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthUser")
            .field("uid", &self.uid)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailure {
    pub code: String,
    pub message: String,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Which request an [`AuthOutput`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthAction {
    SignIn,
    SignUp,
    SignOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOperation {
    SignIn {
        email: String,
        password: Secret,
    },
    SignUp {
        display_name: String,
        email: String,
        password: Secret,
    },
    SignOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOutput {
    SignedIn(AuthUser),
    SignedOut,
    Failed(AuthFailure),
}

impl Operation for AuthOperation {
    type Output = AuthOutput;
}

/// Email/password sign-in against the hosted identity provider. The shell
/// also reports session changes on its own with `Event::AuthStateChanged`.
pub struct Auth<Ev> {
    context: CapabilityContext<AuthOperation, Ev>,
}

impl<Ev> Capability<Ev> for Auth<Ev> {
    type Operation = AuthOperation;
    type MappedSelf<MappedEv> = Auth<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Auth::new(self.context.map_event(f))
    }
}

impl<Ev> Auth<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<AuthOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn sign_in<F>(&self, email: &Email, password: &Password, make_event: F)
    where
        F: FnOnce(AuthOutput) -> Ev + Send + 'static,
    {
        self.request(
            AuthOperation::SignIn {
                email: email.as_str().to_string(),
                password: password.into(),
            },
            make_event,
        );
    }

    pub fn sign_up<F>(&self, display_name: String, email: &Email, password: &Password, make_event: F)
    where
        F: FnOnce(AuthOutput) -> Ev + Send + 'static,
    {
        self.request(
            AuthOperation::SignUp {
                display_name,
                email: email.as_str().to_string(),
                password: password.into(),
            },
            make_event,
        );
    }

    pub fn sign_out<F>(&self, make_event: F)
    where
        F: FnOnce(AuthOutput) -> Ev + Send + 'static,
    {
        self.request(AuthOperation::SignOut, make_event);
    }

    fn request<F>(&self, operation: AuthOperation, make_event: F)
    where
        F: FnOnce(AuthOutput) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(output));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_never_print_passwords() {
        let op = AuthOperation::SignIn {
            email: "m@example.com".into(),
            password: Secret::from(&Password::new("hunter22")),
        };
        let rendered = format!("{op:?}");
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn user_debug_hides_email() {
        let user = AuthUser {
            uid: UserId::new("u1"),
            email: Some("m@example.com".into()),
            display_name: Some("Mira".into()),
        };
        assert!(!format!("{user:?}").contains("example.com"));
    }
}
