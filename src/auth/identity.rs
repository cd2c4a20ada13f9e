use parking_lot::RwLock;

/// The signed-in user as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
}

/// Supplies the current user; authentication itself happens elsewhere.
pub trait IdentityProvider: Send + Sync {
    /// `None` while signed out.
    fn current_user(&self) -> Option<UserProfile>;

    fn sign_out(&self);

    fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Identity fixed at construction, e.g. from the config file.
pub struct StaticIdentity {
    user: RwLock<Option<UserProfile>>,
}

impl StaticIdentity {
    pub fn signed_in(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(UserProfile {
                uid: uid.into(),
                display_name: display_name.into(),
            })),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: RwLock::new(None),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserProfile> {
        self.user.read().clone()
    }

    fn sign_out(&self) {
        if let Some(user) = self.user.write().take() {
            log::info!("Signed out {}", user.display_name);
        }
    }
}
