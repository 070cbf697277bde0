use orderkit_auth::{JwtClaims, Role};
use orderkit_core::UserId;
use orderkit_infra::order_queries::Requester;
use orderkit_orders::Contact;

/// Principal context for a request (verified identity + roles).
///
/// Built by the auth middleware from the token claims; handlers never see the
/// raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    name: String,
    email: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, name: String, email: String, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            name,
            email,
            roles,
        }
    }

    pub fn from_claims(claims: JwtClaims) -> Self {
        Self::new(claims.sub, claims.name, claims.email, claims.roles)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin)
    }

    /// Snapshot stored on orders placed by this principal.
    pub fn contact(&self) -> Contact {
        Contact {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.user_id,
            is_admin: self.is_admin(),
        }
    }
}
