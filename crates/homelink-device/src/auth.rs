use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use hashbrown::HashMap;

use rand::Rng;
use rand::distr::Alphanumeric;

use homelink::response::Response;

use tracing::{info, warn};

/// Length of an authentication token.
pub const TOKEN_LENGTH: usize = 16;

/// Lifetime of an authentication token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct IssuedToken {
    value: String,
    expiry: Instant,
}

/// Password-based token issuance and validation for a single device.
///
/// Each client identifier owns at most one token: a successful
/// authentication replaces any token previously issued to the same client.
/// Tokens expire after a fixed lifetime and are checked lazily, so
/// expired entries remain stored until they are replaced.
///
/// Password and tokens are guarded by their own locks, hence the manager
/// can be shared among concurrent connections.
#[derive(Debug)]
pub struct AuthenticationManager {
    password: RwLock<String>,
    tokens: RwLock<HashMap<String, IssuedToken>>,
    token_lifetime: Duration,
}

impl AuthenticationManager {
    /// Creates an [`AuthenticationManager`] for the given device password.
    #[must_use]
    #[inline]
    pub fn new(password: impl Into<String>) -> Self {
        Self::with_token_lifetime(password, TOKEN_LIFETIME)
    }

    /// Creates an [`AuthenticationManager`] whose tokens last for the
    /// given lifetime.
    #[must_use]
    #[inline]
    pub fn with_token_lifetime(password: impl Into<String>, token_lifetime: Duration) -> Self {
        Self {
            password: RwLock::new(password.into()),
            tokens: RwLock::new(HashMap::new()),
            token_lifetime,
        }
    }

    /// Issues a fresh token to a client presenting the right password.
    ///
    /// A wrong password leaves the stored tokens untouched.
    pub fn authenticate(&self, client_id: &str, password: &str) -> Response {
        let matches = *self
            .password
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            == password;

        if !matches {
            warn!("Authentication failed for client `{client_id}`");
            return Response::unauthorized("Authentication failed");
        }

        let token = generate_token();
        let issued = IssuedToken {
            value: token.clone(),
            expiry: Instant::now() + self.token_lifetime,
        };

        // A previous token for the same client is silently replaced.
        let _ = self
            .tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client_id.to_string(), issued);

        info!("Issued a new token to client `{client_id}`");

        Response::ok("Authentication successful").token(token)
    }

    /// Checks whether a token has been issued to a client and is not
    /// expired yet.
    pub fn validate_token(&self, client_id: &str, token: &str) -> Response {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);

        match tokens.get(client_id) {
            Some(issued) if issued.value == token && Instant::now() < issued.expiry => {
                Response::ok("Token is valid")
            }
            _ => Response::forbidden("Invalid or expired token"),
        }
    }

    /// Replaces the device password.
    ///
    /// Tokens issued with the previous password remain valid.
    pub fn change_password(&self, current_password: &str, new_password: &str) -> Response {
        let mut password = self.password.write().unwrap_or_else(PoisonError::into_inner);

        if *password != current_password {
            warn!("Password change refused: wrong current password");
            return Response::unauthorized("Current password is incorrect");
        }

        *password = new_password.to_string();

        info!("Device password changed");

        Response::ok("Password changed successfully")
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use homelink::response::Status;

    use super::{AuthenticationManager, TOKEN_LENGTH};

    fn token(manager: &AuthenticationManager, client_id: &str, password: &str) -> String {
        let response = manager.authenticate(client_id, password);
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.message, "Authentication successful");
        response.token.unwrap()
    }

    #[test]
    fn test_authenticate() {
        let manager = AuthenticationManager::new("secret");

        let token = token(&manager, "client-1", "secret");
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let response = manager.validate_token("client-1", &token);
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.message, "Token is valid");
    }

    #[test]
    fn test_wrong_password() {
        let manager = AuthenticationManager::new("secret");

        let response = manager.authenticate("client-1", "guess");
        assert_eq!(response.status, Status::Unauthorized);
        assert_eq!(response.message, "Authentication failed");
        assert_eq!(response.token, None);
    }

    #[test]
    fn test_token_replacement() {
        let manager = AuthenticationManager::new("secret");

        let first = token(&manager, "client-1", "secret");
        let second = token(&manager, "client-1", "secret");
        assert_ne!(first, second);

        assert_eq!(
            manager.validate_token("client-1", &first).status,
            Status::Forbidden
        );
        assert_eq!(
            manager.validate_token("client-1", &second).status,
            Status::Ok
        );
    }

    #[test]
    fn test_foreign_and_tampered_tokens() {
        let manager = AuthenticationManager::new("secret");

        let token = token(&manager, "client-1", "secret");

        // Token issued to another client.
        let response = manager.validate_token("client-2", &token);
        assert_eq!(response.status, Status::Forbidden);
        assert_eq!(response.message, "Invalid or expired token");

        // Tampered token.
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'a' { 'b' } else { 'a' });
        assert_eq!(
            manager.validate_token("client-1", &tampered).status,
            Status::Forbidden
        );
    }

    #[test]
    fn test_token_expiry() {
        let manager = AuthenticationManager::with_token_lifetime("secret", Duration::from_millis(50));

        let token = token(&manager, "client-1", "secret");
        assert_eq!(manager.validate_token("client-1", &token).status, Status::Ok);

        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(
            manager.validate_token("client-1", &token).status,
            Status::Forbidden
        );

        // A new authentication issues a valid token again.
        let token = self::token(&manager, "client-1", "secret");
        assert_eq!(manager.validate_token("client-1", &token).status, Status::Ok);
    }

    #[test]
    fn test_change_password() {
        let manager = AuthenticationManager::new("secret");
        let token = token(&manager, "client-1", "secret");

        let response = manager.change_password("wrong", "other");
        assert_eq!(response.status, Status::Unauthorized);
        assert_eq!(response.message, "Current password is incorrect");

        let response = manager.change_password("secret", "other");
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.message, "Password changed successfully");

        // Old password rejected, new one accepted.
        assert_eq!(
            manager.authenticate("client-2", "secret").status,
            Status::Unauthorized
        );
        assert_eq!(
            manager.authenticate("client-2", "other").status,
            Status::Ok
        );

        // Existing tokens survive a password change.
        assert_eq!(manager.validate_token("client-1", &token).status, Status::Ok);
    }

    #[test]
    fn test_concurrent_authentication() {
        let manager = Arc::new(AuthenticationManager::new("secret"));

        let handles = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    let client_id = format!("client-{i}");
                    let token = token(&manager, &client_id, "secret");
                    manager.validate_token(&client_id, &token).status
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Status::Ok);
        }
    }
}
