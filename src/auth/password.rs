use crate::models::{ServiceError, ServiceResult};

/// One-way bcrypt password hashing.
///
/// bcrypt is CPU bound, so both operations run on the blocking thread pool
/// to keep request workers responsive.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: bcrypt::DEFAULT_COST }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> ServiceResult<String> {
        let cost = self.cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| {
                tracing::error!("password hash task failed: {}", e);
                ServiceError::internal("password hashing failed")
            })?
            .map_err(|e| {
                tracing::error!("failed to hash password: {}", e);
                ServiceError::internal("password hashing failed")
            })
    }

    pub async fn verify(&self, password: &str, hashed_password: &str) -> ServiceResult<bool> {
        let password = password.to_string();
        let hashed_password = hashed_password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed_password))
            .await
            .map_err(|e| {
                tracing::error!("password verify task failed: {}", e);
                ServiceError::internal("password verification failed")
            })?
            .map_err(|e| {
                tracing::error!("failed to verify password: {}", e);
                ServiceError::internal("password verification failed")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let hashed = hasher.hash("correct horse").await.unwrap();

        assert_ne!(hashed, "correct horse");
        assert!(hasher.verify("correct horse", &hashed).await.unwrap());
        assert!(!hasher.verify("wrong horse", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let hasher = PasswordHasher::new(4);
        let a = hasher.hash("password1").await.unwrap();
        let b = hasher.hash("password1").await.unwrap();
        assert_ne!(a, b);
    }
}
