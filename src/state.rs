use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::JwtKeys;
use crate::config::JwtConfig;
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub keys: JwtKeys,
}

impl AppState {
    pub fn from_parts(users: Arc<dyn UserStore>, jwt: &JwtConfig) -> Self {
        Self {
            users,
            keys: JwtKeys::from_config(jwt),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_store(Arc::new(crate::users::memory::MemoryUserStore::new()))
    }

    #[cfg(test)]
    pub fn fake_with_store(users: Arc<dyn UserStore>) -> Self {
        let jwt = JwtConfig {
            secret: "test".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60 * 24,
        };
        Self::from_parts(users, &jwt)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
