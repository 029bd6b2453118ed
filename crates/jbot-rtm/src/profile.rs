//! User profile cache for the modern transport's half of the recipient
//! resolver (spec §4.2): "a user profile lookup yields real name and
//! mention name." Profiles are fetched lazily over the REST API and kept
//! around for the life of the connection — the RTM event stream tells us
//! about renames via `UserChangeEvent`, which the dispatch kernel already
//! threads through to `ChannelState`, so this cache only needs to answer
//! "who is this user id" cheaply on the hot path.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;

use crate::error::RtmError;

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub real_name: String,
    #[serde(rename = "name")]
    pub mention_name: String,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    error: Option<String>,
    user: Option<UserProfile>,
}

/// Caches `user_id -> UserProfile` lookups against the token-authenticated
/// REST API, so repeated messages from the same user don't re-fetch.
pub struct ProfileCache {
    http: reqwest::Client,
    token: String,
    base_url: String,
    cache: RwLock<HashMap<String, UserProfile>>,
}

impl ProfileCache {
    pub fn new(http: reqwest::Client, token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            base_url: base_url.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, user_id: &str) -> Result<UserProfile, RtmError> {
        if let Some(profile) = self.cache.read().expect("profile cache poisoned").get(user_id) {
            return Ok(profile.clone());
        }

        let resp: UsersInfoResponse = self
            .http
            .get(format!("{}/users.info", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await
            .map_err(|e| RtmError::Socket(e.to_string()))?
            .json()
            .await
            .map_err(|e| RtmError::Socket(e.to_string()))?;

        if !resp.ok {
            return Err(RtmError::Handshake(resp.error.unwrap_or_else(|| "users.info failed".into())));
        }
        let profile = resp.user.ok_or_else(|| RtmError::Handshake("users.info returned no user".into()))?;

        self.cache
            .write()
            .expect("profile cache poisoned")
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    /// Invalidate a cached entry, e.g. on a `UserChangeEvent` rename.
    pub fn invalidate(&self, user_id: &str) {
        self.cache.write().expect("profile cache poisoned").remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_on_empty_cache_is_a_noop() {
        let cache = ProfileCache::new(reqwest::Client::new(), "tok", "https://example.invalid/api");
        cache.invalidate("U1");
    }
}
