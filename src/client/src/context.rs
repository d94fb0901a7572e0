use arcu_common::constants::{
    ANONYMOUS_USER, FALLBACK_USER_ID_KEY, SESSION_ID_KEY, TAGS_KEY, USER_ID_KEY, USER_INFO_KEY,
};
use arcu_common::store::{KeyValueStore, StoreResult};
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::warn;

const SESSION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `session_<unix millis>_<9 base36 chars>`
pub fn new_session_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// User identity, tags and session id resolved from the Local and Session
/// stores. Reads never fail: storage errors are logged and replaced with
/// defaults.
pub struct ContextStore {
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    // used when the session store cannot hold the id
    fallback_session: OnceLock<String>,
}

impl ContextStore {
    pub fn new(local: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            local,
            session,
            fallback_session: OnceLock::new(),
        }
    }

    pub fn user_id(&self) -> String {
        for key in [USER_ID_KEY, FALLBACK_USER_ID_KEY] {
            match self.local.get(key) {
                Ok(Some(id)) if !id.is_empty() => return id,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read user id from local store: {}", e);
                    break;
                }
            }
        }
        ANONYMOUS_USER.to_string()
    }

    pub fn user_info(&self) -> Option<Map<String, Value>> {
        match self.local.get(USER_INFO_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read user info from local store: {}", e);
                None
            }
        }
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        match self.local.get(TAGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed tags in local store: {}", e);
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read tags from local store: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Session id, created on first access and kept for the lifetime of the
    /// session store.
    pub fn session_id(&self) -> String {
        match self.session.get(SESSION_ID_KEY) {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => {
                let id = new_session_id();
                match self.session.set(SESSION_ID_KEY, &id) {
                    Ok(()) => id,
                    Err(e) => {
                        warn!("Failed to persist session id: {}", e);
                        self.fallback_session.get_or_init(|| id).clone()
                    }
                }
            }
            Err(e) => {
                warn!("Failed to read session id: {}", e);
                self.fallback_session.get_or_init(new_session_id).clone()
            }
        }
    }

    pub fn set_user_context(
        &self,
        user_id: &str,
        info: Option<&Map<String, Value>>,
    ) -> StoreResult<()> {
        self.local.set(USER_ID_KEY, user_id)?;
        if let Some(info) = info {
            self.local.set(USER_INFO_KEY, &serde_json::to_string(info)?)?;
        }
        Ok(())
    }

    pub fn set_tags(&self, tags: &BTreeMap<String, String>) -> StoreResult<()> {
        self.local.set(TAGS_KEY, &serde_json::to_string(tags)?)
    }
}
