//! In-flight registry for caller-supplied idempotency keys
//!
//! A key is claimed for the duration of one admission. A second request
//! with the same key while the first is still running cannot know the
//! outcome yet and is answered with `Indeterminate`; once the first
//! finishes, retries are served from the persisted entity instead.

use tracing::warn;
use uuid::Uuid;

use super::resolver::{CollisionDomains, CollisionSet, Reservation};
use crate::error::{Error, Result};

/// Holder of one idempotency key
#[derive(Default)]
pub struct KeyClaim(Option<Uuid>);

impl CollisionSet for KeyClaim {
    type Candidate = Uuid;
    type Id = Uuid;

    fn find_collision(&self, _: &Uuid) -> Option<Uuid> {
        self.0
    }

    fn insert(&mut self, token: Uuid) -> Uuid {
        self.0 = Some(token);
        token
    }

    fn remove(&mut self, token: &Uuid) -> bool {
        if self.0 == Some(*token) {
            self.0 = None;
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

pub struct InFlightKeys {
    keys: CollisionDomains<String, KeyClaim>,
}

impl InFlightKeys {
    pub fn new(shards: usize) -> Self {
        Self {
            keys: CollisionDomains::new(shards),
        }
    }

    /// Run `admit` while holding `key`; without a key, just run it
    pub fn run_exclusive<T>(&self, key: Option<String>, admit: impl FnOnce() -> Result<T>) -> Result<T> {
        let Some(key) = key else {
            return admit();
        };

        let token = match self.keys.reserve_if_free(&key, Uuid::new_v4())? {
            Reservation::Reserved(token) => token,
            Reservation::Collided(_) => {
                return Err(Error::Indeterminate(format!(
                    "a request with idempotency key '{key}' is still in flight"
                )));
            }
        };

        let outcome = admit();

        if let Err(e) = self.keys.release(&key, &token) {
            warn!(key = %key, error = %e, "Failed to release idempotency key");
        }
        outcome
    }

    pub fn is_in_flight(&self, key: &str) -> Result<bool> {
        Ok(self
            .keys
            .inspect(&key.to_string(), |claim| !claim.is_empty())?
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_duplicate_is_indeterminate() {
        let keys = InFlightKeys::new(4);

        let outer = keys.run_exclusive(Some("k1".to_string()), || {
            assert!(keys.is_in_flight("k1").unwrap());
            let inner = keys.run_exclusive(Some("k1".to_string()), || Ok(()));
            assert!(matches!(inner, Err(Error::Indeterminate(_))));
            Ok(5)
        });

        assert_eq!(outer.unwrap(), 5);
        assert!(!keys.is_in_flight("k1").unwrap());
    }

    #[test]
    fn test_key_released_after_failure() {
        let keys = InFlightKeys::new(4);
        let failed: Result<()> =
            keys.run_exclusive(Some("k2".to_string()), || Err(Error::Validation("bad".into())));
        assert!(failed.is_err());
        assert!(keys.run_exclusive(Some("k2".to_string()), || Ok(())).is_ok());
    }

    #[test]
    fn test_distinct_keys_and_no_key() {
        let keys = InFlightKeys::new(4);
        let result = keys.run_exclusive(Some("a".to_string()), || {
            keys.run_exclusive(Some("b".to_string()), || keys.run_exclusive(None, || Ok(1)))
        });
        assert_eq!(result.unwrap(), 1);
    }
}
