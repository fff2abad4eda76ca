//! Short-lived captcha challenges bound to a session id.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use reqscope_core::kv::{KeyPrefix, KeyValueStore, Namespace, Result};

/// Characters a challenge is drawn from. Glyphs that are easy to confuse
/// (`0`/`o`, `1`/`i`) are left out.
const CAPTCHA_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

const CAPTCHA_LENGTH: usize = 4;

/// Generates a random challenge text.
pub fn generate_captcha_text() -> String {
    let mut rng = rand::rng();
    (0..CAPTCHA_LENGTH)
        .map(|_| CAPTCHA_ALPHABET[rng.random_range(0..CAPTCHA_ALPHABET.len())] as char)
        .collect()
}

/// Outcome of checking an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaCheck {
    Valid,
    Mismatch,
    /// No challenge was issued, or it expired.
    Missing,
}

impl CaptchaCheck {
    pub fn is_valid(self) -> bool {
        self == CaptchaCheck::Valid
    }
}

#[derive(Clone)]
pub struct CaptchaStore {
    store: Arc<dyn KeyValueStore>,
    prefix: KeyPrefix,
}

impl CaptchaStore {
    pub fn new(store: Arc<dyn KeyValueStore>, global_prefix: &str) -> Self {
        Self {
            store,
            prefix: KeyPrefix::new(global_prefix, Namespace::Captcha),
        }
    }

    /// Issues a new challenge for `session_id`, replacing any previous one.
    pub async fn issue(&self, session_id: &str, ttl: Duration) -> Result<String> {
        let text = generate_captcha_text();
        self.store
            .set(&self.prefix.key(session_id), &text, Some(ttl))
            .await?;
        tracing::debug!(session_id, "Captcha issued");
        Ok(text)
    }

    /// Checks `answer` against the pending challenge.
    ///
    /// Comparison ignores case and surrounding whitespace. A correct answer
    /// consumes the challenge; a wrong one leaves it in place until it expires.
    pub async fn verify(&self, session_id: &str, answer: &str) -> Result<CaptchaCheck> {
        let key = self.prefix.key(session_id);
        let Some(expected) = self.store.get(&key).await? else {
            return Ok(CaptchaCheck::Missing);
        };

        if !expected.eq_ignore_ascii_case(answer.trim()) {
            tracing::debug!(session_id, "Captcha mismatch");
            return Ok(CaptchaCheck::Mismatch);
        }

        self.store.delete(&[key]).await?;
        Ok(CaptchaCheck::Valid)
    }

    pub async fn discard(&self, session_id: &str) -> Result<()> {
        self.store.delete(&[self.prefix.key(session_id)]).await?;
        Ok(())
    }
}
