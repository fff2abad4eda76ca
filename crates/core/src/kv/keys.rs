use std::fmt;

/// Logical key categories. Each one owns a disjoint slice of the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Serialized session payloads keyed by session id.
    Session,
    /// Login identity to active session ids.
    LoginSessions,
    /// Captcha challenges keyed by client-chosen challenge id.
    Captcha,
    /// Distributed sequence counters keyed by counter name.
    IdCounter,
    /// Generic JSON values.
    Json,
}

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::Session,
        Namespace::LoginSessions,
        Namespace::Captcha,
        Namespace::IdCounter,
        Namespace::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::LoginSessions => "login_sessions",
            Self::Captcha => "captcha",
            Self::IdCounter => "id_counter",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key prefix rendered as `<global>:<namespace>:`.
///
/// The namespace segment is always terminated by `:`, so two prefixes built
/// from the same global prefix and different namespaces can never produce
/// the same composed key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    namespace: Namespace,
    rendered: String,
}

impl KeyPrefix {
    pub fn new(global: &str, namespace: Namespace) -> Self {
        Self {
            namespace,
            rendered: format!("{}:{}:", global, namespace.as_str()),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Composes the full backend key for `raw`.
    pub fn key(&self, raw: impl fmt::Display) -> String {
        format!("{}{}", self.rendered, raw)
    }

    /// Strips this prefix from a full key, returning the raw key.
    pub fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.rendered.as_str())
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let prefix = KeyPrefix::new("reqscope", Namespace::Session);
        assert_eq!(prefix.as_str(), "reqscope:session:");
        assert_eq!(prefix.key("abc"), "reqscope:session:abc");
        assert_eq!(prefix.key(42), "reqscope:session:42");
    }

    #[test]
    fn test_strip_roundtrip() {
        let prefix = KeyPrefix::new("app", Namespace::IdCounter);
        let key = prefix.key("orders");
        assert_eq!(prefix.strip(&key), Some("orders"));
        assert_eq!(prefix.strip("app:captcha:orders"), None);
    }

    #[test]
    fn test_namespaces_never_collide() {
        // Raw keys that try to smuggle another namespace in still stay in their own slice.
        let raws = ["x", "session:x", ":x", "captcha:", ""];
        for a in Namespace::ALL {
            for b in Namespace::ALL {
                if a == b {
                    continue;
                }
                let pa = KeyPrefix::new("g", a);
                let pb = KeyPrefix::new("g", b);
                assert!(!pa.as_str().starts_with(pb.as_str()));
                for ra in raws {
                    for rb in raws {
                        assert_ne!(pa.key(ra), pb.key(rb), "{a} vs {b}");
                    }
                }
            }
        }
    }
}
