use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::session::{SessionError, SessionStore};

/// [`SessionStore`] over a request's [`SignedCookieJar`].
///
/// Reads come from the inbound jar with queued mutations overlaid; a final
/// [`apply`](CookieSession::apply) folds the mutations into the jar so the
/// handler can return it and emit the `Set-Cookie` headers. All cookies get
/// the same policy: http-only, `SameSite=Lax`, path `/`, secure outside dev.
pub struct CookieSession {
    jar: SignedCookieJar,
    secure: bool,
    queued: Vec<Mutation>,
}

enum Mutation {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    Delete {
        key: String,
    },
}

impl CookieSession {
    #[must_use]
    pub fn new(jar: SignedCookieJar, secure: bool) -> Self {
        Self {
            jar,
            secure,
            queued: Vec::new(),
        }
    }

    /// Fold queued mutations into the jar for the outbound response.
    #[must_use]
    pub fn apply(self) -> SignedCookieJar {
        let Self { jar, secure, queued } = self;
        queued.into_iter().fold(jar, |jar, mutation| match mutation {
            Mutation::Set { key, value, ttl } => jar.add(build_cookie(key, value, ttl, secure)),
            Mutation::Delete { key } => jar.remove(Cookie::build((key, "")).path("/").build()),
        })
    }
}

fn build_cookie(key: String, value: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((key, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(ttl)
        .build()
}

impl SessionStore for CookieSession {
    fn get(&self, key: &str) -> Option<String> {
        // Later mutations shadow earlier ones and the inbound jar.
        for mutation in self.queued.iter().rev() {
            match mutation {
                Mutation::Set { key: k, value, .. } if k == key => return Some(value.clone()),
                Mutation::Delete { key: k } if k == key => return None,
                _ => {}
            }
        }
        self.jar.get(key).map(|c| c.value().to_string())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        self.queued.push(Mutation::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        });
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SessionError> {
        self.queued.push(Mutation::Delete {
            key: key.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Key;

    fn empty_session() -> CookieSession {
        CookieSession::new(SignedCookieJar::new(Key::generate()), false)
    }

    #[test]
    fn queued_set_is_visible_before_apply() {
        let mut session = empty_session();
        session.set("k", "v", Duration::minutes(10)).unwrap();
        assert_eq!(session.get("k"), Some("v".to_string()));
    }

    #[test]
    fn queued_delete_shadows_inbound_cookie() {
        let key = Key::generate();
        let jar = SignedCookieJar::new(key).add(
            Cookie::build(("k", "inbound")).path("/").build(),
        );
        let mut session = CookieSession::new(jar, false);
        assert_eq!(session.get("k"), Some("inbound".to_string()));

        session.delete("k").unwrap();
        assert_eq!(session.get("k"), None);
    }

    #[test]
    fn later_mutation_wins() {
        let mut session = empty_session();
        session.set("k", "v1", Duration::minutes(10)).unwrap();
        session.delete("k").unwrap();
        session.set("k", "v2", Duration::minutes(10)).unwrap();
        assert_eq!(session.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn apply_folds_queued_set_into_jar() {
        let mut session = empty_session();
        session.set("k", "v", Duration::minutes(10)).unwrap();

        let jar = session.apply();
        let cookie = jar.get("k").unwrap();
        assert_eq!(cookie.value(), "v");
    }

    #[test]
    fn apply_removes_deleted_cookie() {
        let key = Key::generate();
        let jar = SignedCookieJar::new(key)
            .add(Cookie::build(("k", "inbound")).path("/").build());
        let mut session = CookieSession::new(jar, false);
        session.delete("k").unwrap();

        let jar = session.apply();
        assert!(jar.get("k").is_none());
    }
}
