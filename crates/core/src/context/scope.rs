use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;

use super::{RequestHead, RequestId, ScopeError, ScopeState};
use crate::session::Session;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Shared handle to the state of one request scope.
///
/// Clones point at the same state, so a write made anywhere inside the
/// request is visible to every continuation of that request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<RwLock<ScopeState>>,
}

impl RequestContext {
    pub fn new(state: ScopeState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Runs `body` with this context as the ambient one.
    pub async fn scope<F>(self, body: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, body).await
    }

    // Critical sections never await and never panic, so a poisoned lock
    // still holds consistent state.
    fn read(&self) -> RwLockReadGuard<'_, ScopeState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScopeState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_id(&self) -> RequestId {
        self.read().request_id
    }

    pub fn client_ip(&self) -> String {
        self.read().client_ip.clone()
    }

    pub fn request(&self) -> Option<Arc<RequestHead>> {
        self.read().request.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.read().session.clone()
    }

    /// Copy of the whole scope state.
    pub fn snapshot(&self) -> ScopeState {
        self.read().clone()
    }

    pub fn set_request_id(&self, request_id: RequestId) {
        self.write().request_id = request_id;
    }

    pub fn set_client_ip(&self, client_ip: impl Into<String>) {
        self.write().client_ip = client_ip.into();
    }

    pub fn set_request(&self, request: RequestHead) {
        self.write().request = Some(Arc::new(request));
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.write().session = session;
    }

    /// True when both handles refer to the same scope.
    pub fn same_scope(&self, other: &RequestContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Opens a new, isolated request scope and runs `body` inside it.
///
/// A scope opened inside another one starts from `initial` and inherits
/// nothing from the outer scope.
pub async fn with_scope<F>(initial: ScopeState, body: F) -> F::Output
where
    F: Future,
{
    RequestContext::new(initial).scope(body).await
}

/// Returns the context of the enclosing request scope.
///
/// Calling this outside a scope is a programming error: it is logged and
/// reported instead of handing out empty state that could attribute one
/// request's writes to another.
pub fn current() -> Result<RequestContext, ScopeError> {
    try_current().ok_or_else(|| {
        tracing::error!("request context accessed outside of a request scope");
        ScopeError::NoActiveScope
    })
}

/// Returns the context of the enclosing request scope, if any.
pub fn try_current() -> Option<RequestContext> {
    CURRENT.try_with(RequestContext::clone).ok()
}

pub fn request_id() -> Result<RequestId, ScopeError> {
    current().map(|ctx| ctx.request_id())
}

pub fn client_ip() -> Result<String, ScopeError> {
    current().map(|ctx| ctx.client_ip())
}

pub fn request() -> Result<Option<Arc<RequestHead>>, ScopeError> {
    current().map(|ctx| ctx.request())
}

pub fn session() -> Result<Option<Session>, ScopeError> {
    current().map(|ctx| ctx.session())
}

pub fn set_request_id(request_id: RequestId) -> Result<(), ScopeError> {
    current().map(|ctx| ctx.set_request_id(request_id))
}

pub fn set_client_ip(client_ip: impl Into<String>) -> Result<(), ScopeError> {
    let client_ip = client_ip.into();
    current().map(|ctx| ctx.set_client_ip(client_ip))
}

pub fn set_request(request: RequestHead) -> Result<(), ScopeError> {
    current().map(|ctx| ctx.set_request(request))
}

pub fn set_session(session: Option<Session>) -> Result<(), ScopeError> {
    current().map(|ctx| ctx.set_session(session))
}

/// Spawns a task that runs inside the current request scope.
///
/// The task shares the scope by reference, so it keeps the state alive and
/// observes later writes. Outside a scope the task is spawned without one.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match try_current() {
        Some(ctx) => tokio::spawn(ctx.scope(future)),
        None => tokio::spawn(future),
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::time::Duration;

    use super::*;
    use crate::session::UserView;

    fn state(ip: &str) -> ScopeState {
        ScopeState::new(RequestId::new(), ip)
    }

    fn session_for(user_id: i64) -> Session {
        Session::new(
            user_id,
            UserView {
                user_name: format!("user-{user_id}"),
                phone: String::new(),
                email: String::new(),
                is_admin: false,
            },
        )
    }

    type Observed = (RequestId, Option<i64>);

    // Reads the scope after `depth` nested suspensions.
    fn deep_read(depth: u32) -> Pin<Box<dyn Future<Output = Observed> + Send>> {
        Box::pin(async move {
            if depth == 0 {
                tokio::task::yield_now().await;
                let session = session().unwrap();
                return (request_id().unwrap(), session.map(|s| s.user_id));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            deep_read(depth - 1).await
        })
    }

    #[test]
    fn test_outside_scope_fails() {
        assert_eq!(current().unwrap_err(), ScopeError::NoActiveScope);
        assert_eq!(request_id().unwrap_err(), ScopeError::NoActiveScope);
        assert_eq!(set_session(None).unwrap_err(), ScopeError::NoActiveScope);
        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn test_scope_exposes_initial_state() {
        let initial = state("10.0.0.1");
        let expected = initial.request_id;

        with_scope(initial, async move {
            assert_eq!(request_id().unwrap(), expected);
            assert_eq!(client_ip().unwrap(), "10.0.0.1");
            assert!(session().unwrap().is_none());
            assert!(request().unwrap().is_none());
        })
        .await;

        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn test_setters_update_current_scope() {
        with_scope(state("10.0.0.1"), async {
            set_session(Some(session_for(5))).unwrap();
            set_client_ip("172.16.0.9").unwrap();
            let new_id = RequestId::new();
            set_request_id(new_id).unwrap();

            let snapshot = current().unwrap().snapshot();
            assert_eq!(snapshot.session.map(|s| s.user_id), Some(5));
            assert_eq!(snapshot.client_ip, "172.16.0.9");
            assert_eq!(snapshot.request_id, new_id);

            set_session(None).unwrap();
            assert!(session().unwrap().is_none());
        })
        .await;
    }

    fn head(method: http::Method, uri: &str) -> RequestHead {
        RequestHead {
            method,
            uri: uri.parse().unwrap(),
            version: http::Version::HTTP_11,
            headers: http::HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn test_request_head_survives_suspension_and_can_be_replaced() {
        let initial = state("10.0.0.1").with_request(head(http::Method::POST, "/api/login?next=%2F"));

        with_scope(initial, async {
            tokio::time::sleep(Duration::from_millis(1)).await;

            let original = request().unwrap().unwrap();
            assert_eq!(original.method, http::Method::POST);
            assert_eq!(original.uri.path(), "/api/login");
            assert_eq!(original.uri.query(), Some("next=%2F"));

            set_request(head(http::Method::GET, "/api/me")).unwrap();
            tokio::task::yield_now().await;

            let replaced = request().unwrap().unwrap();
            assert_eq!(replaced.method, http::Method::GET);
            assert_eq!(replaced.uri.path(), "/api/me");
            // Earlier handles keep what they saw.
            assert_eq!(original.method, http::Method::POST);
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_scopes_are_isolated() {
        let a = state("1.1.1.1");
        let b = state("2.2.2.2");
        let (id_a, id_b) = (a.request_id, b.request_id);

        let task_a = tokio::spawn(with_scope(a, async move {
            set_session(Some(session_for(1))).unwrap();
            let mut seen = Vec::new();
            for depth in 0..8 {
                seen.push(deep_read(depth).await);
            }
            seen
        }));
        let task_b = tokio::spawn(with_scope(b, async move {
            set_session(Some(session_for(2))).unwrap();
            let mut seen = Vec::new();
            for depth in 0..8 {
                seen.push(deep_read(depth).await);
            }
            seen
        }));

        for observed in task_a.await.unwrap() {
            assert_eq!(observed, (id_a, Some(1)));
        }
        for observed in task_b.await.unwrap() {
            assert_eq!(observed, (id_b, Some(2)));
        }
    }

    #[tokio::test]
    async fn test_interleaved_scopes_on_one_task() {
        let a = state("1.1.1.1");
        let b = state("2.2.2.2");
        let (id_a, id_b) = (a.request_id, b.request_id);

        let (seen_a, seen_b) = tokio::join!(
            with_scope(a, async {
                set_session(Some(session_for(1))).unwrap();
                deep_read(5).await
            }),
            with_scope(b, async {
                set_session(Some(session_for(2))).unwrap();
                deep_read(5).await
            }),
        );

        assert_eq!(seen_a, (id_a, Some(1)));
        assert_eq!(seen_b, (id_b, Some(2)));
    }

    #[tokio::test]
    async fn test_spawned_child_shares_scope_by_reference() {
        with_scope(state("10.0.0.1"), async {
            let parent = current().unwrap();

            let child = spawn(async {
                let ctx = current().unwrap();
                ctx.set_session(Some(session_for(42)));
                ctx
            })
            .await
            .unwrap();

            assert!(child.same_scope(&parent));
            assert_eq!(session().unwrap().map(|s| s.user_id), Some(42));
        })
        .await;
    }

    #[tokio::test]
    async fn test_plain_spawn_does_not_inherit() {
        with_scope(state("10.0.0.1"), async {
            let handle = tokio::spawn(async { try_current().is_none() });
            assert!(handle.await.unwrap());
        })
        .await;
    }

    #[tokio::test]
    async fn test_nested_scope_inherits_nothing() {
        with_scope(state("10.0.0.1"), async {
            set_session(Some(session_for(1))).unwrap();
            let outer = current().unwrap();

            with_scope(state("10.0.0.2"), async {
                assert!(session().unwrap().is_none());
                assert_eq!(client_ip().unwrap(), "10.0.0.2");
                assert!(!current().unwrap().same_scope(&outer));
            })
            .await;

            assert_eq!(client_ip().unwrap(), "10.0.0.1");
            assert_eq!(session().unwrap().map(|s| s.user_id), Some(1));
        })
        .await;
    }
}
