//! Test environment lifecycle
//!
//! A `TestEnvironment` owns the backend handle and every component started
//! for a suite. Test cases borrow it mutably, so two cases can never poll the
//! same backend at once, and the backend store is cleared after each case.

use std::mem;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::collector::{self, await_stable_content, Collection, StabilityPolicy, StableContent};
use crate::error::{Error, Result};
use crate::graph::TraceGraph;

/// A started piece of the environment (collector, target, backend container)
#[async_trait]
pub trait Component: Send {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Stop the component and release its resources
    async fn stop(&mut self) -> Result<()>;
}

/// Context shared by the test cases of one suite
pub struct TestEnvironment<B: Backend> {
    backend: B,
    policy: StabilityPolicy,
    components: Vec<Box<dyn Component>>,
    dirty: bool,
}

impl<B: Backend> TestEnvironment<B> {
    /// Create an environment around a ready backend
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policy: StabilityPolicy::default(),
            components: Vec::new(),
            dirty: false,
        }
    }

    /// Use a custom stability policy
    #[must_use]
    pub fn with_policy(mut self, policy: StabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Take ownership of a started component. Components are stopped in
    /// reverse registration order.
    #[must_use]
    pub fn with_component(mut self, component: impl Component + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    /// The backend handle
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The stability policy used by the wait operations
    pub fn policy(&self) -> &StabilityPolicy {
        &self.policy
    }

    /// Whether the last reset failed and the store may hold stale exports
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the backend store. Not retried; on failure the environment stays
    /// dirty and refuses to run cases until a reset succeeds.
    pub async fn reset_backend(&mut self) -> Result<()> {
        match self.backend.reset().await {
            Ok(()) => {
                self.dirty = false;
                debug!("Backend reset");
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }

    /// Wait for the backend payload to stop growing
    pub async fn wait_for_content(&mut self) -> Result<StableContent> {
        let backend = &self.backend;
        await_stable_content(|| backend.fetch(), &self.policy).await
    }

    /// Wait for the backend payload to stop growing and decode it
    pub async fn collect(&mut self) -> Result<Collection> {
        collector::collect(&self.backend, &self.policy).await
    }

    /// Wait for the backend payload to stop growing and return its traces
    pub async fn wait_for_traces(&mut self) -> Result<TraceGraph> {
        Ok(self.collect().await?.into_graph())
    }

    /// Run one test case, then clear the backend store.
    ///
    /// A reset failure after a passing case is returned as the case's result.
    /// After a failing case the case's error wins and the reset failure is
    /// logged. Either way the environment stays dirty, and further cases fail
    /// with [`Error::Reset`] without running until [`Self::reset_backend`]
    /// succeeds.
    pub async fn run_case<T, F>(&mut self, case: F) -> Result<T>
    where
        F: for<'e> FnOnce(&'e mut Self) -> BoxFuture<'e, Result<T>>,
    {
        if self.dirty {
            return Err(Error::reset(
                "backend store may hold exports from a previous case; reset_backend must succeed first",
            ));
        }

        let outcome = case(&mut *self).await;

        match self.reset_backend().await {
            Ok(()) => outcome,
            Err(e) => match outcome {
                Ok(_) => {
                    error!(error = %e, "Backend reset after case failed");
                    Err(e)
                }
                Err(case_error) => {
                    error!(
                        error = %e,
                        case_error = %case_error,
                        "Backend reset after failed case also failed"
                    );
                    Err(case_error)
                }
            },
        }
    }

    /// Stop every owned component in reverse registration order.
    ///
    /// Every component is attempted; the first failure is returned.
    pub async fn teardown(mut self) -> Result<()> {
        let components = mem::take(&mut self.components);
        let mut first_error = None;

        for mut component in components.into_iter().rev() {
            match component.stop().await {
                Ok(()) => info!(component = component.name(), "Component stopped"),
                Err(e) => {
                    error!(component = component.name(), error = %e, "Failed to stop component");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<B: Backend> Drop for TestEnvironment<B> {
    fn drop(&mut self) {
        if !self.components.is_empty() {
            warn!(
                components = self.components.len(),
                "Test environment dropped without teardown, components left running"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::FutureExt;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::backend::InMemoryBackend;

    fn policy() -> StabilityPolicy {
        StabilityPolicy::default()
            .with_deadline(Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(100))
    }

    fn export(service: &str, span: &str) -> serde_json::Value {
        json!({"resourceSpans": [{
            "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": service}}]},
            "scopeSpans": [{"spans": [{"name": span}]}]
        }]})
    }

    /// Backend whose first `failures` resets are refused
    #[derive(Default)]
    struct FlakyBackend {
        inner: InMemoryBackend,
        failures: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl FlakyBackend {
        fn failing(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                ..Self::default()
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn fetch(&self) -> Result<String> {
            self.inner.fetch().await
        }

        async fn reset(&self) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::reset("clear-requests returned 500"));
            }
            self.inner.reset().await
        }
    }

    struct Recording {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Component for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn stop(&mut self) -> Result<()> {
            self.log.lock().push(self.name.clone());
            if self.fail {
                return Err(Error::component(&self.name, "container already gone"));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_case_resets_after_case() {
        let backend = InMemoryBackend::new();
        let handle = backend.clone();
        let mut env = TestEnvironment::new(backend).with_policy(policy());

        let pusher = handle.clone();
        let services = env
            .run_case(move |env| {
                async move {
                    pusher.push(export("checkout", "GET /cart"));
                    pusher.push(export("billing", "charge"));
                    let graph = env.wait_for_traces().await?;
                    Ok(graph
                        .find_resource_attributes("service.name")
                        .map(ToString::to_string)
                        .collect::<Vec<_>>())
                }
                .boxed()
            })
            .await
            .unwrap();

        assert_eq!(services, vec!["checkout", "billing"]);
        assert!(handle.is_empty());
        assert!(!env.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_case_still_resets() {
        let backend = InMemoryBackend::new();
        let handle = backend.clone();
        let mut env = TestEnvironment::new(backend).with_policy(policy());

        let pusher = handle.clone();
        let result: Result<()> = env
            .run_case(move |_env| {
                async move {
                    pusher.push(export("checkout", "GET /cart"));
                    Err(Error::internal("expected 2 spans, found 1"))
                }
                .boxed()
            })
            .await;

        assert!(matches!(result, Err(Error::Internal(_))));
        assert!(handle.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_case_sees_only_its_own_exports() {
        let backend = InMemoryBackend::new();
        let handle = backend.clone();
        let mut env = TestEnvironment::new(backend).with_policy(policy());

        for span in ["first", "second"] {
            let pusher = handle.clone();
            let names = env
                .run_case(move |env| {
                    async move {
                        pusher.push(export("checkout", span));
                        let graph = env.wait_for_traces().await?;
                        Ok(graph
                            .spans()
                            .map(|s| s.name.clone())
                            .collect::<Vec<_>>())
                    }
                    .boxed()
                })
                .await
                .unwrap();

            assert_eq!(names, vec![span.to_string()]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_failure_after_passing_case_is_returned() {
        let mut env = TestEnvironment::new(FlakyBackend::failing(usize::MAX)).with_policy(policy());

        let err = env
            .run_case(|_env| async { Ok(()) }.boxed())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Reset(_)));
        assert!(env.is_dirty());
        assert_eq!(env.backend().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_case_error_wins_over_reset_failure() {
        let mut env = TestEnvironment::new(FlakyBackend::failing(1)).with_policy(policy());

        let err = env
            .run_case(|_env| async { Err::<(), _>(Error::internal("span missing")) }.boxed())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert!(env.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_environment_refuses_cases_until_explicit_reset() {
        let mut env = TestEnvironment::new(FlakyBackend::failing(1)).with_policy(policy());
        env.run_case(|_env| async { Ok(()) }.boxed())
            .await
            .unwrap_err();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let err = env
            .run_case(move |_env| {
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .await
            .unwrap_err();

        assert!(err.is_reset_failure());
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(env.backend().attempts(), 1);

        env.reset_backend().await.unwrap();
        assert!(!env.is_dirty());
        env.run_case(|_env| async { Ok(()) }.boxed())
            .await
            .unwrap();
        assert_eq!(env.backend().attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_content_on_empty_backend() {
        let mut env = TestEnvironment::new(InMemoryBackend::new()).with_policy(policy());

        let content = env.wait_for_content().await.unwrap();

        assert!(!content.stable);
        assert_eq!(content.content, "[]");
    }

    #[tokio::test]
    async fn test_teardown_stops_in_reverse_order_and_reports_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let component = |name: &str, fail: bool| Recording {
            name: name.to_string(),
            log: log.clone(),
            fail,
        };

        let env = TestEnvironment::new(InMemoryBackend::new())
            .with_component(component("backend", false))
            .with_component(component("collector", true))
            .with_component(component("target", true));

        let err = env.teardown().await.unwrap_err();

        assert_eq!(*log.lock(), vec!["target", "collector", "backend"]);
        assert!(matches!(err, Error::Component { ref name, .. } if name == "target"));
    }
}
