//! Single-flight cache of the parsed registry
//!
//! Each generation moves through `Uninitialized → Building → Ready`. All callers
//! of one generation share a single build, whichever accessor they use. An index
//! update starts a new generation without rebuilding; the next access does.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::index::IndexProvider;
use crate::index::listeners::Subscription;
use crate::registry::MavenClassRegistry;
use crate::registry::error::BuildError;

pub type BuildResult = Result<Arc<MavenClassRegistry>, BuildError>;

type SharedBuild = Shared<BoxFuture<'static, BuildResult>>;

enum State {
    Uninitialized,
    Building(SharedBuild),
    Ready(Arc<MavenClassRegistry>),
}

struct Inner {
    generation: u64,
    state: State,
}

enum Access {
    Ready(Arc<MavenClassRegistry>),
    Pending(SharedBuild),
}

pub struct RegistryManager {
    provider: Arc<dyn IndexProvider>,
    runtime: Handle,
    inner: Arc<Mutex<Inner>>,
    _subscription: Subscription,
}

impl RegistryManager {
    /// Creates a manager building on `runtime`'s blocking pool. It listens for index
    /// updates until dropped.
    pub fn new(provider: Arc<dyn IndexProvider>, runtime: Handle) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            generation: 0,
            state: State::Uninitialized,
        }));

        let weak = Arc::downgrade(&inner);
        let subscription = provider.subscribe(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                invalidate(&inner);
            }
        }));

        Self {
            provider,
            runtime,
            inner,
            _subscription: subscription,
        }
    }

    /// Returns the registry, building it if needed. Concurrent callers share one build.
    pub async fn get_maven_class_registry(&self) -> BuildResult {
        match self.access() {
            Access::Ready(registry) => Ok(registry),
            Access::Pending(build) => build.await,
        }
    }

    /// Same as [`get_maven_class_registry`](Self::get_maven_class_registry) but blocks
    /// the calling thread. Must not be called from an async runtime worker.
    pub fn get_maven_class_registry_blocking(&self) -> BuildResult {
        match self.access() {
            Access::Ready(registry) => Ok(registry),
            Access::Pending(build) => futures::executor::block_on(build),
        }
    }

    /// Returns the registry if it is ready. Otherwise starts the build, if none is
    /// running, and returns `None` without waiting.
    pub fn try_get_maven_class_registry(&self) -> Option<Arc<MavenClassRegistry>> {
        match self.access() {
            Access::Ready(registry) => Some(registry),
            Access::Pending(build) => build.peek().and_then(|result| result.clone().ok()),
        }
    }

    fn access(&self) -> Access {
        let mut inner = lock(&self.inner);
        match &inner.state {
            State::Ready(registry) => return Access::Ready(Arc::clone(registry)),
            State::Building(build) => return Access::Pending(build.clone()),
            State::Uninitialized => {}
        }

        let build = self.start_build(inner.generation);
        inner.state = State::Building(build.clone());
        Access::Pending(build)
    }

    /// Spawns the parse on the blocking pool. Called with the state lock held, so the
    /// task cannot install its result before `Building` is recorded.
    fn start_build(&self, generation: u64) -> SharedBuild {
        debug!("Building Maven class registry (generation {})", generation);

        let provider = Arc::clone(&self.provider);
        let inner = Arc::downgrade(&self.inner);
        let cancelled = Weak::clone(&inner);
        let task = self.runtime.spawn_blocking(move || {
            let built = panic::catch_unwind(AssertUnwindSafe(|| {
                MavenClassRegistry::create_from(&*provider)
            }));
            let result = match built {
                Ok(built) => built
                    .map(Arc::new)
                    .map_err(|e| BuildError::Load(e.to_string())),
                Err(payload) => Err(BuildError::Aborted(panic_message(&*payload))),
            };
            install(&inner, generation, &result);
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                let result = Err(BuildError::Aborted(e.to_string()));
                install(&cancelled, generation, &result);
                result
            })
        }
        .boxed()
        .shared()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "registry build panicked".to_string())
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn invalidate(inner: &Mutex<Inner>) {
    let mut inner = lock(inner);
    inner.generation += 1;
    inner.state = State::Uninitialized;
    debug!(
        "Maven class registry invalidated (generation {})",
        inner.generation
    );
}

/// Publishes a finished build unless its generation was invalidated meanwhile.
fn install(inner: &Weak<Mutex<Inner>>, generation: u64, result: &BuildResult) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = lock(&inner);
    if inner.generation != generation {
        debug!(
            "Discarding registry of generation {}, now at {}",
            generation, inner.generation
        );
        return;
    }

    match result {
        Ok(registry) => {
            info!(
                "Maven class registry ready: {} class names, {} artifacts",
                registry.class_name_map().len(),
                registry.lookup().coordinates.len()
            );
            inner.state = State::Ready(Arc::clone(registry));
        }
        Err(e) => {
            error!("Failed to build Maven class registry: {}", e);
            inner.state = State::Uninitialized;
        }
    }
}
