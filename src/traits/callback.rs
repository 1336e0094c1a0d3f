use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::RankId;
use crate::traits::TransportDriver;

/// What a callback gets to see when its queue position is reached.
#[derive(Clone)]
pub struct CallbackInvocation {
    rank: Option<RankId>,
    ranks: Vec<RankId>,
    driver: Arc<dyn TransportDriver>,
}

impl CallbackInvocation {
    pub(crate) fn new(rank: Option<RankId>, ranks: Vec<RankId>, driver: Arc<dyn TransportDriver>) -> Self {
        Self { rank, ranks, driver }
    }

    /// The rank this invocation runs for, or `None` for a single-call callback.
    pub fn rank(&self) -> Option<RankId> {
        self.rank
    }

    /// Every rank this invocation is bound to.
    pub fn ranks(&self) -> &[RankId] {
        &self.ranks
    }

    pub fn is_single_call(&self) -> bool {
        self.rank.is_none()
    }

    /// Direct access to the driver. The bound ranks' queues are parked on this
    /// callback (unless it is non-blocking), so calls made here do not race
    /// queued operations on those ranks.
    pub fn driver(&self) -> &Arc<dyn TransportDriver> {
        &self.driver
    }
}

impl std::fmt::Debug for CallbackInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackInvocation")
            .field("rank", &self.rank)
            .field("ranks", &self.ranks)
            .field("driver", &self.driver.name())
            .finish()
    }
}

/// Host-side function run at a queue position.
///
/// An `Err` is recorded like a failed transfer for the rank(s) the callback
/// runs on.
#[async_trait]
pub trait RankCallback: Send + Sync {
    async fn call(&self, invocation: CallbackInvocation) -> Result<(), String>;

    fn name(&self) -> &str {
        "callback"
    }
}

/// Adapts a plain closure into a [`RankCallback`].
///
/// The closure runs on tokio's blocking pool, so it may block the thread
/// (sleep, file I/O) without stalling other ranks.
pub struct FnCallback<F> {
    name: String,
    f: Arc<F>,
}

impl<F> FnCallback<F>
where
    F: Fn(CallbackInvocation) -> Result<(), String> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl<F> RankCallback for FnCallback<F>
where
    F: Fn(CallbackInvocation) -> Result<(), String> + Send + Sync + 'static,
{
    async fn call(&self, invocation: CallbackInvocation) -> Result<(), String> {
        let f = Arc::clone(&self.f);
        tokio::task::spawn_blocking(move || f(invocation))
            .await
            .map_err(|e| format!("callback panicked: {}", e))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Destination for the program output fetched after a launch.
pub trait LogSink: Send + Sync {
    fn write(&self, rank: RankId, log: &[u8]) -> Result<(), String>;
}
