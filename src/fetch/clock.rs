// src/fetch/clock.rs
// =============================================================================
// Injectable sleep capability.
//
// The fetch engine sleeps a lot: courtesy delays before every request,
// ten-minute cooldowns after secondary rate limits, waits until a quota
// window resets. Hiding the actual sleeping behind a trait lets tests
// simulate hours of backoff in microseconds while recording exactly what
// the engine asked for.
//
// Rust concepts:
// - Trait objects for dependency injection (no mocking framework needed)
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;

/// Something that can wait. Production uses the tokio timer; tests use a
/// recorder that returns immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// The real thing: tokio's async timer. Yields to other tasks while
/// waiting, and stays interruptible because the engine races every sleep
/// against its cancellation token.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
