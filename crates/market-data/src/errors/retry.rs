/// Classification for retry policy.
///
/// Used by [`ProviderAdapter`](crate::provider::ProviderAdapter) to decide which
/// failures go back through the retry handler and which are settled on the spot.
///
/// # Behavior Summary
///
/// | Class | Retried in place? | After exhaustion |
/// |-------|-------------------|------------------|
/// | `WithBackoff` | Yes | Abandon the tier if rate limited, else next variant |
/// | `NextVariant` | No | Next query variant of the same provider |
/// | `NextProvider` | No | Tier returns EMPTY |
/// | `Never` | No | Surface to the caller (cancellation, bad config) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient: rate limiting (429), timeouts, connection resets.
    WithBackoff,

    /// The upstream answered, but this variant has nothing usable
    /// (no rows, unexpected shape). Another suffix may still work.
    NextVariant,

    /// The provider cannot serve this request at all.
    NextProvider,

    /// Terminal for the whole fetch.
    Never,
}
