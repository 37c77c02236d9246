use std::time::Duration;

use tokio::time::Instant;

/// A token bucket that refills lazily
///
/// Tokens are restored one per `restoration` period, up to `burst`, and only
/// counted when the bucket is next touched.
#[derive(Debug, Clone)]
pub struct Limiter {
    burst: u32,
    restoration: Duration,
    tokens: u32,
    last_activation: Instant,
}

impl Limiter {
    /// Construct a full bucket
    #[must_use]
    pub fn new(burst: u32, restoration: Duration) -> Self {
        Self {
            burst,
            restoration,
            tokens: burst,
            last_activation: Instant::now(),
        }
    }

    /// The maximum number of tokens
    #[inline]
    #[must_use]
    pub fn burst(&self) -> u32 { self.burst }

    /// The time taken to restore a single token
    #[inline]
    #[must_use]
    pub fn restoration(&self) -> Duration { self.restoration }

    fn virtual_tokens(&self, elapsed: Duration) -> u32 {
        let periods = elapsed.as_nanos() / self.restoration.as_nanos().max(1);
        let periods = u32::try_from(periods).unwrap_or(u32::MAX);
        self.tokens.saturating_add(periods).min(self.burst)
    }

    /// The number of tokens currently available
    #[must_use]
    pub fn available(&self) -> u32 {
        self.virtual_tokens(Instant::now().saturating_duration_since(self.last_activation))
    }

    /// Take a token
    ///
    /// # Errors
    /// If the bucket is empty, returns the time until the next token is
    /// restored.
    pub fn take(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_activation);
        let tokens = self.virtual_tokens(elapsed);

        if tokens == 0 {
            return Err(self.restoration.saturating_sub(elapsed));
        }

        self.tokens = tokens - 1;
        self.last_activation = now;
        Ok(())
    }

    /// Give back a single token
    pub fn restore(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_activation);
        self.tokens = self.virtual_tokens(elapsed).saturating_add(1).min(self.burst);
        self.last_activation = now;
    }

    /// Whether the bucket has been untouched long enough to have refilled
    /// completely
    #[must_use]
    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activation) >= self.restoration.saturating_mul(self.burst)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Limiter;

    const PERIOD: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn burst_then_wait() {
        let mut lim = Limiter::new(2, PERIOD);

        assert_eq!(lim.take(), Ok(()));
        assert_eq!(lim.take(), Ok(()));
        assert_eq!(lim.take(), Err(PERIOD));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(lim.take(), Err(Duration::from_secs(20)));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(lim.take(), Ok(()));
        assert!(lim.take().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped() {
        let mut lim = Limiter::new(2, PERIOD);
        lim.take().unwrap();

        tokio::time::advance(PERIOD * 10).await;
        assert_eq!(lim.available(), 2);
        assert!(lim.is_idle(tokio::time::Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_refunds_one() {
        let mut lim = Limiter::new(2, PERIOD);
        lim.take().unwrap();
        lim.take().unwrap();

        lim.restore();
        assert_eq!(lim.available(), 1);
        lim.restore();
        lim.restore();
        assert_eq!(lim.available(), 2);
        assert!(!lim.is_idle(tokio::time::Instant::now()));
    }
}
