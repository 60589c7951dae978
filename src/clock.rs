/*!
    time source for the waits of the driver

    all waits are polls separated by fixed sleeps, and only the boot waits are bounded by a timeout. Both go through [Clock] so tests can run on simulated time.
*/

use core::time::Duration;
use embedded_hal_async::delay::DelayNs;


/// monotonic clock able to sleep
#[allow(async_fn_in_trait)]
pub trait Clock: DelayNs {
    /// time elapsed since an arbitrary fixed origin
    fn now(&mut self) -> Duration;

    /// sleep for the given duration
    async fn sleep(&mut self, duration: Duration) {
        let mut nanos = duration.as_nanos();
        while nanos > 0 {
            let step = u32::try_from(nanos).unwrap_or(u32::MAX);
            self.delay_ns(step).await;
            nanos -= u128::from(step);
        }
    }
}


/// wall clock using tokio timers
#[cfg(feature = "std")]
pub struct StdClock {
    origin: std::time::Instant,
}
#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {origin: std::time::Instant::now()}
    }
}
#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {Self::new()}
}
#[cfg(feature = "std")]
impl DelayNs for StdClock {
    async fn delay_ns(&mut self, ns: u32) {
        tokio::time::sleep(Duration::from_nanos(ns.into())).await
    }
}
#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}
