//! Stream throttling for high-rate queues

use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`, latest wins.
    fn throttle(self, period: Duration) -> ThrottleBy<Self, (), fn(&Self::Item)>
    where
        Self: Sized,
    {
        fn unit<T>(_: &T) {}
        let key: fn(&Self::Item) = unit::<Self::Item>;
        ThrottleBy::new(self, period, key)
    }

    /// Emit at most one item per key per `period`, latest wins per key.
    ///
    /// Suited to telemetry and location queues keyed by car number: every
    /// car still appears once per window, in order of first arrival.
    fn throttle_by<K, F>(self, period: Duration, key: F) -> ThrottleBy<Self, K, F>
    where
        Self: Sized,
        K: PartialEq,
        F: FnMut(&Self::Item) -> K,
    {
        ThrottleBy::new(self, period, key)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Keyed latest-wins throttle. Created by [`ThrottleExt`].
    pub struct ThrottleBy<S: Stream, K, F> {
        #[pin]
        stream: S,
        interval: Interval,
        key: F,
        window: Vec<(K, S::Item)>,
        ready: VecDeque<S::Item>,
        done: bool,
    }
}

impl<S, K, F> ThrottleBy<S, K, F>
where
    S: Stream,
    K: PartialEq,
    F: FnMut(&S::Item) -> K,
{
    pub fn new(stream: S, period: Duration, key: F) -> Self {
        let mut interval = interval(period);
        // Don't burst after a slow consumer
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, key, window: Vec::new(), ready: VecDeque::new(), done: false }
    }
}

impl<S, K, F> Stream for ThrottleBy<S, K, F>
where
    S: Stream,
    K: PartialEq,
    F: FnMut(&S::Item) -> K,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if let Some(item) = this.ready.pop_front() {
            return Poll::Ready(Some(item));
        }
        if *this.done {
            return Poll::Ready(None);
        }

        // Drain whatever is available into the current window
        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    let key = (this.key)(&item);
                    match this.window.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = item,
                        None => this.window.push((key, item)),
                    }
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    break;
                }
                Poll::Pending => break,
            }
        }

        if !*this.done && (this.window.is_empty() || this.interval.poll_tick(cx).is_pending()) {
            return Poll::Pending;
        }

        this.ready.extend(this.window.drain(..).map(|(_, item)| item));
        Poll::Ready(this.ready.pop_front())
    }
}
