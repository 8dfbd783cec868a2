use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Amount of output the consumer of a read is willing to accept.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Demand {
    /// Nothing for now.
    None,
    /// This many more bytes.
    Limited(usize),
    /// Everything.
    Unlimited,
}

const UNLIMITED: usize = usize::MAX;

/// Credit counter shared between a consumer and the engine feeding it.
///
/// `usize::MAX` stands for unlimited credit.
#[derive(Debug)]
pub(crate) struct Credit {
    remaining: AtomicUsize,
    notify: Notify,
}

impl Credit {
    pub(crate) fn new(demand: Demand) -> Self {
        let credit = Self {
            remaining: AtomicUsize::new(0),
            notify: Notify::new(),
        };
        credit.grant(demand);
        credit
    }

    /// Add `demand` to the credit and wake up the engine.
    pub(crate) fn grant(&self, demand: Demand) {
        match demand {
            Demand::None => return,
            Demand::Limited(n) => {
                let _ = self
                    .remaining
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                        if remaining == UNLIMITED {
                            None
                        } else {
                            Some(remaining.saturating_add(n).min(UNLIMITED - 1))
                        }
                    });
            }
            Demand::Unlimited => self.remaining.store(UNLIMITED, Ordering::Release),
        }

        self.notify.notify_one();
    }

    /// Take at most `wanted` bytes of credit, return how much was taken.
    pub(crate) fn take(&self, wanted: usize) -> usize {
        let mut taken = 0;

        let _ = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                if remaining == UNLIMITED {
                    taken = wanted;
                    None
                } else {
                    taken = remaining.min(wanted);
                    (taken != 0).then(|| remaining - taken)
                }
            });

        taken
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Wait until credit might have been granted.
    ///
    /// Spurious wake-ups are possible, check [`Credit::is_exhausted`] again.
    pub(crate) async fn granted(&self) {
        self.notify.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_is_decremented_precisely() {
        let credit = Credit::new(Demand::Limited(10));

        assert_eq!(credit.take(4), 4);
        assert_eq!(credit.take(100), 6);
        assert!(credit.is_exhausted());
        assert_eq!(credit.take(1), 0);

        credit.grant(Demand::Limited(3));
        credit.grant(Demand::Limited(2));
        assert_eq!(credit.take(100), 5);
    }

    #[test]
    fn unlimited_never_runs_out() {
        let credit = Credit::new(Demand::None);
        assert!(credit.is_exhausted());

        credit.grant(Demand::Unlimited);
        assert_eq!(credit.take(usize::MAX - 1), usize::MAX - 1);
        assert_eq!(credit.take(7), 7);

        // Limited demand on top of unlimited changes nothing.
        credit.grant(Demand::Limited(1));
        assert!(!credit.is_exhausted());
    }

    #[tokio::test]
    async fn grant_wakes_up_waiter() {
        let credit = std::sync::Arc::new(Credit::new(Demand::None));

        let waiter = {
            let credit = credit.clone();
            tokio::spawn(async move {
                while credit.is_exhausted() {
                    credit.granted().await;
                }
                credit.take(usize::MAX)
            })
        };

        tokio::task::yield_now().await;
        credit.grant(Demand::Limited(5));

        assert_eq!(waiter.await.unwrap(), 5);
    }
}
