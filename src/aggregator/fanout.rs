use std::future::Future;

use smol::{channel, LocalExecutor};

use crate::party::PartyMap;

/// Runs one future per party concurrently, and collects their results by position.
///
/// The futures may borrow from the caller, since they never outlive the executor,
/// which is owned by this struct and dropped when collection finishes.
/// Dropping it early, e.g. after the first failure, cancels whatever is still running.
pub(crate) struct FanOut<'a, O> {
    executor: LocalExecutor<'a>,
    sender: channel::Sender<(usize, O)>,
    receiver: channel::Receiver<(usize, O)>,
    size: usize,
}

impl<'a, O: 'a> FanOut<'a, O> {
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            executor: LocalExecutor::new(),
            sender,
            receiver,
            size,
        }
    }

    /// Start the work for the party at a given position.
    pub fn spawn(&self, position: usize, fut: impl Future<Output = O> + 'a) {
        debug_assert!(position < self.size);
        let sender = self.sender.clone();
        self.executor
            .spawn(async move {
                let out = fut.await;
                // Only fails if the collector already gave up on this round.
                let _ = sender.send((position, out)).await;
            })
            .detach();
    }

    /// Wait for every party, handing each result to `settle` as soon as it arrives.
    ///
    /// The output is in position order, regardless of completion order.
    pub async fn join_all<R>(self, mut settle: impl FnMut(usize, O) -> R) -> Vec<R> {
        let Self {
            executor,
            sender,
            receiver,
            size,
        } = self;
        // Otherwise the channel would never close.
        drop(sender);

        executor
            .run(async move {
                let mut out = PartyMap::new(size);
                while let Ok((position, res)) = receiver.recv().await {
                    out.put(position, settle(position, res));
                }
                out.into_vec()
            })
            .await
    }

    /// Like [FanOut::join_all], but stop at the first result `settle` rejects.
    pub async fn try_join_all<R, E>(
        self,
        mut settle: impl FnMut(usize, O) -> Result<R, E>,
    ) -> Result<Vec<R>, E> {
        let Self {
            executor,
            sender,
            receiver,
            size,
        } = self;
        drop(sender);

        executor
            .run(async move {
                let mut out = PartyMap::new(size);
                while let Ok((position, res)) = receiver.recv().await {
                    out.put(position, settle(position, res)?);
                }
                Ok(out.into_vec())
            })
            .await
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, time::Duration};

    use smol::Timer;

    use super::*;

    #[test]
    fn test_join_all_orders_by_position() {
        let delays = [30u64, 0, 15];
        let order = smol::block_on(async {
            let fanout = FanOut::new(delays.len());
            for (position, &ms) in delays.iter().enumerate() {
                fanout.spawn(position, async move {
                    Timer::after(Duration::from_millis(ms)).await;
                    ms
                });
            }
            let mut arrivals = Vec::new();
            let out = fanout
                .join_all(|position, ms| {
                    arrivals.push(position);
                    ms
                })
                .await;
            (out, arrivals)
        });
        assert_eq!(order.0, vec![30, 0, 15]);
        assert_eq!(order.1, vec![1, 2, 0]);
    }

    #[test]
    fn test_join_all_empty() {
        let out: Vec<u8> = smol::block_on(FanOut::<u8>::new(0).join_all(|_, x| x));
        assert!(out.is_empty());
    }

    #[test]
    fn test_try_join_all_stops_at_first_failure() {
        let finished = Cell::new(0);
        let res: Result<Vec<u32>, usize> = smol::block_on(async {
            let fanout = FanOut::new(3);
            fanout.spawn(0, async {
                Timer::after(Duration::from_secs(5)).await;
                finished.set(finished.get() + 1);
                Ok(0)
            });
            fanout.spawn(1, async { Err(1) });
            fanout.spawn(2, async {
                finished.set(finished.get() + 1);
                Ok(2)
            });
            fanout.try_join_all(|_, res| res).await
        });
        assert_eq!(res, Err(1));
        // The slow party was cancelled rather than waited on.
        assert!(finished.get() <= 1);
    }
}
