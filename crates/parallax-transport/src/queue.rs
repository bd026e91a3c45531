//! Ingress queue
//!
//! Single-producer (network task) / single-consumer (simulation thread)
//! FIFO. Pushing never blocks the network task; popping blocks until an
//! item arrives or the queue closes. `len`/`is_empty` are advisory only:
//! they may be stale the instant they return and must not drive control
//! flow.

use tokio::sync::mpsc;

use parallax_core::{ParallaxError, ParallaxResult};

/// Producer half, held by the network task
#[derive(Clone, Debug)]
pub struct IngressSender<T> {
    tx: mpsc::UnboundedSender<T>,
}

/// Consumer half, held by the simulation thread
#[derive(Debug)]
pub struct IngressReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

/// Create a connected queue pair
pub fn ingress_channel<T>() -> (IngressSender<T>, IngressReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IngressSender { tx }, IngressReceiver { rx })
}

impl<T> IngressSender<T> {
    /// Push an item; never blocks. Returns false if the consumer is gone,
    /// which is the signal for the network task to stop.
    pub fn push(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    /// Has the consumer side been dropped or closed?
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> IngressReceiver<T> {
    /// Block until an item is available or every producer is gone.
    /// For the simulation thread only: calling this from inside an async
    /// task would stall the runtime.
    pub fn pop(&mut self) -> ParallaxResult<T> {
        self.rx.blocking_recv().ok_or(ParallaxError::QueueClosed)
    }

    /// Async flavor of [`IngressReceiver::pop`]
    pub async fn pop_async(&mut self) -> ParallaxResult<T> {
        self.rx.recv().await.ok_or(ParallaxError::QueueClosed)
    }

    /// Non-blocking pop for the per-frame drain. `Ok(None)` means empty
    /// right now; `QueueClosed` means no item will ever arrive again.
    pub fn try_pop(&mut self) -> ParallaxResult<Option<T>> {
        match self.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ParallaxError::QueueClosed),
        }
    }

    /// Advisory: items queued at this instant. Diagnostics only.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Advisory, like [`IngressReceiver::len`]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Stop accepting new items; already queued items can still be popped
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_single_producer() {
        let (tx, mut rx) = ingress_channel();

        let producer = std::thread::spawn(move || {
            for i in 0..1000u32 {
                assert!(tx.push(i));
            }
        });

        for expected in 0..1000u32 {
            assert_eq!(rx.pop().unwrap(), expected);
        }
        producer.join().unwrap();
    }

    #[test]
    fn test_pop_unblocks_on_close() {
        let (tx, mut rx) = ingress_channel::<u32>();
        let consumer = std::thread::spawn(move || rx.pop());

        drop(tx);
        let result = consumer.join().unwrap();
        assert!(matches!(result, Err(ParallaxError::QueueClosed)));
    }

    #[test]
    fn test_try_pop_empty_vs_closed() {
        let (tx, mut rx) = ingress_channel::<u32>();
        assert!(matches!(rx.try_pop(), Ok(None)));

        tx.push(5);
        assert!(matches!(rx.try_pop(), Ok(Some(5))));

        drop(tx);
        assert!(matches!(rx.try_pop(), Err(ParallaxError::QueueClosed)));
    }

    #[test]
    fn test_close_drains_queued_items() {
        let (tx, mut rx) = ingress_channel::<u32>();
        tx.push(1);
        tx.push(2);
        rx.close();

        assert!(!tx.push(3));
        assert!(matches!(rx.try_pop(), Ok(Some(1))));
        assert!(matches!(rx.try_pop(), Ok(Some(2))));
        assert!(matches!(rx.try_pop(), Err(ParallaxError::QueueClosed)));
    }

    #[test]
    fn test_len_is_advisory() {
        let (tx, rx) = ingress_channel::<u32>();
        assert!(rx.is_empty());
        tx.push(1);
        tx.push(2);
        assert_eq!(rx.len(), 2);
    }
}
