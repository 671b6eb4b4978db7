//! Background thread that periodically sweeps idle objects.

use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::factory::PooledObjectFactory;
use crate::pool::PoolInner;

pub(crate) struct Evictor {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Evictor {
    /// Starts the sweep loop. The thread only holds a weak reference, so it
    /// exits on its own once the pool is gone.
    pub(crate) fn spawn<F: PooledObjectFactory>(
        pool: Weak<PoolInner<F>>,
        every: Duration,
    ) -> io::Result<Self> {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("object-pool-evictor".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(every) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                let evicted = pool.evict();
                if evicted > 0 {
                    tracing::debug!(evicted, "evictor destroyed idle objects");
                }
            })?;
        Ok(Self { stop, handle })
    }

    pub(crate) fn stop(self) {
        let _ = self.stop.try_send(());
        if self.handle.join().is_err() {
            tracing::warn!("evictor thread panicked");
        }
    }
}
