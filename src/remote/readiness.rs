use futures_channel::oneshot;
use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Default)]
struct ReadinessState {
    ready: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

/// Whether a control connection to the remote currently exists.
///
/// Waiting is unbounded: without a connection there is nothing useful to do.
#[derive(Debug, Default)]
pub struct Readiness {
    state: Mutex<ReadinessState>,
}

impl Readiness {
    pub fn set(&self, ready: bool) {
        let mut state = self.state.lock();
        if state.ready == ready {
            return;
        }
        state.ready = ready;
        if ready {
            info!("Remote connection established");
            for waiter in state.waiters.drain(..) {
                let _ = waiter.send(());
            }
        } else {
            info!("Remote connection lost");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub async fn wait(&self) {
        loop {
            let receiver = {
                let mut state = self.state.lock();
                if state.ready {
                    return;
                }
                let (sender, receiver) = oneshot::channel();
                state.waiters.push(sender);
                receiver
            };
            let _ = receiver.await;
        }
    }
}
