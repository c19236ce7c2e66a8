use tokio::sync::watch;

/// Owner of a flow (the modal, in UI terms). Closing it, or dropping it,
/// flips every `CloseSignal` handed out from it.
#[derive(Debug)]
pub struct FlowScope {
    tx: watch::Sender<bool>,
}

impl Default for FlowScope {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CloseSignal {
        CloseSignal {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Drop for FlowScope {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Closed flag checked by async continuations before they touch state.
#[derive(Debug, Clone, Default)]
pub struct CloseSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CloseSignal {
    /// A signal with no owner; it never closes.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the owning scope is closed or dropped.
    pub async fn closed(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
