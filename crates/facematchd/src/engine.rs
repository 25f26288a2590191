use axum::body::Bytes;
use facematch_core::{compare_images, CompareError, FaceAnalyzer};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

const ENGINE_QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Compare(#[from] CompareError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("face analysis panicked: {0}")]
    Panicked(String),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Compare {
        cnic: Bytes,
        profile: Bytes,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Compare the first face on `cnic` with the first face on `profile`.
    pub async fn compare(&self, cnic: Bytes, profile: Bytes) -> Result<bool, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Compare {
                cnic,
                profile,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Move `analyzer` onto a dedicated OS thread and serve comparisons from it.
///
/// Inference needs exclusive access to the ONNX sessions, so requests are
/// processed one at a time in arrival order. A panic inside the analyzer fails
/// only the request that caused it. The thread exits once every [`EngineHandle`]
/// has been dropped.
pub fn spawn_engine<A>(mut analyzer: A) -> Result<EngineHandle, EngineError>
where
    A: FaceAnalyzer + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(ENGINE_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Compare { cnic, profile, reply } => {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            compare_images(&mut analyzer, &cnic, &profile)
                        }));
                        let result = match result {
                            Ok(outcome) => outcome.map_err(EngineError::from),
                            Err(payload) => {
                                let message = panic_message(payload.as_ref());
                                tracing::error!(panic = %message, "face analysis panicked");
                                Err(EngineError::Panicked(message))
                            }
                        };
                        // receiver gone means the HTTP request was dropped
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
