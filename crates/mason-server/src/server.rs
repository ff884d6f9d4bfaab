use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};

use mason_remote_proto::{
    checked_frame_len, decode_payload, encode_frame, ProtoError, Request, RequestEnvelope,
    Response, RpcResult, ServerMessage,
};
use mason_scheduler::ProgressEvent;

use crate::ResolutionService;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),
}

/// Serve the framed protocol over one connection until the client hangs up
/// or sends `shutdown`.
///
/// Requests are dispatched concurrently — there is no ordering guarantee
/// between in-flight calls — while all outbound traffic (responses,
/// streamed chunks, progress) is serialized through one writer task.
pub async fn serve<S>(service: Arc<ResolutionService>, stream: S) -> Result<(), ServeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let frame = match encode_frame(&message) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!(
                        target: "mason.server",
                        error = %err,
                        "dropping unencodable outbound message"
                    );
                    continue;
                }
            };
            if writer.write_all(&frame).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let mut progress_rx = service.scheduler().subscribe_progress();
    let progress_tx = tx.clone();
    let progress_task = tokio::spawn(async move {
        loop {
            match progress_rx.recv().await {
                Ok(event) => {
                    let _ = progress_tx.send(progress_message(event));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let result = read_loop(&service, &mut reader, &tx).await;

    drop(tx);
    progress_task.abort();
    let _ = writer_task.await;
    result
}

async fn read_loop<R>(
    service: &Arc<ResolutionService>,
    reader: &mut R,
    tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), ServeError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut prefix = [0u8; 4];
        match reader.read_exact(&mut prefix).await {
            Ok(_) => {}
            // Client hung up between frames: a clean shutdown.
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        let len = checked_frame_len(prefix)?;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;
        let RequestEnvelope { id, request } = decode_payload(&payload)?;

        match request {
            // Cancellation must never queue behind the job it targets.
            Request::CancelRequest { id: target } => {
                service.cancel(target);
                let _ = tx.send(ServerMessage::Response {
                    id,
                    result: RpcResult::Ok {
                        response: Response::Ok,
                    },
                });
            }
            Request::Shutdown => {
                let _ = tx.send(ServerMessage::Response {
                    id,
                    result: RpcResult::Ok {
                        response: Response::Ok,
                    },
                });
                return Ok(());
            }
            request => {
                let service = Arc::clone(service);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = service.handle(id, request, tx.clone()).await;
                    let _ = tx.send(ServerMessage::Response { id, result });
                });
            }
        }
    }
}

fn progress_message(event: ProgressEvent) -> ServerMessage {
    match event {
        ProgressEvent::Begin { title, .. } => ServerMessage::Progress {
            title: Some(title),
            message: None,
            fraction: None,
        },
        ProgressEvent::Report {
            message, fraction, ..
        } => ServerMessage::Progress {
            title: None,
            message,
            fraction,
        },
        ProgressEvent::End { .. } => ServerMessage::Progress {
            title: None,
            message: None,
            fraction: Some(1.0),
        },
    }
}
