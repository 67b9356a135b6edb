//! The one-shot request/response protocol engine
//!
//! Each logical call opens its own stream: one request frame in, one response
//! frame out, then the stream is released. Concurrency comes entirely from the
//! transport's stream layer; the protocol itself holds no per-call state.

use super::envelope::{self, RequestEnvelope};
use super::framing::{read_frame, write_frame};
use super::registry::{HandlerRegistry, InboundRequest};
use super::ProtocolError;
use crate::metrics::{FRAMES_REJECTED_TOTAL, REQUESTS_TOTAL};
use futures::{AsyncRead, AsyncWrite, AsyncWriteExt, StreamExt};
use libp2p::PeerId;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Serve exactly one exchange on an inbound stream.
///
/// A malformed request aborts only this stream, after a best-effort
/// `{error: "Bad Request", status: 400}` response so the caller fails fast
/// instead of timing out. Handler failures become structured 500 responses.
pub async fn serve_stream<S>(
    mut stream: S,
    remote_peer: Option<PeerId>,
    registry: &HandlerRegistry,
    deadline: Duration,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(deadline, serve_exchange(&mut stream, remote_peer, registry))
        .await
        .map_err(|_| ProtocolError::Deadline(deadline))?
}

async fn serve_exchange<S>(
    stream: &mut S,
    remote_peer: Option<PeerId>,
    registry: &HandlerRegistry,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let envelope = match read_request(stream).await {
        Ok(envelope) => envelope,
        Err(e) => {
            counter!(FRAMES_REJECTED_TOTAL, "reason" => "malformed").increment(1);
            counter!(REQUESTS_TOTAL, "outcome" => "bad_request").increment(1);
            let _ = write_response(stream, &envelope::bad_request()).await;
            let _ = stream.close().await;
            return Err(e);
        }
    };

    info!(path = %envelope.path, "Received request");

    let response = match registry.get(&envelope.path) {
        Some(handler) => {
            let request = InboundRequest {
                body: envelope.body,
                remote_peer,
            };
            match handler(request).await {
                Ok(value) => {
                    counter!(REQUESTS_TOTAL, "outcome" => "ok").increment(1);
                    value
                }
                Err(e) => {
                    counter!(REQUESTS_TOTAL, "outcome" => "handler_error").increment(1);
                    debug!(path = %envelope.path, "Handler failed: {}", e);
                    envelope::handler_failure(&e.to_string())
                }
            }
        }
        None => {
            counter!(REQUESTS_TOTAL, "outcome" => "not_found").increment(1);
            envelope::not_found()
        }
    };

    write_response(stream, &response).await?;
    stream.close().await?;
    Ok(())
}

/// Run one exchange as the client: write the request frame, read the response.
pub async fn call<S>(mut stream: S, path: &str, body: Value) -> Result<Value, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = serde_json::to_vec(&RequestEnvelope::new(path, body))?;
    write_frame(&mut stream, &request).await?;

    let frame = read_frame(&mut stream).await?;
    let response = serde_json::from_slice(&frame)?;
    let _ = stream.close().await;
    Ok(response)
}

/// Accept inbound protocol streams and serve each in its own task.
pub fn spawn_server(
    mut incoming: libp2p_stream::IncomingStreams,
    registry: Arc<HandlerRegistry>,
    request_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((peer, stream)) = incoming.next().await {
            let registry = registry.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_stream(stream, Some(peer), &registry, request_timeout).await {
                    debug!(%peer, "Inbound exchange aborted: {}", e);
                }
            });
        }
    })
}

async fn read_request<S>(stream: &mut S) -> Result<RequestEnvelope, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let frame = read_frame(stream).await?;
    Ok(serde_json::from_slice(&frame)?)
}

async fn write_response<S>(stream: &mut S, response: &Value) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(response)?;
    write_frame(stream, &payload).await
}
