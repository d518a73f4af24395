//! The stream route: `GET|HEAD /{container_id}/{name}?id=..&hash=..`.
//!
//! Resolves the object through the least-loaded upstream client, checks the
//! capability hash, plans the requested byte window, and answers with a body
//! produced chunk by chunk as the peer reads it.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, Extensions, HeaderMap, Method};
use axum::response::Response;
use futures::stream::{self, StreamExt, TryStreamExt};
use mr_core::range::parse_range_header;
use mr_core::{Error, ObjectRef, RangeWindow, Result};
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::response;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub id: Option<String>,
    pub hash: Option<String>,
}

/// GET|HEAD /{container_id}/{name}
pub async fn stream_object(
    State(ctx): State<AppContext>,
    Path((container_id, _name)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    method: Method,
    headers: HeaderMap,
    extensions: Extensions,
) -> std::result::Result<Response, AppError> {
    let remote = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    serve(&ctx, &container_id, &query, &method, &headers, &remote)
        .await
        .map_err(|e| {
            let err = AppError::new(e);
            match extensions.get::<RequestId>() {
                Some(id) => err.with_request_id(id.0.clone()),
                None => err,
            }
        })
}

fn parse_object(container_id: &str, query: &StreamQuery) -> Result<ObjectRef> {
    let container: i64 = container_id
        .parse()
        .map_err(|_| Error::Validation(format!("invalid container id: {container_id:?}")))?;
    let id = query
        .id
        .as_deref()
        .ok_or_else(|| Error::Validation("missing id query parameter".into()))?;
    let object: i64 = id
        .parse()
        .map_err(|_| Error::Validation(format!("invalid object id: {id:?}")))?;
    Ok(ObjectRef::new(container, object))
}

async fn serve(
    ctx: &AppContext,
    container_id: &str,
    query: &StreamQuery,
    method: &Method,
    headers: &HeaderMap,
    remote: &str,
) -> Result<Response> {
    let object = parse_object(container_id, query)?;

    let checkout = ctx.streams.checkout().await?;
    if ctx.streams.pool().len() > 1 {
        tracing::info!("Client {} is now serving {}", checkout.client_id, remote);
    }

    let metadata = match checkout.adapter.object_metadata(object).await {
        Ok(metadata) => metadata,
        Err(Error::ObjectNotFound(object)) => {
            forget_object(ctx, object, query.hash.as_deref()).await;
            return Err(Error::ObjectNotFound(object));
        }
        Err(e) => return Err(e),
    };

    response::verify_token(&metadata, object, query.hash.as_deref(), ctx.token_length())?;

    let total_size = metadata.size_bytes;
    let chunk_size = ctx.streams.chunk_size();
    let range_header = headers.get(header::RANGE);
    let partial = range_header.is_some();

    let window = match range_header {
        Some(value) => {
            let range = value
                .to_str()
                .ok()
                .and_then(parse_range_header)
                .ok_or(Error::RangeNotSatisfiable { total_size })?;
            Some(range.plan(total_size, chunk_size)?)
        }
        None if total_size == 0 => None,
        None => Some(RangeWindow::whole(total_size, chunk_size)?),
    };

    tracing::debug!(
        object = %object,
        client = %checkout.client_id,
        from = window.map(|w| w.from_bytes),
        until = window.map(|w| w.until_bytes),
        chunks = window.map(|w| w.chunk_count),
        "Planned stream"
    );

    let body = match window {
        Some(window) if *method != Method::HEAD => {
            let mut producer = checkout.into_producer(object, window);
            // Pull the first chunk before committing to a status line, so an
            // object that vanished behind cached metadata still answers 404.
            let first = match producer.next_chunk().await {
                Some(Ok(first)) => first,
                Some(Err(Error::ObjectNotFound(object))) => {
                    forget_object(ctx, object, query.hash.as_deref()).await;
                    return Err(Error::ObjectNotFound(object));
                }
                Some(Err(e)) => return Err(e),
                None => return Err(Error::Internal(format!("no chunks planned for {object}"))),
            };
            let stream = stream::iter([Ok(first)])
                .chain(producer.into_stream())
                .inspect_err(move |e| {
                    if e.is_disconnect() {
                        tracing::debug!(object = %object, error = %e, "Upstream went away mid-stream");
                    } else {
                        tracing::error!(object = %object, error = %e, "Stream aborted mid-body");
                    }
                });
            Body::from_stream(stream)
        }
        // Nothing to fetch: the workload is released with the checkout.
        _ => Body::empty(),
    };

    response::assemble(&metadata, window.as_ref(), partial, body)
}

/// Best-effort removal of a catalog record the upstream no longer backs.
///
/// Without a non-empty token there is nothing to match the record against,
/// so it is left alone.
async fn forget_object(ctx: &AppContext, object: ObjectRef, token: Option<&str>) {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        tracing::debug!(object = %object, "No token given; keeping catalog record");
        return;
    };
    match ctx.catalog.delete_object(object, Some(token)).await {
        Ok(true) => tracing::info!(object = %object, "Removed stale catalog record"),
        Ok(false) => {}
        Err(e) => tracing::warn!(object = %object, error = %e, "Failed to remove stale catalog record"),
    }
}
