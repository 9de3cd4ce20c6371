//! Per-request execution pipeline.
//!
//! Shared by the reactor and [`SynchronousExecutor`](crate::processor::SynchronousExecutor):
//! materialize the body, run the exchange with retries and redirects under
//! the overall timeout, read the bounded body, apply the error-response
//! policy, offload oversized results, and deliver to the task handler.

use crate::config::ProcessorConfig;
use crate::errors::{HttpErrorClass, RequestErrorKind, TaskError, TaskErrorKind};
use crate::processor::observer::ProcessorObserver;
use crate::storage::ExternalStorage;
use crate::transport::client::Origin;
use crate::transport::pool::ClientPool;
use crate::transport::reader::{read_limited, ReadError};
use crate::transport::redirect::{converts_to_get, sanitize_cross_origin, RedirectChain};
use crate::types::{HttpHeaders, Payload, RequestTask, Response, TaskId, TaskOutcome};
use bytes::Bytes;
use http::Method;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Shared execution state owned by one scheduling domain.
///
/// The pool lives in a `RefCell` because every caller runs on the same
/// thread; borrows are scoped so they never span an await point.
pub(crate) struct ExecutionEnv {
    pub config: ProcessorConfig,
    pub storage: ExternalStorage,
    pub pool: RefCell<ClientPool>,
}

impl ExecutionEnv {
    pub fn new(config: ProcessorConfig, storage: ExternalStorage) -> Self {
        let pool = RefCell::new(ClientPool::new(&config));
        Self { config, storage, pool }
    }
}

/// Execute one task end to end and deliver its outcome.
///
/// `delivered` is flipped the instant the handler callback returns; the
/// shutdown path uses it to decide whether a surrendered task still needs
/// `retry`.
pub(crate) async fn run_task(
    env: &ExecutionEnv,
    observer: &dyn ProcessorObserver,
    id: TaskId,
    task: &RequestTask,
    delivered: &AtomicBool,
) -> TaskOutcome {
    observer.request_started(id, &task.request);

    let outcome = match execute(env, task).await {
        Ok(response) => TaskOutcome::Completed(response),
        Err(error) => TaskOutcome::Failed(error),
    };

    // An offloaded request body has served its purpose once the bytes
    // reached the wire; keep it only when dispatch itself failed, so an
    // external retry can still resolve it.
    if let Some(payload @ Payload::Stored { .. }) = task.request.body() {
        if was_dispatched(&outcome) {
            env.storage.discard(payload).await;
        }
    }

    let delivery = match &outcome {
        TaskOutcome::Completed(response) => {
            task.handler.on_complete(response.clone(), &task.callback).await
        }
        TaskOutcome::Failed(task_error) => {
            task.handler.on_error(task_error.clone(), &task.callback).await
        }
    };
    delivered.store(true, Ordering::Release);

    match delivery {
        Ok(()) => {
            if env.config.delete_response_payloads {
                if let TaskOutcome::Completed(response) = &outcome {
                    if let Some(payload @ Payload::Stored { .. }) = &response.body {
                        env.storage.discard(payload).await;
                    }
                }
            }
        }
        Err(e) => {
            error!(task_id = %id, callback = %task.callback, error = %e, "task handler failed");
            observer.error("task_handler", &e.to_string());
        }
    }

    observer.request_ended(id, &outcome);
    outcome
}

/// Whether the request body reached the wire: everything except a
/// dispatch-level failure.
fn was_dispatched(outcome: &TaskOutcome) -> bool {
    !matches!(
        outcome,
        TaskOutcome::Failed(TaskError {
            kind: TaskErrorKind::Request { .. },
            ..
        })
    )
}

/// Run the HTTP exchange for `task`, producing a response or a typed error.
async fn execute(env: &ExecutionEnv, task: &RequestTask) -> Result<Response, TaskError> {
    let request = &task.request;

    let body = match request.body() {
        Some(payload) => match env.storage.materialize(payload).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                return Err(task_error(
                    task,
                    TaskErrorKind::Request {
                        kind: RequestErrorKind::Storage,
                        message: e.to_string(),
                    },
                ))
            }
        },
        None => None,
    };

    let timeout = request.timeout().unwrap_or(env.config.default_timeout);
    let (status, headers, bytes) =
        match tokio::time::timeout(timeout, exchange(env, task, body)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(task_error(
                    task,
                    TaskErrorKind::Request {
                        kind: RequestErrorKind::Timeout,
                        message: format!("request did not complete within {timeout:?}"),
                    },
                ))
            }
        };

    let raise = request
        .raise_error_responses()
        .unwrap_or(env.config.raise_error_responses);
    if raise {
        if let Some(class) = HttpErrorClass::from_status(status) {
            let body = if bytes.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&bytes).into_owned())
            };
            return Err(task_error(task, TaskErrorKind::Http { status, class, body }));
        }
    }

    let content_type = headers.get("content-type").map(str::to_string);
    let body = if bytes.is_empty() {
        None
    } else {
        Some(env.storage.maybe_offload(bytes, content_type.as_deref()).await)
    };

    Ok(Response {
        status,
        headers,
        body,
        method: request.method().to_string(),
        url: request.url().clone(),
        callback_args: task.callback_args.clone(),
    })
}

/// The wire loop: transport retries, redirect following, bounded read.
///
/// The transport retry budget is shared across the whole redirect chain,
/// and only connect/IO failures draw from it.
async fn exchange(
    env: &ExecutionEnv,
    task: &RequestTask,
    mut body: Option<Bytes>,
) -> Result<(u16, HttpHeaders, Bytes), TaskError> {
    let request = &task.request;
    let mut url = request.url().clone();
    let mut method = request.method().clone();
    let mut headers = request.headers().clone();
    if !headers.contains("user-agent") {
        headers.insert("user-agent", env.config.user_agent.clone());
    }

    let max_redirects = request
        .max_redirects()
        .unwrap_or(env.config.default_max_redirects);
    let mut chain = RedirectChain::new(&url, max_redirects);
    let mut retries_left = env.config.transport_retries;

    let response = loop {
        let origin = Origin::of(&url).ok_or_else(|| {
            task_error(
                task,
                TaskErrorKind::Request {
                    kind: RequestErrorKind::Io,
                    message: format!("url {url} has no usable origin"),
                },
            )
        })?;

        let client = env.pool.borrow_mut().acquire(&origin).map_err(|failure| {
            task_error(
                task,
                TaskErrorKind::Request {
                    kind: failure.kind,
                    message: failure.message,
                },
            )
        })?;

        let result = client
            .execute(method.clone(), url.clone(), &headers, body.clone())
            .await;

        let response = match result {
            Ok(response) => {
                env.pool.borrow_mut().report_success(&origin);
                response
            }
            Err(failure) => {
                env.pool.borrow_mut().report_failure(&origin);
                if failure.kind.is_retryable() && retries_left > 0 {
                    retries_left -= 1;
                    debug!(
                        url = %url,
                        kind = ?failure.kind,
                        retries_left,
                        "transport failure, retrying"
                    );
                    tokio::time::sleep(env.config.transport_retry_backoff).await;
                    continue;
                }
                return Err(task_error(
                    task,
                    TaskErrorKind::Request {
                        kind: failure.kind,
                        message: failure.message,
                    },
                ));
            }
        };

        let status = response.status();
        let location = if status.is_redirection() {
            response
                .headers()
                .get(http::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        } else {
            None
        };

        let Some(location) = location else {
            break response;
        };

        let next = url.join(&location).map_err(|e| {
            task_error(
                task,
                TaskErrorKind::Request {
                    kind: RequestErrorKind::Io,
                    message: format!("invalid redirect location {location:?}: {e}"),
                },
            )
        })?;

        chain
            .follow(&next)
            .map_err(|kind| task_error(task, TaskErrorKind::Redirect { kind, url: next.clone() }))?;

        if converts_to_get(status.as_u16(), &method, body.is_some()) {
            method = Method::GET;
            body = None;
            headers.remove("content-type");
            headers.remove("content-length");
        }
        sanitize_cross_origin(&mut headers, &url, &next);

        debug!(from = %url, to = %next, status = status.as_u16(), "following redirect");
        url = next;
    };

    let status = response.status().as_u16();
    let headers = HttpHeaders::from_header_map(response.headers());
    let bytes = read_limited(response, env.config.max_response_size)
        .await
        .map_err(|e| match e {
            ReadError::TooLarge { limit, received } => {
                task_error(task, TaskErrorKind::ResponseTooLarge { limit, received })
            }
            ReadError::Io { message } => task_error(
                task,
                TaskErrorKind::Request {
                    kind: RequestErrorKind::Io,
                    message,
                },
            ),
        })?;

    Ok((status, headers, bytes))
}

fn task_error(task: &RequestTask, kind: TaskErrorKind) -> TaskError {
    TaskError::new(&task.request, task.callback_args.clone(), kind)
}
