// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Stop requests from the terminal.
//!
//! The signal handlers are installed when the listener is created, so a
//! Ctrl+C arriving before the returned future is first polled still stops
//! the recording instead of killing the process.

use std::future::Future;
use std::io;

use tracing::{debug, info};

use crate::recording::StopToken;

/// Install handlers for SIGINT and SIGTERM and return a future that requests
/// a stop on `stop` once either arrives.
///
/// Must be called from within a tokio runtime context.
#[cfg(unix)]
pub fn listen_for_shutdown(stop: StopToken) -> io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => debug!("SIGINT received"),
            _ = terminate.recv() => debug!("SIGTERM received"),
        }
        info!("stop requested");
        stop.request_stop();
    })
}

/// Install a Ctrl+C handler and return a future that requests a stop on
/// `stop` once it fires.
///
/// Must be called from within a tokio runtime context.
#[cfg(windows)]
pub fn listen_for_shutdown(stop: StopToken) -> io::Result<impl Future<Output = ()> + Send + 'static> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        ctrl_c.recv().await;
        info!("stop requested");
        stop.request_stop();
    })
}
