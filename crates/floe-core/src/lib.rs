// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Engine-wide plumbing shared by every Floe crate: tracing setup, the
//! application event model and the layer stack that consumes it.

pub mod event;
pub mod layer;
pub mod timestep;

pub use event::{Event, EventCategory, MouseButton};
pub use layer::{Layer, LayerStack};
pub use timestep::Timestep;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid log filter `{filter}`")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins when it is set; otherwise `default_filter` (for example
/// `"info"` or `"floe_render_vk=debug,info"`) is used. Calling this twice is
/// harmless, the second subscriber is simply not installed.
pub fn init_tracing(default_filter: &str) -> Result<(), CoreError> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|source| CoreError::Filter {
            filter: default_filter.to_owned(),
            source,
        })?,
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}
