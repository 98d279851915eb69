/*!
 * Prelude module for avroute Core.
 *
 * Re-exports the types most callers need in one import.
 */

pub use crate::error::{Error, Result};

pub use crate::types::{DriverId, Localized, FALLBACK_LOCALE};

pub use crate::config::{Config, ConfigBuilder, TransportConfig};

pub use crate::utils::{with_retry, with_retry_if};

pub use tracing::{debug, error, info, trace, warn};
