//! # Event marker capability.
//!
//! The bus carries arbitrary user types; [`Event`] is the opt-in marker that
//! admits a type to `post` and to type filters. Events travel as
//! `Arc<dyn Any + Send + Sync>` internally and reach subscribers as `Arc<T>`,
//! so the bus never clones or mutates a posted value.

use std::any::Any;
use std::sync::Arc;

/// Type-erased event payload as carried by the channel.
pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// Marker capability for values that can travel through the bus.
///
/// One line per type, no derive or registration step:
///
/// ```
/// use typebus::Event;
///
/// struct Login { user: String }
/// impl Event for Login {}
/// ```
///
/// ### Notes
/// - `Any` implies `'static`: events own their data.
/// - `Send + Sync` because one posted value is shared (`Arc`) across every
///   matching subscription, each possibly on a different thread.
/// - Filtering matches the exact runtime type: a subscription for `Login`
///   sees `Login` values only, never other `Event` types.
pub trait Event: Any + Send + Sync {}
