//! Reverse geocoding of embedded GPS coordinates.
//!
//! The lookup is an external service behind the [`ReverseGeocoder`] trait.
//! Rate limiting ([`Throttled`]) and retries ([`reverse_with_retry`]) are
//! layered on by the caller; nothing here is global.

pub mod nominatim;
pub mod provider;
pub mod retry;
pub mod throttle;

pub use nominatim::NominatimGeocoder;
pub use provider::{Address, ReverseGeocoder};
pub use retry::{reverse_with_retry, RetryPolicy};
pub use throttle::Throttled;
