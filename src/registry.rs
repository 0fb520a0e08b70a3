//! Device registry access: listing the sensors in a device group, paginated
//! via an opaque continuation token.

use crate::models::telemetry::ListingPage;
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound the provider places on one listing page.
pub const LISTING_PAGE_SIZE: u32 = 100;

#[derive(Debug)]
pub enum RegistryError {
    /// The listing provider could not be reached or rejected the call.
    /// No partial device list is ever returned.
    Unavailable(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Unavailable(message) => write!(f, "registry unavailable: {}", message),
        }
    }
}

impl Error for RegistryError {}

/// One page of the provider listing call. Implementations request at most
/// [`LISTING_PAGE_SIZE`] identifiers and never recurse into child groups.
pub trait RegistryApi {
    fn list_page(&self, group: &str, next_token: Option<&str>) -> Result<ListingPage, RegistryError>;
}

/// Thin client over a [`RegistryApi`] that drives the pagination loop.
/// Holds no cache: every call re-queries the registry.
pub struct DeviceRegistryClient<A: RegistryApi> {
    api: A,
}

impl<A: RegistryApi> DeviceRegistryClient<A> {
    pub fn new(api: A) -> Self {
        DeviceRegistryClient { api }
    }

    /// All device identifiers registered under `group`, accumulated across
    /// every listing page. An empty group yields an empty vec.
    pub fn list_devices(&self, group: &str) -> Result<Vec<String>, RegistryError> {
        let mut devices = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self.api.list_page(group, next_token.as_deref())?;
            devices.extend(page.things);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(devices)
    }
}
