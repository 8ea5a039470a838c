/// Optional address filter for discovered devices.
///
/// Matches against the address reported by the adapter, never the address
/// decoded from the payload. Comparison is case-insensitive and exact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    address: Option<String>,
}

impl DeviceFilter {
    pub fn new(address: Option<String>) -> Self {
        Self {
            address: address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        }
    }

    /// A filter that lets every device through.
    pub fn any() -> Self {
        Self::default()
    }

    /// Check whether a reported address should be processed.
    pub fn matches(&self, reported: &str) -> bool {
        match &self.address {
            Some(address) => address.eq_ignore_ascii_case(reported),
            None => true,
        }
    }
}
