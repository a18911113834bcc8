//! Cyclic egress proxy selection.

/// Cycles through a configured proxy list
///
/// `None` from [`ProxyRotator::next_proxy`] means "direct connection". The
/// rotator never fails; exhaustion is the caller's call, made by counting
/// attempts against [`ProxyRotator::len`].
#[derive(Debug, Clone, Default)]
pub struct ProxyRotator {
    proxies: Vec<String>,
    cursor: usize,
}

impl ProxyRotator {
    /// Create a rotator; blank entries are ignored
    pub fn new(proxies: Vec<String>) -> Self {
        let proxies = proxies
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { proxies, cursor: 0 }
    }

    /// Next proxy in cyclic order, or `None` when the list is empty
    pub fn next_proxy(&mut self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let proxy = self.proxies[self.cursor % self.proxies.len()].clone();
        self.cursor += 1;
        Some(proxy)
    }

    /// Number of configured proxies
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Rotation only changes anything with two or more proxies
    pub fn can_rotate(&self) -> bool {
        self.proxies.len() > 1
    }
}
