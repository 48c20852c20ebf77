//! Kill switch and leak protection settings.
//!
//! The SDK enforces these at the network layer; this crate only keeps them
//! coherent and hands them over.

use serde::{Deserialize, Serialize};

/// Network-level enforcement toggles pushed to the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkGuard {
    /// Block all non-VPN traffic when the tunnel is down.
    pub kill_switch: bool,
    /// Also block LAN traffic. Only meaningful with the kill switch on.
    pub block_lan: bool,
    pub dns_leak_protection: bool,
    pub ipv6_leak_protection: bool,
    /// Keep local adapters reachable while connected.
    pub allow_lan_interfaces: bool,
}

impl Default for NetworkGuard {
    fn default() -> Self {
        Self {
            kill_switch: false,
            block_lan: false,
            dns_leak_protection: true,
            ipv6_leak_protection: true,
            allow_lan_interfaces: true,
        }
    }
}

impl NetworkGuard {
    /// Returns the guard with `block_lan` cleared when the kill switch is off.
    #[must_use]
    pub const fn normalized(mut self) -> Self {
        if !self.kill_switch {
            self.block_lan = false;
        }
        self
    }

    /// Whether LAN traffic passes, as the SDK expects it.
    #[must_use]
    pub const fn allows_lan_traffic(self) -> bool {
        !self.normalized().block_lan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_lan_requires_kill_switch() {
        let guard = NetworkGuard {
            kill_switch: false,
            block_lan: true,
            ..NetworkGuard::default()
        };
        assert!(!guard.normalized().block_lan);
        assert!(guard.allows_lan_traffic());
    }

    #[test]
    fn test_block_lan_kept_with_kill_switch() {
        let guard = NetworkGuard {
            kill_switch: true,
            block_lan: true,
            ..NetworkGuard::default()
        };
        assert_eq!(guard.normalized(), guard);
        assert!(!guard.allows_lan_traffic());
    }

    #[test]
    fn test_defaults_protect_against_leaks() {
        let guard = NetworkGuard::default();
        assert!(guard.dns_leak_protection);
        assert!(guard.ipv6_leak_protection);
        assert!(!guard.kill_switch);
    }
}
