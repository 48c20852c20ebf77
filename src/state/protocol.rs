//! VPN protocol and connection configuration types.

use serde::{Deserialize, Serialize};

/// Tunnel protocol a connection can be made with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Let the SDK race/fall back across every candidate.
    #[default]
    Automatic,
    /// `WireGuard` protocol.
    WireGuard,
    /// IKEv2 through the Windows RAS stack.
    Ikev2,
    /// `OpenVPN` protocol (legacy TAP adapter transport).
    OpenVpn,
}

impl Protocol {
    /// Fallback priority used when the protocol is [`Protocol::Automatic`].
    pub const FALLBACK_ORDER: [Protocol; 3] = [Protocol::WireGuard, Protocol::Ikev2, Protocol::OpenVpn];

    /// Whether the protocol can carry a double-hop route.
    #[must_use]
    pub const fn supports_double_hop(self) -> bool {
        matches!(self, Self::WireGuard | Self::OpenVpn)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Automatic => write!(f, "Automatic"),
            Protocol::WireGuard => write!(f, "WireGuard"),
            Protocol::Ikev2 => write!(f, "IKEv2"),
            Protocol::OpenVpn => write!(f, "OpenVPN"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "automatic" | "auto" => Ok(Self::Automatic),
            "wireguard" | "wg" => Ok(Self::WireGuard),
            "ikev2" | "ras" => Ok(Self::Ikev2),
            "openvpn" | "ovpn" => Ok(Self::OpenVpn),
            other => Err(format!("Unknown protocol: {other}")),
        }
    }
}

/// `OpenVPN` data channel cipher.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cipher {
    /// AES-128-CBC. The only cipher scramble can carry.
    Aes128Cbc,
    /// AES-256-CBC.
    #[default]
    Aes256Cbc,
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cipher::Aes128Cbc => write!(f, "AES-128-CBC"),
            Cipher::Aes256Cbc => write!(f, "AES-256-CBC"),
        }
    }
}

impl std::str::FromStr for Cipher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "aes-128-cbc" | "128" => Ok(Self::Aes128Cbc),
            "aes-256-cbc" | "256" => Ok(Self::Aes256Cbc),
            other => Err(format!("Unknown cipher: {other}")),
        }
    }
}

/// Network transport for `OpenVPN`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Udp => write!(f, "UDP"),
            Transport::Tcp => write!(f, "TCP"),
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            other => Err(format!("Unknown transport: {other}")),
        }
    }
}

/// Entry and exit of a double-hop route, as location ids.
///
/// Passed to the SDK verbatim; unset ends are rejected there, not here.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleHopRoute {
    pub entry: Option<String>,
    pub destination: Option<String>,
}

impl DoubleHopRoute {
    /// Both ends are set to a non-empty id.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.entry) && set(&self.destination)
    }
}

/// One connection configuration candidate handed to the SDK.
///
/// Built fresh for every attempt and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ConnectionConfiguration {
    WireGuard {
        double_hop: Option<DoubleHopRoute>,
    },
    Ikev2,
    OpenVpn {
        cipher: Cipher,
        transport: Transport,
        scramble: bool,
        double_hop: Option<DoubleHopRoute>,
    },
}

impl ConnectionConfiguration {
    /// Protocol this configuration targets.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        match self {
            Self::WireGuard { .. } => Protocol::WireGuard,
            Self::Ikev2 => Protocol::Ikev2,
            Self::OpenVpn { .. } => Protocol::OpenVpn,
        }
    }

    /// Double-hop route carried by this configuration, if any.
    #[must_use]
    pub fn double_hop(&self) -> Option<&DoubleHopRoute> {
        match self {
            Self::WireGuard { double_hop } | Self::OpenVpn { double_hop, .. } => double_hop.as_ref(),
            Self::Ikev2 => None,
        }
    }
}

impl std::fmt::Display for ConnectionConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WireGuard { double_hop } => {
                write!(f, "WireGuard")?;
                if double_hop.is_some() {
                    write!(f, " (double hop)")?;
                }
                Ok(())
            }
            Self::Ikev2 => write!(f, "IKEv2"),
            Self::OpenVpn {
                cipher,
                transport,
                scramble,
                double_hop,
            } => {
                write!(f, "OpenVPN {transport} {cipher}")?;
                if *scramble {
                    write!(f, " scramble")?;
                }
                if double_hop.is_some() {
                    write!(f, " (double hop)")?;
                }
                Ok(())
            }
        }
    }
}
