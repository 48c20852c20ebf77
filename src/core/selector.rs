//! Builds connection configuration candidates from user settings.

use crate::settings::{Settings, SettingsError, SettingsStore};
use crate::state::{Cipher, ConnectionConfiguration, Protocol};

/// Turns settings into the ordered list of configurations a connect may use.
///
/// Candidate order is the automatic-mode fallback priority: `WireGuard`,
/// IKEv2, `OpenVPN`. Settings pass through verbatim apart from the
/// scramble cipher constraint; nothing is validated here.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionConfigurationSelector;

impl ConnectionConfigurationSelector {
    /// One candidate per protocol, in fallback order.
    #[must_use]
    pub fn build_candidates(settings: &Settings) -> Vec<ConnectionConfiguration> {
        let double_hop = settings.double_hop_route();

        Protocol::FALLBACK_ORDER
            .iter()
            .map(|protocol| match protocol {
                Protocol::WireGuard => ConnectionConfiguration::WireGuard {
                    double_hop: double_hop.clone(),
                },
                Protocol::OpenVpn => ConnectionConfiguration::OpenVpn {
                    cipher: Self::openvpn_cipher(settings),
                    transport: settings.transport,
                    scramble: settings.scramble,
                    double_hop: double_hop.clone(),
                },
                Protocol::Ikev2 | Protocol::Automatic => ConnectionConfiguration::Ikev2,
            })
            .collect()
    }

    /// Scramble only works with AES-128; it silently overrides the preference.
    #[must_use]
    pub const fn openvpn_cipher(settings: &Settings) -> Cipher {
        if settings.scramble {
            Cipher::Aes128Cbc
        } else {
            settings.cipher
        }
    }

    /// The explicit "apply configuration" step run before each connect.
    ///
    /// Normalises the stored settings against what the SDK offers, saves them
    /// once if anything changed, and returns them with their candidates.
    ///
    /// # Errors
    ///
    /// Returns an error if normalised settings could not be saved.
    pub fn apply(
        store: &mut dyn SettingsStore,
        available: &[Protocol],
    ) -> Result<(Settings, Vec<ConnectionConfiguration>), SettingsError> {
        let stored = store.snapshot();
        let mut settings = stored.clone().normalized();

        if settings.protocol != Protocol::Automatic && !available.contains(&settings.protocol) {
            if let Some(fallback) = available
                .iter()
                .copied()
                .find(|p| *p != Protocol::Automatic)
            {
                tracing::warn!(
                    "CONFIG: {} is not available, falling back to {fallback}",
                    settings.protocol
                );
                settings.protocol = fallback;
            }
        }

        if settings != stored {
            store.save(&settings)?;
        }

        let candidates = Self::build_candidates(&settings);
        Ok((settings, candidates))
    }
}
