//! Initial data the engine is built from.
//!
//! A seed is either the built-in [`Seed::sample`] fixture or a YAML file
//! with the same shape:
//!
//! ```yaml
//! servers:
//!   - server:
//!       server_id: "100000000001"
//!       hostname: node-1
//!       zone: is1a
//!       port_channels:
//!         - port_channel_id: 1
//!           bonding_type: lacp
//!           link_speed_type: 1gbe
//!     power_status: { status: on }
//!     raid_status: { overall_status: ok, monitored_at: "2024-01-01T00:00:00Z" }
//!     os_images:
//!       - { os_image_id: ubuntu-24.04, name: Ubuntu 24.04 LTS }
//! dedicated_subnets: []
//! private_networks: []
//! ```

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SeedError;
use crate::models::{
    BondingType, CachedPowerStatus, DedicatedSubnet, InterfacePort, Ipv4Network, LinkSpeedType,
    OsImage, PortChannel, PowerState, PrivateNetwork, RaidHealth, RaidLogicalVolume, RaidStatus,
    Server, ServerPowerStatus,
};

/// Everything the engine knows about one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server as exposed by the API.
    pub server: Server,
    /// Live power status.
    pub power_status: ServerPowerStatus,
    /// RAID status.
    pub raid_status: RaidStatus,
    /// Installable OS images.
    #[serde(default)]
    pub os_images: Vec<OsImage>,
}

/// Initial engine contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    /// Server records.
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    /// Dedicated subnet catalog.
    #[serde(default)]
    pub dedicated_subnets: Vec<DedicatedSubnet>,
    /// Private network catalog.
    #[serde(default)]
    pub private_networks: Vec<PrivateNetwork>,
}

impl Seed {
    /// Parse a seed from YAML.
    ///
    /// # Errors
    /// Returns an error if the YAML is malformed or fails validation.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SeedError> {
        let seed: Self = serde_yaml::from_str(contents)?;
        seed.validate()?;
        Ok(seed)
    }

    /// Load a seed from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let seed = Self::from_yaml_str(&contents)?;
        info!(
            path = %path.display(),
            servers = seed.servers.len(),
            "Loaded seed file"
        );
        Ok(seed)
    }

    /// Check identifier uniqueness and port channel references.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), SeedError> {
        let mut server_ids = HashSet::new();
        for record in &self.servers {
            let server = &record.server;
            if !server_ids.insert(server.server_id.as_str()) {
                return Err(SeedError::DuplicateServer(server.server_id.clone()));
            }

            let mut port_ids = HashSet::new();
            for port in &server.ports {
                if !port_ids.insert(port.port_id) {
                    return Err(SeedError::DuplicatePort {
                        server_id: server.server_id.clone(),
                        port_id: port.port_id,
                    });
                }
            }

            for channel in &server.port_channels {
                if let Some(&missing) = channel.ports.iter().find(|id| !port_ids.contains(*id)) {
                    return Err(SeedError::DanglingPortReference {
                        server_id: server.server_id.clone(),
                        port_channel_id: channel.port_channel_id,
                        port_id: missing,
                    });
                }
            }
        }
        Ok(())
    }

    /// Largest port identifier present in the seed.
    #[must_use]
    pub fn max_port_id(&self) -> i64 {
        self.servers
            .iter()
            .flat_map(|r| r.server.ports.iter().map(|p| p.port_id))
            .max()
            .unwrap_or(0)
    }

    /// Built-in fixture: two servers, one dedicated subnet, three private
    /// networks.
    #[must_use]
    pub fn sample() -> Self {
        let seeded_at = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default();

        let node1 = ServerRecord {
            server: Server {
                server_id: "100000000001".to_string(),
                hostname: "node-1".to_string(),
                zone: "is1a".to_string(),
                ports: vec![InterfacePort::new(1001, "1gbe", 101)],
                port_channels: vec![PortChannel {
                    port_channel_id: 101,
                    bonding_type: BondingType::Lacp,
                    link_speed_type: LinkSpeedType::OneGbe,
                    locked: false,
                    ports: vec![1001],
                }],
                lock_status: None,
                cached_power_status: Some(CachedPowerStatus {
                    status: PowerState::On,
                    stored: seeded_at,
                }),
            },
            power_status: ServerPowerStatus {
                status: PowerState::On,
            },
            raid_status: RaidStatus {
                overall_status: RaidHealth::Ok,
                monitored_at: seeded_at,
                logical_volumes: vec![RaidLogicalVolume {
                    volume_id: "0".to_string(),
                    raid_level: "1".to_string(),
                    status: RaidHealth::Ok,
                }],
            },
            os_images: sample_os_images(),
        };

        let node2 = ServerRecord {
            server: Server {
                server_id: "100000000002".to_string(),
                hostname: "node-2".to_string(),
                zone: "is1a".to_string(),
                ports: vec![
                    InterfacePort::new(1002, "10gbe 1", 102),
                    InterfacePort::new(1003, "10gbe 2", 102),
                ],
                port_channels: vec![PortChannel {
                    port_channel_id: 102,
                    bonding_type: BondingType::Single,
                    link_speed_type: LinkSpeedType::TenGbe,
                    locked: false,
                    ports: vec![1002, 1003],
                }],
                lock_status: None,
                cached_power_status: Some(CachedPowerStatus {
                    status: PowerState::Off,
                    stored: seeded_at,
                }),
            },
            power_status: ServerPowerStatus {
                status: PowerState::Off,
            },
            raid_status: RaidStatus {
                overall_status: RaidHealth::Warning,
                monitored_at: seeded_at,
                logical_volumes: vec![
                    RaidLogicalVolume {
                        volume_id: "0".to_string(),
                        raid_level: "1".to_string(),
                        status: RaidHealth::Ok,
                    },
                    RaidLogicalVolume {
                        volume_id: "1".to_string(),
                        raid_level: "10".to_string(),
                        status: RaidHealth::Warning,
                    },
                ],
            },
            os_images: sample_os_images(),
        };

        Self {
            servers: vec![node1, node2],
            dedicated_subnets: vec![DedicatedSubnet {
                dedicated_subnet_id: "200000000001".to_string(),
                nickname: "dedicated-subnet-1".to_string(),
                ipv4: Ipv4Network {
                    network_address: "198.51.100.0".to_string(),
                    prefix_length: 28,
                },
            }],
            private_networks: (1..=3)
                .map(|n| PrivateNetwork {
                    private_network_id: format!("30000000000{n}"),
                    nickname: format!("private-network-{n}"),
                    vlan_id: 100 + n,
                })
                .collect(),
        }
    }
}

fn sample_os_images() -> Vec<OsImage> {
    vec![
        OsImage {
            os_image_id: "ubuntu-24.04".to_string(),
            name: "Ubuntu 24.04 LTS".to_string(),
        },
        OsImage {
            os_image_id: "rockylinux-9".to_string(),
            name: "Rocky Linux 9".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_valid() {
        let seed = Seed::sample();
        seed.validate().unwrap();
        assert_eq!(seed.servers.len(), 2);
        assert_eq!(seed.private_networks.len(), 3);
        assert_eq!(seed.max_port_id(), 1003);
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = serde_yaml::to_string(&Seed::sample()).unwrap();
        let parsed = Seed::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, Seed::sample());
    }

    #[test]
    fn test_minimal_yaml() {
        let yaml = r#"
servers:
  - server:
      server_id: "1"
      hostname: node
      zone: tk1a
      port_channels:
        - port_channel_id: 7
          bonding_type: static
          link_speed_type: 25gbe
    power_status: { status: off }
    raid_status: { overall_status: ok, monitored_at: "2024-01-01T00:00:00Z" }
"#;
        let seed = Seed::from_yaml_str(yaml).unwrap();
        let record = &seed.servers[0];
        assert!(record.server.ports.is_empty());
        assert!(record.os_images.is_empty());
        assert_eq!(
            record.server.port_channels[0].link_speed_type,
            LinkSpeedType::TwentyFiveGbe
        );
        assert!(seed.dedicated_subnets.is_empty());
    }

    #[test]
    fn test_duplicate_server_rejected() {
        let mut seed = Seed::sample();
        let copy = seed.servers[0].clone();
        seed.servers.push(copy);
        assert!(matches!(
            seed.validate(),
            Err(SeedError::DuplicateServer(id)) if id == "100000000001"
        ));
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut seed = Seed::sample();
        let port = seed.servers[1].server.ports[0].clone();
        seed.servers[1].server.ports.push(port);
        assert!(matches!(
            seed.validate(),
            Err(SeedError::DuplicatePort { port_id: 1002, .. })
        ));
    }

    #[test]
    fn test_dangling_port_reference_rejected() {
        let mut seed = Seed::sample();
        seed.servers[0].server.port_channels[0].ports.push(4242);
        assert!(matches!(
            seed.validate(),
            Err(SeedError::DanglingPortReference {
                port_channel_id: 101,
                port_id: 4242,
                ..
            })
        ));
    }
}
