//! Port channel and port operations.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use super::{record_mut, Catalog, Engine, IdAllocator};
use crate::error::{EngineError, ResourceKind};
use crate::models::{
    AssignNetworkParameter, AttachedDedicatedSubnet, AttachedPrivateNetwork, BondingType,
    ConfigureBondingParameter, EnableServerPortParameter, InterfacePort, Internet,
    InternetSubnetType, InternetType, PortChannel, PortChannelId, PortId, PortMode,
    ReadServerTrafficByPortParams, TrafficGraph, TrafficGraphData, UpdateServerPortParameter,
};

/// Shared subnet every `common_subnet` port is attached to.
const COMMON_SUBNET_ADDRESS: &str = "203.0.113.0";
const COMMON_SUBNET_PREFIX: u8 = 24;

/// Internet bandwidth of a `common_subnet` attachment.
const COMMON_SUBNET_BANDWIDTH_MBPS: u32 = 100;

/// Internet bandwidth of a `dedicated_subnet` attachment.
const DEDICATED_SUBNET_BANDWIDTH_MBPS: u32 = 500;

/// Private network bandwidth, independent of how many networks are attached.
const PRIVATE_NETWORK_BANDWIDTH_MBPS: u32 = 1000;

/// Build the ports a bonding reconfiguration produces.
///
/// Nickname cardinality is validated before any identifier is allocated.
fn bonding_ports(
    channel: &PortChannel,
    params: &ConfigureBondingParameter,
    ids: &IdAllocator,
) -> Result<Vec<InterfacePort>, EngineError> {
    let label = channel.link_speed_type.to_string();
    let nicknames = params.port_nicknames.as_deref();

    let names: Vec<String> = match params.bonding_type {
        BondingType::Lacp | BondingType::Static => {
            let name = match nicknames {
                None => label,
                Some([name]) if name.is_empty() => label,
                Some([name]) => name.clone(),
                Some(_) => return Err(invalid_nicknames(channel, 1)),
            };
            vec![name]
        }
        BondingType::Single => match nicknames {
            None => vec![format!("{label} 1"), format!("{label} 2")],
            Some(names @ [_, _]) => names.to_vec(),
            Some(_) => return Err(invalid_nicknames(channel, 2)),
        },
        BondingType::Unknown => {
            warn!(
                port_channel_id = channel.port_channel_id,
                "Unknown bonding type, no ports created"
            );
            Vec::new()
        }
    };

    Ok(names
        .into_iter()
        .map(|name| InterfacePort::new(ids.next_id(), name, channel.port_channel_id))
        .collect())
}

fn invalid_nicknames(channel: &PortChannel, expected: usize) -> EngineError {
    EngineError::invalid(
        ResourceKind::PortChannel,
        channel.port_channel_id,
        format!("invalid port_nicknames: expected {expected}"),
    )
}

/// Reset a port's network assignment and apply the requested one.
///
/// The reset is applied before validation, so a rejected request leaves the
/// port with whatever was applied up to the failing step.
fn apply_network_assignment(
    port: &mut InterfacePort,
    params: &AssignNetworkParameter,
    catalog: &Catalog,
) -> Result<(), EngineError> {
    port.internet = None;
    port.mode = None;
    port.private_networks.clear();
    port.global_bandwidth_mbps = None;
    port.local_bandwidth_mbps = None;

    if let Some(internet_type) = params.internet_type {
        let (internet, bandwidth) = match internet_type {
            InternetType::CommonSubnet => (
                Internet {
                    subnet_type: InternetSubnetType::CommonSubnet,
                    network_address: COMMON_SUBNET_ADDRESS.to_string(),
                    prefix_length: COMMON_SUBNET_PREFIX,
                    dedicated_subnet: None,
                },
                COMMON_SUBNET_BANDWIDTH_MBPS,
            ),
            InternetType::DedicatedSubnet => {
                let id = params.dedicated_subnet_id.as_deref().ok_or_else(|| {
                    EngineError::invalid(
                        ResourceKind::Port,
                        port.port_id,
                        "dedicated_subnet_id is required for dedicated_subnet",
                    )
                })?;
                let subnet = catalog.dedicated_subnet(id).ok_or_else(|| {
                    EngineError::invalid(
                        ResourceKind::Port,
                        port.port_id,
                        format!("invalid dedicated subnet id: {id}"),
                    )
                })?;
                (
                    Internet {
                        subnet_type: InternetSubnetType::DedicatedSubnet,
                        network_address: subnet.ipv4.network_address.clone(),
                        prefix_length: subnet.ipv4.prefix_length,
                        dedicated_subnet: Some(AttachedDedicatedSubnet {
                            dedicated_subnet_id: subnet.dedicated_subnet_id.clone(),
                            nickname: subnet.nickname.clone(),
                        }),
                    },
                    DEDICATED_SUBNET_BANDWIDTH_MBPS,
                )
            }
            InternetType::Unknown => {
                return Err(EngineError::invalid(
                    ResourceKind::Port,
                    port.port_id,
                    "invalid internet_type",
                ));
            }
        };
        port.internet = Some(internet);
        port.global_bandwidth_mbps = Some(bandwidth);
    }

    port.mode = match params.mode {
        Some(PortMode::Unknown) => {
            return Err(EngineError::invalid(
                ResourceKind::Port,
                port.port_id,
                "invalid mode",
            ));
        }
        mode => mode,
    };

    if let Some(ids) = &params.private_network_ids {
        for id in ids {
            let network = catalog.private_network(id).ok_or_else(|| {
                EngineError::invalid(
                    ResourceKind::Port,
                    port.port_id,
                    format!("invalid private network id: {id}"),
                )
            })?;
            port.private_networks.push(AttachedPrivateNetwork {
                private_network_id: network.private_network_id.clone(),
                nickname: network.nickname.clone(),
            });
        }
        port.local_bandwidth_mbps = Some(PRIVATE_NETWORK_BANDWIDTH_MBPS);
    }

    Ok(())
}

impl Engine {
    /// Read a port channel.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port channel.
    pub async fn read_port_channel(
        &self,
        server_id: &str,
        port_channel_id: PortChannelId,
    ) -> Result<PortChannel, EngineError> {
        let store = self.shared().await;
        Ok(store
            .server(server_id)?
            .port_channel(port_channel_id)?
            .clone())
    }

    /// Reconfigure bonding of a port channel.
    ///
    /// Replaces the server's port list and the channel's member list with
    /// freshly created ports. Processed synchronously under the exclusive
    /// lock, so the channel's `locked` flag is never raised.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port channel, and
    /// `InvalidRequest` when the nickname count does not match the bonding
    /// type.
    pub async fn configure_bonding(
        &self,
        server_id: &str,
        port_channel_id: PortChannelId,
        params: &ConfigureBondingParameter,
    ) -> Result<PortChannel, EngineError> {
        let mut store = self.exclusive().await;
        let record = store.server_mut(server_id)?;

        let ports = bonding_ports(record.port_channel(port_channel_id)?, params, &self.ids)?;
        let port_ids: Vec<PortId> = ports.iter().map(|p| p.port_id).collect();
        record.server.ports = ports;

        let channel = record.port_channel_mut(port_channel_id)?;
        channel.bonding_type = params.bonding_type;
        channel.ports = port_ids;

        info!(
            server_id = %server_id,
            port_channel_id,
            bonding_type = %params.bonding_type,
            ports = ?channel.ports,
            "Bonding configured"
        );
        Ok(channel.clone())
    }

    /// Read a port.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port.
    pub async fn read_port(
        &self,
        server_id: &str,
        port_id: PortId,
    ) -> Result<InterfacePort, EngineError> {
        let store = self.shared().await;
        Ok(store.server(server_id)?.port(port_id)?.clone())
    }

    /// Rename a port.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port.
    pub async fn update_port(
        &self,
        server_id: &str,
        port_id: PortId,
        params: &UpdateServerPortParameter,
    ) -> Result<InterfacePort, EngineError> {
        let mut store = self.exclusive().await;
        let port = store.server_mut(server_id)?.port_mut(port_id)?;
        port.nickname.clone_from(&params.nickname);
        Ok(port.clone())
    }

    /// Change the network assignment of a port.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port, `InvalidRequest` for
    /// an unknown dedicated subnet or private network, a missing dedicated
    /// subnet id, or an unrecognised internet type.
    pub async fn assign_network(
        &self,
        server_id: &str,
        port_id: PortId,
        params: &AssignNetworkParameter,
    ) -> Result<InterfacePort, EngineError> {
        let mut guard = self.exclusive().await;
        let store = &mut *guard;
        let port = record_mut(&mut store.servers, server_id)?.port_mut(port_id)?;

        apply_network_assignment(port, params, &store.catalog)?;

        info!(
            server_id = %server_id,
            port_id,
            global_bandwidth_mbps = ?port.global_bandwidth_mbps,
            private_networks = port.private_networks.len(),
            "Network assigned"
        );
        Ok(port.clone())
    }

    /// Enable or disable a port.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port.
    pub async fn enable_port(
        &self,
        server_id: &str,
        port_id: PortId,
        params: &EnableServerPortParameter,
    ) -> Result<InterfacePort, EngineError> {
        let mut store = self.exclusive().await;
        let port = store.server_mut(server_id)?.port_mut(port_id)?;
        port.enabled = params.enable;
        Ok(port.clone())
    }

    /// Read the traffic graph of a port.
    ///
    /// Always a fixed two-point series per direction; the range parameters
    /// are ignored.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or port.
    pub async fn read_port_traffic(
        &self,
        server_id: &str,
        port_id: PortId,
        _params: &ReadServerTrafficByPortParams,
    ) -> Result<TrafficGraph, EngineError> {
        {
            let store = self.shared().await;
            store.server(server_id)?.port(port_id)?;
        }

        let now = Utc::now();
        let series = || {
            vec![
                TrafficGraphData {
                    timestamp: now,
                    value: 1.0,
                },
                TrafficGraphData {
                    timestamp: now - Duration::minutes(1),
                    value: 2.0,
                },
            ]
        };
        Ok(TrafficGraph {
            receive: series(),
            transmit: series(),
        })
    }
}
