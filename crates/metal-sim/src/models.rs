//! Resource models served by the simulator.
//!
//! These mirror the JSON payloads of the bare metal provisioning API. Every
//! type derives `Clone`: the engine hands out clones so callers never alias
//! the records it owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Port identifier, unique within a server.
pub type PortId = i64;

/// Port channel identifier, unique within a server.
pub type PortChannelId = i64;

// ============================================================================
// Server types
// ============================================================================

/// A physical server as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Unique server identifier.
    pub server_id: String,
    /// Server hostname.
    pub hostname: String,
    /// Zone the server is racked in.
    pub zone: String,
    /// Network ports currently configured on the server.
    #[serde(default)]
    pub ports: Vec<InterfacePort>,
    /// Port channels (bonding groups) of the server.
    #[serde(default)]
    pub port_channels: Vec<PortChannel>,
    /// Active provisioning lock, if any.
    #[serde(default)]
    pub lock_status: Option<ServerLockStatus>,
    /// Last recorded power state.
    #[serde(default)]
    pub cached_power_status: Option<CachedPowerStatus>,
}

/// Provisioning action currently holding a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerLockStatus {
    /// An OS installation is in progress.
    OsInstall,
    /// The server is under maintenance.
    Maintenance,
}

impl std::fmt::Display for ServerLockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OsInstall => write!(f, "os_install"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Paginated server listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Servers {
    /// Pagination metadata.
    pub meta: PaginateMeta,
    /// Server snapshots.
    pub servers: Vec<Server>,
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginateMeta {
    /// Total number of matching records.
    pub count: usize,
}

/// Installable operating system image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsImage {
    /// Image identifier.
    pub os_image_id: String,
    /// Display name.
    pub name: String,
}

// ============================================================================
// Port types
// ============================================================================

/// A network interface port of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfacePort {
    /// Port identifier.
    pub port_id: PortId,
    /// Display name.
    pub nickname: String,
    /// Whether the link is enabled.
    pub enabled: bool,
    /// Owning port channel.
    #[serde(default)]
    pub port_channel_id: Option<PortChannelId>,
    /// Internet attachment.
    #[serde(default)]
    pub internet: Option<Internet>,
    /// Attached private networks.
    #[serde(default)]
    pub private_networks: Vec<AttachedPrivateNetwork>,
    /// VLAN mode.
    #[serde(default)]
    pub mode: Option<PortMode>,
    /// Internet bandwidth cap.
    #[serde(default)]
    pub global_bandwidth_mbps: Option<u32>,
    /// Private network bandwidth cap.
    #[serde(default)]
    pub local_bandwidth_mbps: Option<u32>,
}

impl InterfacePort {
    /// Create an enabled port with no network assignment.
    #[must_use]
    pub fn new(
        port_id: PortId,
        nickname: impl Into<String>,
        port_channel_id: PortChannelId,
    ) -> Self {
        Self {
            port_id,
            nickname: nickname.into(),
            enabled: true,
            port_channel_id: Some(port_channel_id),
            internet: None,
            private_networks: Vec::new(),
            mode: None,
            global_bandwidth_mbps: None,
            local_bandwidth_mbps: None,
        }
    }
}

/// VLAN mode of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortMode {
    /// Untagged access port.
    Access,
    /// Tagged trunk port.
    Trunk,
    /// Any value this simulator does not model.
    #[serde(other)]
    Unknown,
}

/// Logical bundle of ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortChannel {
    /// Port channel identifier.
    pub port_channel_id: PortChannelId,
    /// Current bonding mode.
    pub bonding_type: BondingType,
    /// Link speed of the member ports.
    pub link_speed_type: LinkSpeedType,
    /// Whether a reconfiguration is in progress.
    #[serde(default)]
    pub locked: bool,
    /// Member port identifiers.
    #[serde(default)]
    pub ports: Vec<PortId>,
}

/// Bonding (link aggregation) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondingType {
    /// LACP aggregation.
    Lacp,
    /// Static aggregation.
    Static,
    /// Two independent links.
    Single,
    /// Any value this simulator does not model.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for BondingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lacp => write!(f, "lacp"),
            Self::Static => write!(f, "static"),
            Self::Single => write!(f, "single"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Link speed of a port channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkSpeedType {
    /// 1 Gigabit Ethernet.
    #[serde(rename = "1gbe")]
    OneGbe,
    /// 10 Gigabit Ethernet.
    #[serde(rename = "10gbe")]
    TenGbe,
    /// 25 Gigabit Ethernet.
    #[serde(rename = "25gbe")]
    TwentyFiveGbe,
}

impl std::fmt::Display for LinkSpeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneGbe => write!(f, "1gbe"),
            Self::TenGbe => write!(f, "10gbe"),
            Self::TwentyFiveGbe => write!(f, "25gbe"),
        }
    }
}

// ============================================================================
// Network types
// ============================================================================

/// Internet attachment of a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internet {
    /// Kind of subnet the port is attached to.
    pub subnet_type: InternetSubnetType,
    /// Network address of the subnet.
    pub network_address: String,
    /// Prefix length of the subnet.
    pub prefix_length: u8,
    /// Dedicated subnet reference, for `dedicated_subnet` attachments.
    #[serde(default)]
    pub dedicated_subnet: Option<AttachedDedicatedSubnet>,
}

/// Kind of internet subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternetSubnetType {
    /// Shared subnet.
    CommonSubnet,
    /// Customer-exclusive subnet.
    DedicatedSubnet,
}

/// Dedicated subnet reference on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDedicatedSubnet {
    /// Dedicated subnet identifier.
    pub dedicated_subnet_id: String,
    /// Display name.
    pub nickname: String,
}

/// Private network reference on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPrivateNetwork {
    /// Private network identifier.
    pub private_network_id: String,
    /// Display name.
    pub nickname: String,
}

/// Customer-exclusive subnet from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicatedSubnet {
    /// Dedicated subnet identifier.
    pub dedicated_subnet_id: String,
    /// Display name.
    pub nickname: String,
    /// IPv4 range.
    pub ipv4: Ipv4Network,
}

/// IPv4 network range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Network {
    /// Network address.
    pub network_address: String,
    /// Prefix length.
    pub prefix_length: u8,
}

/// Isolated internal network from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNetwork {
    /// Private network identifier.
    pub private_network_id: String,
    /// Display name.
    pub nickname: String,
    /// VLAN carrying the network.
    pub vlan_id: u16,
}

/// Traffic time series of a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficGraph {
    /// Received traffic samples.
    pub receive: Vec<TrafficGraphData>,
    /// Transmitted traffic samples.
    pub transmit: Vec<TrafficGraphData>,
}

/// One traffic sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficGraphData {
    /// Sample time.
    pub timestamp: DateTime<Utc>,
    /// Sample value.
    pub value: f64,
}

// ============================================================================
// Power and RAID types
// ============================================================================

/// Power state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    /// Powered on.
    On,
    /// Powered off.
    Off,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// Live power status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPowerStatus {
    /// Current power state.
    pub status: PowerState,
}

/// Power status snapshot stored on the server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPowerStatus {
    /// Recorded power state.
    pub status: PowerState,
    /// When the state was recorded.
    pub stored: DateTime<Utc>,
}

/// RAID health of a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidStatus {
    /// Aggregate health.
    pub overall_status: RaidHealth,
    /// When the controller was last polled.
    pub monitored_at: DateTime<Utc>,
    /// Per-volume health.
    #[serde(default)]
    pub logical_volumes: Vec<RaidLogicalVolume>,
}

/// Health of a RAID array or volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidHealth {
    /// Healthy.
    Ok,
    /// Degraded but serving.
    Warning,
    /// Failed.
    Critical,
}

/// One RAID logical volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidLogicalVolume {
    /// Volume identifier.
    pub volume_id: String,
    /// RAID level (e.g. "1", "10").
    pub raid_level: String,
    /// Volume health.
    pub status: RaidHealth,
}

// ============================================================================
// Request parameters
// ============================================================================

/// Query parameters of the server listing. Accepted but not applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListServersParams {
    /// Page number.
    pub page: Option<u32>,
    /// Page size.
    pub page_size: Option<u32>,
    /// Free text filter.
    pub free_word: Option<String>,
    /// Sort order.
    pub ordering: Option<String>,
}

/// Body of an OS install request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInstallParameter {
    /// Image to install.
    pub os_image_id: String,
}

/// Body of a bonding reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureBondingParameter {
    /// Requested bonding mode.
    pub bonding_type: BondingType,
    /// Nicknames for the created ports.
    #[serde(default)]
    pub port_nicknames: Option<Vec<String>>,
}

/// Body of a port rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServerPortParameter {
    /// New display name.
    pub nickname: String,
}

/// Requested internet attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternetType {
    /// Attach to the shared subnet.
    CommonSubnet,
    /// Attach to a dedicated subnet.
    DedicatedSubnet,
    /// Any other wire value.
    #[serde(other)]
    Unknown,
}

/// Body of a network assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignNetworkParameter {
    /// Internet attachment kind.
    #[serde(default)]
    pub internet_type: Option<InternetType>,
    /// Dedicated subnet, required for `dedicated_subnet`.
    #[serde(default)]
    pub dedicated_subnet_id: Option<String>,
    /// VLAN mode.
    #[serde(default)]
    pub mode: Option<PortMode>,
    /// Private networks to attach.
    #[serde(default)]
    pub private_network_ids: Option<Vec<String>>,
}

/// Body of a port enable/disable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableServerPortParameter {
    /// Desired link state.
    pub enable: bool,
}

/// Query parameters of the traffic graph. Accepted but not applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadServerTrafficByPortParams {
    /// Range start.
    pub since: Option<DateTime<Utc>>,
    /// Range end.
    pub until: Option<DateTime<Utc>>,
    /// Sampling step in seconds.
    pub step: Option<u32>,
}

/// Power operation requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOperation {
    /// Power on.
    On,
    /// Hard power off.
    Off,
    /// Hard reset.
    Reset,
    /// ACPI shutdown.
    Soft,
    /// Any other wire value.
    #[serde(other)]
    Unknown,
}

impl PowerOperation {
    /// Power state the server settles in once the operation completes.
    #[must_use]
    pub fn target_state(self) -> Option<PowerState> {
        match self {
            Self::On | Self::Reset => Some(PowerState::On),
            Self::Off | Self::Soft => Some(PowerState::Off),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for PowerOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
            Self::Reset => write!(f, "reset"),
            Self::Soft => write!(f, "soft"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Body of a power control request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerControlParameter {
    /// Requested operation.
    pub operation: PowerOperation,
}

/// Query parameters of the RAID status read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRaidStatusParams {
    /// Ask the controller for fresh data. Ignored by the simulator.
    pub refresh: Option<bool>,
}
