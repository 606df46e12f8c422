use crate::types::{Identity, ShipmentId, TransferId};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Custody state of a shipment, stored as its ordinal (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ShipmentState {
    Created = 0,
    InTransit = 1,
    Stored = 2,
    Delivered = 3,
}

impl ShipmentState {
    pub const ALL: [ShipmentState; 4] = [
        ShipmentState::Created,
        ShipmentState::InTransit,
        ShipmentState::Stored,
        ShipmentState::Delivered,
    ];

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(ShipmentState::Created),
            1 => Some(ShipmentState::InTransit),
            2 => Some(ShipmentState::Stored),
            3 => Some(ShipmentState::Delivered),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentState::Created => write!(f, "created"),
            ShipmentState::InTransit => write!(f, "in_transit"),
            ShipmentState::Stored => write!(f, "stored"),
            ShipmentState::Delivered => write!(f, "delivered"),
        }
    }
}

impl FromStr for ShipmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "created" | "CREATED" => Ok(ShipmentState::Created),
            "1" | "in_transit" | "IN_TRANSIT" => Ok(ShipmentState::InTransit),
            "2" | "stored" | "STORED" => Ok(ShipmentState::Stored),
            "3" | "delivered" | "DELIVERED" => Ok(ShipmentState::Delivered),
            other => Err(format!("unknown shipment state '{other}'")),
        }
    }
}

impl TryFrom<u8> for ShipmentState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_ordinal(value).ok_or_else(|| format!("invalid state value: {value}"))
    }
}

impl From<ShipmentState> for u8 {
    fn from(state: ShipmentState) -> Self {
        state.ordinal()
    }
}

/// An immutable record of one custody/state change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub id: TransferId,
    pub shipment_id: ShipmentId,
    /// Unix seconds at which the transfer was committed.
    pub timestamp: u64,
    pub new_state: ShipmentState,
    pub location: String,
    pub transfer_notes: String,
    pub new_owner: Identity,
}

/// One tracked unit of goods together with its full transfer history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: ShipmentId,
    pub name: String,
    pub description: String,
    pub origin: String,
    pub destination: String,
    pub delivery_date: String,
    pub units: u64,
    pub weight: f64,
    pub state: ShipmentState,
    pub current_owner: Identity,
    pub creator: Identity,
    /// Unix seconds at which the shipment was created.
    pub created_at: u64,
    pub transfers: Vec<Transfer>,
    /// blake3 checksum for integrity verification. `None` until first persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl Shipment {
    /// Compute the checksum over the record content (excluding the checksum field itself).
    pub(crate) fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    pub fn last_transfer(&self) -> Option<&Transfer> {
        self.transfers.last()
    }

    /// Creator first, then every distinct new owner in commit order.
    pub fn participants(&self) -> Vec<&Identity> {
        let mut seen: Vec<&Identity> = vec![&self.creator];
        for t in &self.transfers {
            if !seen.contains(&&t.new_owner) {
                seen.push(&t.new_owner);
            }
        }
        seen
    }

    pub fn involves(&self, identity: &Identity) -> bool {
        self.creator == *identity || self.transfers.iter().any(|t| t.new_owner == *identity)
    }

    /// Timestamp of the transfer that moved the shipment into `Delivered`,
    /// if it is currently delivered.
    pub fn delivered_at(&self) -> Option<u64> {
        if self.state != ShipmentState::Delivered {
            return None;
        }
        self.transfers
            .iter()
            .rev()
            .find(|t| t.new_state == ShipmentState::Delivered)
            .map(|t| t.timestamp)
    }
}
