//! RFC 2136 Dynamic DNS Update message construction
//!
//! This module builds the update transactions the provider sends:
//! - one transaction per record, so a failure affects a single record
//! - append, delete-by-value and replace semantics
//! - TSIG signing of the resulting messages (see [`tsig`])

use crate::dns::common::fqdn;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::header::DNSHeader;
use crate::dns::question::DNSQuestion;
use crate::dns::{DNSPacket, Opcode};
use crate::error::Result;
use crate::record::{OwnerScope, Record, to_wire};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub mod operations;
pub mod tsig;

pub use operations::UpdateOperation;
pub use tsig::{TsigAlgorithm, TsigError, TsigKey, TsigSigner};

/// How a record is applied to its RRset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Insert the RR, leaving any existing RRs of the set in place
    Append,
    /// Remove the RR matching name, type and value
    Delete,
    /// Replace the whole RRset with this single RR
    Set,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Append => f.write_str("append"),
            UpdateMode::Delete => f.write_str("delete"),
            UpdateMode::Set => f.write_str("set"),
        }
    }
}

/// One UPDATE message worth of changes to a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTransaction {
    pub zone: String,
    /// Deletions, sent ahead of the insertions
    pub removals: Vec<UpdateOperation>,
    pub insertions: Vec<UpdateOperation>,
}

impl UpdateTransaction {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: fqdn(zone),
            removals: Vec::new(),
            insertions: Vec::new(),
        }
    }

    /// Build the UPDATE message: zone section `zone SOA IN`, no prerequisites,
    /// removals then insertions in the update section
    pub fn to_packet(&self) -> DNSPacket {
        let header = DNSHeader {
            id: rand::random::<u16>(),
            opcode: Opcode::UPDATE as u8,
            ..Default::default()
        };

        let authorities = self
            .removals
            .iter()
            .chain(self.insertions.iter())
            .map(UpdateOperation::to_resource)
            .collect();

        DNSPacket {
            header,
            questions: vec![DNSQuestion::new(
                &self.zone,
                DNSResourceType::SOA,
                DNSResourceClass::IN,
            )],
            answers: Vec::new(),
            authorities,
            resources: Vec::new(),
        }
    }
}

/// Build the transaction applying `record` to `zone` with the given mode
pub fn build_transaction(
    zone: &str,
    record: &Record,
    mode: UpdateMode,
    scope: OwnerScope,
) -> Result<UpdateTransaction> {
    let rr = to_wire(zone, record, scope)?;
    let mut transaction = UpdateTransaction::new(zone);

    match mode {
        UpdateMode::Append => transaction.insertions.push(UpdateOperation::add(&rr)),
        UpdateMode::Delete => transaction.removals.push(UpdateOperation::delete_rr(&rr)),
        UpdateMode::Set => {
            transaction.removals.push(UpdateOperation::delete_rrset(&rr));
            transaction.insertions.push(UpdateOperation::add(&rr));
        }
    }

    debug!(
        "Built {} transaction for {} in zone {}: {} removals, {} insertions",
        mode,
        record,
        transaction.zone,
        transaction.removals.len(),
        transaction.insertions.len()
    );
    Ok(transaction)
}
