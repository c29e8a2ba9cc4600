//! Update-section directives and their RFC 2136 section 2.5 encodings

use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;
use tracing::debug;

/// Update operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOperation {
    /// Add to an RRset - IN class
    Add {
        name: String,
        ttl: u32,
        rtype: DNSResourceType,
        rdata: Vec<u8>,
    },
    /// Delete an RRset - ANY class, type != ANY
    DeleteRRset {
        name: String,
        rtype: DNSResourceType,
    },
    /// Delete all RRsets at a name - ANY class, type = ANY
    DeleteName(String),
    /// Delete specific RR - NONE class
    DeleteRR {
        name: String,
        rtype: DNSResourceType,
        rdata: Vec<u8>,
    },
}

impl UpdateOperation {
    /// Add the RR carried by a translated resource
    pub fn add(rr: &DNSResource) -> Self {
        UpdateOperation::Add {
            name: owner(rr),
            ttl: rr.ttl,
            rtype: rr.rtype,
            rdata: rr.rdata.clone(),
        }
    }

    /// Delete every RR of the resource's name and type
    pub fn delete_rrset(rr: &DNSResource) -> Self {
        UpdateOperation::DeleteRRset {
            name: owner(rr),
            rtype: rr.rtype,
        }
    }

    /// Delete exactly the resource's RR, matched by value
    pub fn delete_rr(rr: &DNSResource) -> Self {
        UpdateOperation::DeleteRR {
            name: owner(rr),
            rtype: rr.rtype,
            rdata: rr.rdata.clone(),
        }
    }

    /// Encode as an update-section resource record
    pub fn to_resource(&self) -> DNSResource {
        let resource = match self {
            UpdateOperation::Add {
                name,
                ttl,
                rtype,
                rdata,
            } => DNSResource::new(name, *rtype, DNSResourceClass::IN, *ttl, rdata.clone()),
            UpdateOperation::DeleteRRset { name, rtype } => {
                DNSResource::new(name, *rtype, DNSResourceClass::ANY, 0, Vec::new())
            }
            UpdateOperation::DeleteName(name) => DNSResource::new(
                name,
                DNSResourceType::ANY,
                DNSResourceClass::ANY,
                0,
                Vec::new(),
            ),
            UpdateOperation::DeleteRR { name, rtype, rdata } => {
                DNSResource::new(name, *rtype, DNSResourceClass::NONE, 0, rdata.clone())
            }
        };
        debug!(
            "Encoded {:?} as class {:?} type {}",
            self, resource.rclass, resource.rtype
        );
        resource
    }
}

fn owner(rr: &DNSResource) -> String {
    crate::dns::common::labels_to_name(&rr.labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt() -> DNSResource {
        DNSResource::new(
            "example.org.",
            DNSResourceType::TXT,
            DNSResourceClass::IN,
            300,
            vec![2, b'v', b'1'],
        )
    }

    #[test]
    fn test_add_keeps_class_ttl_and_rdata() {
        let rr = UpdateOperation::add(&txt()).to_resource();
        assert_eq!(rr.rclass, DNSResourceClass::IN);
        assert_eq!(rr.ttl, 300);
        assert_eq!(rr.rdata, vec![2, b'v', b'1']);
    }

    #[test]
    fn test_delete_rrset_is_class_any_without_rdata() {
        let rr = UpdateOperation::delete_rrset(&txt()).to_resource();
        assert_eq!(rr.rclass, DNSResourceClass::ANY);
        assert_eq!(rr.rtype, DNSResourceType::TXT);
        assert_eq!(rr.ttl, 0);
        assert!(rr.rdata.is_empty());
    }

    #[test]
    fn test_delete_rr_is_class_none_with_zero_ttl() {
        let rr = UpdateOperation::delete_rr(&txt()).to_resource();
        assert_eq!(rr.rclass, DNSResourceClass::NONE);
        assert_eq!(rr.ttl, 0);
        assert_eq!(rr.rdata, vec![2, b'v', b'1']);
    }

    #[test]
    fn test_delete_name() {
        let rr = UpdateOperation::DeleteName("example.org.".to_string()).to_resource();
        assert_eq!(rr.rtype, DNSResourceType::ANY);
        assert_eq!(rr.rclass, DNSResourceClass::ANY);
    }
}
