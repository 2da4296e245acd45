//! Vocabulary - Closed Entity and Commodity Types
//!
//! The set of entity types and commodity types is fixed by the monitoring SDK.
//! Templates name them as SCREAMING_SNAKE_CASE strings; everything past the
//! resolver works with the typed tokens below.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Returned when a name is not a member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken(pub String);

impl fmt::Display for UnknownToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown token `{}`", self.0)
    }
}

macro_rules! closed_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownToken;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownToken(other.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_vocabulary! {
    /// Kinds of discoverable resources.
    EntityType {
        Application => "APPLICATION",
        ApplicationComponent => "APPLICATION_COMPONENT",
        ApplicationServer => "APPLICATION_SERVER",
        BusinessApplication => "BUSINESS_APPLICATION",
        BusinessTransaction => "BUSINESS_TRANSACTION",
        BusinessUser => "BUSINESS_USER",
        Container => "CONTAINER",
        ContainerPod => "CONTAINER_POD",
        ContainerSpec => "CONTAINER_SPEC",
        Database => "DATABASE",
        DatabaseServer => "DATABASE_SERVER",
        Datacenter => "DATACENTER",
        DesktopPool => "DESKTOP_POOL",
        DiskArray => "DISK_ARRAY",
        Ip => "IP",
        Namespace => "NAMESPACE",
        Network => "NETWORK",
        PhysicalMachine => "PHYSICAL_MACHINE",
        Service => "SERVICE",
        Storage => "STORAGE",
        VirtualApplication => "VIRTUAL_APPLICATION",
        VirtualDatacenter => "VIRTUAL_DATACENTER",
        VirtualMachine => "VIRTUAL_MACHINE",
        WorkloadController => "WORKLOAD_CONTROLLER",
    }
}

closed_vocabulary! {
    /// Measurable resources exchanged between entities.
    CommodityType {
        Application => "APPLICATION",
        Ballooning => "BALLOONING",
        CollectionTime => "COLLECTION_TIME",
        Connection => "CONNECTION",
        Cpu => "CPU",
        CpuAllocation => "CPU_ALLOCATION",
        DbCacheHitRate => "DB_CACHE_HIT_RATE",
        DbMem => "DB_MEM",
        Heap => "HEAP",
        IoThroughput => "IO_THROUGHPUT",
        Kpi => "KPI",
        Mem => "MEM",
        MemAllocation => "MEM_ALLOCATION",
        NetThroughput => "NET_THROUGHPUT",
        RemainingGcCapacity => "REMAINING_GC_CAPACITY",
        ResponseTime => "RESPONSE_TIME",
        StorageAccess => "STORAGE_ACCESS",
        StorageAmount => "STORAGE_AMOUNT",
        Swapping => "SWAPPING",
        Threads => "THREADS",
        Transaction => "TRANSACTION",
        TransactionLog => "TRANSACTION_LOG",
        Vcpu => "VCPU",
        VcpuRequest => "VCPU_REQUEST",
        Vmem => "VMEM",
        VmemRequest => "VMEM_REQUEST",
        Vstorage => "VSTORAGE",
    }
}

closed_vocabulary! {
    /// Relationship labels between a buyer and its provider.
    Relationship {
        Hosting => "HOSTING",
        LayeredOver => "LAYERED_OVER",
    }
}

closed_vocabulary! {
    /// Template precedence class. Metadata only.
    TemplateKind {
        Base => "BASE",
        Extension => "EXTENSION",
    }
}

impl Relationship {
    /// The containment relation that drives property and commodity inheritance.
    pub fn is_hosting(&self) -> bool {
        matches!(self, Relationship::Hosting)
    }
}

/// Read-only lookup of names against the closed vocabularies.
///
/// The compiler never defines types itself; it only asks the vocabulary
/// whether a name is known.
pub trait Vocabulary {
    fn entity_type(&self, name: &str) -> Option<EntityType>;
    fn commodity_type(&self, name: &str) -> Option<CommodityType>;
}

/// The full SDK vocabulary: every declared entity and commodity type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkVocabulary;

impl Vocabulary for SdkVocabulary {
    fn entity_type(&self, name: &str) -> Option<EntityType> {
        name.parse().ok()
    }

    fn commodity_type(&self, name: &str) -> Option<CommodityType> {
        name.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("VIRTUAL_MACHINE".parse::<EntityType>(), Ok(EntityType::VirtualMachine));
        assert_eq!("VCPU".parse::<CommodityType>(), Ok(CommodityType::Vcpu));
        assert_eq!("HOSTING".parse::<Relationship>(), Ok(Relationship::Hosting));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = "APP_COMPONENT".parse::<EntityType>().unwrap_err();
        assert_eq!(err, UnknownToken("APP_COMPONENT".to_string()));
        assert!(SdkVocabulary.commodity_type("INVALID_COMM").is_none());
    }

    #[test]
    fn test_labels_round_trip() {
        for entity in EntityType::ALL {
            assert_eq!(entity.as_str().parse::<EntityType>().unwrap(), *entity);
        }
        for comm in CommodityType::ALL {
            assert_eq!(comm.as_str().parse::<CommodityType>().unwrap(), *comm);
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&EntityType::ApplicationComponent).unwrap();
        assert_eq!(json, r#""APPLICATION_COMPONENT""#);
        let back: CommodityType = serde_json::from_str(r#""RESPONSE_TIME""#).unwrap();
        assert_eq!(back, CommodityType::ResponseTime);
        assert!(serde_json::from_str::<Relationship>(r#""CONTAINS""#).is_err());
    }
}
