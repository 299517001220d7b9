/// BACnet property identifiers used by discovery, device info and point access.
///
/// Unlisted identifiers use [`Proprietary`](Self::Proprietary) so any number
/// survives a decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyId {
    ApplicationSoftwareVersion,
    Description,
    FirmwareRevision,
    ModelName,
    ObjectIdentifier,
    ObjectList,
    ObjectName,
    ObjectType,
    OutOfService,
    PresentValue,
    PriorityArray,
    RelinquishDefault,
    StatusFlags,
    Units,
    VendorIdentifier,
    VendorName,
    Proprietary(u32),
}

impl PropertyId {
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::ApplicationSoftwareVersion => 12,
            Self::Description => 28,
            Self::FirmwareRevision => 44,
            Self::ModelName => 70,
            Self::ObjectIdentifier => 75,
            Self::ObjectList => 76,
            Self::ObjectName => 77,
            Self::ObjectType => 79,
            Self::OutOfService => 81,
            Self::PresentValue => 85,
            Self::PriorityArray => 87,
            Self::RelinquishDefault => 104,
            Self::StatusFlags => 111,
            Self::Units => 117,
            Self::VendorIdentifier => 120,
            Self::VendorName => 121,
            Self::Proprietary(v) => v,
        }
    }

    pub const fn from_u32(value: u32) -> Self {
        match value {
            12 => Self::ApplicationSoftwareVersion,
            28 => Self::Description,
            44 => Self::FirmwareRevision,
            70 => Self::ModelName,
            75 => Self::ObjectIdentifier,
            76 => Self::ObjectList,
            77 => Self::ObjectName,
            79 => Self::ObjectType,
            81 => Self::OutOfService,
            85 => Self::PresentValue,
            87 => Self::PriorityArray,
            104 => Self::RelinquishDefault,
            111 => Self::StatusFlags,
            117 => Self::Units,
            120 => Self::VendorIdentifier,
            121 => Self::VendorName,
            v => Self::Proprietary(v),
        }
    }
}
