/// Segmentation capability advertised in I-Am.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Segmentation {
    SegmentedBoth = 0,
    SegmentedTransmit = 1,
    SegmentedReceive = 2,
    NoSegmentation = 3,
}

/// BACnet error class reported in Error PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorClass {
    Device = 0,
    Object = 1,
    Property = 2,
    Resources = 3,
    Security = 4,
    Services = 5,
    Vt = 6,
    Communication = 7,
}

/// The BACnet error codes a property client commonly meets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Other = 0,
    ConfigurationInProgress = 2,
    DeviceBusy = 3,
    InconsistentParameters = 7,
    InvalidDataType = 9,
    ServiceRequestDenied = 29,
    UnknownObject = 31,
    UnknownProperty = 32,
    ValueOutOfRange = 37,
    WriteAccessDenied = 40,
    PropertyIsNotAnArray = 50,
    InvalidArrayIndex = 42,
}

impl Segmentation {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::SegmentedBoth),
            1 => Some(Self::SegmentedTransmit),
            2 => Some(Self::SegmentedReceive),
            3 => Some(Self::NoSegmentation),
            _ => None,
        }
    }
}

impl ErrorClass {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Device),
            1 => Some(Self::Object),
            2 => Some(Self::Property),
            3 => Some(Self::Resources),
            4 => Some(Self::Security),
            5 => Some(Self::Services),
            6 => Some(Self::Vt),
            7 => Some(Self::Communication),
            _ => None,
        }
    }
}

impl ErrorCode {
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Other),
            2 => Some(Self::ConfigurationInProgress),
            3 => Some(Self::DeviceBusy),
            7 => Some(Self::InconsistentParameters),
            9 => Some(Self::InvalidDataType),
            29 => Some(Self::ServiceRequestDenied),
            31 => Some(Self::UnknownObject),
            32 => Some(Self::UnknownProperty),
            37 => Some(Self::ValueOutOfRange),
            40 => Some(Self::WriteAccessDenied),
            42 => Some(Self::InvalidArrayIndex),
            50 => Some(Self::PropertyIsNotAnArray),
            _ => None,
        }
    }
}
