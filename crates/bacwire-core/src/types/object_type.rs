use core::fmt;

/// BACnet object types this stack names.
///
/// Anything else round-trips through [`Proprietary`](Self::Proprietary),
/// which also carries reserved standard numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectType {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    Device,
    MultiStateInput,
    MultiStateOutput,
    MultiStateValue,
    Proprietary(u16),
}

impl ObjectType {
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::AnalogInput => 0,
            Self::AnalogOutput => 1,
            Self::AnalogValue => 2,
            Self::BinaryInput => 3,
            Self::BinaryOutput => 4,
            Self::BinaryValue => 5,
            Self::Device => 8,
            Self::MultiStateInput => 13,
            Self::MultiStateOutput => 14,
            Self::MultiStateValue => 19,
            Self::Proprietary(v) => v,
        }
    }

    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::AnalogInput,
            1 => Self::AnalogOutput,
            2 => Self::AnalogValue,
            3 => Self::BinaryInput,
            4 => Self::BinaryOutput,
            5 => Self::BinaryValue,
            8 => Self::Device,
            13 => Self::MultiStateInput,
            14 => Self::MultiStateOutput,
            19 => Self::MultiStateValue,
            v => Self::Proprietary(v),
        }
    }

    /// True for object types whose present value is commandable by priority.
    pub const fn is_commandable(self) -> bool {
        matches!(
            self,
            Self::AnalogOutput
                | Self::AnalogValue
                | Self::BinaryOutput
                | Self::BinaryValue
                | Self::MultiStateOutput
                | Self::MultiStateValue
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AnalogInput => "analog-input",
            Self::AnalogOutput => "analog-output",
            Self::AnalogValue => "analog-value",
            Self::BinaryInput => "binary-input",
            Self::BinaryOutput => "binary-output",
            Self::BinaryValue => "binary-value",
            Self::Device => "device",
            Self::MultiStateInput => "multi-state-input",
            Self::MultiStateOutput => "multi-state-output",
            Self::MultiStateValue => "multi-state-value",
            Self::Proprietary(v) => return write!(f, "object-type-{v}"),
        };
        f.write_str(name)
    }
}
