use core::fmt;

use crate::types::ObjectType;
use crate::EncodeError;

/// Largest object instance number (22 bits).
pub const MAX_INSTANCE: u32 = 0x3F_FFFF;

/// A packed BACnet object identifier combining an [`ObjectType`] and a 22-bit
/// instance number into a single `u32`.
///
/// The upper 10 bits encode the object type and the lower 22 bits encode the
/// instance number, matching the BACnet wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(u32);

impl ObjectId {
    /// Creates an `ObjectId`, masking the instance to 22 bits.
    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self((((object_type.to_u16() as u32) & 0x03FF) << 22) | (instance & MAX_INSTANCE))
    }

    /// Creates an `ObjectId`, rejecting instances or types that do not fit.
    pub const fn try_new(object_type: ObjectType, instance: u32) -> Result<Self, EncodeError> {
        if instance > MAX_INSTANCE || object_type.to_u16() > 0x03FF {
            return Err(EncodeError::ValueOutOfRange);
        }
        Ok(Self::new(object_type, instance))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn object_type(self) -> ObjectType {
        ObjectType::from_u16(((self.0 >> 22) & 0x03FF) as u16)
    }

    pub const fn instance(self) -> u32 {
        self.0 & MAX_INSTANCE
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type(), self.instance())
    }
}

/// Instance number of a Device object, unique within its BACnet network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct DeviceInstance(u32);

impl DeviceInstance {
    pub const fn new(instance: u32) -> Result<Self, EncodeError> {
        if instance > MAX_INSTANCE {
            return Err(EncodeError::ValueOutOfRange);
        }
        Ok(Self(instance))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The Device object identifier for this instance.
    pub const fn object_id(self) -> ObjectId {
        ObjectId::new(ObjectType::Device, self.0)
    }

    /// Extracts the instance from a Device object identifier.
    pub fn from_object_id(id: ObjectId) -> Option<Self> {
        (id.object_type() == ObjectType::Device).then_some(Self(id.instance()))
    }
}

impl TryFrom<u32> for DeviceInstance {
    type Error = EncodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceInstance> for u32 {
    fn from(value: DeviceInstance) -> Self {
        value.0
    }
}

impl fmt::Display for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
