mod date_time;
mod enums;
mod object_id;
mod object_type;
mod property_id;
mod property_value;

pub use date_time::{Date, Time};
pub use enums::{ErrorClass, ErrorCode, Segmentation};
pub use object_id::{DeviceInstance, ObjectId, MAX_INSTANCE};
pub use object_type::ObjectType;
pub use property_id::PropertyId;
pub use property_value::{BitString, PropertyValue};
