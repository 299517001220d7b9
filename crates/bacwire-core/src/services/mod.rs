pub mod i_am;
pub mod read_property;
pub mod value_codec;
pub mod who_is;
pub mod write_property;

pub use i_am::{IAmRequest, SERVICE_I_AM};
pub use read_property::{ReadPropertyAck, ReadPropertyRequest, SERVICE_READ_PROPERTY};
pub use who_is::{WhoIsRequest, SERVICE_WHO_IS};
pub use write_property::{WritePropertyRequest, SERVICE_WRITE_PROPERTY};
