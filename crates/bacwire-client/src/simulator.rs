//! Lightweight simulated BACnet device.
//!
//! [`SimulatedDevice`] answers Who-Is, ReadProperty and WriteProperty over any
//! [`DataLink`]. It only ever replies; nothing is sent unsolicited. Useful for
//! tests and for development without hardware.

use crate::ClientError;
use bacwire_core::apdu::{ErrorPdu, SimpleAck};
use bacwire_core::services::{
    IAmRequest, ReadPropertyAck, ReadPropertyRequest, WritePropertyRequest,
    SERVICE_READ_PROPERTY, SERVICE_WRITE_PROPERTY,
};
use bacwire_core::types::{
    DeviceInstance, ErrorClass, ErrorCode, ObjectId, ObjectType, PropertyId, PropertyValue,
    Segmentation,
};
use bacwire_core::{decode, encode_routed, DecodeError, Pdu};
use bacwire_datalink::{Address, DataLink, DataLinkError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const SIM_MAX_APDU: u32 = 1476;
const SIM_VENDOR_ID: u16 = 999;

/// Property table of one simulated object.
pub type Properties = HashMap<PropertyId, PropertyValue>;

/// A simulated BACnet device with one Device object and any number of
/// additional objects.
pub struct SimulatedDevice<D: DataLink> {
    instance: DeviceInstance,
    objects: RwLock<HashMap<ObjectId, Properties>>,
    datalink: Arc<D>,
}

impl<D: DataLink> SimulatedDevice<D> {
    pub fn new(instance: DeviceInstance, datalink: Arc<D>) -> Self {
        let device_id = instance.object_id();
        let mut device = Properties::new();
        device.insert(PropertyId::ObjectIdentifier, PropertyValue::ObjectId(device_id));
        device.insert(
            PropertyId::ObjectName,
            PropertyValue::CharacterString(format!("SimDevice-{instance}")),
        );
        device.insert(
            PropertyId::ObjectType,
            PropertyValue::Enumerated(u32::from(ObjectType::Device.to_u16())),
        );
        device.insert(
            PropertyId::VendorName,
            PropertyValue::CharacterString("bacwire".into()),
        );
        device.insert(
            PropertyId::VendorIdentifier,
            PropertyValue::Unsigned(u32::from(SIM_VENDOR_ID)),
        );
        device.insert(
            PropertyId::ModelName,
            PropertyValue::CharacterString("SimulatedDevice".into()),
        );
        device.insert(
            PropertyId::Description,
            PropertyValue::CharacterString("bacwire simulated device".into()),
        );
        device.insert(
            PropertyId::ObjectList,
            PropertyValue::Sequence(vec![PropertyValue::ObjectId(device_id)]),
        );

        let mut objects = HashMap::new();
        objects.insert(device_id, device);
        Self {
            instance,
            objects: RwLock::new(objects),
            datalink,
        }
    }

    pub fn instance(&self) -> DeviceInstance {
        self.instance
    }

    pub fn datalink(&self) -> &Arc<D> {
        &self.datalink
    }

    /// Adds (or replaces) an object and lists it in the Device object.
    pub async fn add_object(&self, id: ObjectId, properties: Properties) {
        let mut objects = self.objects.write().await;
        objects.insert(id, properties);
        let device_id = self.instance.object_id();
        let mut ids: Vec<ObjectId> = objects.keys().copied().collect();
        ids.sort_by_key(|id| (*id != device_id, id.raw()));
        let list = ids.into_iter().map(PropertyValue::ObjectId).collect();
        if let Some(device) = objects.get_mut(&device_id) {
            device.insert(PropertyId::ObjectList, PropertyValue::Sequence(list));
        }
    }

    /// Adds an AnalogValue object with the usual required properties.
    pub async fn add_analog_value(&self, instance: u32, name: &str, present_value: f32) -> ObjectId {
        let id = ObjectId::new(ObjectType::AnalogValue, instance);
        let mut properties = Properties::new();
        properties.insert(PropertyId::ObjectIdentifier, PropertyValue::ObjectId(id));
        properties.insert(PropertyId::ObjectName, PropertyValue::CharacterString(name.into()));
        properties.insert(
            PropertyId::ObjectType,
            PropertyValue::Enumerated(u32::from(ObjectType::AnalogValue.to_u16())),
        );
        properties.insert(PropertyId::PresentValue, PropertyValue::Real(present_value));
        properties.insert(PropertyId::OutOfService, PropertyValue::Boolean(false));
        // 95 = no-units
        properties.insert(PropertyId::Units, PropertyValue::Enumerated(95));
        self.add_object(id, properties).await;
        id
    }

    /// Current value of a property, as a client would read it.
    pub async fn property(&self, object_id: ObjectId, property_id: PropertyId) -> Option<PropertyValue> {
        self.objects
            .read()
            .await
            .get(&object_id)
            .and_then(|props| props.get(&property_id))
            .cloned()
    }

    /// Answers requests until the link is closed. A bad datagram is logged
    /// and skipped.
    pub async fn run(&self) -> Result<(), ClientError> {
        let mut buf = [0u8; 1500];
        loop {
            let (n, source) = match self.datalink.recv(&mut buf).await {
                Ok(received) => received,
                Err(DataLinkError::NotOpen) => return Ok(()),
                Err(err) => {
                    log::warn!("simulator: receive error: {err}");
                    continue;
                }
            };
            if let Err(e) = self.handle_frame(&buf[..n], source).await {
                log::debug!("simulator: error handling frame from {source}: {e}");
            }
        }
    }

    /// Handles one received NPDU, replying where the request calls for it.
    pub async fn handle_frame(&self, frame: &[u8], source: Address) -> Result<(), ClientError> {
        let parsed = match decode(frame) {
            Ok(parsed) => parsed,
            Err(DecodeError::Unsupported) => return Ok(()),
            Err(e) => {
                log::debug!("simulator: undecodable frame from {source}: {e}");
                return Ok(());
            }
        };
        let reply = match parsed.pdu {
            Pdu::WhoIs(who_is) if who_is.matches(self.instance.get()) => {
                Pdu::IAm(IAmRequest {
                    device_id: self.instance.object_id(),
                    max_apdu: SIM_MAX_APDU,
                    segmentation: Segmentation::NoSegmentation,
                    vendor_id: SIM_VENDOR_ID,
                })
            }
            Pdu::ReadProperty(req) => self.read_property(&req).await,
            Pdu::WriteProperty(req) => self.write_property(req).await,
            _ => return Ok(()),
        };

        let bytes = encode_routed(&reply, parsed.source)?;
        self.datalink.send(&source, &bytes).await?;
        Ok(())
    }

    async fn read_property(&self, req: &ReadPropertyRequest) -> Pdu {
        let objects = self.objects.read().await;
        let Some(props) = objects.get(&req.object_id) else {
            return error_pdu(
                req.invoke_id,
                SERVICE_READ_PROPERTY,
                ErrorClass::Object,
                ErrorCode::UnknownObject,
            );
        };
        let Some(value) = props.get(&req.property_id) else {
            return error_pdu(
                req.invoke_id,
                SERVICE_READ_PROPERTY,
                ErrorClass::Property,
                ErrorCode::UnknownProperty,
            );
        };
        let value = match (req.array_index, value) {
            (None, value) => value.clone(),
            (Some(0), PropertyValue::Sequence(items)) => {
                PropertyValue::Unsigned(items.len() as u32)
            }
            (Some(index), PropertyValue::Sequence(items)) => {
                match items.get(index as usize - 1) {
                    Some(item) => item.clone(),
                    None => {
                        return error_pdu(
                            req.invoke_id,
                            SERVICE_READ_PROPERTY,
                            ErrorClass::Property,
                            ErrorCode::InvalidArrayIndex,
                        )
                    }
                }
            }
            (Some(_), _) => {
                return error_pdu(
                    req.invoke_id,
                    SERVICE_READ_PROPERTY,
                    ErrorClass::Property,
                    ErrorCode::PropertyIsNotAnArray,
                )
            }
        };
        Pdu::ReadPropertyAck(ReadPropertyAck {
            invoke_id: req.invoke_id,
            object_id: req.object_id,
            property_id: req.property_id,
            array_index: req.array_index,
            value,
        })
    }

    async fn write_property(&self, req: WritePropertyRequest) -> Pdu {
        let mut objects = self.objects.write().await;
        let Some(props) = objects.get_mut(&req.object_id) else {
            return error_pdu(
                req.invoke_id,
                SERVICE_WRITE_PROPERTY,
                ErrorClass::Property,
                ErrorCode::WriteAccessDenied,
            );
        };
        let Some(current) = props.get_mut(&req.property_id) else {
            return error_pdu(
                req.invoke_id,
                SERVICE_WRITE_PROPERTY,
                ErrorClass::Property,
                ErrorCode::UnknownProperty,
            );
        };
        let target = match req.array_index {
            None => current,
            Some(index) => {
                let PropertyValue::Sequence(items) = current else {
                    return error_pdu(
                        req.invoke_id,
                        SERVICE_WRITE_PROPERTY,
                        ErrorClass::Property,
                        ErrorCode::PropertyIsNotAnArray,
                    );
                };
                // Index 0 is the array length, which is read-only here.
                if index == 0 {
                    return error_pdu(
                        req.invoke_id,
                        SERVICE_WRITE_PROPERTY,
                        ErrorClass::Property,
                        ErrorCode::WriteAccessDenied,
                    );
                }
                match items.get_mut(index as usize - 1) {
                    Some(item) => item,
                    None => {
                        return error_pdu(
                            req.invoke_id,
                            SERVICE_WRITE_PROPERTY,
                            ErrorClass::Property,
                            ErrorCode::InvalidArrayIndex,
                        )
                    }
                }
            }
        };
        log::debug!(
            "simulator: {} {:?} <- {} (priority {:?})",
            req.object_id,
            req.property_id,
            req.value,
            req.priority
        );
        *target = req.value;
        Pdu::SimpleAck(SimpleAck {
            invoke_id: req.invoke_id,
            service_choice: SERVICE_WRITE_PROPERTY,
        })
    }
}

fn error_pdu(invoke_id: u8, service_choice: u8, class: ErrorClass, code: ErrorCode) -> Pdu {
    Pdu::Error(ErrorPdu {
        invoke_id,
        service_choice,
        error_class: class.to_u32(),
        error_code: code.to_u32(),
    })
}

impl<D: DataLink> std::fmt::Debug for SimulatedDevice<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}
