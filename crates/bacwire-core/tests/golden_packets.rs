use bacwire_core::apdu::{AbortPdu, ErrorPdu, RejectPdu, SimpleAck};
use bacwire_core::npdu::NpduAddress;
use bacwire_core::services::{
    IAmRequest, ReadPropertyAck, ReadPropertyRequest, WhoIsRequest, WritePropertyRequest,
};
use bacwire_core::types::{
    ErrorClass, ErrorCode, ObjectId, ObjectType, PropertyId, PropertyValue, Segmentation,
};
use bacwire_core::{decode, encode, encode_routed, DecodeError, Pdu};

fn analog_value_1() -> ObjectId {
    ObjectId::new(ObjectType::AnalogValue, 1)
}

#[test]
fn who_is_global_frame_matches_fixture() {
    let bytes = encode(&Pdu::WhoIs(WhoIsRequest::global())).unwrap();
    assert_eq!(bytes, [0x01, 0x00, 0x10, 0x08]);
}

#[test]
fn who_is_range_frame_matches_fixture() {
    let bytes = encode(&Pdu::WhoIs(WhoIsRequest::range(1000, 1999).unwrap())).unwrap();
    assert_eq!(bytes, [0x01, 0x00, 0x10, 0x08, 0x0A, 0x03, 0xE8, 0x1A, 0x07, 0xCF]);
}

#[test]
fn i_am_frame_matches_fixture() {
    let bytes = encode(&Pdu::IAm(IAmRequest {
        device_id: ObjectId::new(ObjectType::Device, 1234),
        max_apdu: 1476,
        segmentation: Segmentation::NoSegmentation,
        vendor_id: 260,
    }))
    .unwrap();
    assert_eq!(
        bytes,
        [
            0x01, 0x00, 0x10, 0x00, 0xC4, 0x02, 0x00, 0x04, 0xD2, 0x22, 0x05, 0xC4, 0x91, 0x03,
            0x22, 0x01, 0x04,
        ]
    );
}

#[test]
fn read_property_frame_matches_fixture() {
    let bytes = encode(&Pdu::ReadProperty(ReadPropertyRequest {
        object_id: ObjectId::new(ObjectType::Device, 123),
        property_id: PropertyId::ObjectName,
        array_index: None,
        invoke_id: 1,
    }))
    .unwrap();
    assert_eq!(
        bytes,
        [0x01, 0x04, 0x00, 0x05, 0x01, 0x0C, 0x0C, 0x02, 0x00, 0x00, 0x7B, 0x19, 0x4D]
    );
}

#[test]
fn read_property_with_array_index_frame_matches_fixture() {
    let bytes = encode(&Pdu::ReadProperty(ReadPropertyRequest {
        object_id: analog_value_1(),
        property_id: PropertyId::PriorityArray,
        array_index: Some(8),
        invoke_id: 2,
    }))
    .unwrap();
    assert_eq!(
        bytes,
        [0x01, 0x04, 0x00, 0x05, 0x02, 0x0C, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x57, 0x29, 0x08]
    );
}

#[test]
fn write_property_frame_matches_fixture() {
    let bytes = encode(&Pdu::WriteProperty(WritePropertyRequest {
        object_id: analog_value_1(),
        property_id: PropertyId::PresentValue,
        array_index: None,
        value: PropertyValue::Real(75.5),
        priority: Some(8),
        invoke_id: 5,
    }))
    .unwrap();
    assert_eq!(
        bytes,
        [
            0x01, 0x04, 0x00, 0x05, 0x05, 0x0F, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E,
            0x44, 0x42, 0x97, 0x00, 0x00, 0x3F, 0x49, 0x08,
        ]
    );
}

#[test]
fn write_property_null_relinquishes_without_priority() {
    let bytes = encode(&Pdu::WriteProperty(WritePropertyRequest {
        object_id: analog_value_1(),
        property_id: PropertyId::PresentValue,
        array_index: None,
        value: PropertyValue::Null,
        priority: None,
        invoke_id: 6,
    }))
    .unwrap();
    assert_eq!(
        bytes,
        [0x01, 0x04, 0x00, 0x05, 0x06, 0x0F, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E, 0x00, 0x3F]
    );
}

#[test]
fn read_property_ack_decodes_real_value() {
    let bytes = [
        0x01, 0x00, 0x30, 0x05, 0x0C, 0x0C, 0x00, 0x80, 0x00, 0x01, 0x19, 0x55, 0x3E, 0x44, 0x42,
        0x28, 0x00, 0x00, 0x3F,
    ];
    let frame = decode(&bytes).unwrap();
    assert_eq!(
        frame.pdu,
        Pdu::ReadPropertyAck(ReadPropertyAck {
            invoke_id: 5,
            object_id: analog_value_1(),
            property_id: PropertyId::PresentValue,
            array_index: None,
            value: PropertyValue::Real(42.0),
        })
    );
}

#[test]
fn read_property_ack_with_object_list_decodes_sequence() {
    let bytes = [
        0x01, 0x00, 0x30, 0x01, 0x0C, 0x0C, 0x02, 0x00, 0x04, 0xD2, 0x19, 0x4C, 0x3E, 0xC4, 0x02,
        0x00, 0x04, 0xD2, 0xC4, 0x00, 0x80, 0x00, 0x01, 0x3F,
    ];
    let Pdu::ReadPropertyAck(ack) = decode(&bytes).unwrap().pdu else {
        panic!("expected ReadProperty ack");
    };
    assert_eq!(
        ack.value,
        PropertyValue::Sequence(vec![
            PropertyValue::ObjectId(ObjectId::new(ObjectType::Device, 1234)),
            PropertyValue::ObjectId(analog_value_1()),
        ])
    );
}

#[test]
fn response_pdus_match_fixtures() {
    let cases = [
        (
            Pdu::SimpleAck(SimpleAck {
                invoke_id: 5,
                service_choice: 0x0F,
            }),
            vec![0x01, 0x00, 0x20, 0x05, 0x0F],
        ),
        (
            Pdu::Error(ErrorPdu {
                invoke_id: 3,
                service_choice: 0x0C,
                error_class: ErrorClass::Object.to_u32(),
                error_code: ErrorCode::UnknownObject.to_u32(),
            }),
            vec![0x01, 0x00, 0x50, 0x03, 0x0C, 0x91, 0x01, 0x91, 0x1F],
        ),
        (
            Pdu::Reject(RejectPdu {
                invoke_id: 7,
                reason: 9,
            }),
            vec![0x01, 0x00, 0x60, 0x07, 0x09],
        ),
        (
            Pdu::Abort(AbortPdu {
                invoke_id: 8,
                reason: 4,
                server: true,
            }),
            vec![0x01, 0x00, 0x71, 0x08, 0x04],
        ),
    ];
    for (pdu, expected) in cases {
        assert_eq!(encode(&pdu).unwrap(), expected);
        assert_eq!(decode(&expected).unwrap().pdu, pdu);
    }
}

#[test]
fn routed_who_is_carries_destination() {
    let dest = NpduAddress::new(0xFFFF, &[]).unwrap();
    let bytes = encode_routed(&Pdu::WhoIs(WhoIsRequest::global()), Some(dest)).unwrap();
    assert_eq!(bytes, [0x01, 0x20, 0xFF, 0xFF, 0x00, 0xFF, 0x10, 0x08]);
}

#[test]
fn oversized_character_string_does_not_fit() {
    let pdu = Pdu::WriteProperty(WritePropertyRequest {
        object_id: analog_value_1(),
        property_id: PropertyId::Description,
        array_index: None,
        value: PropertyValue::CharacterString("x".repeat(2000)),
        priority: None,
        invoke_id: 1,
    });
    assert!(encode(&pdu).is_err());
}

#[test]
fn declared_length_past_end_is_truncated() {
    // Character string tag claims 20 octets; only 3 follow.
    let bytes = [
        0x01, 0x00, 0x30, 0x01, 0x0C, 0x0C, 0x02, 0x00, 0x04, 0xD2, 0x19, 0x4D, 0x3E, 0x75, 0x14,
        0x00, 0x41, 0x42,
    ];
    assert_eq!(decode(&bytes), Err(DecodeError::Truncated));
}
