use olebridge::{Activator, ForeignGuid, Guid, SimulatedPlatform, IID_IDISPATCH};
use proptest::prelude::*;

#[test]
fn test_dispatch_text_form() {
    assert_eq!(IID_IDISPATCH.to_string(), "00020400-0000-0000-C000-000000000046");
    assert_eq!(format!("{:?}", IID_IDISPATCH), "Guid(00020400-0000-0000-C000-000000000046)");
}

#[cfg(target_endian = "little")]
#[test]
fn test_foreign_memory_is_mixed_endian() {
    let id: Guid = "00112233-4455-6677-8899-AABBCCDDEEFF".parse().unwrap();
    let foreign = id.to_foreign();
    let bytes: [u8; 16] = unsafe { std::mem::transmute(foreign) };
    assert_eq!(
        bytes,
        [0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]
    );
}

#[test]
fn test_nil() {
    assert!(Guid::NIL.is_nil());
    assert_eq!(Guid::NIL.to_foreign(), ForeignGuid::default());
}

proptest! {
    #[test]
    fn prop_foreign_round_trip(bytes in prop::array::uniform16(any::<u8>())) {
        let id = Guid::from_bytes(bytes);
        prop_assert_eq!(Guid::from_foreign(&id.to_foreign()), id);
    }

    #[test]
    fn prop_foreign_fields_are_big_endian_reads(bytes in prop::array::uniform16(any::<u8>())) {
        let foreign = Guid::from_bytes(bytes).to_foreign();
        prop_assert_eq!(foreign.data1, u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        prop_assert_eq!(foreign.data2, u16::from_be_bytes([bytes[4], bytes[5]]));
        prop_assert_eq!(foreign.data3, u16::from_be_bytes([bytes[6], bytes[7]]));
        prop_assert_eq!(&foreign.data4[..], &bytes[8..]);
    }

    #[test]
    fn prop_text_round_trip(value in any::<u128>()) {
        let id = Guid::from_u128(value);
        let text = id.to_string();
        prop_assert_eq!(text.parse::<Guid>().unwrap(), id);
        prop_assert_eq!(text.to_lowercase().parse::<Guid>().unwrap(), id);
        prop_assert_eq!(format!("{{{}}}", text).parse::<Guid>().unwrap(), id);
    }

    #[test]
    fn prop_platform_parser_agrees(value in any::<u128>()) {
        let activator = Activator::new(SimulatedPlatform::new());
        let id = Guid::from_u128(value);
        let parsed = activator.iid_from_string(&format!("{{{}}}", id)).unwrap();
        prop_assert_eq!(parsed, id);
        prop_assert_eq!(activator.platform().live_strings(), 0);
    }
}
