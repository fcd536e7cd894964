use olebridge::config::BridgeConfig;
use olebridge::interop::InterfaceOutcome;
use olebridge::{
    Activator, ClsCtx, Guid, HResult, ObjectKind, OleError, ServerTarget, SimulatedPlatform, IID_IDISPATCH,
    IID_IUNKNOWN,
};

const CLASS: Guid = Guid::from_u128(0x0002DF01_0000_0000_C000_000000000046);
const IID_A: Guid = Guid::from_u128(0xA0000000_0000_0000_0000_00000000000A);
const IID_B: Guid = Guid::from_u128(0xB0000000_0000_0000_0000_00000000000B);
const IID_C: Guid = Guid::from_u128(0xC0000000_0000_0000_0000_00000000000C);

fn activator() -> Activator<SimulatedPlatform> {
    let platform = SimulatedPlatform::new();
    platform.register_class(CLASS, &[IID_A, IID_C, IID_IDISPATCH]);
    Activator::new(platform)
}

#[test]
fn test_records_follow_request_order() {
    let activator = activator();
    let results = activator
        .activate_multi(&CLASS, &[IID_A, IID_B, IID_C], &ServerTarget::Local)
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].iid, IID_A);
    assert_eq!(results[1].iid, IID_B);
    assert_eq!(results[2].iid, IID_C);

    assert!(results[0].is_ok());
    assert_eq!(results[1].status, HResult::E_NOINTERFACE);
    assert!(results[1].interface.is_none());
    assert!(results[2].is_ok());

    let calls = activator.platform().activation_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].interfaces, vec![IID_A, IID_B, IID_C]);

    for result in results {
        if let Some(interface) = result.interface {
            interface.release();
        }
    }
}

#[test]
fn test_each_interface_carries_one_reference() {
    let activator = activator();
    let results = activator
        .activate_multi(&CLASS, &[IID_A, IID_C, IID_IUNKNOWN], &ServerTarget::Local)
        .unwrap();

    let object = activator.platform().created_objects().pop().unwrap();
    assert_eq!(object.ref_count(), 3);

    for result in results {
        let interface = result.into_result().unwrap();
        assert!(object.is(interface.as_raw()));
        interface.release();
    }
    assert_eq!(object.ref_count(), 0);
    assert!(!object.over_released());
}

#[test]
fn test_call_level_failure() {
    let activator = activator();
    activator
        .platform()
        .fail_activation(Some(HResult::RPC_S_SERVER_UNAVAILABLE));

    match activator.activate_multi(&CLASS, &[IID_A], &ServerTarget::from_host("far-away")) {
        Err(OleError::ActivationFailed { hr }) => assert_eq!(hr, HResult::RPC_S_SERVER_UNAVAILABLE),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(activator.platform().live_strings(), 0);
}

#[test]
fn test_informational_status_releases_filled_records() {
    let activator = activator();
    activator
        .platform()
        .report_activation_status(Some(HResult::CO_S_NOTALLINTERFACES));

    match activator.activate_multi(&CLASS, &[IID_A, IID_B, IID_C], &ServerTarget::Local) {
        Err(OleError::ActivationFailed { hr }) => assert_eq!(hr, HResult::CO_S_NOTALLINTERFACES),
        other => panic!("unexpected {:?}", other),
    }

    // Records A and C held references when the call returned
    let object = activator.platform().created_objects().pop().unwrap();
    assert_eq!(object.ref_count(), 0);
    assert!(!object.over_released());
}

#[test]
fn test_unregistered_class_fails_whole_call() {
    let activator = activator();
    let other = Guid::from_u128(0xDEAD);
    match activator.create_local(&other, &IID_IUNKNOWN) {
        Err(OleError::ActivationFailed { hr }) => assert_eq!(hr, HResult::REGDB_E_CLASSNOTREG),
        result => panic!("unexpected {:?}", result),
    }
}

#[test]
fn test_success_with_null_is_creation_failure() {
    let activator = activator();
    activator
        .platform()
        .set_interface_outcome(CLASS, IID_A, InterfaceOutcome::NullSuccess);

    assert!(matches!(
        activator.create_local(&CLASS, &IID_A),
        Err(OleError::CreationFailed)
    ));
}

#[test]
fn test_record_failure_surfaces_status() {
    let activator = activator();
    activator
        .platform()
        .set_interface_outcome(CLASS, IID_C, InterfaceOutcome::Fail(HResult::E_ACCESSDENIED));

    match activator.create_remote("app-server", &CLASS, &IID_C) {
        Err(OleError::InterfaceRequestFailed { iid, hr }) => {
            assert_eq!(iid, IID_C);
            assert_eq!(hr, HResult::E_ACCESSDENIED);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_remote_activation_passes_host() {
    let activator = activator();
    let interface = activator.create_remote("app-server", &CLASS, &IID_A).unwrap();

    let call = activator.platform().activation_calls().pop().unwrap();
    assert_eq!(call.context, ClsCtx::REMOTE_SERVER);
    assert_eq!(call.host.as_deref(), Some("app-server"));
    assert_eq!(call.class, CLASS);

    // The host name lives only for the call
    assert_eq!(activator.platform().live_strings(), 0);
    interface.release();
}

#[test]
fn test_empty_host_is_local() {
    let activator = activator();
    let interface = activator.create_remote("", &CLASS, &IID_A).unwrap();

    let call = activator.platform().activation_calls().pop().unwrap();
    assert_eq!(call.context, ClsCtx::SERVER);
    assert_eq!(call.host, None);
    interface.release();
}

#[test]
fn test_host_allocation_failure_skips_call() {
    let activator = activator();
    activator.platform().fail_string_allocation(true);

    assert!(matches!(
        activator.create_remote("host", &CLASS, &IID_A),
        Err(OleError::ForeignAllocationFailed)
    ));
    assert!(activator.platform().activation_calls().is_empty());
}

#[test]
fn test_dispatch_kind() {
    let activator = activator();
    let interface = activator.create_local(&CLASS, &IID_IDISPATCH).unwrap();
    assert_eq!(interface.kind(), ObjectKind::Dispatch);
    interface.release();
}

#[test]
fn test_query_interface_on_activated_object() {
    let activator = activator();
    let unknown = activator.create_local(&CLASS, &IID_IUNKNOWN).unwrap();
    let a = unknown.query_interface(&IID_A).unwrap();
    assert!(matches!(
        unknown.query_interface(&IID_B),
        Err(OleError::InterfaceRequestFailed { .. })
    ));

    let object = activator.platform().created_objects().pop().unwrap();
    assert_eq!(object.ref_count(), 2);
    a.release();
    unknown.release();
    assert_eq!(object.ref_count(), 0);
}

#[test]
fn test_default_target_from_config() {
    let config = BridgeConfig::parse("[activation]\ndefault_host = \"batch01\"\n").unwrap();
    let activator = activator().with_default_target(config.activation.target());

    let interface = activator.create(&CLASS, &IID_A).unwrap();
    let call = activator.platform().activation_calls().pop().unwrap();
    assert_eq!(call.host.as_deref(), Some("batch01"));
    interface.release();
}
