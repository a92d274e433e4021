use std::time::Duration;

use mdc_core::{
    ConState, DisconnectInfo, DisconnectionReason, ErrorKind, IpFamily, MdcConfig, MdcError,
    PdpType, Profile,
};

mod common;
use common::seeded_radio::{test_apn, SeededRadio, NB_PROFILE};

const IPV4_ADDR: &str = "192.168.1.100";
const IPV4_DNS1: &str = "10.40.50.60.1";
const IPV4_DNS2: &str = "10.40.50.60.2";
const IPV4_GW: &str = "192.168.100.123";
const IPV6_ADDR: &str = "2001:0000:3238:DFE1:63::FEFB";
const IPV6_DNS1: &str = "2001:4860:4860::8888";
const IPV6_DNS2: &str = "2001:4860:4860::8844";
const IPV6_GW: &str = "2001:CDBA:0:0:0:0:3257:9652";

fn assert_fault<T: std::fmt::Debug>(result: Result<T, MdcError>, what: &str) {
    match result {
        Err(MdcError::Fault(_)) => {}
        other => panic!("{what}: expected Fault, got {other:?}"),
    }
}

/// Every addressing query must fault on a disconnected profile.
fn assert_disconnected(profile: &Profile) {
    assert_eq!(profile.session_state(), ConState::Disconnected);
    assert!(!profile.is_ipv4());
    assert!(!profile.is_ipv6());
    assert_fault(profile.interface_name(), "interface name");
    for family in [IpFamily::Ipv4, IpFamily::Ipv6] {
        assert_fault(profile.address(family), "address");
        assert_fault(profile.dns_addresses(family), "dns");
        assert_fault(profile.gateway_address(family), "gateway");
    }
}

fn script_slot_one(seeded: &SeededRadio) {
    let radio = &seeded.radio;
    radio.set_interface_name(1, "rmnet0");
    radio.set_ip_address(1, IpFamily::Ipv4, IPV4_ADDR);
    radio.set_dns_addresses(1, IpFamily::Ipv4, IPV4_DNS1, IPV4_DNS2);
    radio.set_gateway_address(1, IpFamily::Ipv4, IPV4_GW);
    radio.set_ip_address(1, IpFamily::Ipv6, IPV6_ADDR);
    radio.set_dns_addresses(1, IpFamily::Ipv6, IPV6_DNS1, IPV6_DNS2);
    radio.set_gateway_address(1, IpFamily::Ipv6, IPV6_GW);
}

fn assert_ipv4_reachable(profile: &Profile) {
    assert_eq!(profile.ipv4_address().unwrap(), IPV4_ADDR);
    let dns = profile.ipv4_dns_addresses().unwrap();
    assert_eq!(dns.primary, IPV4_DNS1);
    assert_eq!(dns.secondary.as_deref(), Some(IPV4_DNS2));
    assert_eq!(profile.ipv4_gateway_address().unwrap(), IPV4_GW);
}

fn assert_ipv6_reachable(profile: &Profile) {
    assert_eq!(profile.ipv6_address().unwrap(), IPV6_ADDR);
    let dns = profile.ipv6_dns_addresses().unwrap();
    assert_eq!(dns.primary, IPV6_DNS1);
    assert_eq!(dns.secondary.as_deref(), Some(IPV6_DNS2));
    assert_eq!(profile.ipv6_gateway_address().unwrap(), IPV6_GW);
}

#[tokio::test]
async fn addressing_is_gated_by_negotiated_family() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    script_slot_one(&seeded);

    for profile in &profiles {
        assert_disconnected(profile);
    }

    let p0 = &profiles[0];
    for pdp in [PdpType::Ipv4, PdpType::Ipv6, PdpType::Ipv4v6] {
        assert_eq!(p0.session_state(), ConState::Disconnected);
        p0.set_pdp(pdp).await.unwrap();
        p0.start_session().await.expect("start should succeed");
        assert_eq!(p0.session_state(), ConState::Connected);

        // ── Isolation: nobody else moved ──────────────────────────────────
        for other in &profiles[1..] {
            assert_disconnected(other);
        }

        assert_eq!(p0.interface_name().unwrap(), "rmnet0");

        match pdp {
            PdpType::Ipv4 => {
                assert!(p0.is_ipv4());
                assert!(!p0.is_ipv6());
                assert_ipv4_reachable(p0);
                assert_fault(p0.ipv6_address(), "IPv6 address on IPv4 session");
                assert_fault(p0.ipv6_dns_addresses(), "IPv6 DNS on IPv4 session");
                assert_fault(p0.ipv6_gateway_address(), "IPv6 gateway on IPv4 session");
            }
            PdpType::Ipv6 => {
                assert!(!p0.is_ipv4());
                assert!(p0.is_ipv6());
                assert_ipv6_reachable(p0);
                assert_fault(p0.ipv4_address(), "IPv4 address on IPv6 session");
                assert_fault(p0.ipv4_dns_addresses(), "IPv4 DNS on IPv6 session");
                assert_fault(p0.ipv4_gateway_address(), "IPv4 gateway on IPv6 session");
            }
            PdpType::Ipv4v6 => {
                assert!(p0.is_ipv4());
                assert!(p0.is_ipv6());
                assert_ipv4_reachable(p0);
                assert_ipv6_reachable(p0);
            }
        }

        p0.stop_session().await.expect("stop should succeed");
        assert_disconnected(p0);
    }
}

#[tokio::test]
async fn ipv6_session_on_profile_zero_leaves_the_rest_alone() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    seeded
        .radio
        .set_ip_address(1, IpFamily::Ipv6, IPV6_ADDR);

    profiles[0].set_pdp(PdpType::Ipv6).await.unwrap();
    profiles[0].start_session().await.unwrap();

    assert_eq!(profiles[0].ipv6_address().unwrap(), IPV6_ADDR);
    assert_fault(profiles[0].ipv4_address(), "IPv4 address");
    for i in 1..NB_PROFILE {
        let profile = &profiles[i as usize];
        assert_eq!(profile.session_state(), ConState::Disconnected);
        assert_eq!(profile.apn(), test_apn(i));
    }
    assert!(seeded.radio.is_attached(1));
    assert!(!seeded.radio.is_attached(2));
}

#[tokio::test]
async fn snapshot_is_taken_at_connect_time() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    seeded.radio.set_ip_address(1, IpFamily::Ipv4, IPV4_ADDR);

    profiles[0].start_session().await.unwrap();
    seeded.radio.set_ip_address(1, IpFamily::Ipv4, "10.0.0.1");
    assert_eq!(profiles[0].ipv4_address().unwrap(), IPV4_ADDR);
}

#[tokio::test]
async fn starting_twice_faults_and_stopping_twice_is_a_no_op() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    let p1 = &profiles[1];

    p1.start_session().await.unwrap();
    assert_fault(p1.start_session().await, "second start");
    assert_eq!(seeded.radio.attach_count(), 1);

    p1.stop_session().await.unwrap();
    // Stopping a disconnected profile is treated as idempotent success.
    p1.stop_session().await.expect("second stop is a no-op");
    assert_eq!(seeded.radio.detach_count(), 1);
}

#[tokio::test]
async fn radio_failure_passes_through_and_keeps_the_profile_disconnected() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;

    seeded.radio.fail_next(ErrorKind::Busy);
    let err = profiles[2].start_session().await.expect_err("radio is busy");
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert_disconnected(&profiles[2]);

    // Nothing was retried behind the caller's back.
    assert_eq!(seeded.radio.attach_count(), 0);
    profiles[2].start_session().await.expect("radio recovered");
}

#[tokio::test]
async fn failed_detach_keeps_the_session() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;

    profiles[3].start_session().await.unwrap();
    seeded.radio.fail_next(ErrorKind::Fault);
    assert_fault(profiles[3].stop_session().await, "detach failure");
    assert_eq!(profiles[3].session_state(), ConState::Connected);
    assert!(profiles[3].interface_name().is_ok());
}

#[tokio::test]
async fn unresponsive_radio_times_out_without_connecting() {
    let seeded = SeededRadio::with_config(MdcConfig {
        radio_timeout_ms: 50,
        ..MdcConfig::default()
    });
    let profiles = seeded.profiles().await;

    seeded
        .radio
        .set_response_delay(Some(Duration::from_millis(300)));
    let err = profiles[0].start_session().await.expect_err("radio is stuck");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_disconnected(&profiles[0]);

    seeded.radio.set_response_delay(None);
    profiles[0].start_session().await.expect("radio answers again");
}

#[tokio::test]
async fn timed_out_attach_is_torn_down_on_the_radio() {
    let seeded = SeededRadio::with_config(MdcConfig {
        radio_timeout_ms: 50,
        ..MdcConfig::default()
    });
    let profiles = seeded.profiles().await;

    seeded
        .radio
        .set_attach_delay(Some(Duration::from_millis(300)));
    let err = profiles[0].start_session().await.expect_err("attach is stuck");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_disconnected(&profiles[0]);

    // The abandoned attach got a best-effort detach of its own.
    assert_eq!(seeded.radio.detach_count(), 1);
    assert!(!seeded.radio.is_attached(1));
}

#[tokio::test]
async fn timed_out_detach_keeps_the_session() {
    let seeded = SeededRadio::with_config(MdcConfig {
        radio_timeout_ms: 50,
        ..MdcConfig::default()
    });
    let profiles = seeded.profiles().await;
    seeded.radio.set_ip_address(1, IpFamily::Ipv4, IPV4_ADDR);
    profiles[0].start_session().await.unwrap();

    seeded
        .radio
        .set_response_delay(Some(Duration::from_millis(300)));
    let err = profiles[0].stop_session().await.expect_err("detach is stuck");
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // The radio never confirmed the teardown.
    assert_eq!(profiles[0].session_state(), ConState::Connected);
    assert_eq!(profiles[0].ipv4_address().unwrap(), IPV4_ADDR);
    assert_eq!(seeded.radio.detach_count(), 0);

    seeded.radio.set_response_delay(None);
    profiles[0].stop_session().await.expect("radio answers again");
    assert_disconnected(&profiles[0]);
}

#[tokio::test]
async fn disconnection_reason_is_recorded_and_persists() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    let p4 = &profiles[4];

    assert_eq!(p4.disconnection_reason(), DisconnectionReason::Undefined);
    assert_eq!(p4.platform_specific_disconnection_code(), 0);

    p4.start_session().await.unwrap();
    p4.stop_session().await.unwrap();
    assert_eq!(
        p4.disconnection_reason(),
        DisconnectionReason::RegularDeactivation
    );
    assert_eq!(p4.platform_specific_disconnection_code(), 2);

    // Still visible while the next session is up.
    p4.start_session().await.unwrap();
    assert_eq!(
        p4.disconnection_reason(),
        DisconnectionReason::RegularDeactivation
    );

    seeded.radio.set_disconnect_info(DisconnectInfo {
        reason: DisconnectionReason::NoService,
        platform_code: 36,
    });
    p4.stop_session().await.unwrap();
    assert_eq!(p4.disconnection_reason(), DisconnectionReason::NoService);
    assert_eq!(p4.platform_specific_disconnection_code(), 36);
}

#[tokio::test]
async fn network_drop_is_picked_up_on_refresh() {
    let seeded = SeededRadio::new();
    let profiles = seeded.profiles().await;
    let p1 = &profiles[1];

    p1.start_session().await.unwrap();
    assert_eq!(p1.refresh_session_state().await.unwrap(), ConState::Connected);

    seeded.radio.drop_session(2);
    assert_eq!(
        p1.refresh_session_state().await.unwrap(),
        ConState::Disconnected
    );
    assert_disconnected(p1);
    assert_eq!(p1.disconnection_reason(), DisconnectionReason::NetworkFailure);
    assert_eq!(seeded.radio.detach_count(), 0);
}
