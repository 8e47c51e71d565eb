//! Status Feed - drives one slot through a Wi-Fi calling session
//!
//! Posts a scripted sequence of radio and network events and prints every
//! notification the decision engine would see.
//!
//! Run with: QNS_LOG_MODE=development cargo run -p qns-status --example status_feed

use std::net::IpAddr;
use std::sync::Arc;

use qns_status::logging::init_logging_from_env;
use qns_status::prelude::*;

struct PrintingMedia;

impl MediaQualityController for PrintingMedia {
    fn set_rtp_thresholds(&self, slot: SlotIndex, call_id: CallId, request: &RtpThresholdRequest) {
        println!("[media] {slot} {call_id}: thresholds {:?}", request.thresholds);
    }
}

struct PrintingIms;

impl ImsRegistrationSource for PrintingIms {
    fn subscribe(&self, slot: SlotIndex) {
        println!("[ims] subscribe {slot}");
    }

    fn unsubscribe(&self, slot: SlotIndex) {
        println!("[ims] unsubscribe {slot}");
    }
}

const CONFIG: &str = r#"{
    "default_data_subscription": 1,
    "slots": [ { "slot": 0, "subscription_id": 1, "block_ipv6_only_wifi": true } ]
}"#;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    println!("=== QNS Status Feed ===\n");

    let collaborators = Collaborators {
        config: Arc::new(StaticConfig::from_json_str(CONFIG)?),
        media_quality: Arc::new(PrintingMedia),
        ims_registration: Arc::new(PrintingIms),
    };
    let registry = ProviderRegistry::new(ProviderOptions::default(), collaborators)?;
    let slot = SlotIndex::new(0);
    let provider = registry.provider(slot)?;

    // Step 1: register the way a decision engine would
    let (call_listener, call_rx) = Listener::channel();
    provider
        .call_state()
        .register_call_type_changed(call_listener, Tag(1));

    let (data_listener, data_rx) = Listener::channel();
    provider
        .data_connections()
        .register(ApnType::Ims.raw(), data_listener, Tag(2))?;

    let (iwlan_listener, iwlan_rx) = Listener::channel();
    registry.iwlan().register(slot, iwlan_listener, Tag(3));

    let (ims_listener, ims_rx) = Listener::channel();
    provider.ims_registration().register(ims_listener, Tag(4))?;

    // Step 2: Wi-Fi comes up and IMS registers over it
    let wifi = NetworkId::new(42);
    registry.post_default_network_event(DefaultNetworkEvent::Available {
        network: wifi,
        transport: NetworkTransport::Wifi,
        subscription: None,
    })?;
    let address: IpAddr = "192.168.1.23".parse()?;
    registry.post_default_network_event(DefaultNetworkEvent::LinkPropertiesChanged {
        network: wifi,
        addresses: vec![address],
    })?;
    registry.flush()?;
    provider.post_iwlan_registration(true)?;
    provider.post_ims_registration(ImsRegistrationInfo::registered(Transport::Wlan))?;

    // Step 3: IMS PDN on WLAN, then a voice call
    for state in [LowLevelDataState::Connecting, LowLevelDataState::Connected] {
        provider.post_data_connection_report(DataConnectionReport::new(
            ApnType::Ims,
            Transport::Wlan,
            state,
        ))?;
    }
    provider.post_rtp_threshold_request(RtpThresholdRequest {
        apn: ApnType::Ims,
        thresholds: RtpThresholds {
            jitter_ms: 100,
            packet_loss_rate: 10,
            packet_loss_time_ms: 3000,
            no_rtp_interval_ms: 5000,
        },
    })?;
    let call = CallId::new(1);
    provider.post_call_info(CallLegEvent::new(call, CallKind::Voice, LegState::Active))?;

    // Step 4: Wi-Fi drops, the PDN hands over to cellular, the call ends
    registry.post_default_network_event(DefaultNetworkEvent::Lost { network: wifi })?;
    registry.flush()?;
    provider.post_data_connection_report(DataConnectionReport::new(
        ApnType::Ims,
        Transport::Wlan,
        LowLevelDataState::HandoverInProgress,
    ))?;
    provider.post_data_connection_report(DataConnectionReport::new(
        ApnType::Ims,
        Transport::Wwan,
        LowLevelDataState::Connected,
    ))?;
    provider.post_call_info(CallLegEvent::new(call, CallKind::Voice, LegState::Disconnected))?;
    registry.flush()?;

    println!();
    for n in iwlan_rx.try_iter() {
        println!("[iwlan]  {:?}", n.result);
    }
    for n in ims_rx.try_iter() {
        println!("[ims]    {:?}", n.result);
    }
    for n in data_rx.try_iter() {
        println!("[data]   {:?} on {}", n.result.event, n.result.transport);
    }
    for n in call_rx.try_iter() {
        println!("[call]   {:?}", n.result);
    }

    registry.close();
    println!("\nDone.");
    Ok(())
}
