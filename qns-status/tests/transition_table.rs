//! Data-connection transition table
//!
//! Every row of the table, plus the reports that must be dropped.

use rstest::rstest;

use qns_status::{
    transition, ApnType, ConnectionState, DataConnectionEvent, DataConnectionStateMachine,
    LowLevelDataState, SlotIndex, Transport,
};

use ConnectionState as S;
use DataConnectionEvent as E;
use LowLevelDataState as L;

#[rstest]
#[case::start(S::Inactive, L::Connecting, false, S::Connecting, E::Started)]
#[case::fail(S::Connecting, L::Disconnected, false, S::Inactive, E::Failed)]
#[case::connect_after_start(S::Connecting, L::Connected, false, S::Connected, E::Connected)]
#[case::connect_directly(S::Inactive, L::Connected, true, S::Connected, E::Connected)]
#[case::disconnect(S::Connected, L::Disconnected, false, S::Inactive, E::Disconnected)]
#[case::disconnect_mid_handover(S::Handover, L::Disconnected, true, S::Inactive, E::Disconnected)]
#[case::handover_start(S::Connected, L::HandoverInProgress, false, S::Handover, E::HandoverStarted)]
#[case::handover_success(S::Handover, L::Connected, true, S::Connected, E::HandoverSuccess)]
#[case::handover_failure(S::Handover, L::Connected, false, S::Connected, E::HandoverFailed)]
fn accepted_transitions(
    #[case] from: ConnectionState,
    #[case] reported: LowLevelDataState,
    #[case] transport_changed: bool,
    #[case] to: ConnectionState,
    #[case] event: DataConnectionEvent,
) {
    assert_eq!(transition(from, reported, transport_changed), Some((to, event)));
}

#[rstest]
#[case(S::Inactive, L::Disconnected, false)]
#[case(S::Inactive, L::HandoverInProgress, false)]
#[case(S::Connecting, L::Connecting, false)]
#[case(S::Connected, L::Connecting, false)]
#[case(S::Connected, L::Connected, false)]
#[case(S::Connected, L::HandoverInProgress, true)]
#[case(S::Connected, L::Suspended, false)]
#[case(S::Handover, L::HandoverInProgress, false)]
#[case(S::Handover, L::Disconnecting, false)]
#[case(S::Inactive, L::Unknown, false)]
fn dropped_reports(
    #[case] from: ConnectionState,
    #[case] reported: LowLevelDataState,
    #[case] transport_changed: bool,
) {
    assert_eq!(transition(from, reported, transport_changed), None);
}

#[rstest]
#[case::to_wlan(Transport::Wwan, Transport::Wlan, E::HandoverSuccess, Transport::Wlan)]
#[case::back_on_wwan(Transport::Wwan, Transport::Wwan, E::HandoverFailed, Transport::Wwan)]
#[case::to_wwan(Transport::Wlan, Transport::Wwan, E::HandoverSuccess, Transport::Wwan)]
fn handover_outcome(
    #[case] origin: Transport,
    #[case] landed_on: Transport,
    #[case] expected: DataConnectionEvent,
    #[case] final_transport: Transport,
) {
    let machine = DataConnectionStateMachine::new(SlotIndex::new(0), ApnType::Ims);
    machine.on_report(origin, L::Connecting, 0);
    machine.on_report(origin, L::Connected, 0);

    assert_eq!(
        machine.on_report(origin, L::HandoverInProgress, 0),
        Some(E::HandoverStarted)
    );
    assert_eq!(machine.on_report(landed_on, L::Connected, 0), Some(expected));
    assert_eq!(machine.transport(), final_transport);
    assert_eq!(machine.state(), S::Connected);
}
