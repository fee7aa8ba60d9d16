use std::time::{Duration, Instant};

use viewstamped_rs::channel::{
    ChannelError, Handshake, HandshakeAction, HandshakeError, HandshakeState,
};

const MESSAGE_TIMEOUT: Duration = Duration::from_millis(500);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn active_end_retransmits_until_confirmed_test() {
    let t0 = Instant::now();
    let mut handshake = Handshake::new(true, MESSAGE_TIMEOUT, OVERALL_TIMEOUT, t0);
    assert_eq!(handshake.state(), &HandshakeState::WaitingForFirstMessage);

    // The first poll sends immediately.
    assert_eq!(handshake.poll(t0), HandshakeAction::Send);
    assert_eq!(
        handshake.poll(t0),
        HandshakeAction::Wait(t0 + MESSAGE_TIMEOUT)
    );

    // No retransmission before the message timeout elapses.
    let t1 = t0 + Duration::from_millis(200);
    assert_eq!(
        handshake.poll(t1),
        HandshakeAction::Wait(t0 + MESSAGE_TIMEOUT)
    );

    let t2 = t0 + MESSAGE_TIMEOUT;
    assert_eq!(handshake.poll(t2), HandshakeAction::Send);
    assert_eq!(
        handshake.state(),
        &HandshakeState::Retransmitting {
            next_send: t2 + MESSAGE_TIMEOUT
        }
    );

    handshake.confirm();
    assert_eq!(handshake.poll(t2), HandshakeAction::Done(Ok(())));

    // Once confirmed, no further retransmission is ever requested.
    assert_eq!(
        handshake.poll(t2 + Duration::from_secs(60)),
        HandshakeAction::Done(Ok(()))
    );
}

#[test]
fn passive_end_waits_test() {
    let t0 = Instant::now();
    let mut handshake = Handshake::new(false, MESSAGE_TIMEOUT, OVERALL_TIMEOUT, t0);

    assert_eq!(handshake.poll(t0), HandshakeAction::Wait(t0 + OVERALL_TIMEOUT));
    assert_eq!(
        handshake.poll(t0 + Duration::from_secs(1)),
        HandshakeAction::Wait(t0 + OVERALL_TIMEOUT)
    );
    assert_eq!(handshake.state(), &HandshakeState::WaitingForFirstMessage);

    handshake.confirm();
    assert_eq!(handshake.state(), &HandshakeState::Confirmed);
}

#[test]
fn retransmit_wait_never_passes_deadline_test() {
    let t0 = Instant::now();
    let overall_timeout = Duration::from_millis(700);
    let mut handshake = Handshake::new(true, MESSAGE_TIMEOUT, overall_timeout, t0);

    assert_eq!(handshake.poll(t0), HandshakeAction::Send);
    let t1 = t0 + MESSAGE_TIMEOUT;
    assert_eq!(handshake.poll(t1), HandshakeAction::Send);
    assert_eq!(
        handshake.poll(t1),
        HandshakeAction::Wait(t0 + overall_timeout)
    );
}

#[test]
fn timeout_test() {
    let t0 = Instant::now();
    let mut handshake = Handshake::new(true, MESSAGE_TIMEOUT, OVERALL_TIMEOUT, t0);
    assert_eq!(handshake.poll(t0), HandshakeAction::Send);

    let expired = t0 + OVERALL_TIMEOUT;
    assert_eq!(
        handshake.poll(expired),
        HandshakeAction::Done(Err(HandshakeError::TimedOut))
    );
    assert_eq!(handshake.state(), &HandshakeState::TimedOut);

    // A late confirmation does not revive a finished handshake.
    handshake.confirm();
    assert_eq!(handshake.state(), &HandshakeState::TimedOut);
}

#[test]
fn cancel_test() {
    let t0 = Instant::now();
    let mut handshake = Handshake::new(true, MESSAGE_TIMEOUT, OVERALL_TIMEOUT, t0);
    assert_eq!(handshake.poll(t0), HandshakeAction::Send);

    handshake.cancel();
    assert!(handshake.is_finished());
    assert_eq!(
        handshake.poll(t0 + MESSAGE_TIMEOUT),
        HandshakeAction::Done(Err(HandshakeError::Cancelled))
    );
}

#[test]
fn fail_test() {
    let t0 = Instant::now();
    let mut handshake = Handshake::new(false, MESSAGE_TIMEOUT, OVERALL_TIMEOUT, t0);

    handshake.fail(ChannelError::Disconnected.into());
    handshake.cancel();

    assert_eq!(
        handshake.poll(t0),
        HandshakeAction::Done(Err(HandshakeError::Channel(ChannelError::Disconnected)))
    );
}
