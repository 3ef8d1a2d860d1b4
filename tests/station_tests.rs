use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use test_case::test_case;

use icsc::{Address, Command, FrameError, Station, StationConfig, StationError};
use icsc_testing::{VirtualBus, VirtualDirection};

const RECV: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

type Event = (Address, Command, Vec<u8>);

fn station_on(bus: &VirtualBus, address: u8) -> Station {
    let (tx, rx) = bus.endpoint();
    Station::try_new(tx, rx, None, StationConfig::new(Address(address))).unwrap()
}

/// Registers a handler that forwards every matching frame to a channel.
fn capture(station: &Station, command: Command) -> Receiver<Event> {
    let (events, captured) = mpsc::channel();
    station
        .register(command, move |_, frame| {
            events
                .send((frame.source(), frame.command(), frame.payload().to_vec()))
                .unwrap();
        })
        .unwrap();
    captured
}

#[test]
fn unicast_reaches_the_addressed_station_exactly_once() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let captured = capture(&b, Command(b'X'));
    a.send(Address(100), Command(b'X'), &[1, 2, 3]).unwrap();

    let event = captured.recv_timeout(RECV).unwrap();
    assert_eq!((Address(50), Command(b'X'), vec![1, 2, 3]), event);
    assert!(captured.recv_timeout(QUIET).is_err(), "frame dispatched twice");
}

#[test_case(100, true ; "our station")]
#[test_case(0x00, true ; "broadcast")]
#[test_case(77, false ; "someone else")]
#[test_case(0x09, false ; "relay address gets no shortcut")]
fn delivery_filters_on_destination(destination: u8, delivered: bool) {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let captured = capture(&b, Command::CATCH_ALL);
    a.send(Address(destination), Command(b'X'), &[1, 2, 3]).unwrap();

    let received = captured.recv_timeout(if delivered { RECV } else { QUIET });
    assert_eq!(delivered, received.is_ok());
}

#[test]
fn broadcast_reaches_every_other_station() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);
    let c = station_on(&bus, 200);

    let b_captured = capture(&b, Command(b'N'));
    let c_captured = capture(&c, Command(b'N'));
    let a_captured = capture(&a, Command(b'N'));

    a.broadcast(Command(b'N'), &[7]).unwrap();

    assert_eq!((Address(50), Command(b'N'), vec![7]), b_captured.recv_timeout(RECV).unwrap());
    assert_eq!((Address(50), Command(b'N'), vec![7]), c_captured.recv_timeout(RECV).unwrap());
    // The transmitter is deaf while driving the line.
    assert!(a_captured.recv_timeout(QUIET).is_err());
}

#[test]
fn ping_is_answered_before_user_handlers_run() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let (events, sequence) = mpsc::channel();

    let pong_events = events.clone();
    a.register(Command::PONG, move |_, frame| {
        pong_events.send(("pong", frame.source(), frame.payload().to_vec())).unwrap();
    })
    .unwrap();

    let follow_events = events;
    a.register(Command(b'Z'), move |_, frame| {
        follow_events.send(("follow-up", frame.source(), frame.payload().to_vec())).unwrap();
    })
    .unwrap();

    // B's own ping handler replies with a second command. The automatic pong
    // is transmitted before that handler runs, so A must see the pong first.
    b.register(Command::PING, move |handle, frame| {
        handle.send(frame.source(), Command(b'Z'), &[]).unwrap();
    })
    .unwrap();

    a.send(Address(100), Command::PING, &[9, 8]).unwrap();

    assert_eq!(("pong", Address(100), vec![9, 8]), sequence.recv_timeout(RECV).unwrap());
    assert_eq!(("follow-up", Address(100), vec![]), sequence.recv_timeout(RECV).unwrap());
}

#[test]
fn duplicate_and_catch_all_registrations_fire_in_order() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let (events, order) = mpsc::channel();
    for label in ["first", "catch-all", "second"] {
        let command = if label == "catch-all" { Command::CATCH_ALL } else { Command(b'X') };
        let events = events.clone();
        b.register(command, move |_, _| events.send(label).unwrap()).unwrap();
    }

    a.send(Address(100), Command(b'X'), &[]).unwrap();
    assert_eq!("first", order.recv_timeout(RECV).unwrap());
    assert_eq!("catch-all", order.recv_timeout(RECV).unwrap());
    assert_eq!("second", order.recv_timeout(RECV).unwrap());

    // A command with no exact registration still hits the catch-all.
    a.send(Address(100), Command(b'Y'), &[]).unwrap();
    assert_eq!("catch-all", order.recv_timeout(RECV).unwrap());
    assert!(order.recv_timeout(QUIET).is_err());
}

#[test]
fn unregister_removes_the_earliest_registration() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let (events, order) = mpsc::channel();
    for label in ["first", "second"] {
        let events = events.clone();
        b.register(Command(b'X'), move |_, _| events.send(label).unwrap()).unwrap();
    }

    b.unregister(Command(b'X')).unwrap();
    a.send(Address(100), Command(b'X'), &[]).unwrap();

    assert_eq!("second", order.recv_timeout(RECV).unwrap());
    assert!(order.recv_timeout(QUIET).is_err());

    // Unregistering a command that was never registered is a quiet no-op.
    b.unregister(Command(b'Q')).unwrap();
}

#[test]
fn handlers_can_reply_through_their_handle() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    b.register(Command(b'X'), |handle, frame| {
        handle.send(frame.source(), Command(b'Y'), frame.payload()).unwrap();
    })
    .unwrap();

    let captured = capture(&a, Command(b'Y'));
    a.send(Address(100), Command(b'X'), &[4, 5]).unwrap();

    assert_eq!((Address(100), Command(b'Y'), vec![4, 5]), captured.recv_timeout(RECV).unwrap());
}

#[test]
fn typed_helpers_encode_little_endian() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let captured = capture(&b, Command::CATCH_ALL);

    a.send_i8(Address(100), Command(b'1'), -5).unwrap();
    assert_eq!(vec![0xFB], captured.recv_timeout(RECV).unwrap().2);

    a.send_i16(Address(100), Command(b'2'), -2).unwrap();
    assert_eq!(vec![0xFE, 0xFF], captured.recv_timeout(RECV).unwrap().2);

    a.send_i32(Address(100), Command(b'4'), -2).unwrap();
    assert_eq!(vec![0xFE, 0xFF, 0xFF, 0xFF], captured.recv_timeout(RECV).unwrap().2);

    a.send_str(Address(100), Command(b'S'), "hullo").unwrap();
    assert_eq!(b"hullo".to_vec(), captured.recv_timeout(RECV).unwrap().2);

    a.broadcast_i16(Command(b'B'), 0x1234).unwrap();
    assert_eq!(vec![0x34, 0x12], captured.recv_timeout(RECV).unwrap().2);
}

#[test]
fn oversized_payloads_are_rejected_not_truncated() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);

    let error = a.send(Address(100), Command(b'X'), &[0; 256]).unwrap_err();
    assert!(matches!(
        error,
        StationError::Frame {
            source: FrameError::PayloadTooLong { max: 255, actual: 256, .. },
        }
    ));
}

#[test]
fn close_is_final() {
    let bus = VirtualBus::new();
    let mut a = station_on(&bus, 50);

    a.close().unwrap();

    assert!(matches!(a.close(), Err(StationError::Closed)));
    assert!(matches!(
        a.send(Address(100), Command(b'X'), &[]),
        Err(StationError::Closed)
    ));
    assert!(matches!(a.register(Command(b'X'), |_, _| {}), Err(StationError::Closed)));
    assert!(matches!(a.unregister(Command(b'X')), Err(StationError::Closed)));
}

#[test]
fn handles_outlive_their_station() {
    let bus = VirtualBus::new();
    let mut a = station_on(&bus, 50);
    let handle = a.handle();

    assert_eq!(Address(50), handle.address());
    a.close().unwrap();

    assert!(matches!(
        handle.send(Address(100), Command(b'X'), &[]),
        Err(StationError::Closed)
    ));
}

#[test]
fn resynchronizes_after_raw_garbage_on_the_wire() {
    use icsc::core::{BusTx, Frame, Payload};

    let bus = VirtualBus::new();
    let b = station_on(&bus, 100);
    let captured = capture(&b, Command::CATCH_ALL);

    // A misbehaving peer: raw noise, then a corrupted frame, then a good one.
    let (mut raw, _keep) = bus.endpoint();
    let frame = Frame::new(Address(100), Address(50), Command(b'X'), Payload::try_new(vec![1, 2, 3]).unwrap());
    let mut corrupted = frame.to_bytes();
    corrupted[7] ^= 0x01;

    for byte in [0xAA, 0x55, 0x13].into_iter().chain(corrupted).chain(frame.to_bytes()) {
        raw.write_byte(byte).unwrap();
    }

    let event = captured.recv_timeout(RECV).unwrap();
    assert_eq!((Address(50), Command(b'X'), vec![1, 2, 3]), event);
    assert!(captured.recv_timeout(QUIET).is_err(), "corrupted frame dispatched");
}

#[test]
fn stats_track_traffic_both_ways() {
    let bus = VirtualBus::new();
    let a = station_on(&bus, 50);
    let b = station_on(&bus, 100);

    let captured = capture(&b, Command(b'X'));
    a.send(Address(100), Command(b'X'), &[1, 2, 3]).unwrap();
    let _ = captured.recv_timeout(RECV).unwrap();

    let sent = a.stats();
    assert_eq!(1, sent.tx_packets);
    // 1 sentinel + 4 header bytes + STX + 3 payload + ETX + checksum + EOT.
    assert_eq!(12, sent.tx_bytes);
    assert_eq!(0, sent.tx_failures);

    let received = b.stats();
    assert_eq!(1, received.rx_packets);
    assert_eq!(12, received.rx_bytes);
    assert_eq!(0, received.frames_rejected);
    assert_eq!(1, received.callbacks_run);
}

#[test]
fn transmit_enable_brackets_each_frame() {
    let bus = VirtualBus::new();
    let (tx, rx) = bus.endpoint();
    let line = VirtualDirection::new();
    let station = Station::try_new(
        tx,
        rx,
        Some(Box::new(line.clone())),
        StationConfig::new(Address(50)),
    )
    .unwrap();

    // Driven low once at startup, then high/low around the frame.
    assert_eq!(vec![false], line.transitions());
    station.send(Address(100), Command(b'X'), &[1]).unwrap();
    assert_eq!(vec![false, true, false], line.transitions());
}
