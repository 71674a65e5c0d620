use std::net::TcpListener;
use std::time::Duration;

use tomcast::daemon::proto::{read_envelope, write_envelope};
use tomcast::daemon::{DEFAULT_MAX_FRAME_BYTES, Phase};
use tomcast::{Envelope, Payload, PeerId};

use crate::fixtures::{TestNode, WAIT, fast_config, reserve_listener, wait_until};

fn next_envelope(listener: &TcpListener, want: impl Fn(&Envelope) -> bool) -> Envelope {
    loop {
        let (mut stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        while let Some(envelope) =
            read_envelope(&mut stream, DEFAULT_MAX_FRAME_BYTES).expect("read envelope")
        {
            if want(&envelope) {
                return envelope;
            }
        }
    }
}

#[test]
fn node_speaks_the_wire_protocol() {
    let (remote, remote_id) = reserve_listener();
    let (listener, node_id) = reserve_listener();
    let mut config = fast_config(&node_id, std::slice::from_ref(&remote_id), 5);
    config.engine.rate = 0.01;
    let node = TestNode::start(listener, &config);

    let ready = next_envelope(&remote, |e| e.payload == Payload::Ready);
    assert_eq!(ready.origin, node_id);
    assert!(wait_until(WAIT, || node.node.engine().phase() == Phase::Active));

    let mut stream = std::net::TcpStream::connect(node.node.local_addr()).expect("connect");
    write_envelope(
        &mut stream,
        &Envelope::word(remote_id.clone(), "Mirandela", 100),
        DEFAULT_MAX_FRAME_BYTES,
    )
    .expect("write");
    drop(stream);

    let ack = next_envelope(&remote, |e| e.payload.is_ack());
    assert_eq!(ack.origin, node_id);
    assert!(ack.timestamp > 100);

    assert!(wait_until(WAIT, || node
        .delivered()
        .iter()
        .any(|m| m.word == "Mirandela" && m.origin == remote_id)));

    let mut stream = std::net::TcpStream::connect(node.node.local_addr()).expect("connect");
    write_envelope(
        &mut stream,
        &Envelope::shutdown(PeerId::from_socket_addr(remote.local_addr().unwrap()), 0),
        DEFAULT_MAX_FRAME_BYTES,
    )
    .expect("write shutdown");
    drop(stream);

    let stats = node.node.wait();
    assert_eq!(stats.phase, Phase::ShuttingDown);
    assert!(stats.acks_sent >= 1);
}
