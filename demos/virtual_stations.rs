use std::error::Error;
use std::sync::mpsc;
use std::time::Duration;

use icsc::{Address, Command, Station, StationConfig};
use icsc_testing::VirtualBus;

/// Two stations chatting over an in-memory bus. Run with RUST_LOG=debug to
/// watch the frames go by.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let bus = VirtualBus::new();

    let (tx, rx) = bus.endpoint();
    let mut alpha = Station::try_new(tx, rx, None, StationConfig::new(Address(50)))?;

    let (tx, rx) = bus.endpoint();
    let mut beta = Station::try_new(tx, rx, None, StationConfig::new(Address(100)))?;

    // Beta greets back whenever it is greeted.
    beta.register(Command(b'G'), |handle, frame| {
        println!(
            "beta: station {} says {:?}",
            frame.source(),
            String::from_utf8_lossy(frame.payload())
        );
        let _ = handle.send_str(frame.source(), Command(b'G'), "hello yourself");
    })?;

    let (done, finished) = mpsc::channel();
    alpha.register(Command(b'G'), move |_, frame| {
        println!(
            "alpha: station {} says {:?}",
            frame.source(),
            String::from_utf8_lossy(frame.payload())
        );
        let _ = done.send(());
    })?;

    alpha.send_str(Address(100), Command(b'G'), "hello there")?;
    finished.recv_timeout(Duration::from_secs(2))?;

    // Liveness probing is built in: beta answers the ping automatically.
    let (pong, ponged) = mpsc::channel();
    alpha.register(Command::PONG, move |_, frame| {
        println!("alpha: pong from station {}", frame.source());
        let _ = pong.send(());
    })?;
    alpha.send(Address(100), Command::PING, &[])?;
    ponged.recv_timeout(Duration::from_secs(2))?;

    beta.close()?;
    alpha.close()?;
    Ok(())
}
