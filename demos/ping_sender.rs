use std::error::Error;
use std::thread;
use std::time::Duration;

use icsc::serial::SysfsPin;
use icsc::{Address, Command, Station};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Station 50, GPIO 49 = transmit enable (BBB pin 23), 115200 baud,
    // /dev/ttyO1 (BBB pins 24/26).
    let direction = SysfsPin::open(49)?;
    let mut station = Station::open_with_direction("/dev/ttyO1", 115_200, Address(50), Box::new(direction))?;

    station.register(Command::PONG, |_, frame| {
        println!("PING reply from {}!", frame.source());
    })?;

    for _ in 0..10 {
        thread::sleep(Duration::from_secs(1));
        station.send(Address(100), Command::PING, &[])?;
    }

    thread::sleep(Duration::from_secs(1));
    station.close()?;
    Ok(())
}
