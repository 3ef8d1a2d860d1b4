use std::fs;
use std::path::{Path, PathBuf};

use icsc_core::{BusError, DirectionControl};

use crate::errors::SerialError;

const GPIO_ROOT: &str = "/sys/class/gpio";

/// A transmit-enable line driven through the Linux sysfs GPIO interface.
///
/// Opening a pin exports it if necessary, switches it to output mode, and
/// drives it low so the transceiver starts out listening. The pin is
/// unexported again when the `SysfsPin` is dropped.
///
/// # Examples
///
/// ```no_run
/// use icsc_serial::SysfsPin;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// // GPIO 49 drives the RS-485 transceiver's DE pin.
/// let pin = SysfsPin::open(49)?;
/// #
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
    unexport_path: PathBuf,
}

impl SysfsPin {
    /// Exports the given GPIO, configures it as a low output, and returns a
    /// handle for driving it.
    ///
    /// # Errors
    ///
    /// Returns [`SerialError::Gpio`] if any of the sysfs writes fail.
    pub fn open(pin: u32) -> Result<Self, SerialError> {
        Self::open_under(Path::new(GPIO_ROOT), pin)
    }

    fn open_under(root: &Path, pin: u32) -> Result<Self, SerialError> {
        let gpio_error = |source| SerialError::Gpio { pin, source };

        let node = root.join(format!("gpio{}", pin));
        if !node.exists() {
            fs::write(root.join("export"), format!("{}\n", pin)).map_err(gpio_error)?;
        }
        fs::write(node.join("direction"), "out\n").map_err(gpio_error)?;

        let value_path = node.join("value");
        // Start out in listen mode.
        fs::write(&value_path, "0").map_err(gpio_error)?;

        Ok(SysfsPin {
            pin,
            value_path,
            unexport_path: root.join("unexport"),
        })
    }
}

impl DirectionControl for SysfsPin {
    fn set_transmitting(&mut self, transmitting: bool) -> Result<(), BusError> {
        fs::write(&self.value_path, if transmitting { "1" } else { "0" })?;
        Ok(())
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        let _ = fs::write(&self.unexport_path, format!("{}\n", self.pin));
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::process;

    use super::*;

    /// Lays out a fake sysfs GPIO tree with pin 5 already exported.
    fn scratch_root(name: &str) -> PathBuf {
        let root = env::temp_dir().join(format!("icsc-gpio-{}-{}", process::id(), name));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("gpio5")).unwrap();
        fs::write(root.join("gpio5").join("direction"), "in\n").unwrap();
        fs::write(root.join("gpio5").join("value"), "0").unwrap();
        root
    }

    #[test]
    fn drives_value_through_sysfs() {
        let root = scratch_root("drive");
        let mut pin = SysfsPin::open_under(&root, 5).unwrap();

        assert_eq!("out\n", fs::read_to_string(root.join("gpio5").join("direction")).unwrap());
        assert_eq!("0", fs::read_to_string(root.join("gpio5").join("value")).unwrap());

        pin.set_transmitting(true).unwrap();
        assert_eq!("1", fs::read_to_string(root.join("gpio5").join("value")).unwrap());

        pin.set_transmitting(false).unwrap();
        assert_eq!("0", fs::read_to_string(root.join("gpio5").join("value")).unwrap());
    }

    #[test]
    fn unexports_on_drop() {
        let root = scratch_root("unexport");
        fs::write(root.join("unexport"), "").unwrap();

        let pin = SysfsPin::open_under(&root, 5).unwrap();
        drop(pin);

        assert_eq!("5\n", fs::read_to_string(root.join("unexport")).unwrap());
    }

    #[test]
    fn missing_pin_reports_gpio_error() {
        let root = scratch_root("missing");
        let error = SysfsPin::open_under(&root, 7).unwrap_err();
        assert!(matches!(error, SerialError::Gpio { pin: 7, .. }));
    }
}
