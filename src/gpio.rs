//! Digital I/O for the button and the ready LED
//!
//! Backends expose raw pin levels. [`Panel`] applies the wiring (pin numbers
//! and button polarity) so the control loop only sees "pressed" and "LED
//! on/off".

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default LED pin (BCM numbering, physical pin 38)
pub const DEFAULT_LED_PIN: u8 = 20;

/// Default button pin (BCM numbering, physical pin 40)
pub const DEFAULT_BUTTON_PIN: u8 = 21;

/// Logic level on a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Low
    Low,
    /// High
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Raw pin access
pub trait DigitalIo: Send {
    /// Read the level of an input pin
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the pin cannot be read
    fn read(&mut self, pin: u8) -> Result<Level>;

    /// Drive an output pin
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the pin cannot be written
    fn write(&mut self, pin: u8, level: Level) -> Result<()>;
}

/// Pin assignment and polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    /// Button input pin
    pub button_pin: u8,
    /// LED output pin
    pub led_pin: u8,
    /// Button pulls the line low when pressed
    pub button_active_low: bool,
    /// Button line has its own pull resistor, so none is enabled on the pin
    pub external_pull: bool,
}

impl Default for Wiring {
    fn default() -> Self {
        Self {
            button_pin: DEFAULT_BUTTON_PIN,
            led_pin: DEFAULT_LED_PIN,
            button_active_low: true,
            external_pull: false,
        }
    }
}

/// Button and LED as the appliance sees them
pub struct Panel {
    io: Box<dyn DigitalIo>,
    wiring: Wiring,
}

impl Panel {
    /// Wrap a backend with the given wiring
    #[must_use]
    pub fn new(io: Box<dyn DigitalIo>, wiring: Wiring) -> Self {
        Self { io, wiring }
    }

    /// Whether the button is currently held
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the pin cannot be read
    pub fn is_pressed(&mut self) -> Result<bool> {
        let level = self.io.read(self.wiring.button_pin)?;
        let active = if self.wiring.button_active_low {
            Level::Low
        } else {
            Level::High
        };
        Ok(level == active)
    }

    /// Switch the ready LED
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the pin cannot be written
    pub fn set_led(&mut self, on: bool) -> Result<()> {
        self.io.write(self.wiring.led_pin, Level::from(on))
    }

    /// Pin assignment
    #[must_use]
    pub const fn wiring(&self) -> Wiring {
        self.wiring
    }
}

/// Linux sysfs GPIO (`/sys/class/gpio`)
///
/// The sysfs interface cannot enable pull resistors. An active-low button
/// therefore needs an external pull-up, declared with
/// [`Wiring::external_pull`].
pub struct SysfsGpio {
    root: PathBuf,
    /// Global number of the SoC pin controller's first line
    base: u32,
}

impl SysfsGpio {
    /// Export and configure the pins for `wiring`
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if a pin cannot be exported or configured
    pub fn open(wiring: &Wiring) -> Result<Self> {
        Self::open_at("/sys/class/gpio", wiring)
    }

    /// Same as [`SysfsGpio::open`] with a custom sysfs root
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an active-low button without an external
    /// pull-up, or `Error::Gpio` if a pin cannot be exported or configured
    pub fn open_at(root: impl Into<PathBuf>, wiring: &Wiring) -> Result<Self> {
        if wiring.button_active_low && !wiring.external_pull {
            return Err(Error::Config(
                "sysfs GPIO cannot enable the button pull-up; fit an external pull-up and set \
                 gpio.external_pull, or use the rpi backend"
                    .to_string(),
            ));
        }

        let root = root.into();
        let base = pinctrl_base(&root);
        let gpio = Self { root, base };
        gpio.export(wiring.button_pin, "in")?;
        gpio.export(wiring.led_pin, "out")?;
        tracing::debug!(
            button = wiring.button_pin,
            led = wiring.led_pin,
            base,
            "sysfs gpio initialized"
        );
        Ok(gpio)
    }

    fn line(&self, pin: u8) -> u32 {
        self.base + u32::from(pin)
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", self.line(pin)))
    }

    fn export(&self, pin: u8, direction: &str) -> Result<()> {
        let dir = self.pin_dir(pin);
        if !dir.exists() {
            std::fs::write(self.root.join("export"), self.line(pin).to_string())
                .map_err(|e| Error::Gpio(format!("export gpio{pin}: {e}")))?;
        }
        std::fs::write(dir.join("direction"), direction)
            .map_err(|e| Error::Gpio(format!("set gpio{pin} direction: {e}")))
    }
}

/// First global line number of the SoC pin controller
///
/// Newer kernels number the Raspberry Pi header from a non-zero base (512 on
/// 6.6). The controller is the `gpiochip*` whose label starts with
/// `pinctrl-`. Without one, BCM numbers are used as is.
fn pinctrl_base(root: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("gpiochip") {
            continue;
        }
        let chip = entry.path();
        let is_pinctrl = std::fs::read_to_string(chip.join("label"))
            .is_ok_and(|label| label.trim().starts_with("pinctrl-"));
        if !is_pinctrl {
            continue;
        }
        if let Some(base) = std::fs::read_to_string(chip.join("base"))
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
        {
            return base;
        }
    }
    0
}

impl DigitalIo for SysfsGpio {
    fn read(&mut self, pin: u8) -> Result<Level> {
        let raw = std::fs::read_to_string(self.pin_dir(pin).join("value"))
            .map_err(|e| Error::Gpio(format!("read gpio{pin}: {e}")))?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(Error::Gpio(format!("gpio{pin}: unexpected value {other:?}"))),
        }
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        std::fs::write(self.pin_dir(pin).join("value"), value)
            .map_err(|e| Error::Gpio(format!("write gpio{pin}: {e}")))
    }
}

/// Raspberry Pi GPIO through `rppal`
#[cfg(feature = "rpi")]
pub struct RppalGpio {
    button: rppal::gpio::InputPin,
    led: rppal::gpio::OutputPin,
    wiring: Wiring,
}

#[cfg(feature = "rpi")]
impl RppalGpio {
    /// Claim the pins for `wiring`, with a pull resistor matching polarity
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the GPIO peripheral or a pin is unavailable
    pub fn open(wiring: &Wiring) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| Error::Gpio(e.to_string()))?;
        let button_pin = gpio
            .get(wiring.button_pin)
            .map_err(|e| Error::Gpio(e.to_string()))?;
        let button = if wiring.external_pull {
            button_pin.into_input()
        } else if wiring.button_active_low {
            button_pin.into_input_pullup()
        } else {
            button_pin.into_input_pulldown()
        };
        let led = gpio
            .get(wiring.led_pin)
            .map_err(|e| Error::Gpio(e.to_string()))?
            .into_output_low();

        Ok(Self {
            button,
            led,
            wiring: *wiring,
        })
    }
}

#[cfg(feature = "rpi")]
impl DigitalIo for RppalGpio {
    fn read(&mut self, pin: u8) -> Result<Level> {
        if pin != self.wiring.button_pin {
            return Err(Error::Gpio(format!("gpio{pin} is not configured as input")));
        }
        Ok(Level::from(self.button.is_high()))
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        if pin != self.wiring.led_pin {
            return Err(Error::Gpio(format!("gpio{pin} is not configured as output")));
        }
        match level {
            Level::Low => self.led.set_low(),
            Level::High => self.led.set_high(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Default pins with the pull-up on the board
    fn wired() -> Wiring {
        Wiring {
            external_pull: true,
            ..Wiring::default()
        }
    }

    fn fake_sysfs(wiring: &Wiring) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("export"), "").unwrap();
        for pin in [wiring.button_pin, wiring.led_pin] {
            let dir = root.path().join(format!("gpio{pin}"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("value"), "1\n").unwrap();
        }
        root
    }

    fn add_chip(root: &Path, name: &str, label: &str, base: u32) {
        let chip = root.join(name);
        std::fs::create_dir_all(&chip).unwrap();
        std::fs::write(chip.join("label"), format!("{label}\n")).unwrap();
        std::fs::write(chip.join("base"), format!("{base}\n")).unwrap();
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
    }

    #[test]
    fn sysfs_configures_directions() {
        let wiring = wired();
        let root = fake_sysfs(&wiring);
        SysfsGpio::open_at(root.path(), &wiring).unwrap();

        let button_dir = root.path().join("gpio21/direction");
        let led_dir = root.path().join("gpio20/direction");
        assert_eq!(std::fs::read_to_string(button_dir).unwrap(), "in");
        assert_eq!(std::fs::read_to_string(led_dir).unwrap(), "out");
    }

    #[test]
    fn panel_normalizes_active_low_button() {
        let wiring = wired();
        let root = fake_sysfs(&wiring);
        let gpio = SysfsGpio::open_at(root.path(), &wiring).unwrap();
        let mut panel = Panel::new(Box::new(gpio), wiring);

        // Pulled up: released
        assert!(!panel.is_pressed().unwrap());

        std::fs::write(root.path().join("gpio21/value"), "0\n").unwrap();
        assert!(panel.is_pressed().unwrap());
    }

    #[test]
    fn panel_writes_led_level() {
        let wiring = wired();
        let root = fake_sysfs(&wiring);
        let gpio = SysfsGpio::open_at(root.path(), &wiring).unwrap();
        let mut panel = Panel::new(Box::new(gpio), wiring);

        panel.set_led(false).unwrap();
        assert_eq!(std::fs::read_to_string(root.path().join("gpio20/value")).unwrap(), "0");
        panel.set_led(true).unwrap();
        assert_eq!(std::fs::read_to_string(root.path().join("gpio20/value")).unwrap(), "1");
    }

    #[test]
    fn sysfs_read_rejects_garbage() {
        let wiring = wired();
        let root = fake_sysfs(&wiring);
        let mut gpio = SysfsGpio::open_at(root.path(), &wiring).unwrap();
        std::fs::write(root.path().join("gpio21/value"), "x").unwrap();
        assert!(matches!(gpio.read(21), Err(Error::Gpio(_))));
    }

    #[test]
    fn missing_sysfs_is_gpio_error() {
        let result = SysfsGpio::open_at("/nonexistent/gpio", &wired());
        assert!(matches!(result, Err(Error::Gpio(_))));
    }

    #[test]
    fn sysfs_refuses_active_low_without_pull_up() {
        let wiring = Wiring::default();
        let root = fake_sysfs(&wiring);

        let result = SysfsGpio::open_at(root.path(), &wiring);

        assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("pull-up")));
        assert!(!root.path().join("gpio21/direction").exists());
    }

    #[test]
    fn sysfs_active_high_needs_no_external_pull() {
        let wiring = Wiring {
            button_active_low: false,
            ..Wiring::default()
        };
        let root = fake_sysfs(&wiring);
        let gpio = SysfsGpio::open_at(root.path(), &wiring).unwrap();
        let mut panel = Panel::new(Box::new(gpio), wiring);

        assert!(panel.is_pressed().unwrap());
    }

    #[test]
    fn sysfs_offsets_pins_by_pinctrl_base() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("export"), "").unwrap();
        add_chip(root.path(), "gpiochip0", "raspberrypi-exp-gpio", 0);
        add_chip(root.path(), "gpiochip512", "pinctrl-bcm2711", 512);
        for line in [532, 533] {
            let dir = root.path().join(format!("gpio{line}"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("value"), "1\n").unwrap();
        }

        let mut gpio = SysfsGpio::open_at(root.path(), &wired()).unwrap();

        assert_eq!(std::fs::read_to_string(root.path().join("gpio533/direction")).unwrap(), "in");
        assert_eq!(std::fs::read_to_string(root.path().join("gpio532/direction")).unwrap(), "out");
        gpio.write(20, Level::Low).unwrap();
        assert_eq!(std::fs::read_to_string(root.path().join("gpio532/value")).unwrap(), "0");
        assert_eq!(gpio.read(21).unwrap(), Level::High);
    }

    #[test]
    fn sysfs_exports_offset_line() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("export"), "").unwrap();
        add_chip(root.path(), "gpiochip512", "pinctrl-rp1", 512);

        // The fake export file does not create pin directories
        let result = SysfsGpio::open_at(root.path(), &wired());

        assert!(matches!(result, Err(Error::Gpio(_))));
        assert_eq!(std::fs::read_to_string(root.path().join("export")).unwrap(), "533");
    }

    #[test]
    fn pinctrl_base_defaults_to_zero() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(pinctrl_base(root.path()), 0);

        add_chip(root.path(), "gpiochip100", "some-expander", 100);
        assert_eq!(pinctrl_base(root.path()), 0);
    }
}
