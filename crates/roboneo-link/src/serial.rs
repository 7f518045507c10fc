//! Serial device access
//!
//! The port is opened in raw mode with explicit line settings, so a board
//! never depends on how the tty was left by whatever used it last.

use std::path::Path;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilder, SerialPortBuilderExt, SerialStream, StopBits};

use roboneo_core::{FaceError, FaceResult};

/// Read timeout applied to the port
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Reading half of an open serial device
pub type SerialReader = ReadHalf<SerialStream>;

/// Writing half of an open serial device
pub type SerialWriter = WriteHalf<SerialStream>;

/// Line settings of the inter-board link: 8N1, no flow control
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl SerialSettings {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: SERIAL_TIMEOUT,
        }
    }

    /// Port builder carrying these settings
    pub fn builder(&self, port: &Path) -> SerialPortBuilder {
        tokio_serial::new(port.to_string_lossy(), self.baud_rate)
            .data_bits(self.data_bits)
            .parity(self.parity)
            .stop_bits(self.stop_bits)
            .flow_control(self.flow_control)
            .timeout(self.timeout)
    }
}

/// Open a serial device at `baud_rate` (8N1, raw) for reading and writing
pub async fn open_serial(port: &Path, baud_rate: u32) -> FaceResult<(SerialReader, SerialWriter)> {
    let settings = SerialSettings::new(baud_rate);
    let stream = settings
        .builder(port)
        .open_native_async()
        .map_err(|e| FaceError::Channel(format!("{}: {}", port.display(), e)))?;

    tracing::info!("Opened serial port {} ({} baud, 8N1)", port.display(), baud_rate);
    Ok(tokio::io::split(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_carry_baud_rate() {
        let settings = SerialSettings::new(9600);
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.flow_control, FlowControl::None);

        let port = Path::new("/dev/ttyS0");
        let expected = tokio_serial::new("/dev/ttyS0", 9600)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(SERIAL_TIMEOUT);
        assert_eq!(settings.builder(port), expected);
        assert_ne!(SerialSettings::new(115_200).builder(port), expected);
    }

    #[tokio::test]
    async fn test_missing_port_is_channel_error() {
        let result = open_serial(Path::new("/nonexistent/roboneo/tty"), 115_200).await;
        assert!(matches!(result, Err(FaceError::Channel(_))));
    }
}
