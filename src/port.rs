use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::cli::SerialOpts;
use crate::error::ChannelError;

/// Byte transport the link runs over. Production is the radio's serial
/// port; tests substitute a scripted in-memory channel.
pub trait Channel: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

struct SerialChannel(Box<dyn SerialPort>);

impl Channel for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Driver-level poll timeout. Delimiter scans retry on this, so it bounds
/// how often a blocked receive re-checks its deadline, not how long a
/// frame may take.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub fn open_port(opts: &SerialOpts) -> Result<Box<dyn Channel>, ChannelError> {
    let dev = match &opts.dev {
        Some(dev) => dev.clone(),
        None => discover_radio()?,
    };
    let port = serialport::new(&dev, opts.baud)
        .timeout(READ_TIMEOUT)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open()?;
    info!(dev = %dev, baud = opts.baud, "serial channel open");
    Ok(Box::new(SerialChannel(port)))
}

/// Scan the USB serial ports for the XBee radio. It enumerates as
/// "USB Serial Port" on Windows and "USB UART" on macOS.
pub fn discover_radio() -> Result<String, ChannelError> {
    for info in serialport::available_ports()? {
        let SerialPortType::UsbPort(usb) = &info.port_type else {
            continue;
        };
        let product = usb.product.as_deref().unwrap_or("");
        if product.contains("USB Serial Port") || product.contains("USB UART") {
            info!(dev = %info.port_name, product = %product, "radio found");
            return Ok(info.port_name);
        }
        debug!(dev = %info.port_name, product = %product, "skipping port");
    }
    Err(ChannelError::DeviceNotFound)
}
