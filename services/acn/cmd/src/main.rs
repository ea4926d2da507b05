//! ACN node binary.
//!
//! Runs the root layer over UDP and logs the root PDUs it receives. It can
//! also send a periodic test payload to a set of destinations and query a
//! USB Pro family widget on a serial device.

use acn_root::{RootLayer, UdpTransport};
use acn_usbpro::{ArduinoDmxUsbWidget, Message, MessageDecoder, UsbProWidget, WriterTransport};
use acn_wire::{Cid, DataPdu, HeaderSet, PayloadHandler, VectorSize};
use bytes::BytesMut;
use clap::Parser;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::{NodeConfig, WidgetConfig, WidgetKind};
use logging::AcnLogFormatter;

/// Vector of the test payload PDU inside the root layer
const TEST_PAYLOAD_VECTOR: u32 = 0x02;

/// ACN root layer node
#[derive(Parser, Debug)]
#[command(name = "acn-node", version, about = "ACN root layer node with optional USB Pro widget")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Component identifier (UUID), generated when unset
    #[arg(long)]
    cid: Option<Cid>,

    /// Listen address, e.g. 0.0.0.0:5568
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Send the test payload to this address (repeatable)
    #[arg(long)]
    send_to: Vec<SocketAddr>,

    /// Test payload interval, e.g. 500ms
    #[arg(long)]
    send_interval: Option<humantime::Duration>,

    /// Root vector to send and log
    #[arg(long)]
    vector: Option<u32>,

    /// Serial device of a USB Pro widget
    #[arg(long)]
    widget: Option<PathBuf>,

    /// Widget protocol
    #[arg(long, value_enum)]
    widget_kind: Option<WidgetKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Command line settings win over file and environment
    fn apply(self, config: &mut NodeConfig) {
        if let Some(cid) = self.cid {
            config.cid = Some(cid);
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if !self.send_to.is_empty() {
            config.destinations = self.send_to;
        }
        if let Some(interval) = self.send_interval {
            config.send_interval = interval.into();
        }
        if let Some(vector) = self.vector {
            config.vector = vector;
        }
        if let Some(device) = self.widget {
            let kind = config.widget.as_ref().map(|w| w.kind).unwrap_or_default();
            config.widget = Some(WidgetConfig { device, kind });
        }
        if let (Some(kind), Some(widget)) = (self.widget_kind, config.widget.as_mut()) {
            widget.kind = kind;
        }
    }
}

/// Widget opened on a serial device
enum Widget {
    UsbPro(UsbProWidget<WriterTransport<File>>),
    Arduino(ArduinoDmxUsbWidget<WriterTransport<File>>),
}

impl Widget {
    fn open(config: &WidgetConfig) -> io::Result<(Self, File)> {
        let device = OpenOptions::new().read(true).write(true).open(&config.device)?;
        let reader = device.try_clone()?;
        let transport = WriterTransport::new(device);

        let widget = match config.kind {
            WidgetKind::UsbPro => Widget::UsbPro(UsbProWidget::new(transport)),
            WidgetKind::Arduino => Widget::Arduino(ArduinoDmxUsbWidget::new(transport)),
        };
        Ok((widget, reader))
    }

    fn generic(&mut self) -> &mut UsbProWidget<WriterTransport<File>> {
        match self {
            Widget::UsbPro(widget) => widget,
            Widget::Arduino(widget) => widget.generic(),
        }
    }

    /// Ask the widget to describe itself; replies are logged
    fn query(&mut self) {
        let generic = self.generic();
        generic.set_dmx_callback(|frame| {
            component_debug!(
                "widget",
                "received {} channels, start code {}, status {:#04x}",
                frame.data.len(),
                frame.start_code,
                frame.status
            );
        });
        generic.get_serial(|result| match result {
            Ok(serial) => component_info!("widget", "Serial number {}", serial),
            Err(e) => component_warn!("widget", "Serial number request failed: {}", e),
        });
        generic.get_parameters(|result| match result {
            Ok(params) => component_info!(
                "widget",
                "Firmware {}.{}, break {}, mab {}, rate {}",
                params.firmware >> 8,
                params.firmware & 0xFF,
                params.break_time,
                params.mab_time,
                params.rate
            ),
            Err(e) => component_warn!("widget", "Parameter request failed: {}", e),
        });

        if let Widget::Arduino(widget) = self {
            widget.get_extended_parameters(|result| match result {
                Ok(ports) => component_info!(
                    "widget",
                    "{} output ports, {} input ports",
                    ports.output_ports,
                    ports.input_ports
                ),
                Err(e) => component_warn!("widget", "Extended parameter request failed: {}", e),
            });
        }
    }

    fn handle_message(&mut self, message: &Message) {
        match self {
            Widget::UsbPro(widget) => widget.handle_message(message.label, &message.data),
            Widget::Arduino(widget) => widget.handle_message(message.label, &message.data),
        }
    }

    fn stop(&mut self) {
        match self {
            Widget::UsbPro(widget) => widget.stop(),
            Widget::Arduino(widget) => widget.stop(),
        }
    }
}

/// Read and frame widget messages on a dedicated thread
fn spawn_widget_reader(
    path: &Path,
    mut device: File,
    tx: mpsc::UnboundedSender<Message>,
) -> io::Result<std::thread::JoinHandle<()>> {
    let path = path.display().to_string();
    std::thread::Builder::new()
        .name("widget-reader".to_string())
        .spawn(move || {
            let mut decoder = MessageDecoder::new();
            let mut buf = BytesMut::with_capacity(1024);
            let mut chunk = [0u8; 512];

            loop {
                match device.read(&mut chunk) {
                    Ok(0) => {
                        component_warn!("widget", "{} closed", path);
                        return;
                    }
                    Ok(n) => {
                        buf.extend_from_slice(&chunk[..n]);
                        while let Some(message) = decoder.decode(&mut buf) {
                            if tx.send(message).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        component_error!("widget", "Read from {} failed: {}", path, e);
                        return;
                    }
                }
            }
        })
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("acn_node={}", args.log_level).parse()?)
        .add_directive(format!("acn_root={}", args.log_level).parse()?)
        .add_directive(format!("acn_wire={}", args.log_level).parse()?)
        .add_directive(format!("acn_usbpro={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(true)
        .event_format(AcnLogFormatter::new("acn"))
        .init();

    info!("Starting ACN node v{}", env!("CARGO_PKG_VERSION"));

    let mut config = NodeConfig::load_from_file(&args.config)?;
    args.apply(&mut config);

    let cid = config.cid.unwrap_or_else(Cid::generate);
    let transport = UdpTransport::bind(config.listen)?;
    let mut receiver = transport.receiver()?;
    component_info!("root", "Listening on {} as {}", transport.local_addr()?, cid);

    let mut layer = RootLayer::new(transport, cid);
    layer.add_inflator(Box::new(PayloadHandler::new(
        config.vector,
        |headers: &HeaderSet, data: &[u8]| {
            let sender = headers
                .root_header()
                .map_or_else(|| "unknown".to_string(), |h| h.cid.to_string());
            let source = headers
                .source()
                .map_or_else(|| "unknown".to_string(), |s| s.to_string());
            component_info!(
                "root",
                "{} byte payload from {} ({})",
                data.len(),
                sender,
                source
            );
        },
    )))?;

    let (widget_tx, widget_rx) = mpsc::unbounded_channel();
    let mut widget_rx = Some(widget_rx);
    let mut widget = match config.widget.as_ref() {
        Some(widget_config) => match Widget::open(widget_config) {
            Ok((mut widget, reader)) => {
                spawn_widget_reader(&widget_config.device, reader, widget_tx)?;
                component_info!(
                    "widget",
                    "Opened {:?} widget on {}",
                    widget_config.kind,
                    widget_config.device.display()
                );
                widget.query();
                Some(widget)
            }
            Err(e) => {
                component_error!(
                    "widget",
                    "Failed to open {}: {}",
                    widget_config.device.display(),
                    e
                );
                widget_rx = None;
                None
            }
        },
        None => {
            widget_rx = None;
            None
        }
    };

    let send_interval = if config.send_interval.is_zero() {
        Duration::from_secs(1)
    } else {
        config.send_interval
    };
    let mut ticker = tokio::time::interval(send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u32 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("ACN node started. Waiting for events...");

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    component_warn!("node", "Failed to listen for Ctrl+C: {}", e);
                }
                info!("Received shutdown signal");
                break;
            }

            result = receiver.recv() => match result {
                Ok((datagram, source)) => {
                    let consumed = layer.handle_datagram(&datagram, source);
                    if consumed < datagram.len() {
                        component_debug!(
                            "root",
                            "Decoded {} of {} bytes from {}",
                            consumed,
                            datagram.len(),
                            source
                        );
                    }
                }
                Err(e) => component_warn!("transport", "Receive failed: {}", e),
            },

            _ = ticker.tick(), if !config.destinations.is_empty() => {
                sequence = sequence.wrapping_add(1);
                let data = sequence.to_be_bytes();
                let payload = DataPdu::new(VectorSize::Four, TEST_PAYLOAD_VECTOR, &data);
                for destination in &config.destinations {
                    if let Err(e) = layer.send_pdu(*destination, config.vector, &payload) {
                        component_warn!("root", "Send to {} failed: {}", destination, e);
                    }
                }
            }

            message = async {
                match widget_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => match (message, widget.as_mut()) {
                (Some(message), Some(widget)) => widget.handle_message(&message),
                (Some(_), None) => {}
                (None, _) => {
                    component_warn!("widget", "Widget reader stopped");
                    widget_rx = None;
                }
            },
        }
    }

    if let Some(widget) = widget.as_mut() {
        widget.stop();
    }

    info!("ACN node shutdown complete");
    Ok(())
}
