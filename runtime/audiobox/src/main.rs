// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto
mod model;
mod usb;

use {
    alsactl::{prelude::*, *},
    clap::Parser,
    glib::{ControlFlow, Error, FileError},
    model::*,
    nix::sys::signal,
    protocols::{presonus::*, *},
    runtime_core::{card_cntr::*, cmdline::*, dispatcher::*, *},
    std::sync::mpsc,
    tracing::{debug, debug_span, info},
    uac2_feature_protocols as protocols,
    usb::*,
};

enum Event {
    Shutdown,
    Disconnected,
    Elem((ElemId, ElemEventMask)),
}

/// The parameters to launch the runtime.
struct AudioboxParams {
    card_id: u32,
    vendor_id: u16,
    product_id: u16,
    interface: Option<u8>,
    playback_unit: u8,
    capture_unit: u8,
}

struct AudioboxRuntime {
    unit: UsbAudioUnit,
    model: AudioboxModel,
    card_cntr: CardCntr,
    rx: mpsc::Receiver<Event>,
    tx: mpsc::SyncSender<Event>,
    dispatchers: Vec<Dispatcher>,
}

impl Drop for AudioboxRuntime {
    fn drop(&mut self) {
        // At first, stop event loop in all of dispatchers to avoid queueing new events.
        for dispatcher in &mut self.dispatchers {
            dispatcher.stop();
        }

        // Next, consume all events in queue to release blocked thread for sender.
        for _ in self.rx.try_iter() {}

        // Finally Finish I/O threads.
        self.dispatchers.clear();
    }
}

impl RuntimeOperation<AudioboxParams> for AudioboxRuntime {
    fn new(params: AudioboxParams, log_level: Option<LogLevel>) -> Result<Self, Error> {
        init_tracing(log_level);

        let config = FeatureUnitConfig::new(params.playback_unit, params.capture_unit);

        let unit = UsbAudioUnit::open(params.vendor_id, params.product_id, params.interface)?;

        let model = AudioboxModel::new(config);

        let card_cntr = CardCntr::default();
        card_cntr.card.open(params.card_id, 0)?;

        // Use uni-directional channel for communication to child threads.
        let (tx, rx) = mpsc::sync_channel(32);

        Ok(AudioboxRuntime {
            unit,
            model,
            card_cntr,
            rx,
            tx,
            dispatchers: Vec::new(),
        })
    }

    fn listen(&mut self) -> Result<(), Error> {
        self.launch_system_event_dispatcher()?;

        let enter = debug_span!("cache").entered();
        self.model.cache(&mut self.unit)?;
        enter.exit();

        let enter = debug_span!("load").entered();
        self.model.load(&mut self.card_cntr)?;
        enter.exit();

        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        let enter = debug_span!("event").entered();

        loop {
            let ev = match self.rx.recv() {
                Ok(ev) => ev,
                Err(_) => continue,
            };

            match ev {
                Event::Shutdown => break,
                Event::Disconnected => break,
                Event::Elem((elem_id, events)) => {
                    let _enter = debug_span!("element").entered();

                    debug!(
                        numid = elem_id.numid(),
                        name = elem_id.name().as_str(),
                        iface = ?elem_id.iface(),
                        index = elem_id.index(),
                    );

                    let res = self.card_cntr.dispatch_elem_event(
                        &mut self.unit,
                        &elem_id,
                        &events,
                        &mut self.model,
                    );
                    if let Err(err) = res {
                        if err.kind::<FileError>() == Some(FileError::Nodev) {
                            info!("USB device is disconnected: {}", err);
                            break;
                        }
                    }
                }
            }
        }

        enter.exit();

        Ok(())
    }
}

impl AudioboxRuntime {
    const SYSTEM_DISPATCHER_NAME: &'static str = "system event dispatcher";

    fn launch_system_event_dispatcher(&mut self) -> Result<(), Error> {
        let name = Self::SYSTEM_DISPATCHER_NAME.to_string();
        let mut dispatcher = Dispatcher::run(name)?;

        let tx = self.tx.clone();
        dispatcher.attach_signal_handler(signal::Signal::SIGINT, move || {
            let _ = tx.send(Event::Shutdown);
            ControlFlow::Break
        });

        let tx = self.tx.clone();
        dispatcher.attach_snd_card(&self.card_cntr.card, move |_| {
            let _ = tx.send(Event::Disconnected);
        })?;

        let tx = self.tx.clone();
        self.card_cntr
            .card
            .connect_handle_elem_event(move |_, elem_id, events| {
                let _ = tx.send(Event::Elem((elem_id.clone(), events)));
            });

        self.dispatchers.push(dispatcher);

        Ok(())
    }
}

struct AudioboxServiceCmd;

#[derive(Parser, Default)]
#[command(name = "snd-audiobox-ctl-service")]
struct Arguments {
    /// The numeric identifier of sound card in Linux sound subsystem.
    card_id: u32,

    /// The identifier of vendor for USB device, in hexadecimal with 0x prefix or decimal.
    #[arg(long, default_value = "0x194f", value_parser = parse_u16)]
    vendor_id: u16,

    /// The identifier of product for USB device, in hexadecimal with 0x prefix or decimal.
    #[arg(long, default_value = "0x0101", value_parser = parse_u16)]
    product_id: u16,

    /// The number of interface for audio control, detected from descriptors as a default.
    #[arg(long)]
    interface: Option<u8>,

    /// The numeric identifier of Feature Unit in playback path.
    #[arg(long, default_value_t = AudioboxVslProtocol::PLAYBACK_UNIT_ID)]
    playback_unit: u8,

    /// The numeric identifier of Feature Unit in capture path.
    #[arg(long, default_value_t = AudioboxVslProtocol::CAPTURE_UNIT_ID)]
    capture_unit: u8,

    /// The level to debug runtime, disabled as a default.
    #[arg(long, short, value_enum)]
    log_level: Option<LogLevel>,
}

fn parse_u16(literal: &str) -> Result<u16, String> {
    let res = match literal.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => literal.parse::<u16>(),
    };
    res.map_err(|e| format!("{}: {}", literal, e))
}

impl ServiceCmd<Arguments, AudioboxParams, AudioboxRuntime> for AudioboxServiceCmd {
    fn params(args: &Arguments) -> (AudioboxParams, Option<LogLevel>) {
        let params = AudioboxParams {
            card_id: args.card_id,
            vendor_id: args.vendor_id,
            product_id: args.product_id,
            interface: args.interface,
            playback_unit: args.playback_unit,
            capture_unit: args.capture_unit,
        };
        (params, args.log_level)
    }
}

fn main() {
    AudioboxServiceCmd::run()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hexadecimal_identifier() {
        assert_eq!(parse_u16("0x194f"), Ok(0x194f));
        assert_eq!(parse_u16("257"), Ok(0x0101));
        assert!(parse_u16("0xfffff").is_err());
        assert!(parse_u16("vsl").is_err());
    }

    #[test]
    fn default_arguments() {
        let args = Arguments::try_parse_from(["snd-audiobox-ctl-service", "1"]).unwrap();
        let (params, log_level) = AudioboxServiceCmd::params(&args);
        assert_eq!(params.card_id, 1);
        assert_eq!(params.vendor_id, 0x194f);
        assert_eq!(params.product_id, 0x0101);
        assert_eq!(params.interface, None);
        assert_eq!(params.playback_unit, 10);
        assert_eq!(params.capture_unit, 11);
        assert_eq!(log_level, None);
    }

    #[test]
    fn custom_arguments() {
        let args = Arguments::try_parse_from([
            "snd-audiobox-ctl-service",
            "2",
            "--interface",
            "0",
            "--playback-unit",
            "5",
            "--capture-unit",
            "6",
            "-l",
            "debug",
        ])
        .unwrap();
        let (params, log_level) = AudioboxServiceCmd::params(&args);
        assert_eq!(params.interface, Some(0));
        assert_eq!(params.playback_unit, 5);
        assert_eq!(params.capture_unit, 6);
        assert_eq!(log_level, Some(LogLevel::Debug));
    }
}
