// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use {
    super::*,
    nusb::{
        transfer::{Control, ControlType, Recipient, TransferError},
        Interface,
    },
    std::time::Duration,
};

/// The interface for audio control in USB device, claimed for class-specific requests.
pub struct UsbAudioUnit {
    interface: Interface,
    interface_number: u8,
}

impl UsbAudioUnit {
    const AUDIO_CLASS: u8 = 0x01;
    const AUDIOCONTROL_SUBCLASS: u8 = 0x01;

    /// Find the device by vendor and product identifiers, then claim the interface for audio
    /// control. When the number of interface is not given, the first interface of audio control
    /// class is used.
    pub fn open(vendor_id: u16, product_id: u16, interface: Option<u8>) -> Result<Self, Error> {
        let device_info = nusb::list_devices()
            .map_err(|e| io_err_to_glib(&e, "Fail to enumerate USB devices"))?
            .find(|info| info.vendor_id() == vendor_id && info.product_id() == product_id)
            .ok_or_else(|| {
                let label = format!(
                    "USB device {:04x}:{:04x} is not found",
                    vendor_id, product_id
                );
                Error::new(FileError::Noent, &label)
            })?;

        let interface_number = match interface {
            Some(number) => number,
            None => device_info
                .interfaces()
                .find(|info| {
                    info.class() == Self::AUDIO_CLASS
                        && info.subclass() == Self::AUDIOCONTROL_SUBCLASS
                })
                .map(|info| info.interface_number())
                .ok_or_else(|| {
                    Error::new(FileError::Nxio, "No interface for audio control is found")
                })?,
        };

        let device = device_info
            .open()
            .map_err(|e| io_err_to_glib(&e, "Fail to open USB device"))?;

        let interface = device
            .claim_interface(interface_number)
            .map_err(|e| io_err_to_glib(&e, "Fail to claim interface for audio control"))?;

        debug!(
            bus = device_info.bus_number(),
            address = device_info.device_address(),
            vendor_id,
            product_id,
            interface_number,
            "USB device opened",
        );

        Ok(Self {
            interface,
            interface_number,
        })
    }

    fn control(req: &Uac2CtlRequest) -> Control {
        Control {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: req.request,
            value: req.value,
            index: req.index,
        }
    }
}

impl Uac2Transport<Error> for UsbAudioUnit {
    fn interface_number(&self) -> Option<u8> {
        Some(self.interface_number)
    }

    fn control_in(
        &self,
        req: &Uac2CtlRequest,
        data: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, Error> {
        let res = self.interface.control_in_blocking(
            Self::control(req),
            data,
            Duration::from_millis(timeout_ms as u64),
        );
        debug!(
            request_type = Uac2CtlRequest::REQUEST_TYPE_IN,
            unit = req.unit_id(),
            selector = ?req.selector(),
            channel = ?req.channel(),
            ?data,
            ?res,
        );
        res.map_err(|e| transfer_err_to_glib(e, req))
    }

    fn control_out(&self, req: &Uac2CtlRequest, data: &[u8], timeout_ms: u32) -> Result<usize, Error> {
        let res = self.interface.control_out_blocking(
            Self::control(req),
            data,
            Duration::from_millis(timeout_ms as u64),
        );
        debug!(
            request_type = Uac2CtlRequest::REQUEST_TYPE_OUT,
            unit = req.unit_id(),
            selector = ?req.selector(),
            channel = ?req.channel(),
            ?data,
            ?res,
        );
        res.map_err(|e| transfer_err_to_glib(e, req))
    }
}

fn io_err_to_glib(e: &std::io::Error, msg: &str) -> Error {
    let code = match e.kind() {
        std::io::ErrorKind::NotFound => FileError::Noent,
        std::io::ErrorKind::PermissionDenied => FileError::Acces,
        std::io::ErrorKind::InvalidInput => FileError::Inval,
        _ => FileError::Failed,
    };
    Error::new(code, &format!("{}: {}", msg, e))
}

fn transfer_err_to_glib(e: TransferError, req: &Uac2CtlRequest) -> Error {
    let code = match e {
        TransferError::Stall => FileError::Io,
        TransferError::Disconnected => FileError::Nodev,
        TransferError::Fault => FileError::Fault,
        TransferError::Cancelled => FileError::Intr,
        _ => FileError::Failed,
    };
    let label = format!(
        "{} at unit {}, selector {:?}, channel {:?}",
        e,
        req.unit_id(),
        req.selector(),
        req.channel()
    );
    Error::new(code, &label)
}

/// Map the error of control request to the error for runtime.
pub fn uac2_err_to_glib(e: Uac2Error<Error>) -> Error {
    match e {
        Uac2Error::InvalidArgument(cause) => Error::new(FileError::Inval, cause),
        Uac2Error::ShortTransfer { expected, actual } => {
            let label = format!(
                "Short transfer: {} bytes transferred while {} bytes requested",
                actual, expected
            );
            Error::new(FileError::Io, &label)
        }
        Uac2Error::TransportFailure(cause) | Uac2Error::AllocationFailure(cause) => cause,
    }
}
