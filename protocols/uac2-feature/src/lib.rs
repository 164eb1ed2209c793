// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

#![doc = include_str!("../README.md")]

pub mod ctl;
pub mod presonus;

use std::fmt::{Debug, Display};

/// The code of control selector for Feature Unit, listed in Appendix A.17.7 of USB Audio Class
/// 2.0.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeatureCtlSelector {
    /// Boolean, 0 for off.
    Mute,
    /// Signed 16 bit integer in 1/256 dB unit.
    Volume,
    Bass,
    Mid,
    Treble,
    GraphicEqualizer,
    AutomaticGain,
    Delay,
    BassBoost,
    Loudness,
    InputGain,
    InputGainPad,
    PhaseInverter,
    Underflow,
    Overflow,
    Latency,
    Reserved(u8),
}

impl FeatureCtlSelector {
    const MUTE: u8 = 0x01;
    const VOLUME: u8 = 0x02;
    const BASS: u8 = 0x03;
    const MID: u8 = 0x04;
    const TREBLE: u8 = 0x05;
    const GRAPHIC_EQUALIZER: u8 = 0x06;
    const AUTOMATIC_GAIN: u8 = 0x07;
    const DELAY: u8 = 0x08;
    const BASS_BOOST: u8 = 0x09;
    const LOUDNESS: u8 = 0x0a;
    const INPUT_GAIN: u8 = 0x0b;
    const INPUT_GAIN_PAD: u8 = 0x0c;
    const PHASE_INVERTER: u8 = 0x0d;
    const UNDERFLOW: u8 = 0x0e;
    const OVERFLOW: u8 = 0x0f;
    const LATENCY: u8 = 0x10;
}

impl From<u8> for FeatureCtlSelector {
    fn from(val: u8) -> Self {
        match val {
            Self::MUTE => Self::Mute,
            Self::VOLUME => Self::Volume,
            Self::BASS => Self::Bass,
            Self::MID => Self::Mid,
            Self::TREBLE => Self::Treble,
            Self::GRAPHIC_EQUALIZER => Self::GraphicEqualizer,
            Self::AUTOMATIC_GAIN => Self::AutomaticGain,
            Self::DELAY => Self::Delay,
            Self::BASS_BOOST => Self::BassBoost,
            Self::LOUDNESS => Self::Loudness,
            Self::INPUT_GAIN => Self::InputGain,
            Self::INPUT_GAIN_PAD => Self::InputGainPad,
            Self::PHASE_INVERTER => Self::PhaseInverter,
            Self::UNDERFLOW => Self::Underflow,
            Self::OVERFLOW => Self::Overflow,
            Self::LATENCY => Self::Latency,
            _ => Self::Reserved(val),
        }
    }
}

impl From<FeatureCtlSelector> for u8 {
    fn from(selector: FeatureCtlSelector) -> Self {
        match selector {
            FeatureCtlSelector::Mute => FeatureCtlSelector::MUTE,
            FeatureCtlSelector::Volume => FeatureCtlSelector::VOLUME,
            FeatureCtlSelector::Bass => FeatureCtlSelector::BASS,
            FeatureCtlSelector::Mid => FeatureCtlSelector::MID,
            FeatureCtlSelector::Treble => FeatureCtlSelector::TREBLE,
            FeatureCtlSelector::GraphicEqualizer => FeatureCtlSelector::GRAPHIC_EQUALIZER,
            FeatureCtlSelector::AutomaticGain => FeatureCtlSelector::AUTOMATIC_GAIN,
            FeatureCtlSelector::Delay => FeatureCtlSelector::DELAY,
            FeatureCtlSelector::BassBoost => FeatureCtlSelector::BASS_BOOST,
            FeatureCtlSelector::Loudness => FeatureCtlSelector::LOUDNESS,
            FeatureCtlSelector::InputGain => FeatureCtlSelector::INPUT_GAIN,
            FeatureCtlSelector::InputGainPad => FeatureCtlSelector::INPUT_GAIN_PAD,
            FeatureCtlSelector::PhaseInverter => FeatureCtlSelector::PHASE_INVERTER,
            FeatureCtlSelector::Underflow => FeatureCtlSelector::UNDERFLOW,
            FeatureCtlSelector::Overflow => FeatureCtlSelector::OVERFLOW,
            FeatureCtlSelector::Latency => FeatureCtlSelector::LATENCY,
            FeatureCtlSelector::Reserved(val) => val,
        }
    }
}

/// The logical channel addressed by the request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AudioCh {
    /// Master channel, affecting all of channels.
    Master,
    /// Each of logical channel, numbered from 1.
    Each(u8),
}

impl Default for AudioCh {
    fn default() -> Self {
        Self::Master
    }
}

impl AudioCh {
    const MASTER: u8 = 0x00;

    /// The left channel in stereo pair.
    pub const LEFT: Self = Self::Each(1);
    /// The right channel in stereo pair.
    pub const RIGHT: Self = Self::Each(2);
}

impl From<u8> for AudioCh {
    fn from(val: u8) -> Self {
        match val {
            Self::MASTER => Self::Master,
            _ => Self::Each(val),
        }
    }
}

impl From<AudioCh> for u8 {
    fn from(ch: AudioCh) -> Self {
        match ch {
            AudioCh::Master => AudioCh::MASTER,
            AudioCh::Each(val) => val,
        }
    }
}

/// Feature Unit in audio function of the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeatureUnit {
    /// The numeric identifier in descriptors of audio function.
    pub id: u8,
    /// The name of signal path in which the unit locates.
    pub name: &'static str,
}

/// The parameters of class-specific request addressed to Feature Unit in the interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Uac2CtlRequest {
    /// bRequest field.
    pub request: u8,
    /// wValue field.
    pub value: u16,
    /// wIndex field.
    pub index: u16,
}

impl Uac2CtlRequest {
    /// The request code for current setting attribute.
    pub const CUR: u8 = 0x01;

    /// bmRequestType for class-specific request to interface, device-to-host.
    pub const REQUEST_TYPE_IN: u8 = 0xa1;
    /// bmRequestType for class-specific request to interface, host-to-device.
    pub const REQUEST_TYPE_OUT: u8 = 0x21;

    /// Build CUR request for the control selector and the channel of Feature Unit.
    pub fn cur(unit_id: u8, selector: FeatureCtlSelector, ch: AudioCh, interface: u8) -> Self {
        let value = ((u8::from(selector) as u16) << 8) | (u8::from(ch) as u16);
        let index = ((unit_id as u16) << 8) | (interface as u16);
        Self {
            request: Self::CUR,
            value,
            index,
        }
    }

    pub fn selector(&self) -> FeatureCtlSelector {
        FeatureCtlSelector::from((self.value >> 8) as u8)
    }

    pub fn channel(&self) -> AudioCh {
        AudioCh::from((self.value & 0xff) as u8)
    }

    pub fn unit_id(&self) -> u8 {
        (self.index >> 8) as u8
    }

    pub fn interface(&self) -> u8 {
        (self.index & 0xff) as u8
    }
}

/// For error reporting of control request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Uac2Error<T: Display + Clone> {
    /// Malformed call, such as unexpected size of payload or closed handle.
    InvalidArgument(&'static str),
    /// Fail to finish control transfer.
    TransportFailure(T),
    /// The control transfer finished with less bytes than requested.
    ShortTransfer {
        /// The size of payload requested.
        expected: usize,
        /// The size of payload actually transferred.
        actual: usize,
    },
    /// Fail to allocate or register control in host mixer.
    AllocationFailure(T),
}

impl<T: Display + Clone> Display for Uac2Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(cause) => write!(f, "Invalid argument: {}", cause),
            Self::TransportFailure(cause) => write!(f, "Fail to transfer: {}", cause),
            Self::ShortTransfer { expected, actual } => write!(
                f,
                "Short transfer: {} bytes transferred while {} bytes requested",
                actual, expected
            ),
            Self::AllocationFailure(cause) => write!(f, "Fail to register control: {}", cause),
        }
    }
}

impl<T: Display + Clone + Debug> std::error::Error for Uac2Error<T> {}

/// Synchronous control transfer over endpoint 0, addressed to the interface of audio control.
pub trait Uac2Transport<T: Display + Clone> {
    /// The maximum size of payload for the control of Feature Unit.
    const MAX_PAYLOAD_SIZE: usize = 4;

    /// The number of interface for audio control, or None when the handle is not available.
    fn interface_number(&self) -> Option<u8>;

    /// Transfer data from device, then return the size of transferred data.
    fn control_in(
        &self,
        req: &Uac2CtlRequest,
        data: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, T>;

    /// Transfer data to device, then return the size of transferred data.
    fn control_out(&self, req: &Uac2CtlRequest, data: &[u8], timeout_ms: u32)
        -> Result<usize, T>;

    /// Read current value of the control by GET request. The whole buffer is filled.
    fn get_cur(
        &self,
        unit_id: u8,
        selector: FeatureCtlSelector,
        ch: AudioCh,
        data: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Uac2Error<T>> {
        let req = build_cur_request::<T>(
            self.interface_number(),
            unit_id,
            selector,
            ch,
            data.len(),
            Self::MAX_PAYLOAD_SIZE,
        )?;
        self.control_in(&req, data, timeout_ms)
            .map_err(|cause| Uac2Error::TransportFailure(cause))
            .and_then(|len| check_transferred(data.len(), len))
    }

    /// Write new value of the control by SET request.
    fn set_cur(
        &self,
        unit_id: u8,
        selector: FeatureCtlSelector,
        ch: AudioCh,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<(), Uac2Error<T>> {
        let req = build_cur_request::<T>(
            self.interface_number(),
            unit_id,
            selector,
            ch,
            data.len(),
            Self::MAX_PAYLOAD_SIZE,
        )?;
        self.control_out(&req, data, timeout_ms)
            .map_err(|cause| Uac2Error::TransportFailure(cause))
            .and_then(|len| check_transferred(data.len(), len))
    }
}

fn build_cur_request<T: Display + Clone>(
    interface: Option<u8>,
    unit_id: u8,
    selector: FeatureCtlSelector,
    ch: AudioCh,
    size: usize,
    max_size: usize,
) -> Result<Uac2CtlRequest, Uac2Error<T>> {
    if size == 0 || size > max_size {
        Err(Uac2Error::InvalidArgument("size of payload should be 1 to 4 bytes"))
    } else {
        interface
            .ok_or(Uac2Error::InvalidArgument("handle of interface is not available"))
            .map(|interface| Uac2CtlRequest::cur(unit_id, selector, ch, interface))
    }
}

fn check_transferred<T: Display + Clone>(
    expected: usize,
    actual: usize,
) -> Result<(), Uac2Error<T>> {
    if actual < expected {
        Err(Uac2Error::ShortTransfer { expected, actual })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {super::*, std::cell::RefCell};

    #[derive(Default)]
    struct TestTransport {
        interface: Option<u8>,
        resp: Vec<u8>,
        reqs: RefCell<Vec<(Uac2CtlRequest, Vec<u8>)>>,
        error: Option<String>,
    }

    impl Uac2Transport<String> for TestTransport {
        fn interface_number(&self) -> Option<u8> {
            self.interface
        }

        fn control_in(
            &self,
            req: &Uac2CtlRequest,
            data: &mut [u8],
            _: u32,
        ) -> Result<usize, String> {
            self.reqs.borrow_mut().push((*req, Vec::new()));
            if let Some(error) = &self.error {
                return Err(error.clone());
            }
            let len = std::cmp::min(data.len(), self.resp.len());
            data[..len].copy_from_slice(&self.resp[..len]);
            Ok(len)
        }

        fn control_out(&self, req: &Uac2CtlRequest, data: &[u8], _: u32) -> Result<usize, String> {
            self.reqs.borrow_mut().push((*req, data.to_vec()));
            if let Some(error) = &self.error {
                Err(error.clone())
            } else {
                Ok(data.len())
            }
        }
    }

    #[test]
    fn feature_ctl_selector_from() {
        (0x00..=0x11).for_each(|val| {
            assert_eq!(val, u8::from(FeatureCtlSelector::from(val)));
        });
        assert_eq!(FeatureCtlSelector::Mute, FeatureCtlSelector::from(0x01));
        assert_eq!(FeatureCtlSelector::Volume, FeatureCtlSelector::from(0x02));
        assert_eq!(FeatureCtlSelector::Latency, FeatureCtlSelector::from(0x10));
        assert_eq!(FeatureCtlSelector::Reserved(0x00), FeatureCtlSelector::from(0x00));
        assert_eq!(FeatureCtlSelector::Reserved(0x11), FeatureCtlSelector::from(0x11));
    }

    #[test]
    fn audio_ch_from() {
        assert_eq!(AudioCh::Master, AudioCh::from(0));
        assert_eq!(AudioCh::LEFT, AudioCh::from(1));
        assert_eq!(AudioCh::RIGHT, AudioCh::from(2));
        assert_eq!(2, u8::from(AudioCh::RIGHT));
    }

    #[test]
    fn cur_request_fields() {
        let req = Uac2CtlRequest::cur(11, FeatureCtlSelector::Volume, AudioCh::RIGHT, 0);
        assert_eq!(req.request, 0x01);
        assert_eq!(req.value, 0x0202);
        assert_eq!(req.index, 0x0b00);
        assert_eq!(req.selector(), FeatureCtlSelector::Volume);
        assert_eq!(req.channel(), AudioCh::RIGHT);
        assert_eq!(req.unit_id(), 11);
        assert_eq!(req.interface(), 0);

        let req = Uac2CtlRequest::cur(10, FeatureCtlSelector::Mute, AudioCh::Master, 3);
        assert_eq!(req.value, 0x0100);
        assert_eq!(req.index, 0x0a03);
    }

    #[test]
    fn get_cur_payload() {
        let transport = TestTransport {
            interface: Some(0),
            resp: vec![0xac, 0xff],
            ..Default::default()
        };
        let mut buf = [0; 2];
        transport
            .get_cur(10, FeatureCtlSelector::Volume, AudioCh::LEFT, &mut buf, 100)
            .unwrap();
        assert_eq!(buf, [0xac, 0xff]);

        let reqs = transport.reqs.borrow();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].0.value, 0x0201);
        assert_eq!(reqs[0].0.index, 0x0a00);
    }

    #[test]
    fn invalid_payload_size() {
        let transport = TestTransport {
            interface: Some(0),
            resp: vec![0; 8],
            ..Default::default()
        };

        let mut buf = [0; 0];
        let err = transport
            .get_cur(10, FeatureCtlSelector::Mute, AudioCh::Master, &mut buf, 100)
            .unwrap_err();
        assert!(matches!(err, Uac2Error::InvalidArgument(_)));

        let mut buf = [0; 5];
        let err = transport
            .get_cur(10, FeatureCtlSelector::Mute, AudioCh::Master, &mut buf, 100)
            .unwrap_err();
        assert!(matches!(err, Uac2Error::InvalidArgument(_)));

        let err = transport
            .set_cur(10, FeatureCtlSelector::Mute, AudioCh::Master, &[0; 5], 100)
            .unwrap_err();
        assert!(matches!(err, Uac2Error::InvalidArgument(_)));

        let err = transport
            .set_cur(10, FeatureCtlSelector::Mute, AudioCh::Master, &[], 100)
            .unwrap_err();
        assert!(matches!(err, Uac2Error::InvalidArgument(_)));

        assert!(transport.reqs.borrow().is_empty());
    }

    #[test]
    fn unavailable_handle() {
        let transport = TestTransport::default();
        let err = transport
            .set_cur(10, FeatureCtlSelector::Mute, AudioCh::Master, &[0], 100)
            .unwrap_err();
        assert!(matches!(err, Uac2Error::InvalidArgument(_)));
        assert!(transport.reqs.borrow().is_empty());
    }

    #[test]
    fn transport_failure() {
        let transport = TestTransport {
            interface: Some(0),
            error: Some("stall".to_string()),
            ..Default::default()
        };
        let mut buf = [0; 1];
        let err = transport
            .get_cur(11, FeatureCtlSelector::Mute, AudioCh::Master, &mut buf, 100)
            .unwrap_err();
        assert_eq!(err, Uac2Error::TransportFailure("stall".to_string()));
        assert_eq!(transport.reqs.borrow().len(), 1);
    }

    #[test]
    fn short_transfer() {
        let transport = TestTransport {
            interface: Some(0),
            resp: vec![0x01],
            ..Default::default()
        };
        let mut buf = [0; 2];
        let err = transport
            .get_cur(10, FeatureCtlSelector::Volume, AudioCh::LEFT, &mut buf, 100)
            .unwrap_err();
        assert_eq!(
            err,
            Uac2Error::ShortTransfer {
                expected: 2,
                actual: 1
            }
        );
    }
}
