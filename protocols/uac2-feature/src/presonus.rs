// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Protocol defined by PreSonus for AudioBox 22 VSL.
//!
//! The module includes protocol implementation defined by PreSonus for AudioBox 22 VSL. The model
//! has two Feature Units; one in playback path and another in capture path. Both of them have
//! mute control for master channel and volume control for the left and right channels.
//!
//! ```text
//! USB stream ---> Feature Unit 10 (playback) ---> analog outputs
//! analog inputs ---> Feature Unit 11 (capture) ---> USB stream
//! ```
//!
//! The value of volume is transferred in 1/256 dB unit and exposed in 1/100 dB unit. Both
//! conversions truncate toward zero, thus the value written to the device is not always read
//! back as the same value.

use {
    super::{ctl::*, *},
    std::fmt::Display,
};

/// The signal path in which Feature Unit locates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AudioboxVslPath {
    Playback,
    Capture,
}

impl AudioboxVslPath {
    fn label(&self) -> &'static str {
        match self {
            Self::Playback => "Playback",
            Self::Capture => "Capture",
        }
    }
}

/// The kind of control in Feature Unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AudioboxVslCtlKind {
    /// Volume of left and right channels.
    Volume,
    /// Mute of master channel.
    Mute,
}

/// The identifiers of Feature Unit for each path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeatureUnitConfig {
    pub playback: FeatureUnit,
    pub capture: FeatureUnit,
}

impl Default for FeatureUnitConfig {
    fn default() -> Self {
        Self::new(
            AudioboxVslProtocol::PLAYBACK_UNIT_ID,
            AudioboxVslProtocol::CAPTURE_UNIT_ID,
        )
    }
}

impl FeatureUnitConfig {
    pub fn new(playback_id: u8, capture_id: u8) -> Self {
        Self {
            playback: FeatureUnit {
                id: playback_id,
                name: AudioboxVslPath::Playback.label(),
            },
            capture: FeatureUnit {
                id: capture_id,
                name: AudioboxVslPath::Capture.label(),
            },
        }
    }

    pub fn unit(&self, path: AudioboxVslPath) -> FeatureUnit {
        match path {
            AudioboxVslPath::Playback => self.playback,
            AudioboxVslPath::Capture => self.capture,
        }
    }
}

/// The control bound to Feature Unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AudioboxVslCtl {
    pub path: AudioboxVslPath,
    pub kind: AudioboxVslCtlKind,
    pub unit: FeatureUnit,
}

impl AudioboxVslCtl {
    /// The name of control, according to the convention of ALSA control.
    pub fn name(&self) -> String {
        let suffix = match self.kind {
            AudioboxVslCtlKind::Volume => "Volume",
            AudioboxVslCtlKind::Mute => "Switch",
        };
        format!("{} {}", self.path.label(), suffix)
    }

    pub fn describe(&self) -> CtlDescriptor {
        match self.kind {
            AudioboxVslCtlKind::Volume => CtlDescriptor {
                value_type: CtlValueType::Integer,
                value_count: AudioboxVslProtocol::VOLUME_CHANNELS.len(),
                min: AudioboxVslProtocol::VOLUME_MIN,
                max: AudioboxVslProtocol::VOLUME_MAX,
                step: AudioboxVslProtocol::VOLUME_STEP,
            },
            AudioboxVslCtlKind::Mute => CtlDescriptor {
                value_type: CtlValueType::Boolean,
                value_count: 1,
                min: 0,
                max: 1,
                step: 1,
            },
        }
    }
}

/// The protocol implementation for AudioBox 22 VSL.
#[derive(Default, Debug)]
pub struct AudioboxVslProtocol;

impl AudioboxVslProtocol {
    /// The numeric identifier of Feature Unit in playback path.
    pub const PLAYBACK_UNIT_ID: u8 = 10;
    /// The numeric identifier of Feature Unit in capture path.
    pub const CAPTURE_UNIT_ID: u8 = 11;

    /// -60.00 dB.
    pub const VOLUME_MIN: i32 = -6000;
    /// +12.00 dB.
    pub const VOLUME_MAX: i32 = 1200;
    pub const VOLUME_STEP: i32 = 1;

    // 1/256 dB in wire, 1/100 dB in mixer.
    const VOLUME_RAW_SCALE: i32 = 256;
    const VOLUME_DISPLAY_SCALE: i32 = 100;

    const VOLUME_CHANNELS: [AudioCh; 2] = [AudioCh::LEFT, AudioCh::RIGHT];

    const MUTE_ON: u8 = 0x01;
    const MUTE_OFF: u8 = 0x00;

    const CTL_TABLE: [(AudioboxVslPath, AudioboxVslCtlKind); 4] = [
        (AudioboxVslPath::Playback, AudioboxVslCtlKind::Volume),
        (AudioboxVslPath::Playback, AudioboxVslCtlKind::Mute),
        (AudioboxVslPath::Capture, AudioboxVslCtlKind::Volume),
        (AudioboxVslPath::Capture, AudioboxVslCtlKind::Mute),
    ];

    /// Convert the value in wire (1/256 dB) to the value for mixer (1/100 dB).
    pub fn volume_from_raw(raw: i16) -> i32 {
        (raw as i32) * Self::VOLUME_DISPLAY_SCALE / Self::VOLUME_RAW_SCALE
    }

    /// Convert the value for mixer (1/100 dB) to the value in wire (1/256 dB). The value out of
    /// range is clamped.
    pub fn volume_to_raw(volume: i32) -> i16 {
        let volume = volume.clamp(Self::VOLUME_MIN, Self::VOLUME_MAX);
        (volume * Self::VOLUME_RAW_SCALE / Self::VOLUME_DISPLAY_SCALE) as i16
    }

    /// Convert the value of mute in wire to the state of switch, true when audible.
    pub fn mute_from_raw(raw: u8) -> bool {
        raw == Self::MUTE_OFF
    }

    /// Convert the state of switch, true when audible, to the value of mute in wire.
    pub fn mute_to_raw(audible: bool) -> u8 {
        if audible {
            Self::MUTE_OFF
        } else {
            Self::MUTE_ON
        }
    }

    /// Read volume of left and right channels. The given array is untouched unless both channels
    /// are read.
    pub fn read_volume<P, T>(
        avc: &P,
        unit: &FeatureUnit,
        volumes: &mut [i32; 2],
        timeout_ms: u32,
    ) -> Result<(), Uac2Error<T>>
    where
        P: Uac2Transport<T>,
        T: Display + Clone,
    {
        let mut vals = [0; 2];
        Self::VOLUME_CHANNELS
            .iter()
            .zip(vals.iter_mut())
            .try_for_each(|(&ch, val)| {
                let mut doublet = [0; 2];
                avc.get_cur(
                    unit.id,
                    FeatureCtlSelector::Volume,
                    ch,
                    &mut doublet,
                    timeout_ms,
                )
                .map(|_| *val = Self::volume_from_raw(i16::from_le_bytes(doublet)))
            })?;
        *volumes = vals;
        Ok(())
    }

    /// Write volume of left and right channels in the order. When failing for the right channel,
    /// the left channel is already changed.
    pub fn write_volume<P, T>(
        avc: &P,
        unit: &FeatureUnit,
        volumes: &[i32; 2],
        timeout_ms: u32,
    ) -> Result<bool, Uac2Error<T>>
    where
        P: Uac2Transport<T>,
        T: Display + Clone,
    {
        Self::VOLUME_CHANNELS
            .iter()
            .zip(volumes.iter())
            .try_for_each(|(&ch, &volume)| {
                let doublet = Self::volume_to_raw(volume).to_le_bytes();
                avc.set_cur(
                    unit.id,
                    FeatureCtlSelector::Volume,
                    ch,
                    &doublet,
                    timeout_ms,
                )
            })
            .map(|_| true)
    }

    /// Read the state of mute for master channel as switch, true when audible.
    pub fn read_mute<P, T>(
        avc: &P,
        unit: &FeatureUnit,
        audible: &mut bool,
        timeout_ms: u32,
    ) -> Result<(), Uac2Error<T>>
    where
        P: Uac2Transport<T>,
        T: Display + Clone,
    {
        let mut raw = [0; 1];
        avc.get_cur(
            unit.id,
            FeatureCtlSelector::Mute,
            AudioCh::Master,
            &mut raw,
            timeout_ms,
        )
        .map(|_| *audible = Self::mute_from_raw(raw[0]))
    }

    /// Write the state of mute for master channel as switch, true when audible.
    pub fn write_mute<P, T>(
        avc: &P,
        unit: &FeatureUnit,
        audible: bool,
        timeout_ms: u32,
    ) -> Result<bool, Uac2Error<T>>
    where
        P: Uac2Transport<T>,
        T: Display + Clone,
    {
        let raw = [Self::mute_to_raw(audible)];
        avc.set_cur(
            unit.id,
            FeatureCtlSelector::Mute,
            AudioCh::Master,
            &raw,
            timeout_ms,
        )
        .map(|_| true)
    }

    /// Build the controls and publish them to the registry one by one. The first failure stops
    /// the rest of registration; controls already published are left as is.
    pub fn initialize<R, T>(
        registry: &mut R,
        config: &FeatureUnitConfig,
    ) -> Result<Vec<AudioboxVslCtl>, Uac2Error<T>>
    where
        R: CtlRegistry<AudioboxVslCtl, T>,
        T: Display + Clone,
    {
        if config.playback.id == config.capture.id {
            return Err(Uac2Error::InvalidArgument(
                "the same Feature Unit is used for playback and capture",
            ));
        }

        let ctls: Vec<AudioboxVslCtl> = Self::CTL_TABLE
            .iter()
            .map(|&(path, kind)| AudioboxVslCtl {
                path,
                kind,
                unit: config.unit(path),
            })
            .collect();

        ctls.iter().try_for_each(|ctl| {
            registry
                .register(&ctl.name(), &ctl.describe(), ctl)
                .map_err(|cause| Uac2Error::AllocationFailure(cause))
        })?;

        Ok(ctls)
    }
}
