// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

use {super::*, alsa_ctl_tlv_codec::DbInterval, protocols::ctl::*};

const TIMEOUT_MS: u32 = 100;

#[derive(Default, Debug)]
pub struct AudioboxModel {
    config: FeatureUnitConfig,
    ctls: Vec<AudioboxVslCtl>,
}

// Adds user-defined elements for the controls.
struct CardRegistry<'a>(&'a mut CardCntr);

impl<'a> CtlRegistry<AudioboxVslCtl, Error> for CardRegistry<'a> {
    fn register(
        &mut self,
        name: &str,
        descriptor: &CtlDescriptor,
        _: &AudioboxVslCtl,
    ) -> Result<(), Error> {
        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, name, 0);
        match descriptor.value_type {
            CtlValueType::Integer => {
                let tlv = DbInterval {
                    min: descriptor.min,
                    max: descriptor.max,
                    linear: false,
                    mute_avail: false,
                };
                self.0.add_int_elems(
                    &elem_id,
                    1,
                    descriptor.min,
                    descriptor.max,
                    descriptor.step,
                    descriptor.value_count,
                    Some(&Into::<Vec<u32>>::into(tlv)),
                    true,
                )
            }
            CtlValueType::Boolean => {
                self.0
                    .add_bool_elems(&elem_id, 1, descriptor.value_count, true)
            }
        }
        .map(|_| ())
    }
}

impl AudioboxModel {
    pub fn new(config: FeatureUnitConfig) -> Self {
        Self {
            config,
            ctls: Vec::new(),
        }
    }

    fn find_ctl(&self, elem_id: &ElemId) -> Option<AudioboxVslCtl> {
        let name = elem_id.name();
        self.ctls
            .iter()
            .find(|ctl| ctl.name() == name.as_str())
            .copied()
    }
}

impl CtlModel<UsbAudioUnit> for AudioboxModel {
    fn cache(&mut self, unit: &mut UsbAudioUnit) -> Result<(), Error> {
        debug!(
            interface = ?unit.interface_number(),
            playback = self.config.playback.id,
            capture = self.config.capture.id,
        );
        Ok(())
    }

    fn load(&mut self, card_cntr: &mut CardCntr) -> Result<(), Error> {
        let mut registry = CardRegistry(card_cntr);
        self.ctls = AudioboxVslProtocol::initialize(&mut registry, &self.config)
            .map_err(uac2_err_to_glib)?;

        self.ctls.iter().for_each(|ctl| {
            info!(
                name = ctl.name().as_str(),
                unit = ctl.unit.id,
                "Registered control"
            );
        });

        Ok(())
    }

    fn read(
        &mut self,
        unit: &mut UsbAudioUnit,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        let ctl = match self.find_ctl(elem_id) {
            Some(ctl) => ctl,
            None => return Ok(false),
        };

        match ctl.kind {
            AudioboxVslCtlKind::Volume => {
                let mut volumes = [0; 2];
                AudioboxVslProtocol::read_volume(&*unit, &ctl.unit, &mut volumes, TIMEOUT_MS)
                    .map(|_| elem_value.set_int(&volumes))
            }
            AudioboxVslCtlKind::Mute => {
                let mut audible = false;
                AudioboxVslProtocol::read_mute(&*unit, &ctl.unit, &mut audible, TIMEOUT_MS)
                    .map(|_| elem_value.set_bool(&[audible]))
            }
        }
        .map(|_| true)
        .map_err(uac2_err_to_glib)
    }

    fn write(
        &mut self,
        unit: &mut UsbAudioUnit,
        elem_id: &ElemId,
        _: &ElemValue,
        new: &ElemValue,
    ) -> Result<bool, Error> {
        let ctl = match self.find_ctl(elem_id) {
            Some(ctl) => ctl,
            None => return Ok(false),
        };

        match ctl.kind {
            AudioboxVslCtlKind::Volume => {
                let vals = new.int();
                let volumes = [vals[0], vals[1]];
                AudioboxVslProtocol::write_volume(&*unit, &ctl.unit, &volumes, TIMEOUT_MS)
            }
            AudioboxVslCtlKind::Mute => {
                let audible = new.boolean()[0];
                AudioboxVslProtocol::write_mute(&*unit, &ctl.unit, audible, TIMEOUT_MS)
            }
        }
        .map_err(uac2_err_to_glib)
    }
}

#[cfg(test)]
mod test {
    use {super::*, alsactl::CardError};

    #[derive(Default)]
    struct NameList(Vec<String>);

    impl CtlRegistry<AudioboxVslCtl, Error> for NameList {
        fn register(
            &mut self,
            name: &str,
            _: &CtlDescriptor,
            _: &AudioboxVslCtl,
        ) -> Result<(), Error> {
            self.0.push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn ctl_definition() {
        let mut card_cntr = CardCntr::default();
        let mut model = AudioboxModel::default();

        let error = model.load(&mut card_cntr).unwrap_err();
        assert_eq!(error.kind::<CardError>(), Some(CardError::Failed));
    }

    #[test]
    fn ctl_definition_with_duplicated_unit() {
        let mut card_cntr = CardCntr::default();
        let mut model = AudioboxModel::new(FeatureUnitConfig::new(11, 11));

        let error = model.load(&mut card_cntr).unwrap_err();
        assert_eq!(error.kind::<FileError>(), Some(FileError::Inval));
    }

    #[test]
    fn ctl_lookup_by_name() {
        let mut model = AudioboxModel::default();
        let mut names = NameList::default();
        model.ctls = AudioboxVslProtocol::initialize(&mut names, &model.config).unwrap();

        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, "Capture Switch", 0);
        let ctl = model.find_ctl(&elem_id).unwrap();
        assert_eq!(ctl.kind, AudioboxVslCtlKind::Mute);
        assert_eq!(ctl.unit.id, 11);

        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, "Playback Volume", 0);
        let ctl = model.find_ctl(&elem_id).unwrap();
        assert_eq!(ctl.kind, AudioboxVslCtlKind::Volume);
        assert_eq!(ctl.unit.id, 10);

        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, "PCM Playback Volume", 0);
        assert_eq!(model.find_ctl(&elem_id), None);
    }
}
