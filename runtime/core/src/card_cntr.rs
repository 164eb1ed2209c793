// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2020 Takashi Sakamoto

use {
    super::*,
    alsactl::{prelude::*, *},
    glib::FileError,
    tracing::{debug, debug_span, enabled, Level},
};

/// The container of user-defined elements added by the runtime, with their cached values.
#[derive(Default)]
pub struct CardCntr {
    pub card: Card,
    entries: Vec<(ElemInfo, ElemValue)>,
}

pub trait CtlModel<O: Sized> {
    fn cache(&mut self, _: &mut O) -> Result<(), Error>;
    fn load(&mut self, card_cntr: &mut CardCntr) -> Result<(), Error>;
    fn read(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error>;
    fn write(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        old: &ElemValue,
        new: &ElemValue,
    ) -> Result<bool, Error>;
}

impl Drop for CardCntr {
    fn drop(&mut self) {
        self.entries
            .iter()
            .filter_map(|(elem_info, _)| elem_id_from_elem_info(elem_info))
            .for_each(|elem_id| {
                let _ = self.card.remove_elems(&elem_id);
            });
    }
}

fn elem_id_from_elem_info(elem_info: &ElemInfo) -> Option<ElemId> {
    match elem_info {
        ElemInfo::Iec60958(info) => info.elem_id(),
        ElemInfo::Boolean(info) => info.elem_id(),
        ElemInfo::Bytes(info) => info.elem_id(),
        ElemInfo::Integer(info) => info.elem_id(),
        ElemInfo::Integer64(info) => info.elem_id(),
        ElemInfo::Enumerated(info) => info.elem_id(),
    }
}

fn match_elem_id(elem_info: &ElemInfo, elem_id: &ElemId) -> bool {
    elem_id_from_elem_info(elem_info)
        .map(|e| e.eq(elem_id))
        .unwrap_or_default()
}

fn dump_elem_info(elem_info: &ElemInfo) {
    if let Some(elem_id) = elem_id_from_elem_info(elem_info) {
        match elem_info {
            ElemInfo::Boolean(info) => {
                debug!(
                    numid=?elem_id.numid(),
                    access=?info.access(),
                    elem_type=?info.elem_type(),
                    owner=?info.owner(),
                    value_count=?info.value_count()
                );
            }
            ElemInfo::Integer(info) => {
                debug!(
                    numid=?elem_id.numid(),
                    access=?info.access(),
                    elem_type=?info.elem_type(),
                    owner=?info.owner(),
                    value_count=?info.value_count(),
                    value_min=?info.value_min(),
                    value_max=?info.value_max(),
                    value_step=?info.value_step()
                );
            }
            _ => debug!(numid=?elem_id.numid(), "unsupported type of element"),
        }
    }
}

fn value_array_literal(elem_info: &ElemInfo, elem_value: &ElemValue) -> String {
    match elem_info {
        ElemInfo::Boolean(info) => {
            let count = info.value_count() as usize;
            format!("{:?}", &elem_value.boolean()[..count])
        }
        ElemInfo::Integer(info) => {
            let count = info.value_count() as usize;
            format!("{:?}", &elem_value.int()[..count])
        }
        _ => String::new(),
    }
}

impl CardCntr {
    pub fn add_bool_elems(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        value_count: usize,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let _entry = debug_span!("boolean").entered();

        let elem_info = ElemInfoBoolean::new();
        elem_info.set_value_count(value_count as u32);

        let access = ElemAccessFlag::READ | ElemAccessFlag::WRITE | ElemAccessFlag::VOLATILE;
        elem_info.set_access(access);

        let res = self.register_elems(elem_id, elem_count, &elem_info, None, unlock);
        debug!(
            name = ?elem_id.name().as_str(),
            iface = ?elem_id.iface(),
            index = ?elem_id.index(),
            ?elem_count,
            ?value_count,
            ?unlock,
            ?res,
        );
        res
    }

    pub fn add_int_elems(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        min: i32,
        max: i32,
        step: i32,
        value_count: usize,
        tlv: Option<&[u32]>,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let _entry = debug_span!("integer").entered();

        let elem_info = ElemInfoInteger::new();
        elem_info.set_value_count(value_count as u32);
        elem_info.set_value_min(min);
        elem_info.set_value_max(max);
        elem_info.set_value_step(step);

        let mut access = ElemAccessFlag::READ | ElemAccessFlag::WRITE | ElemAccessFlag::VOLATILE;
        if tlv.is_some() {
            access |= ElemAccessFlag::TLV_READ | ElemAccessFlag::TLV_WRITE;
        }
        elem_info.set_access(access);

        let res = self.register_elems(elem_id, elem_count, &elem_info, tlv, unlock);
        debug!(
            name = ?elem_id.name().as_str(),
            iface = ?elem_id.iface(),
            index = ?elem_id.index(),
            ?elem_count,
            ?min,
            ?max,
            ?step,
            ?value_count,
            ?tlv,
            ?unlock,
            ?res,
        );
        res
    }

    fn register_elems<O: AsRef<ElemInfoCommon>>(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        elem_info: &O,
        tlv: Option<&[u32]>,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let _enter = debug_span!("register").entered();

        // Reuse the elements left by the previous instance of runtime.
        let elem_id_list = self.card.elem_id_list()?;
        let elem_id_list = if elem_id_list.iter().any(|eid| eid.eq(elem_id)) {
            let elem_id_list: Vec<ElemId> = elem_id_list
                .into_iter()
                .filter(|eid| eid.name() == elem_id.name() && eid.iface() == elem_id.iface())
                .collect();

            if elem_id_list.len() != elem_count {
                let label = format!(
                    "{} is already added however the count is unexpected.",
                    elem_id.name()
                );
                return Err(Error::new(FileError::Inval, &label));
            }

            elem_id_list.iter().try_for_each(|elem_id| {
                let info = self.card.elem_info(elem_id)?;
                let access = info.as_ref().access();

                if access.contains(ElemAccessFlag::OWNER) {
                    let label = format!("{} is already added by runtime.", elem_id.name());
                    Err(Error::new(FileError::Inval, &label))
                } else if access.contains(ElemAccessFlag::LOCK) {
                    let label = format!("{} is locked by the other process.", elem_id.name());
                    Err(Error::new(FileError::Inval, &label))
                } else if info.as_ref().elem_type() != elem_info.as_ref().elem_type() {
                    let label = format!(
                        "{} is already added but has unexpected type.",
                        elem_id.name()
                    );
                    Err(Error::new(FileError::Inval, &label))
                } else {
                    Ok(())
                }
            })?;

            elem_id_list
        } else {
            self.card.add_elems(elem_id, elem_count as u32, elem_info)?
        };

        elem_id_list.iter().try_for_each(|elem_id| {
            let elem_info = self.card.elem_info(elem_id).map_err(|err| {
                let _ = self.card.remove_elems(&elem_id_list[0]);
                err
            })?;

            let elem_id = elem_info.as_ref().elem_id().ok_or_else(|| {
                let _ = self.card.remove_elems(&elem_id_list[0]);
                Error::new(FileError::Io, "Unexpected result to detect element id")
            })?;

            let mut v = ElemValue::new();
            self.card.read_elem_value(&elem_id, &mut v)?;

            debug!(
                numid = ?elem_id.numid(),
                name = ?elem_id.name().as_str(),
                iface = ?elem_id.iface(),
                index = ?elem_id.index(),
            );

            if enabled!(Level::DEBUG) {
                dump_elem_info(&elem_info);
            }

            self.entries.push((elem_info, v));
            Ok::<(), Error>(())
        })?;

        if let Some(cntr) = tlv {
            elem_id_list.iter().try_for_each(|elem_id| {
                let res = self.card.write_elem_tlv(elem_id, cntr);
                debug!(numid=?elem_id.numid(), ?tlv, ?res);
                res
            })?;
        }

        if unlock {
            elem_id_list.iter().for_each(|elem_id| {
                // Ignore any errors.
                let res = self.card.lock_elem(elem_id, false);
                debug!(numid=?elem_id.numid(), ?unlock, ?res);
            });
        }

        Ok(elem_id_list)
    }

    /// Dispatch the event of element. At addition, the value is read from hardware and written
    /// to kernel. At change, the value is read from kernel and written to hardware; if it fails,
    /// the previous value is written back to kernel.
    pub fn dispatch_elem_event<O, T>(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        events: &ElemEventMask,
        ctl_model: &mut T,
    ) -> Result<(), Error>
    where
        O: Sized,
        T: CtlModel<O>,
    {
        if events.contains(ElemEventMask::REMOVE) {
            let _enter = debug_span!("remove").entered();

            debug!(numid = ?elem_id.numid());

            self.entries
                .retain(|(elem_info, _)| !match_elem_id(elem_info, elem_id));
            return Ok(());
        }

        if events.contains(ElemEventMask::ADD) {
            let _enter = debug_span!("add").entered();

            for (elem_info, v) in &mut self.entries {
                if !match_elem_id(elem_info, elem_id) {
                    continue;
                }

                let mut val = ElemValue::new();

                let _enter = debug_span!("hardware").entered();

                let res = ctl_model.read(unit, elem_id, &mut val);
                debug!(
                    numid = elem_id.numid(),
                    values = value_array_literal(elem_info, &val),
                    ?res,
                );

                _enter.exit();

                if let Ok(res) = res {
                    if !res || v.equal(&val) {
                        continue;
                    }

                    let _enter = debug_span!("kernel").entered();

                    let res = self.card.write_elem_value(elem_id, &val);
                    debug!(
                        numid = elem_id.numid(),
                        values = value_array_literal(elem_info, &val),
                        ?res,
                    );

                    _enter.exit();

                    if res.is_err() {
                        continue;
                    }

                    *v = val;
                }
            }
        }

        if events.contains(ElemEventMask::VALUE) {
            let _enter = debug_span!("value").entered();

            for (elem_info, v) in &mut self.entries {
                if !match_elem_id(elem_info, elem_id) {
                    continue;
                }

                let _enter = debug_span!("kernel").entered();

                let mut val = ElemValue::new();
                let res = self.card.read_elem_value(elem_id, &mut val);
                debug!(
                    numid = elem_id.numid(),
                    old_values = value_array_literal(elem_info, v),
                    new_values = value_array_literal(elem_info, &val),
                    ?res,
                );

                _enter.exit();

                // No need to update the hardware.
                if res.is_err() || v.equal(&val) {
                    continue;
                }

                let _enter = debug_span!("hardware").entered();

                let res = ctl_model.write(unit, elem_id, v, &val);
                debug!(
                    numid = elem_id.numid(),
                    values = value_array_literal(elem_info, &val),
                    ?res,
                );

                _enter.exit();

                match res {
                    Ok(true) => {
                        *v = val;
                        return Ok(());
                    }
                    Ok(false) => (),
                    Err(err) => {
                        // Back to old values.
                        self.card.write_elem_value(elem_id, v)?;
                        return Err(err);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_elems_without_card() {
        let mut card_cntr = CardCntr::default();

        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, "Playback Volume", 0);
        let error = card_cntr
            .add_int_elems(&elem_id, 1, -6000, 1200, 1, 2, None, true)
            .unwrap_err();
        assert_eq!(error.kind::<CardError>(), Some(CardError::Failed));

        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, "Playback Switch", 0);
        let error = card_cntr
            .add_bool_elems(&elem_id, 1, 1, true)
            .unwrap_err();
        assert_eq!(error.kind::<CardError>(), Some(CardError::Failed));
    }
}
