// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2021 Takashi Sakamoto

//! Description of mixer controls and the registry to publish them.
//!
//! The module includes the metadata of controls which host mixer requires to expose them, and
//! the trait for host mixer to accept the controls.

use std::fmt::Display;

/// The type of value in control.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CtlValueType {
    Integer,
    Boolean,
}

/// The capability of control.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CtlDescriptor {
    pub value_type: CtlValueType,
    /// The number of values in the control.
    pub value_count: usize,
    pub min: i32,
    pub max: i32,
    pub step: i32,
}

/// The registry of host mixer to which controls are published.
pub trait CtlRegistry<C, T: Display + Clone> {
    /// Publish the control with the name and the capability.
    fn register(&mut self, name: &str, descriptor: &CtlDescriptor, ctl: &C) -> Result<(), T>;
}
