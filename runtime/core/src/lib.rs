// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2020 Takashi Sakamoto
pub mod card_cntr;
pub mod cmdline;
pub mod dispatcher;

use {
    clap::ValueEnum,
    glib::Error,
    tracing::Level,
};

/// The level to debug runtime.
#[derive(ValueEnum, Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Debug,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
        }
    }
}

/// Install the subscriber to print events of tracing into standard output. Nothing is printed
/// unless the level is given.
pub fn init_tracing(log_level: Option<LogLevel>) {
    if let Some(level) = log_level {
        tracing_subscriber::fmt()
            .with_max_level(Level::from(level))
            .init();
    }
}

pub trait RuntimeOperation<T>: Sized {
    fn new(arg: T, log_level: Option<LogLevel>) -> Result<Self, Error>;
    fn listen(&mut self) -> Result<(), Error>;
    fn run(&mut self) -> Result<(), Error>;
}
