use std::str::FromStr;

use anyhow::{Error, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Toggle,
    Refresh,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Command::On),
            "off" => Ok(Command::Off),
            "toggle" | "t" => Ok(Command::Toggle),
            "refresh" | "r" => Ok(Command::Refresh),
            "quit" | "q" => Ok(Command::Quit),
            _ => bail!("unknown command: {} (expected on, off, toggle, refresh or quit)", s),
        }
    }
}
