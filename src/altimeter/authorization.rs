use std::{fmt, str::FromStr};

use anyhow::{Error, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
    Unknown(i64),
}

impl AuthorizationStatus {
    /// Maps a raw code reported by the sensor service.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => AuthorizationStatus::NotDetermined,
            1 => AuthorizationStatus::Restricted,
            2 => AuthorizationStatus::Denied,
            3 => AuthorizationStatus::Authorized,
            _ => AuthorizationStatus::Unknown(code),
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => f.write_str("Not determined"),
            AuthorizationStatus::Restricted => f.write_str("Restricted"),
            AuthorizationStatus::Denied => f.write_str("Denied"),
            AuthorizationStatus::Authorized => f.write_str("Authorized"),
            AuthorizationStatus::Unknown(code) => write!(f, "Unknown ({code})"),
        }
    }
}

impl FromStr for AuthorizationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-determined" => Ok(AuthorizationStatus::NotDetermined),
            "restricted" => Ok(AuthorizationStatus::Restricted),
            "denied" => Ok(AuthorizationStatus::Denied),
            "authorized" => Ok(AuthorizationStatus::Authorized),
            _ => match s.parse::<i64>() {
                Ok(code) => Ok(AuthorizationStatus::from_code(code)),
                Err(_) => bail!("unknown authorization status: {}", s),
            },
        }
    }
}
