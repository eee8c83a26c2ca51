//! Field enums shared by the three entities.
//!
//! # Design
//! Every constrained field from the wire protocol gets its own enum, so an
//! out-of-set value is unrepresentable once it is past the parse boundary.
//! `FromStr` is that boundary: unknown strings become
//! [`Error::InvalidValue`](crate::Error::InvalidValue) naming the allowed
//! set. Serde attributes carry the lowercase wire spellings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{bad_attribute, Error};

/// Physical mail size accepted by the print service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    #[default]
    Standard,
}

impl Size {
    pub const ALL: &'static [&'static str] = &["standard"];

    pub fn as_str(self) -> &'static str {
        match self {
            Size::Standard => "standard",
        }
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "standard" => Ok(Size::Standard),
            _ => Err(bad_attribute("size", Self::ALL)),
        }
    }
}

/// Printing and dispatch turnaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turnaround {
    #[default]
    ThreeDay,
}

impl Turnaround {
    pub const ALL: &'static [&'static str] = &["threeday"];

    pub fn as_str(self) -> &'static str {
        match self {
            Turnaround::ThreeDay => "threeday",
        }
    }
}

impl FromStr for Turnaround {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "threeday" => Ok(Turnaround::ThreeDay),
            _ => Err(bad_attribute("turnaround", Self::ALL)),
        }
    }
}

/// Print style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Color,
}

impl Style {
    pub const ALL: &'static [&'static str] = &["color"];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Color => "color",
        }
    }
}

impl FromStr for Style {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "color" => Ok(Style::Color),
            _ => Err(bad_attribute("style", Self::ALL)),
        }
    }
}

/// Output sheet arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    #[default]
    Single,
}

impl Output {
    pub const ALL: &'static [&'static str] = &["single"];

    pub fn as_str(self) -> &'static str {
        match self {
            Output::Single => "single",
        }
    }
}

impl FromStr for Output {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "single" => Ok(Output::Single),
            _ => Err(bad_attribute("output", Self::ALL)),
        }
    }
}

/// Workflow state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Processing,
    Hold,
    Archive,
}

impl BatchStatus {
    pub const ALL: &'static [&'static str] = &["processing", "hold", "archive"];

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Hold => "hold",
            BatchStatus::Archive => "archive",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "processing" => Ok(BatchStatus::Processing),
            "hold" => Ok(BatchStatus::Hold),
            "archive" => Ok(BatchStatus::Archive),
            _ => Err(bad_attribute("status", Self::ALL)),
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned delivery state of a mailing. Never set locally except for
/// the `Received` placeholder right after a successful mail call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailingStatus {
    Received,
    Render,
    Error,
    Queued,
    Assigned,
    Processing,
    Printed,
    Shipped,
}

impl MailingStatus {
    pub const ALL: &'static [&'static str] = &[
        "received",
        "render",
        "error",
        "queued",
        "assigned",
        "processing",
        "printed",
        "shipped",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MailingStatus::Received => "received",
            MailingStatus::Render => "render",
            MailingStatus::Error => "error",
            MailingStatus::Queued => "queued",
            MailingStatus::Assigned => "assigned",
            MailingStatus::Processing => "processing",
            MailingStatus::Printed => "printed",
            MailingStatus::Shipped => "shipped",
        }
    }
}

impl FromStr for MailingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "received" => Ok(MailingStatus::Received),
            "render" => Ok(MailingStatus::Render),
            "error" => Ok(MailingStatus::Error),
            "queued" => Ok(MailingStatus::Queued),
            "assigned" => Ok(MailingStatus::Assigned),
            "processing" => Ok(MailingStatus::Processing),
            "printed" => Ok(MailingStatus::Printed),
            "shipped" => Ok(MailingStatus::Shipped),
            _ => Err(bad_attribute("status", Self::ALL)),
        }
    }
}

impl fmt::Display for MailingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
