//! Normal/Alert presentation state and everything derived from it.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const NORMAL_QUOTES: [&str; 5] = [
    "Currency is just paper with an ego.",
    "Zeros are the scars of history.",
    "Stability is a glitch in the simulation.",
    "The printer never sleeps, why should you?",
    "Redenomination: The financial version of 'turning it off and on again'.",
];

const ALERT_QUOTES: [&str; 5] = [
    "RUN.",
    "THE SIMULATION IS COLLAPSING.",
    "SELL EVERYTHING. BUY BREAD.",
    "ZIMBABWE WAS JUST THE TUTORIAL.",
    "ZERO IS COMING FOR YOUR CREDITS.",
];

pub const ALERT_WARNING: &str = "CRITICAL ERROR: MARKET DETONATION DETECTED!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationState {
    #[default]
    Normal,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub primary: &'static str,
    pub background: &'static str,
    pub map_scale: &'static str,
}

const NORMAL_PALETTE: Palette = Palette {
    primary: "#00d4ff",
    background: "#0a0a12",
    map_scale: "Viridis",
};

const ALERT_PALETTE: Palette = Palette {
    primary: "#ff0000",
    background: "#1b0000",
    map_scale: "Reds",
};

impl PresentationState {
    pub fn from_flag(alert: bool) -> Self {
        if alert {
            PresentationState::Alert
        } else {
            PresentationState::Normal
        }
    }

    pub fn is_alert(self) -> bool {
        self == PresentationState::Alert
    }

    /// The meltdown button. Applying it twice restores the original state.
    pub fn toggle(self) -> Self {
        match self {
            PresentationState::Normal => PresentationState::Alert,
            PresentationState::Alert => PresentationState::Normal,
        }
    }

    pub fn confidence(self) -> u8 {
        match self {
            PresentationState::Normal => 85,
            PresentationState::Alert => 15,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            PresentationState::Normal => NORMAL_PALETTE,
            PresentationState::Alert => ALERT_PALETTE,
        }
    }

    pub fn quotes(self) -> &'static [&'static str] {
        match self {
            PresentationState::Normal => &NORMAL_QUOTES,
            PresentationState::Alert => &ALERT_QUOTES,
        }
    }

    pub fn pick_quote<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.quotes().choose(rng).copied().unwrap_or_default()
    }

    pub fn headline(self) -> &'static str {
        match self {
            PresentationState::Normal => "2026",
            PresentationState::Alert => "RED_ALERT",
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            PresentationState::Normal => "STABLE",
            PresentationState::Alert => "BREACHED",
        }
    }

    pub fn footer(self) -> &'static str {
        match self {
            PresentationState::Normal => "SYSTEM_READY",
            PresentationState::Alert => "LEVEL_RED",
        }
    }

    pub fn analyst_version(self) -> &'static str {
        match self {
            PresentationState::Normal => "4.2",
            PresentationState::Alert => "9.9",
        }
    }

    pub fn shaking(self) -> bool {
        self.is_alert()
    }

    pub fn warning(self) -> Option<&'static str> {
        self.is_alert().then_some(ALERT_WARNING)
    }
}

/// The two decorative sidebar toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub neon_glow: bool,
    pub scanlines: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            neon_glow: true,
            scanlines: true,
        }
    }
}

impl DisplayOptions {
    pub fn glow(&self, state: PresentationState) -> String {
        if self.neon_glow {
            format!("0 0 15px {}", state.palette().primary)
        } else {
            "none".to_string()
        }
    }

    pub fn scanline_opacity(&self) -> &'static str {
        if self.scanlines {
            "0.1"
        } else {
            "0"
        }
    }
}
