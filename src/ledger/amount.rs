// src/ledger/amount.rs

//! Amounts, display styles and currency display settings

use super::quantity::Quantity;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Which side of the number the commodity symbol is written on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommoditySide {
    #[default]
    Left,
    Right,
}

impl CommoditySide {
    /// Wire marker used by the server (`'L'` / `'R'`)
    pub const fn as_wire_char(&self) -> char {
        match self {
            Self::Left => 'L',
            Self::Right => 'R',
        }
    }

    /// Decode the wire marker; anything but `'R'` is treated as left
    pub fn from_wire_char(c: char) -> Self {
        if c == 'R' { Self::Right } else { Self::Left }
    }
}

/// How the server would render an amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountStyle {
    pub commodity_side: CommoditySide,
    pub commodity_spaced: bool,
    pub precision: u32,
    pub decimal_mark: String,
}

impl Default for AmountStyle {
    fn default() -> Self {
        Self {
            commodity_side: CommoditySide::Left,
            commodity_spaced: false,
            precision: 2,
            decimal_mark: ".".to_string(),
        }
    }
}

/// One commodity amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    pub commodity: String,
    pub quantity: Quantity,
    pub style: AmountStyle,
}

impl Amount {
    pub fn new(commodity: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            commodity: commodity.into(),
            quantity,
            style: AmountStyle::default(),
        }
    }

    pub fn with_style(mut self, style: AmountStyle) -> Self {
        self.style = style;
        self
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commodity.is_empty() {
            return write!(f, "{}", self.quantity);
        }
        let gap = if self.style.commodity_spaced { " " } else { "" };
        match self.style.commodity_side {
            CommoditySide::Left => write!(f, "{}{gap}{}", self.commodity, self.quantity),
            CommoditySide::Right => write!(f, "{}{gap}{}", self.quantity, self.commodity),
        }
    }
}

/// Currency display preferences applied when serializing outgoing amounts
///
/// Built once from configuration and passed explicitly into every serialize
/// call; nothing reads display state from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrencySettings {
    pub side: CommoditySide,
    pub spaced: bool,
}

impl CurrencySettings {
    pub fn new(side: CommoditySide, spaced: bool) -> Self {
        Self { side, spaced }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_char_round_trip() {
        assert_eq!(CommoditySide::from_wire_char('R'), CommoditySide::Right);
        assert_eq!(CommoditySide::from_wire_char('L'), CommoditySide::Left);
        assert_eq!(CommoditySide::from_wire_char('\0'), CommoditySide::Left);
        assert_eq!(CommoditySide::Right.as_wire_char(), 'R');
    }

    #[test]
    fn test_display_respects_style() {
        let q = Quantity::from_decimal_str("12.50").unwrap();
        let left = Amount::new("$", q);
        assert_eq!(left.to_string(), "$12.50");

        let right = Amount::new("EUR", q).with_style(AmountStyle {
            commodity_side: CommoditySide::Right,
            commodity_spaced: true,
            ..AmountStyle::default()
        });
        assert_eq!(right.to_string(), "12.50 EUR");

        assert_eq!(Amount::new("", q).to_string(), "12.50");
    }
}
