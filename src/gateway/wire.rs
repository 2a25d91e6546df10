// src/gateway/wire.rs

//! Unified wire model shared by every JSON API generation
//!
//! The structs here accept the union of what the supported server versions
//! send and absorb their quirks at the boundary:
//!
//! - account balances live either in `aibalance` or in
//!   `adata.pdperiods[0][1].bdincludingsubs`; [`WireAccount::balances`]
//!   prefers the newer location
//! - `ptransaction_` arrives as an integer or a string and is kept as a string
//! - the decimal mark arrives as `asdecimalmark` (string) or `asdecimalpoint`
//!   (char), precision as a number or `{"tag":"Precision","contents":N}`
//! - `tsourcepos` is a single object or a list of two, and old servers use
//!   `{"tag":..., "contents":[file,[line,column]]}` for each position
//!
//! On output the generation-specific shape is selected by the gateway.

use super::GenerationRules;
use crate::error::{Error, Result};
use crate::ledger::{
    Amount, AmountStyle, CommoditySide, CurrencySettings, DeclarationInfo, LedgerAccount,
    LedgerTransaction, Quantity, TransactionLine, quantity::MAX_SCALE,
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Date format of `tdate`
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Decimal places used for outgoing amounts unless the amount needs more
pub const OUTGOING_PRECISION: u32 = 2;

const UNMARKED: &str = "Unmarked";
const REGULAR_POSTING: &str = "RegularPosting";

fn unmarked() -> String {
    UNMARKED.to_string()
}

fn regular_posting() -> String {
    REGULAR_POSTING.to_string()
}

fn default_decimal_mark() -> String {
    ".".to_string()
}

// =============================================================================
// Lenient field decoders
// =============================================================================

fn de_commodity_side<'de, D>(deserializer: D) -> std::result::Result<CommoditySide, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.chars().next())
        .map(CommoditySide::from_wire_char)
        .unwrap_or_default())
}

fn ser_commodity_side<S>(side: &CommoditySide, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_char(side.as_wire_char())
}

fn de_decimal_mark<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).unwrap_or_else(default_decimal_mark))
}

fn de_precision<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let precision = match &value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => map.get("contents").and_then(Value::as_u64),
        _ => None,
    };
    Ok(precision.unwrap_or(0).min(u64::from(MAX_SCALE)) as u32)
}

fn de_trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_string()).unwrap_or_default())
}

fn de_string_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Amounts
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireQuantity {
    #[serde(rename = "decimalMantissa")]
    pub decimal_mantissa: i64,
    #[serde(rename = "decimalPlaces")]
    pub decimal_places: u32,
    #[serde(rename = "floatingPoint", default)]
    pub floating_point: f64,
}

impl WireQuantity {
    pub fn to_quantity(&self) -> Result<Quantity> {
        if self.decimal_places > MAX_SCALE {
            return Err(Error::parse(format!(
                "too many decimal places: {}",
                self.decimal_places
            )));
        }
        Ok(Quantity::new(self.decimal_mantissa, self.decimal_places))
    }

    pub fn from_quantity(q: Quantity) -> Self {
        Self {
            decimal_mantissa: q.mantissa,
            decimal_places: q.scale,
            floating_point: q.to_approx(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireStyle {
    #[serde(
        default,
        deserialize_with = "de_commodity_side",
        serialize_with = "ser_commodity_side"
    )]
    pub ascommodityside: CommoditySide,
    #[serde(default)]
    pub ascommodityspaced: bool,
    #[serde(default)]
    pub asdigitgroups: Option<Value>,
    #[serde(
        default = "default_decimal_mark",
        alias = "asdecimalpoint",
        deserialize_with = "de_decimal_mark"
    )]
    pub asdecimalmark: String,
    #[serde(default, deserialize_with = "de_precision")]
    pub asprecision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asrounding: Option<String>,
}

impl WireStyle {
    pub fn to_style(&self) -> AmountStyle {
        AmountStyle {
            commodity_side: self.ascommodityside,
            commodity_spaced: self.ascommodityspaced,
            precision: self.asprecision,
            decimal_mark: self.asdecimalmark.clone(),
        }
    }

    /// Outgoing style: display settings from the caller, the rest from the generation
    pub fn outgoing(rules: &GenerationRules, settings: CurrencySettings, precision: u32) -> Self {
        Self {
            ascommodityside: settings.side,
            ascommodityspaced: settings.spaced,
            asdigitgroups: None,
            asdecimalmark: rules.decimal_mark.to_string(),
            asprecision: precision,
            asrounding: rules.rounding.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAmount {
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub acommodity: String,
    pub aquantity: WireQuantity,
    #[serde(default)]
    pub aismultiplier: bool,
    #[serde(default)]
    pub astyle: Option<WireStyle>,
    #[serde(default)]
    pub aprice: Option<Value>,
}

impl WireAmount {
    pub fn to_amount(&self) -> Result<Amount> {
        let amount = Amount::new(self.acommodity.clone(), self.aquantity.to_quantity()?);
        Ok(match &self.astyle {
            Some(style) => amount.with_style(style.to_style()),
            None => amount,
        })
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireBalanceData {
    #[serde(default)]
    pub bdincludingsubs: Vec<WireAmount>,
    #[serde(default)]
    pub bdexcludingsubs: Vec<WireAmount>,
    #[serde(default)]
    pub bdnumpostings: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAccountData {
    /// `[[date, balance-data], ...]`
    #[serde(default)]
    pub pdperiods: Vec<(String, WireBalanceData)>,
    #[serde(default)]
    pub pdpre: Option<WireBalanceData>,
}

impl WireAccountData {
    pub fn first_period(&self) -> Option<&WireBalanceData> {
        self.pdperiods.first().map(|(_, data)| data)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDeclarationInfo {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAccount {
    pub aname: String,
    #[serde(default)]
    pub anumpostings: u64,
    #[serde(default)]
    pub aibalance: Option<Vec<WireAmount>>,
    #[serde(default)]
    pub aebalance: Option<Vec<WireAmount>>,
    #[serde(default)]
    pub adeclarationinfo: Option<WireDeclarationInfo>,
    #[serde(default)]
    pub adata: Option<WireAccountData>,
}

impl WireAccount {
    /// Inclusive balances, from the period data when present
    pub fn balances(&self) -> &[WireAmount] {
        if let Some(period) = self.adata.as_ref().and_then(WireAccountData::first_period) {
            if !period.bdincludingsubs.is_empty() {
                return &period.bdincludingsubs;
            }
        }
        self.aibalance.as_deref().unwrap_or(&[])
    }

    pub fn num_postings(&self) -> u64 {
        self.adata
            .as_ref()
            .and_then(WireAccountData::first_period)
            .map(|p| p.bdnumpostings)
            .unwrap_or(self.anumpostings)
    }

    pub fn into_account(self) -> Result<LedgerAccount> {
        if self.aname.is_empty() {
            return Err(Error::parse("account without a name"));
        }

        let mut account = LedgerAccount::new(self.aname.clone());
        account.num_postings = self.num_postings();
        for balance in self.balances() {
            account.add_amount(balance.to_amount()?)?;
        }
        account.declaration = self.adeclarationinfo.and_then(|info| {
            info.file.map(|file| DeclarationInfo {
                file,
                line: info.line,
            })
        });
        Ok(account)
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePos {
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "sourceLine")]
    pub source_line: u32,
    #[serde(rename = "sourceColumn")]
    pub source_column: u32,
}

impl Default for SourcePos {
    fn default() -> Self {
        Self {
            source_name: String::new(),
            source_line: 1,
            source_column: 1,
        }
    }
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourcePos {
    Tagged {
        #[allow(dead_code)]
        tag: String,
        contents: (String, (u32, u32)),
    },
    Named {
        #[serde(rename = "sourceName", default)]
        source_name: String,
        #[serde(rename = "sourceLine", default = "one")]
        source_line: u32,
        #[serde(rename = "sourceColumn", default = "one")]
        source_column: u32,
    },
}

impl From<RawSourcePos> for SourcePos {
    fn from(raw: RawSourcePos) -> Self {
        match raw {
            RawSourcePos::Tagged {
                contents: (source_name, (source_line, source_column)),
                ..
            } => Self {
                source_name,
                source_line,
                source_column,
            },
            RawSourcePos::Named {
                source_name,
                source_line,
                source_column,
            } => Self {
                source_name,
                source_line,
                source_column,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourcePositions {
    Many(Vec<RawSourcePos>),
    One(RawSourcePos),
}

/// Transaction source positions, always one or two entries
///
/// `as_list` selects the output shape: a JSON list (newest generation) or
/// the first position as a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePositions {
    pub positions: Vec<SourcePos>,
    pub as_list: bool,
}

impl Default for SourcePositions {
    fn default() -> Self {
        Self {
            positions: vec![SourcePos::default()],
            as_list: false,
        }
    }
}

impl SourcePositions {
    /// Fresh positions for an outgoing transaction
    pub fn outgoing(as_list: bool) -> Self {
        let count = if as_list { 2 } else { 1 };
        Self {
            positions: vec![SourcePos::default(); count],
            as_list,
        }
    }
}

impl<'de> Deserialize<'de> for SourcePositions {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (mut positions, as_list): (Vec<SourcePos>, bool) =
            match Option::<RawSourcePositions>::deserialize(deserializer)? {
                Some(RawSourcePositions::Many(list)) => {
                    (list.into_iter().map(SourcePos::from).take(2).collect(), true)
                }
                Some(RawSourcePositions::One(pos)) => (vec![pos.into()], false),
                None => (Vec::new(), false),
            };
        if positions.is_empty() {
            positions.push(SourcePos::default());
        }
        Ok(Self { positions, as_list })
    }
}

impl Serialize for SourcePositions {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.as_list {
            self.positions.serialize(serializer)
        } else {
            match self.positions.first() {
                Some(pos) => pos.serialize(serializer),
                None => SourcePos::default().serialize(serializer),
            }
        }
    }
}

/// `ptransaction_`: integer in old generations, string in newer ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef(pub String);

impl Default for TransactionRef {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl<'de> Deserialize<'de> for TransactionRef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => Self(n.to_string()),
            Value::String(s) => Self(s),
            _ => Self::default(),
        })
    }
}

impl Serialize for TransactionRef {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePosting {
    #[serde(default)]
    pub pbalanceassertion: Option<Value>,
    #[serde(default = "unmarked")]
    pub pstatus: String,
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub paccount: String,
    #[serde(default)]
    pub pamount: Vec<WireAmount>,
    #[serde(default)]
    pub pdate: Option<String>,
    #[serde(default)]
    pub pdate2: Option<String>,
    #[serde(default = "regular_posting")]
    pub ptype: String,
    #[serde(default, deserialize_with = "de_trimmed")]
    pub pcomment: String,
    #[serde(default)]
    pub ptags: Vec<Value>,
    #[serde(default)]
    pub poriginal: Option<Value>,
    #[serde(default, rename = "ptransaction_")]
    pub ptransaction: TransactionRef,
}

impl WirePosting {
    pub fn to_line(&self) -> Result<TransactionLine> {
        let line = match self.pamount.first() {
            Some(amount) => TransactionLine::new(
                self.paccount.clone(),
                Some(amount.aquantity.to_quantity()?),
                amount.acommodity.clone(),
            ),
            None => TransactionLine::new(self.paccount.clone(), None, ""),
        };
        Ok(line.with_comment(self.pcomment.clone()))
    }

    fn outgoing(
        line: &TransactionLine,
        transaction_ref: &TransactionRef,
        rules: &GenerationRules,
        settings: CurrencySettings,
    ) -> Result<Self> {
        let pamount = match line.amount {
            Some(quantity) => {
                let precision = quantity.scale.max(OUTGOING_PRECISION);
                let quantity = quantity.rescale(precision).ok_or_else(|| {
                    Error::Validation(format!("amount {quantity} out of range"))
                })?;
                vec![WireAmount {
                    acommodity: line.currency.clone(),
                    aquantity: WireQuantity::from_quantity(quantity),
                    aismultiplier: false,
                    astyle: Some(WireStyle::outgoing(rules, settings, precision)),
                    aprice: None,
                }]
            }
            None => Vec::new(),
        };

        Ok(Self {
            pbalanceassertion: None,
            pstatus: unmarked(),
            paccount: line.account_name.clone(),
            pamount,
            pdate: None,
            pdate2: None,
            ptype: regular_posting(),
            pcomment: line.comment.clone().unwrap_or_default(),
            ptags: Vec::new(),
            poriginal: None,
            ptransaction: transaction_ref.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTransaction {
    #[serde(default)]
    pub tindex: i64,
    pub tdate: String,
    #[serde(default)]
    pub tdate2: Option<String>,
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub tdescription: String,
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub tcomment: String,
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub tcode: String,
    #[serde(default = "unmarked")]
    pub tstatus: String,
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub tprecedingcomment: String,
    #[serde(default)]
    pub ttags: Vec<Value>,
    #[serde(default)]
    pub tpostings: Vec<WirePosting>,
    #[serde(default)]
    pub tsourcepos: SourcePositions,
}

impl WireTransaction {
    pub fn into_transaction(self) -> Result<LedgerTransaction> {
        let date = NaiveDate::parse_from_str(&self.tdate, WIRE_DATE_FORMAT)
            .map_err(|e| Error::parse(format!("invalid transaction date {:?}: {e}", self.tdate)))?;

        let mut tx = LedgerTransaction::new(self.tindex, date, self.tdescription);
        let comment = self.tcomment.trim();
        if !comment.is_empty() {
            tx.comment = Some(comment.to_string());
        }
        for posting in &self.tpostings {
            tx.add_line(posting.to_line()?);
        }
        Ok(tx)
    }

    /// Build the outgoing shape for one generation
    ///
    /// Lines without an account name are dropped; lines without an amount
    /// are sent with an empty amount list for the server to balance.
    pub fn from_transaction(
        tx: &LedgerTransaction,
        rules: &GenerationRules,
        settings: CurrencySettings,
    ) -> Result<Self> {
        let transaction_ref = TransactionRef(tx.ledger_id.to_string());
        let tpostings = tx
            .lines
            .iter()
            .filter(|line| !line.account_name.is_empty())
            .map(|line| WirePosting::outgoing(line, &transaction_ref, rules, settings))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tindex: tx.ledger_id,
            tdate: tx.date.format(WIRE_DATE_FORMAT).to_string(),
            tdate2: None,
            tdescription: tx.description.clone(),
            tcomment: tx.comment.clone().unwrap_or_default(),
            tcode: String::new(),
            tstatus: unmarked(),
            tprecedingcomment: String::new(),
            ttags: Vec::new(),
            tpostings,
            tsourcepos: SourcePositions::outgoing(rules.source_pos_as_list),
        })
    }
}
